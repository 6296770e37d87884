//! SQLite-backed game index and payload storage.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use storyforge_domain::{GameData, GameId, GameIndexEntry};

use super::{from_db_time, limit_value, parse_id, to_db_time};
use crate::infrastructure::ports::{GameRepo, RepoError};

pub struct SqliteGameRepo {
    pool: SqlitePool,
}

impl SqliteGameRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn write_index(
        tx: &mut Transaction<'_, Sqlite>,
        entry: &GameIndexEntry,
    ) -> Result<(), RepoError> {
        let tags = serde_json::to_string(&entry.tags).map_err(RepoError::serialization)?;

        sqlx::query(
            r#"
            INSERT INTO games_index (
                id, title, description, priority, created_at, updated_at, version,
                thumbnail_asset_id, background_asset_id, tags_json, author
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                priority = excluded.priority,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                version = excluded.version,
                thumbnail_asset_id = excluded.thumbnail_asset_id,
                background_asset_id = excluded.background_asset_id,
                tags_json = excluded.tags_json,
                author = excluded.author
            "#,
        )
        .bind(entry.id.to_string())
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(entry.priority)
        .bind(to_db_time(&entry.created_at))
        .bind(to_db_time(&entry.updated_at))
        .bind(i64::from(entry.version))
        .bind(&entry.thumbnail_asset_id)
        .bind(&entry.background_asset_id)
        .bind(tags)
        .bind(&entry.author)
        .execute(&mut **tx)
        .await
        .map_err(|e| RepoError::database("games_index", e))?;

        Ok(())
    }

    async fn write_data(
        tx: &mut Transaction<'_, Sqlite>,
        data: &GameData,
    ) -> Result<(), RepoError> {
        let json = serde_json::to_string(&data.data).map_err(RepoError::serialization)?;

        sqlx::query(
            r#"
            INSERT INTO games_data (id, data_json, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                data_json = excluded.data_json,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(data.id.to_string())
        .bind(json)
        .bind(to_db_time(&data.created_at))
        .bind(to_db_time(&data.updated_at))
        .execute(&mut **tx)
        .await
        .map_err(|e| RepoError::database("games_data", e))?;

        Ok(())
    }

    /// Rewrites an existing index row; `NotFound` when the row is gone.
    async fn update_index(
        tx: &mut Transaction<'_, Sqlite>,
        entry: &GameIndexEntry,
    ) -> Result<(), RepoError> {
        let tags = serde_json::to_string(&entry.tags).map_err(RepoError::serialization)?;

        let result = sqlx::query(
            r#"
            UPDATE games_index SET
                title = ?, description = ?, priority = ?, created_at = ?, updated_at = ?,
                version = ?, thumbnail_asset_id = ?, background_asset_id = ?, tags_json = ?,
                author = ?
            WHERE id = ?
            "#,
        )
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(entry.priority)
        .bind(to_db_time(&entry.created_at))
        .bind(to_db_time(&entry.updated_at))
        .bind(i64::from(entry.version))
        .bind(&entry.thumbnail_asset_id)
        .bind(&entry.background_asset_id)
        .bind(tags)
        .bind(&entry.author)
        .bind(entry.id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(|e| RepoError::database("games_index", e))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::not_found("Game", entry.id));
        }
        Ok(())
    }

    /// Rewrites an existing payload row; `NotFound` when the row is gone.
    async fn update_data(
        tx: &mut Transaction<'_, Sqlite>,
        data: &GameData,
    ) -> Result<(), RepoError> {
        let json = serde_json::to_string(&data.data).map_err(RepoError::serialization)?;

        let result = sqlx::query(
            "UPDATE games_data SET data_json = ?, created_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(json)
        .bind(to_db_time(&data.created_at))
        .bind(to_db_time(&data.updated_at))
        .bind(data.id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(|e| RepoError::database("games_data", e))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::not_found("Game", data.id));
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Sqlite>, RepoError> {
        self.pool
            .begin()
            .await
            .map_err(|e| RepoError::database("games_begin", e))
    }

    async fn commit(tx: Transaction<'_, Sqlite>) -> Result<(), RepoError> {
        tx.commit()
            .await
            .map_err(|e| RepoError::database("games_commit", e))
    }
}

fn row_to_index(row: &SqliteRow) -> Result<GameIndexEntry, RepoError> {
    let id: String = row.get("id");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    let version: i64 = row.get("version");
    let tags_json: String = row.get("tags_json");

    Ok(GameIndexEntry {
        id: parse_id(&id)?,
        title: row.get("title"),
        description: row.get("description"),
        priority: row.get("priority"),
        created_at: from_db_time(&created_at)?,
        updated_at: from_db_time(&updated_at)?,
        version: u32::try_from(version).map_err(RepoError::serialization)?,
        thumbnail_asset_id: row.get("thumbnail_asset_id"),
        background_asset_id: row.get("background_asset_id"),
        tags: serde_json::from_str(&tags_json).map_err(RepoError::serialization)?,
        author: row.get("author"),
    })
}

fn row_to_data(row: &SqliteRow) -> Result<GameData, RepoError> {
    let id: String = row.get("id");
    let json: String = row.get("data_json");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(GameData {
        id: parse_id(&id)?,
        data: serde_json::from_str(&json).map_err(RepoError::serialization)?,
        created_at: from_db_time(&created_at)?,
        updated_at: from_db_time(&updated_at)?,
    })
}

#[async_trait]
impl GameRepo for SqliteGameRepo {
    async fn save(&self, index: &GameIndexEntry, data: &GameData) -> Result<(), RepoError> {
        let mut tx = self.begin().await?;
        Self::write_index(&mut tx, index).await?;
        Self::write_data(&mut tx, data).await?;
        Self::commit(tx).await
    }

    async fn update(
        &self,
        index: Option<GameIndexEntry>,
        data: Option<GameData>,
    ) -> Result<(), RepoError> {
        if index.is_none() && data.is_none() {
            return Ok(());
        }
        // Dropping the transaction on error rolls back a half-applied update.
        let mut tx = self.begin().await?;
        if let Some(index) = &index {
            Self::update_index(&mut tx, index).await?;
        }
        if let Some(data) = &data {
            Self::update_data(&mut tx, data).await?;
        }
        Self::commit(tx).await
    }

    async fn get_index(&self, id: GameId) -> Result<Option<GameIndexEntry>, RepoError> {
        let row = sqlx::query("SELECT * FROM games_index WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("games_index", e))?;

        row.as_ref().map(row_to_index).transpose()
    }

    async fn get_data(&self, id: GameId) -> Result<Option<GameData>, RepoError> {
        let row = sqlx::query("SELECT * FROM games_data WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("games_data", e))?;

        row.as_ref().map(row_to_data).transpose()
    }

    async fn list(
        &self,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<GameIndexEntry>, RepoError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM games_index
            ORDER BY priority DESC, created_at DESC, id ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit_value(limit))
        .bind(i64::from(offset.unwrap_or(0)))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("games_index", e))?;

        rows.iter().map(row_to_index).collect()
    }

    async fn delete(&self, ids: Vec<GameId>) -> Result<(), RepoError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut tx = self.begin().await?;
        for id in &ids {
            let id = id.to_string();
            for statement in [
                "DELETE FROM games_index WHERE id = ?",
                "DELETE FROM games_data WHERE id = ?",
                "DELETE FROM game_progress WHERE game_id = ?",
            ] {
                sqlx::query(statement)
                    .bind(&id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| RepoError::database("games_delete", e))?;
            }
        }
        Self::commit(tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::sqlite::test_support::{base_time, pool};
    use chrono::Duration;
    use serde_json::json;
    use storyforge_domain::{GameTitle, NewGameOptions};

    fn game(title: &str, priority: i64, minutes: i64) -> (GameIndexEntry, GameData) {
        let now = base_time() + Duration::minutes(minutes);
        let id = GameId::new();
        let index = GameIndexEntry::new(
            id,
            GameTitle::new(title).unwrap(),
            NewGameOptions {
                priority: Some(priority),
                tags: vec!["mystery".into()],
                ..Default::default()
            },
            now,
        );
        let data = GameData::new(id, json!({"game_title": title, "branches": []}), now);
        (index, data)
    }

    #[tokio::test]
    async fn save_and_read_back_both_rows() {
        let (_dir, pool) = pool().await;
        let repo = SqliteGameRepo::new(pool);
        let (index, data) = game("Moon", 2, 0);

        repo.save(&index, &data).await.expect("save");

        assert_eq!(repo.get_index(index.id).await.unwrap(), Some(index.clone()));
        assert_eq!(repo.get_data(index.id).await.unwrap(), Some(data));
    }

    #[tokio::test]
    async fn list_orders_by_priority_then_newest() {
        let (_dir, pool) = pool().await;
        let repo = SqliteGameRepo::new(pool);
        let (low, low_data) = game("low", 0, 10);
        let (old_high, old_data) = game("old high", 5, 0);
        let (new_high, new_data) = game("new high", 5, 5);
        for (i, d) in [(&low, &low_data), (&old_high, &old_data), (&new_high, &new_data)] {
            repo.save(i, d).await.expect("save");
        }

        let titles: Vec<String> = repo
            .list(None, None)
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.title)
            .collect();
        assert_eq!(titles, vec!["new high", "old high", "low"]);

        let page = repo.list(Some(1), Some(1)).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "old high");

        let tail = repo.list(None, Some(2)).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].title, "low");
    }

    #[tokio::test]
    async fn update_touches_only_given_rows() {
        let (_dir, pool) = pool().await;
        let repo = SqliteGameRepo::new(pool);
        let (index, data) = game("Moon", 0, 0);
        repo.save(&index, &data).await.expect("save");

        let mut changed = index.clone();
        changed.priority = 9;
        changed.updated_at = base_time() + Duration::hours(1);
        repo.update(Some(changed.clone()), None).await.expect("update");

        assert_eq!(repo.get_index(index.id).await.unwrap(), Some(changed));
        assert_eq!(repo.get_data(index.id).await.unwrap(), Some(data));
    }

    #[tokio::test]
    async fn update_after_delete_does_not_recreate_rows() {
        let (_dir, pool) = pool().await;
        let repo = SqliteGameRepo::new(pool);
        let (index, data) = game("Moon", 0, 0);
        repo.save(&index, &data).await.expect("save");
        repo.delete(vec![index.id]).await.expect("delete");

        let err = repo.update(Some(index.clone()), None).await.unwrap_err();
        assert!(err.is_not_found());
        let err = repo.update(None, Some(data.clone())).await.unwrap_err();
        assert!(err.is_not_found());

        assert!(repo.list(None, None).await.unwrap().is_empty());
        assert_eq!(repo.get_index(index.id).await.unwrap(), None);
        assert_eq!(repo.get_data(index.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn failed_half_of_update_rolls_back_the_other() {
        let (_dir, pool) = pool().await;
        let repo = SqliteGameRepo::new(pool);
        let (index, data) = game("Moon", 0, 0);
        repo.save(&index, &data).await.expect("save");

        let mut changed = index.clone();
        changed.priority = 4;
        let mut stray = data.clone();
        stray.id = GameId::new();

        assert!(repo.update(Some(changed), Some(stray)).await.is_err());
        assert_eq!(repo.get_index(index.id).await.unwrap(), Some(index));
    }

    #[tokio::test]
    async fn delete_removes_rows_and_ignores_unknown_ids() {
        let (_dir, pool) = pool().await;
        let repo = SqliteGameRepo::new(pool);
        let (index, data) = game("Moon", 0, 0);
        repo.save(&index, &data).await.expect("save");

        repo.delete(vec![index.id, GameId::new()]).await.expect("delete");

        assert_eq!(repo.get_index(index.id).await.unwrap(), None);
        assert_eq!(repo.get_data(index.id).await.unwrap(), None);
        repo.delete(vec![index.id]).await.expect("idempotent");
    }
}
