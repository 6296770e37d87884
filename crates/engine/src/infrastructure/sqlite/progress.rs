//! SQLite-backed saved progress, one row per game.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use storyforge_domain::{GameId, GameProgress};

use super::to_db_time;
use crate::infrastructure::ports::{ProgressRepo, RepoError};

pub struct SqliteProgressRepo {
    pool: SqlitePool,
}

impl SqliteProgressRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressRepo for SqliteProgressRepo {
    async fn save(&self, progress: &GameProgress) -> Result<(), RepoError> {
        let json = serde_json::to_string(progress).map_err(RepoError::serialization)?;

        sqlx::query(
            r#"
            INSERT INTO game_progress (game_id, progress_json, saved_at)
            VALUES (?, ?, ?)
            ON CONFLICT(game_id) DO UPDATE SET
                progress_json = excluded.progress_json,
                saved_at = excluded.saved_at
            "#,
        )
        .bind(progress.game_id.to_string())
        .bind(json)
        .bind(to_db_time(&progress.saved_at))
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("game_progress", e))?;

        Ok(())
    }

    async fn get(&self, game_id: GameId) -> Result<Option<GameProgress>, RepoError> {
        let row = sqlx::query("SELECT progress_json FROM game_progress WHERE game_id = ?")
            .bind(game_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("game_progress", e))?;

        match row {
            Some(row) => {
                let json: String = row.get("progress_json");
                let progress = serde_json::from_str(&json).map_err(RepoError::serialization)?;
                Ok(Some(progress))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, game_id: GameId) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM game_progress WHERE game_id = ?")
            .bind(game_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("game_progress", e))?;
        Ok(())
    }
}
