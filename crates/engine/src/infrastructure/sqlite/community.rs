//! SQLite-backed community tables: users, published games, votes, comments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use storyforge_domain::{
    Comment, CommentId, CommunityGame, CommunityGameId, CommunityUser, GameActivity, UserActivity,
    UserId, UserUpdate, Vote, VoteCount,
};

use super::{from_db_time, parse_id, to_db_time};
use crate::infrastructure::ports::{
    CommentFilter, CommunityRepo, GameFilter, PageRequest, RepoError, UserFilter,
};

const GAME_ACTIVITY_COLUMNS: &str = r#"
    (SELECT COUNT(*) FROM votes v WHERE v.game_id = g.id) AS vote_count,
    (SELECT COUNT(*) FROM comments c WHERE c.game_id = g.id AND c.is_deleted = 0) AS comment_count
"#;

const USER_ACTIVITY_COLUMNS: &str = r#"
    (SELECT COUNT(*) FROM community_games g WHERE g.author_id = u.id) AS game_count,
    (SELECT COUNT(*) FROM comments c WHERE c.user_id = u.id AND c.is_deleted = 0) AS comment_count,
    (SELECT COUNT(*) FROM votes v WHERE v.user_id = u.id) AS vote_count
"#;

pub struct SqliteCommunityRepo {
    pool: SqlitePool,
}

impl SqliteCommunityRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &SqliteRow) -> Result<CommunityUser, RepoError> {
    let id: String = row.get("id");
    let role: String = row.get("role");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    Ok(CommunityUser {
        id: parse_id(&id)?,
        email: row.get("email"),
        name: row.get("name"),
        role: parse_id(&role)?,
        is_active: row.get("is_active"),
        created_at: from_db_time(&created_at)?,
        updated_at: from_db_time(&updated_at)?,
    })
}

fn count_column(row: &SqliteRow, column: &str) -> Result<u64, RepoError> {
    let n: i64 = row.get(column);
    u64::try_from(n).map_err(RepoError::serialization)
}

fn row_to_user_activity(row: &SqliteRow) -> Result<UserActivity, RepoError> {
    Ok(UserActivity {
        games: count_column(row, "game_count")?,
        comments: count_column(row, "comment_count")?,
        votes: count_column(row, "vote_count")?,
    })
}

fn row_to_game(row: &SqliteRow) -> Result<CommunityGame, RepoError> {
    let id: String = row.get("id");
    let author_id: String = row.get("author_id");
    let json: String = row.get("json_data");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(CommunityGame {
        id: parse_id(&id)?,
        title: row.get("title"),
        description: row.get("description"),
        cover_url: row.get("cover_url"),
        json_data: serde_json::from_str(&json).map_err(RepoError::serialization)?,
        author_id: parse_id(&author_id)?,
        created_at: from_db_time(&created_at)?,
        updated_at: from_db_time(&updated_at)?,
    })
}

fn row_to_vote(row: &SqliteRow) -> Result<Vote, RepoError> {
    let user_id: String = row.get("user_id");
    let game_id: String = row.get("game_id");
    let vote_type: String = row.get("vote_type");
    let created_at: String = row.get("created_at");

    Ok(Vote {
        user_id: parse_id(&user_id)?,
        game_id: parse_id(&game_id)?,
        vote_type: parse_id(&vote_type)?,
        created_at: from_db_time(&created_at)?,
    })
}

fn row_to_comment(row: &SqliteRow) -> Result<Comment, RepoError> {
    let id: String = row.get("id");
    let game_id: String = row.get("game_id");
    let user_id: String = row.get("user_id");
    let created_at: String = row.get("created_at");

    Ok(Comment {
        id: parse_id(&id)?,
        game_id: parse_id(&game_id)?,
        user_id: parse_id(&user_id)?,
        content: row.get("content"),
        created_at: from_db_time(&created_at)?,
    })
}

/// `instr(lower(<column>), lower(?)) > 0`
fn push_contains(builder: &mut QueryBuilder<'_, Sqlite>, column: &str, needle: &str) {
    builder.push(format!("instr(lower(coalesce({}, '')), lower(", column));
    builder.push_bind(needle.to_string());
    builder.push(")) > 0");
}

fn push_game_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &GameFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(search) = &filter.search {
        builder.push(" AND (");
        push_contains(builder, "g.title", search);
        builder.push(" OR ");
        push_contains(builder, "g.description", search);
        builder.push(")");
    }
    if let Some(author_id) = filter.author_id {
        builder.push(" AND g.author_id = ");
        builder.push_bind(author_id.to_string());
    }
}

fn push_comment_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &CommentFilter) {
    builder.push(" WHERE c.is_deleted = 0");
    if let Some(search) = &filter.search {
        builder.push(" AND ");
        push_contains(builder, "c.content", search);
    }
    if let Some(user_id) = filter.user_id {
        builder.push(" AND c.user_id = ");
        builder.push_bind(user_id.to_string());
    }
    if let Some(game_id) = filter.game_id {
        builder.push(" AND c.game_id = ");
        builder.push_bind(game_id.to_string());
    }
}

fn push_user_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &UserFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(search) = &filter.search {
        builder.push(" AND (");
        push_contains(builder, "u.email", search);
        builder.push(" OR ");
        push_contains(builder, "u.name", search);
        builder.push(")");
    }
    if let Some(role) = filter.role {
        builder.push(" AND u.role = ");
        builder.push_bind(role.as_str());
    }
}

fn push_page(builder: &mut QueryBuilder<'_, Sqlite>, page: PageRequest) {
    builder.push(" LIMIT ");
    builder.push_bind(i64::from(page.limit));
    builder.push(" OFFSET ");
    builder.push_bind(page.offset());
}

/// `<prefix> (?, ?, ...) <suffix>` over the given ids.
fn in_list<'a, T: ToString>(prefix: &str, ids: &[T], suffix: &str) -> QueryBuilder<'a, Sqlite> {
    let mut builder = QueryBuilder::new(prefix);
    builder.push(" (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id.to_string());
    }
    separated.push_unseparated(") ");
    builder.push(suffix);
    builder
}

#[async_trait]
impl CommunityRepo for SqliteCommunityRepo {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<CommunityUser>, RepoError> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("users", e))?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_users(&self, ids: Vec<UserId>) -> Result<Vec<CommunityUser>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = in_list("SELECT * FROM users WHERE id IN", &ids, "")
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("users", e))?;

        rows.iter().map(row_to_user).collect()
    }

    async fn save_user(&self, user: &CommunityUser) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, role, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                name = excluded.name,
                role = excluded.role,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(to_db_time(&user.created_at))
        .bind(to_db_time(&user.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("users", e))?;
        Ok(())
    }

    async fn create_game(&self, game: &CommunityGame) -> Result<(), RepoError> {
        let json = serde_json::to_string(&game.json_data).map_err(RepoError::serialization)?;

        sqlx::query(
            r#"
            INSERT INTO community_games (
                id, title, description, cover_url, json_data, author_id, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(game.id.to_string())
        .bind(&game.title)
        .bind(&game.description)
        .bind(&game.cover_url)
        .bind(json)
        .bind(game.author_id.to_string())
        .bind(to_db_time(&game.created_at))
        .bind(to_db_time(&game.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("community_games", e))?;
        Ok(())
    }

    async fn get_game(&self, id: CommunityGameId) -> Result<Option<CommunityGame>, RepoError> {
        let row = sqlx::query("SELECT * FROM community_games WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("community_games", e))?;

        row.as_ref().map(row_to_game).transpose()
    }

    async fn list_recent_games(&self, limit: u32) -> Result<Vec<CommunityGame>, RepoError> {
        let rows = sqlx::query(
            "SELECT * FROM community_games ORDER BY created_at DESC, id ASC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("community_games", e))?;

        rows.iter().map(row_to_game).collect()
    }

    async fn vote_counts(
        &self,
        game_ids: Vec<CommunityGameId>,
    ) -> Result<Vec<VoteCount>, RepoError> {
        if game_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = in_list(
            "SELECT game_id, vote_type, COUNT(*) AS n FROM votes WHERE game_id IN",
            &game_ids,
            "GROUP BY game_id, vote_type",
        )
        .build()
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("votes", e))?;

        rows.iter()
            .map(|row| {
                let game_id: String = row.get("game_id");
                let vote_type: String = row.get("vote_type");
                let count: i64 = row.get("n");
                Ok(VoteCount {
                    game_id: parse_id(&game_id)?,
                    vote_type: parse_id(&vote_type)?,
                    count: u64::try_from(count).map_err(RepoError::serialization)?,
                })
            })
            .collect()
    }

    async fn comment_counts(
        &self,
        game_ids: Vec<CommunityGameId>,
    ) -> Result<Vec<(CommunityGameId, u64)>, RepoError> {
        if game_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = in_list(
            "SELECT game_id, COUNT(*) AS n FROM comments WHERE is_deleted = 0 AND game_id IN",
            &game_ids,
            "GROUP BY game_id",
        )
        .build()
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("comments", e))?;

        rows.iter()
            .map(|row| {
                let game_id: String = row.get("game_id");
                let count: i64 = row.get("n");
                Ok((
                    parse_id(&game_id)?,
                    u64::try_from(count).map_err(RepoError::serialization)?,
                ))
            })
            .collect()
    }

    async fn upsert_vote(&self, vote: &Vote) -> Result<Vote, RepoError> {
        let row = sqlx::query(
            r#"
            INSERT INTO votes (user_id, game_id, vote_type, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, game_id) DO UPDATE SET
                vote_type = excluded.vote_type
            RETURNING user_id, game_id, vote_type, created_at
            "#,
        )
        .bind(vote.user_id.to_string())
        .bind(vote.game_id.to_string())
        .bind(vote.vote_type.as_str())
        .bind(to_db_time(&vote.created_at))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepoError::database("votes", e))?;

        row_to_vote(&row)
    }

    async fn create_comment(&self, comment: &Comment) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO comments (id, game_id, user_id, content, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(comment.id.to_string())
        .bind(comment.game_id.to_string())
        .bind(comment.user_id.to_string())
        .bind(&comment.content)
        .bind(to_db_time(&comment.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("comments", e))?;
        Ok(())
    }

    async fn list_comments(
        &self,
        game_id: CommunityGameId,
        cursor: Option<CommentId>,
        limit: u32,
    ) -> Result<Vec<Comment>, RepoError> {
        let rows = match cursor {
            None => sqlx::query(
                r#"
                SELECT * FROM comments
                WHERE game_id = ? AND is_deleted = 0
                ORDER BY created_at DESC, id DESC
                LIMIT ?
                "#,
            )
            .bind(game_id.to_string())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await,
            Some(cursor) => sqlx::query(
                r#"
                SELECT c.* FROM comments c
                JOIN comments anchor ON anchor.id = ?
                WHERE c.game_id = ? AND c.is_deleted = 0
                  AND (c.created_at < anchor.created_at
                       OR (c.created_at = anchor.created_at AND c.id <= anchor.id))
                ORDER BY c.created_at DESC, c.id DESC
                LIMIT ?
                "#,
            )
            .bind(cursor.to_string())
            .bind(game_id.to_string())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await,
        }
        .map_err(|e| RepoError::database("comments", e))?;

        rows.iter().map(row_to_comment).collect()
    }

    async fn get_games(&self, ids: Vec<CommunityGameId>) -> Result<Vec<CommunityGame>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = in_list("SELECT * FROM community_games WHERE id IN", &ids, "")
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("community_games", e))?;

        rows.iter().map(row_to_game).collect()
    }

    async fn search_games(
        &self,
        filter: &GameFilter,
        page: PageRequest,
    ) -> Result<(Vec<(CommunityGame, GameActivity)>, u64), RepoError> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) AS n FROM community_games g");
        push_game_filter(&mut count, filter);
        let row = count
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepoError::database("community_games", e))?;
        let total = count_column(&row, "n")?;

        let mut select = QueryBuilder::new(format!(
            "SELECT g.*, {} FROM community_games g",
            GAME_ACTIVITY_COLUMNS
        ));
        push_game_filter(&mut select, filter);
        select.push(" ORDER BY g.created_at DESC, g.id ASC");
        push_page(&mut select, page);
        let rows = select
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("community_games", e))?;

        let games = rows
            .iter()
            .map(|row| {
                let activity = GameActivity {
                    votes: count_column(row, "vote_count")?,
                    comments: count_column(row, "comment_count")?,
                };
                Ok((row_to_game(row)?, activity))
            })
            .collect::<Result<Vec<_>, RepoError>>()?;
        Ok((games, total))
    }

    async fn delete_game(&self, id: CommunityGameId) -> Result<bool, RepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("community_begin", e))?;

        for (table, statement) in [
            ("votes", "DELETE FROM votes WHERE game_id = ?"),
            ("comments", "DELETE FROM comments WHERE game_id = ?"),
        ] {
            sqlx::query(statement)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| RepoError::database(table, e))?;
        }
        let result = sqlx::query("DELETE FROM community_games WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| RepoError::database("community_games", e))?;

        tx.commit()
            .await
            .map_err(|e| RepoError::database("community_commit", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn search_comments(
        &self,
        filter: &CommentFilter,
        page: PageRequest,
    ) -> Result<(Vec<Comment>, u64), RepoError> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) AS n FROM comments c");
        push_comment_filter(&mut count, filter);
        let row = count
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepoError::database("comments", e))?;
        let total = count_column(&row, "n")?;

        let mut select = QueryBuilder::new("SELECT c.* FROM comments c");
        push_comment_filter(&mut select, filter);
        select.push(" ORDER BY c.created_at DESC, c.id DESC");
        push_page(&mut select, page);
        let rows = select
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("comments", e))?;

        let comments = rows
            .iter()
            .map(row_to_comment)
            .collect::<Result<Vec<_>, RepoError>>()?;
        Ok((comments, total))
    }

    async fn soft_delete_comments(&self, ids: Vec<CommentId>) -> Result<u64, RepoError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = in_list(
            "UPDATE comments SET is_deleted = 1 WHERE is_deleted = 0 AND id IN",
            &ids,
            "",
        )
        .build()
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("comments", e))?;
        Ok(result.rows_affected())
    }

    async fn search_users(
        &self,
        filter: &UserFilter,
        page: PageRequest,
    ) -> Result<(Vec<(CommunityUser, UserActivity)>, u64), RepoError> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) AS n FROM users u");
        push_user_filter(&mut count, filter);
        let row = count
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepoError::database("users", e))?;
        let total = count_column(&row, "n")?;

        let mut select = QueryBuilder::new(format!(
            "SELECT u.*, {} FROM users u",
            USER_ACTIVITY_COLUMNS
        ));
        push_user_filter(&mut select, filter);
        select.push(" ORDER BY u.created_at DESC, u.id ASC");
        push_page(&mut select, page);
        let rows = select
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("users", e))?;

        let users = rows
            .iter()
            .map(|row| Ok((row_to_user(row)?, row_to_user_activity(row)?)))
            .collect::<Result<Vec<_>, RepoError>>()?;
        Ok((users, total))
    }

    async fn user_activity(&self, id: UserId) -> Result<UserActivity, RepoError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM (SELECT ? AS id) u",
            USER_ACTIVITY_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepoError::database("users", e))?;

        row_to_user_activity(&row)
    }

    async fn update_users(
        &self,
        ids: Vec<UserId>,
        update: &UserUpdate,
        at: DateTime<Utc>,
    ) -> Result<u64, RepoError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE users SET updated_at = ");
        builder.push_bind(to_db_time(&at));
        if let Some(name) = &update.name {
            builder.push(", name = ");
            builder.push_bind(name.clone());
        }
        if let Some(role) = update.role {
            builder.push(", role = ");
            builder.push_bind(role.as_str());
        }
        if let Some(is_active) = update.is_active {
            builder.push(", is_active = ");
            builder.push_bind(is_active);
        }
        builder.push(" WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in &ids {
            separated.push_bind(id.to_string());
        }
        separated.push_unseparated(")");

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("users", e))?;
        Ok(result.rows_affected())
    }

    async fn list_user_votes(&self, user_id: UserId, limit: u32) -> Result<Vec<Vote>, RepoError> {
        let rows = sqlx::query(
            "SELECT * FROM votes WHERE user_id = ? ORDER BY created_at DESC, game_id ASC LIMIT ?",
        )
        .bind(user_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("votes", e))?;

        rows.iter().map(row_to_vote).collect()
    }
}
