//! SQLite adapters for every repository port.
//!
//! All tables live in one database file. Timestamps are stored as fixed-width
//! RFC3339 text (microseconds, `Z`) so string order matches time order.

mod assets;
mod community;
mod games;
mod image_cache;
mod progress;
mod settings;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use storyforge_domain::common::{format_storage_time, parse_datetime};

use crate::infrastructure::ports::{ClockPort, RepoError};

pub use assets::SqliteAssetRepo;
pub use community::SqliteCommunityRepo;
pub use games::SqliteGameRepo;
pub use image_cache::SqliteImageCacheRepo;
pub use progress::SqliteProgressRepo;
pub use settings::SqliteSettingsRepo;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS games_index (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        priority INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        version INTEGER NOT NULL DEFAULT 1,
        thumbnail_asset_id TEXT,
        background_asset_id TEXT,
        tags_json TEXT NOT NULL DEFAULT '[]',
        author TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_games_index_priority ON games_index (priority DESC, created_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS games_data (
        id TEXT PRIMARY KEY,
        data_json TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS assets (
        id TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        name TEXT NOT NULL,
        size INTEGER NOT NULL,
        blob BLOB NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS game_progress (
        game_id TEXT PRIMARY KEY,
        progress_json TEXT NOT NULL,
        saved_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS app_settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS image_cache (
        file_hash TEXT PRIMARY KEY,
        image_url TEXT NOT NULL,
        file_size INTEGER NOT NULL,
        uploaded_at TEXT NOT NULL,
        last_accessed_at TEXT NOT NULL,
        access_count INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        name TEXT,
        role TEXT NOT NULL DEFAULT 'USER',
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS community_games (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        cover_url TEXT,
        json_data TEXT NOT NULL,
        author_id TEXT NOT NULL REFERENCES users (id),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS votes (
        user_id TEXT NOT NULL REFERENCES users (id),
        game_id TEXT NOT NULL REFERENCES community_games (id),
        vote_type TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (user_id, game_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        id TEXT PRIMARY KEY,
        game_id TEXT NOT NULL REFERENCES community_games (id),
        user_id TEXT NOT NULL REFERENCES users (id),
        content TEXT NOT NULL,
        created_at TEXT NOT NULL,
        is_deleted INTEGER NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_comments_game ON comments (game_id, created_at DESC)",
];

/// Open (creating if needed) the database file and ensure the schema.
pub async fn connect(db_path: &str) -> Result<SqlitePool, RepoError> {
    let options = format!("sqlite:{}?mode=rwc", db_path)
        .parse::<SqliteConnectOptions>()
        .map_err(|e| RepoError::database("connect", e))?
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .map_err(|e| RepoError::database("connect", e))?;

    ensure_schema(&pool).await?;
    Ok(pool)
}

pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), RepoError> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| RepoError::database("schema", e))?;
    }
    Ok(())
}

/// Every SQLite repository over one shared pool.
#[derive(Clone)]
pub struct SqliteRepositories {
    pub games: Arc<SqliteGameRepo>,
    pub assets: Arc<SqliteAssetRepo>,
    pub progress: Arc<SqliteProgressRepo>,
    pub settings: Arc<SqliteSettingsRepo>,
    pub image_cache: Arc<SqliteImageCacheRepo>,
    pub community: Arc<SqliteCommunityRepo>,
}

impl SqliteRepositories {
    pub async fn open(db_path: &str, clock: Arc<dyn ClockPort>) -> Result<Self, RepoError> {
        let pool = connect(db_path).await?;
        Ok(Self::new(pool, clock))
    }

    pub fn new(pool: SqlitePool, clock: Arc<dyn ClockPort>) -> Self {
        Self {
            games: Arc::new(SqliteGameRepo::new(pool.clone())),
            assets: Arc::new(SqliteAssetRepo::new(pool.clone())),
            progress: Arc::new(SqliteProgressRepo::new(pool.clone())),
            settings: Arc::new(SqliteSettingsRepo::new(pool.clone(), clock)),
            image_cache: Arc::new(SqliteImageCacheRepo::new(pool.clone())),
            community: Arc::new(SqliteCommunityRepo::new(pool)),
        }
    }
}

pub(crate) fn to_db_time(dt: &DateTime<Utc>) -> String {
    format_storage_time(dt)
}

pub(crate) fn from_db_time(s: &str) -> Result<DateTime<Utc>, RepoError> {
    parse_datetime(s).map_err(|e| RepoError::serialization(format!("timestamp '{}': {}", s, e)))
}

pub(crate) fn parse_id<T>(s: &str) -> Result<T, RepoError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    s.parse::<T>().map_err(RepoError::serialization)
}

/// `LIMIT -1` is SQLite's "no limit".
pub(crate) fn limit_value(limit: Option<u32>) -> i64 {
    limit.map(i64::from).unwrap_or(-1)
}
