//! SQLite-backed local asset blobs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use storyforge_domain::{AssetEntry, AssetId};

use super::{from_db_time, parse_id, to_db_time};
use crate::infrastructure::ports::{AssetRepo, RepoError};

pub struct SqliteAssetRepo {
    pool: SqlitePool,
}

impl SqliteAssetRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_asset(row: &SqliteRow) -> Result<AssetEntry, RepoError> {
    let id: String = row.get("id");
    let kind: String = row.get("kind");
    let size: i64 = row.get("size");
    let created_at: String = row.get("created_at");

    Ok(AssetEntry {
        id: parse_id(&id)?,
        blob: row.get("blob"),
        kind: parse_id(&kind)?,
        name: row.get("name"),
        size: u64::try_from(size).map_err(RepoError::serialization)?,
        created_at: from_db_time(&created_at)?,
    })
}

#[async_trait]
impl AssetRepo for SqliteAssetRepo {
    async fn save(&self, asset: &AssetEntry) -> Result<(), RepoError> {
        let size = i64::try_from(asset.size).map_err(RepoError::serialization)?;

        sqlx::query(
            r#"
            INSERT INTO assets (id, kind, name, size, blob, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                name = excluded.name,
                size = excluded.size,
                blob = excluded.blob,
                created_at = excluded.created_at
            "#,
        )
        .bind(asset.id.to_string())
        .bind(asset.kind.as_str())
        .bind(&asset.name)
        .bind(size)
        .bind(&asset.blob)
        .bind(to_db_time(&asset.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("assets", e))?;

        Ok(())
    }

    async fn get(&self, id: AssetId) -> Result<Option<AssetEntry>, RepoError> {
        let row = sqlx::query("SELECT * FROM assets WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("assets", e))?;

        row.as_ref().map(row_to_asset).transpose()
    }

    async fn delete(&self, id: AssetId) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM assets WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("assets", e))?;
        Ok(())
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM assets WHERE created_at < ?")
            .bind(to_db_time(&cutoff))
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("assets", e))?;
        Ok(result.rows_affected())
    }
}
