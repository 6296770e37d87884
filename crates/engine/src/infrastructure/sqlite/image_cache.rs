//! SQLite-backed image cache (content hash -> hosted URL).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use storyforge_domain::ImageCacheEntry;

use super::{from_db_time, to_db_time};
use crate::infrastructure::ports::{ImageCacheRepo, RepoError};

pub struct SqliteImageCacheRepo {
    pool: SqlitePool,
}

impl SqliteImageCacheRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn to_u64(value: i64) -> Result<u64, RepoError> {
    u64::try_from(value).map_err(RepoError::serialization)
}

fn to_i64(value: u64) -> Result<i64, RepoError> {
    i64::try_from(value).map_err(RepoError::serialization)
}

fn row_to_entry(row: &SqliteRow) -> Result<ImageCacheEntry, RepoError> {
    let uploaded_at: String = row.get("uploaded_at");
    let last_accessed_at: String = row.get("last_accessed_at");

    Ok(ImageCacheEntry {
        file_hash: row.get("file_hash"),
        image_url: row.get("image_url"),
        file_size: to_u64(row.get("file_size"))?,
        uploaded_at: from_db_time(&uploaded_at)?,
        last_accessed_at: from_db_time(&last_accessed_at)?,
        access_count: to_u64(row.get("access_count"))?,
    })
}

#[async_trait]
impl ImageCacheRepo for SqliteImageCacheRepo {
    async fn get(&self, file_hash: &str) -> Result<Option<ImageCacheEntry>, RepoError> {
        let row = sqlx::query("SELECT * FROM image_cache WHERE file_hash = ?")
            .bind(file_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("image_cache", e))?;

        row.as_ref().map(row_to_entry).transpose()
    }

    async fn put(&self, entry: &ImageCacheEntry) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO image_cache (
                file_hash, image_url, file_size, uploaded_at, last_accessed_at, access_count
            )
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(file_hash) DO UPDATE SET
                image_url = excluded.image_url,
                file_size = excluded.file_size,
                uploaded_at = excluded.uploaded_at,
                last_accessed_at = excluded.last_accessed_at,
                access_count = excluded.access_count
            "#,
        )
        .bind(&entry.file_hash)
        .bind(&entry.image_url)
        .bind(to_i64(entry.file_size)?)
        .bind(to_db_time(&entry.uploaded_at))
        .bind(to_db_time(&entry.last_accessed_at))
        .bind(to_i64(entry.access_count)?)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("image_cache", e))?;

        Ok(())
    }

    async fn delete(&self, file_hash: &str) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM image_cache WHERE file_hash = ?")
            .bind(file_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("image_cache", e))?;
        Ok(())
    }

    async fn delete_by_url(&self, image_url: &str) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM image_cache WHERE image_url = ?")
            .bind(image_url)
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("image_cache", e))?;
        Ok(result.rows_affected())
    }

    async fn delete_uploaded_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM image_cache WHERE uploaded_at < ?")
            .bind(to_db_time(&cutoff))
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("image_cache", e))?;
        Ok(result.rows_affected())
    }

    async fn trim_to(&self, keep: u64) -> Result<u64, RepoError> {
        let result = sqlx::query(
            r#"
            DELETE FROM image_cache WHERE file_hash NOT IN (
                SELECT file_hash FROM image_cache
                ORDER BY last_accessed_at DESC, file_hash ASC
                LIMIT ?
            )
            "#,
        )
        .bind(to_i64(keep)?)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("image_cache", e))?;
        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<u64, RepoError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM image_cache")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepoError::database("image_cache", e))?;
        to_u64(row.get("n"))
    }

    async fn list_all(&self) -> Result<Vec<ImageCacheEntry>, RepoError> {
        let rows = sqlx::query("SELECT * FROM image_cache ORDER BY uploaded_at ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("image_cache", e))?;

        rows.iter().map(row_to_entry).collect()
    }

    async fn clear(&self) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM image_cache")
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("image_cache", e))?;
        Ok(())
    }
}
