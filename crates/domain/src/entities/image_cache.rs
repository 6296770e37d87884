//! Image cache entries - content hash to hosted URL

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Entries older than this (by upload time) are expired.
pub const IMAGE_CACHE_TTL_DAYS: i64 = 30;

/// Entry cap; the least recently accessed entries beyond it are trimmed after each write.
pub const IMAGE_CACHE_MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCacheEntry {
    /// SHA-256 of the file bytes, lowercase hex
    pub file_hash: String,
    pub image_url: String,
    pub file_size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: u64,
}

impl ImageCacheEntry {
    pub fn new(
        file_hash: impl Into<String>,
        image_url: impl Into<String>,
        file_size: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            file_hash: file_hash.into(),
            image_url: image_url.into(),
            file_size,
            uploaded_at: now,
            last_accessed_at: now,
            access_count: 1,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.uploaded_at > Duration::days(IMAGE_CACHE_TTL_DAYS)
    }

    /// Record a cache hit.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_accessed_at = now;
        self.access_count += 1;
    }
}

/// Aggregate view over the cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCacheStats {
    pub total_entries: u64,
    pub total_size: u64,
    /// Sum of every entry's access count
    pub total_access_count: u64,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

impl ImageCacheStats {
    pub fn from_entries(entries: &[ImageCacheEntry]) -> Self {
        Self {
            total_entries: entries.len() as u64,
            total_size: entries.iter().map(|e| e.file_size).sum(),
            total_access_count: entries.iter().map(|e| e.access_count).sum(),
            oldest_entry: entries.iter().map(|e| e.uploaded_at).min(),
            newest_entry: entries.iter().map(|e| e.uploaded_at).max(),
        }
    }
}
