//! Content-hash image cache.
//!
//! Never fails: storage errors are logged and read as a miss (or an empty
//! result), so a broken cache only costs an extra upload.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use storyforge_domain::{
    ImageCacheEntry, ImageCacheStats, IMAGE_CACHE_MAX_ENTRIES, IMAGE_CACHE_TTL_DAYS,
};

use crate::infrastructure::ports::{ClockPort, ImageCacheRepo};

pub struct ImageCache {
    repo: Arc<dyn ImageCacheRepo>,
    clock: Arc<dyn ClockPort>,
    max_entries: u64,
}

impl ImageCache {
    pub fn new(repo: Arc<dyn ImageCacheRepo>, clock: Arc<dyn ClockPort>) -> Self {
        Self::with_capacity(repo, clock, IMAGE_CACHE_MAX_ENTRIES as u64)
    }

    pub fn with_capacity(
        repo: Arc<dyn ImageCacheRepo>,
        clock: Arc<dyn ClockPort>,
        max_entries: u64,
    ) -> Self {
        Self {
            repo,
            clock,
            max_entries,
        }
    }

    /// Hosted URL for `file_hash`. A hit bumps the access bookkeeping; an
    /// expired entry is deleted and reported as a miss.
    pub async fn check(&self, file_hash: &str) -> Option<String> {
        let entry = match self.repo.get(file_hash).await {
            Ok(entry) => entry?,
            Err(e) => {
                tracing::warn!(file_hash, error = %e, "Image cache lookup failed");
                return None;
            }
        };
        self.hit(entry).await
    }

    pub async fn batch_check(&self, file_hashes: &[String]) -> HashMap<String, String> {
        let mut found = HashMap::new();
        for hash in file_hashes {
            if let Some(url) = self.check(hash).await {
                found.insert(hash.clone(), url);
            }
        }
        found
    }

    async fn hit(&self, mut entry: ImageCacheEntry) -> Option<String> {
        let now = self.clock.now();
        if entry.is_expired(now) {
            tracing::debug!(file_hash = %entry.file_hash, "Image cache entry expired");
            if let Err(e) = self.repo.delete(&entry.file_hash).await {
                tracing::warn!(file_hash = %entry.file_hash, error = %e, "Failed to delete expired cache entry");
            }
            return None;
        }

        entry.touch(now);
        if let Err(e) = self.repo.put(&entry).await {
            tracing::warn!(file_hash = %entry.file_hash, error = %e, "Failed to record cache hit");
        }
        Some(entry.image_url)
    }

    /// Record a fresh upload, then trim the cache back to its cap.
    pub async fn save(&self, file_hash: &str, image_url: &str, file_size: u64) {
        let entry = ImageCacheEntry::new(file_hash, image_url, file_size, self.clock.now());
        if let Err(e) = self.repo.put(&entry).await {
            tracing::warn!(file_hash, error = %e, "Failed to save image cache entry");
            return;
        }
        self.trim().await;
    }

    pub async fn batch_save(&self, entries: &[(String, String, u64)]) {
        let now = self.clock.now();
        for (hash, url, size) in entries {
            let entry = ImageCacheEntry::new(hash.as_str(), url.as_str(), *size, now);
            if let Err(e) = self.repo.put(&entry).await {
                tracing::warn!(file_hash = %hash, error = %e, "Failed to save image cache entry");
            }
        }
        self.trim().await;
    }

    async fn trim(&self) {
        match self.repo.count().await {
            Ok(count) if count > self.max_entries => match self.repo.trim_to(self.max_entries).await {
                Ok(removed) => tracing::debug!(removed, "Image cache trimmed"),
                Err(e) => tracing::warn!(error = %e, "Failed to trim image cache"),
            },
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to count image cache entries"),
        }
    }

    pub async fn stats(&self) -> ImageCacheStats {
        match self.repo.list_all().await {
            Ok(entries) => ImageCacheStats::from_entries(&entries),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read image cache stats");
                ImageCacheStats::default()
            }
        }
    }

    pub async fn clear(&self) {
        if let Err(e) = self.repo.clear().await {
            tracing::warn!(error = %e, "Failed to clear image cache");
        }
    }

    /// Delete every expired entry now; returns how many went.
    pub async fn clear_expired(&self) -> u64 {
        let cutoff = self.clock.now() - Duration::days(IMAGE_CACHE_TTL_DAYS);
        match self.repo.delete_uploaded_before(cutoff).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to clear expired cache entries");
                0
            }
        }
    }

    pub async fn remove_by_url(&self, image_url: &str) {
        if let Err(e) = self.repo.delete_by_url(image_url).await {
            tracing::warn!(image_url, error = %e, "Failed to remove cache entry");
        }
    }

    pub async fn cached_urls(&self) -> Vec<String> {
        match self.repo.list_all().await {
            Ok(entries) => entries.into_iter().map(|e| e.image_url).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list cached URLs");
                Vec::new()
            }
        }
    }
}
