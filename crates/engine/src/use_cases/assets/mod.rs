//! Asset use cases.
//!
//! Images always go to the image host and are referenced by URL; audio and
//! video stay in the local asset table.

use std::sync::Arc;

use chrono::Duration;
use storyforge_domain::{is_hosted_url, AssetEntry, AssetKind, AssetRef, ASSET_RETENTION_DAYS};

use crate::infrastructure::ports::{AssetRepo, ClockPort, RepoError};
use crate::use_cases::images::{ImageFile, ImageHostingService};

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Upload failed: {0}")]
    Upload(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// What `get_asset` finds for an id.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetLookup {
    /// The id was already an absolute URL.
    Hosted(String),
    Local(AssetEntry),
}

pub struct AssetStore {
    assets: Arc<dyn AssetRepo>,
    hosting: Arc<ImageHostingService>,
    clock: Arc<dyn ClockPort>,
}

impl AssetStore {
    pub fn new(
        assets: Arc<dyn AssetRepo>,
        hosting: Arc<ImageHostingService>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            assets,
            hosting,
            clock,
        }
    }

    pub async fn store_asset(
        &self,
        bytes: Vec<u8>,
        name: &str,
        kind: AssetKind,
    ) -> Result<AssetRef, AssetError> {
        if kind == AssetKind::Image {
            let mime_type = mime_guess::from_path(name)
                .first_or_octet_stream()
                .essence_str()
                .to_string();
            let result = self
                .hosting
                .upload_image(ImageFile::new(bytes, name, mime_type))
                .await;
            // The id of a hosted image is its absolute URL; anything else would not resolve.
            return match (result.success, result.url) {
                (true, Some(url)) if is_hosted_url(&url) => Ok(AssetRef::Hosted(url)),
                (true, Some(url)) => Err(AssetError::Upload(format!(
                    "not an absolute URL: {}",
                    url
                ))),
                _ => Err(AssetError::Upload(
                    result.error.unwrap_or_else(|| "上传失败".to_string()),
                )),
            };
        }

        let entry = AssetEntry::new(bytes, name, kind, self.clock.now());
        self.assets.save(&entry).await?;
        tracing::debug!(asset_id = %entry.id, kind = %kind, size = entry.size, "Asset stored");
        Ok(AssetRef::Local(entry.id))
    }

    /// URL ids pass through unchanged; ids that are neither a URL nor a local
    /// id resolve to `None`.
    pub async fn get_asset(&self, id: &str) -> Result<Option<AssetLookup>, AssetError> {
        match AssetRef::parse(id) {
            Ok(AssetRef::Hosted(url)) => Ok(Some(AssetLookup::Hosted(url))),
            Ok(AssetRef::Local(asset_id)) => {
                Ok(self.assets.get(asset_id).await?.map(AssetLookup::Local))
            }
            Err(_) => Ok(None),
        }
    }

    /// No-op for URL ids.
    pub async fn delete_asset(&self, id: &str) -> Result<(), AssetError> {
        if let Ok(AssetRef::Local(asset_id)) = AssetRef::parse(id) {
            self.assets.delete(asset_id).await?;
        }
        Ok(())
    }

    /// Best-effort removal of local assets older than the retention window.
    /// The image cache has its own lifecycle and is left alone.
    pub async fn cleanup(&self) -> u64 {
        let cutoff = self.clock.now() - Duration::days(ASSET_RETENTION_DAYS);
        match self.assets.delete_created_before(cutoff).await {
            Ok(removed) => {
                tracing::info!(removed, "Old assets cleaned up");
                removed
            }
            Err(e) => {
                tracing::warn!(error = %e, "Asset cleanup failed");
                0
            }
        }
    }
}
