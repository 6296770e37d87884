//! Image hosting client: validate, hash, check the cache, upload on miss.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use storyforge_domain::is_hosted_url;
use storyforge_shared::ImageUploadResult;

use super::cache::ImageCache;
use crate::infrastructure::ports::{ImageUploadPort, ImageUploadRequest, UploadError};

pub const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/bmp",
    "image/tiff",
];

pub const MAX_IMAGE_SIZE: u64 = 10 * 1024 * 1024;

const INVALID_IMAGE: &str = "无效的图片文件";

/// An image handed to the hosting client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub bytes: Vec<u8>,
    pub name: String,
    pub mime_type: String,
}

impl ImageFile {
    pub fn new(bytes: Vec<u8>, name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            name: name.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

pub fn is_allowed_image_type(mime_type: &str) -> bool {
    ALLOWED_IMAGE_TYPES.contains(&mime_type)
}

/// Lowercase hex SHA-256 of the content.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub struct ImageHostingService {
    cache: Arc<ImageCache>,
    /// Tried in order; the second is the local fallback endpoint.
    uploaders: Vec<Arc<dyn ImageUploadPort>>,
    timeout: Duration,
    use_imgbb: bool,
}

impl ImageHostingService {
    pub fn new(
        cache: Arc<ImageCache>,
        primary: Option<Arc<dyn ImageUploadPort>>,
        fallback: Arc<dyn ImageUploadPort>,
        timeout: Duration,
    ) -> Self {
        let uploaders = primary.into_iter().chain(std::iter::once(fallback)).collect();
        Self {
            cache,
            uploaders,
            timeout,
            use_imgbb: false,
        }
    }

    pub fn with_imgbb(mut self, use_imgbb: bool) -> Self {
        self.use_imgbb = use_imgbb;
        self
    }

    pub fn cache(&self) -> &Arc<ImageCache> {
        &self.cache
    }

    /// Never returns an error; failures come back as `success: false`. A timed-out
    /// last attempt reports the error `"timeout"`.
    pub async fn upload_image(&self, file: ImageFile) -> ImageUploadResult {
        if !is_allowed_image_type(&file.mime_type) {
            return ImageUploadResult::failed(INVALID_IMAGE);
        }
        if file.size() > MAX_IMAGE_SIZE {
            return ImageUploadResult::failed(format!(
                "文件过大，请上传小于{}MB的图片",
                MAX_IMAGE_SIZE / (1024 * 1024)
            ));
        }

        let hash = content_hash(&file.bytes);
        if let Some(url) = self.cache.check(&hash).await {
            tracing::debug!(file_hash = %hash, "Image cache hit");
            return ImageUploadResult::uploaded(url, true);
        }

        let size = file.size();
        let request = ImageUploadRequest {
            bytes: file.bytes,
            file_name: file.name,
            mime_type: file.mime_type,
            key: hash.clone(),
            use_imgbb: self.use_imgbb,
        };

        let mut last_error = UploadError::Rejected("上传失败".to_string());
        for uploader in &self.uploaders {
            match self.attempt(uploader.as_ref(), request.clone()).await {
                Ok(url) => {
                    self.cache.save(&hash, &url, size).await;
                    tracing::info!(file_hash = %hash, endpoint = %uploader.endpoint(), "Image uploaded");
                    return ImageUploadResult::uploaded(url, false);
                }
                Err(e) => {
                    tracing::warn!(endpoint = %uploader.endpoint(), error = %e, "Image upload attempt failed");
                    last_error = e;
                }
            }
        }
        ImageUploadResult::failed(last_error.to_string())
    }

    async fn attempt(
        &self,
        uploader: &dyn ImageUploadPort,
        request: ImageUploadRequest,
    ) -> Result<String, UploadError> {
        match tokio::time::timeout(self.timeout, uploader.upload(request)).await {
            Ok(Ok(url)) if !is_hosted_url(&url) => Err(UploadError::InvalidResponse(format!(
                "not an absolute URL: {}",
                url
            ))),
            Ok(result) => result,
            Err(_) => Err(UploadError::Timeout),
        }
    }
}
