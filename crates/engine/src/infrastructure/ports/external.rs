//! External service port traits (image hosting).

use async_trait::async_trait;

use super::error::UploadError;

// =============================================================================
// Image Hosting
// =============================================================================

/// One image to push to a host. `key` is the SHA-256 content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUploadRequest {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    pub key: String,
    /// Forwarded as the `useImgBB` form field.
    pub use_imgbb: bool,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageUploadPort: Send + Sync {
    /// Upload the image and return its public URL.
    async fn upload(&self, request: ImageUploadRequest) -> Result<String, UploadError>;

    /// Endpoint this uploader posts to, for logging.
    fn endpoint(&self) -> String;
}
