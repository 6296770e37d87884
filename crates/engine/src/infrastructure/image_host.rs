//! HTTP image host client
//!
//! Implements the ImageUploadPort trait by posting multipart forms to an upload
//! endpoint that answers with the `ImageUploadResponse` contract.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use storyforge_domain::is_hosted_url;
use storyforge_shared::ImageUploadResponse;

use crate::infrastructure::ports::{ImageUploadPort, ImageUploadRequest, UploadError};

const GENERIC_FAILURE: &str = "上传失败";

/// Client for an image upload endpoint (remote host or our own `/api/images/upload`)
#[derive(Clone)]
pub struct HttpImageUploader {
    client: Client,
    endpoint: String,
}

impl HttpImageUploader {
    /// No client-side timeout: the hosting service races each upload against its own timer.
    pub fn new(endpoint: &str) -> Self {
        let client = Client::builder().build().unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn form(request: ImageUploadRequest) -> Result<Form, UploadError> {
        let part = Part::bytes(request.bytes)
            .file_name(request.file_name)
            .mime_str(&request.mime_type)
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        Ok(Form::new()
            .part("file", part)
            .text("key", request.key)
            .text("useImgBB", request.use_imgbb.to_string()))
    }

    /// Hosts may answer with a path (`/uploads/images/..`); resolve it against the endpoint.
    fn absolute_url(&self, url: &str) -> Result<String, UploadError> {
        if is_hosted_url(url) {
            return Ok(url.to_string());
        }
        Url::parse(&self.endpoint)
            .and_then(|base| base.join(url))
            .map(|resolved| resolved.to_string())
            .map_err(|e| UploadError::InvalidResponse(format!("{}: {}", url, e)))
    }
}

#[async_trait]
impl ImageUploadPort for HttpImageUploader {
    async fn upload(&self, request: ImageUploadRequest) -> Result<String, UploadError> {
        let form = Self::form(request)?;

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(endpoint = %self.endpoint, error = %e, "Image upload request failed");
                UploadError::Transport("网络错误".to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::debug!(endpoint = %self.endpoint, %status, body = %error_text, "Image host rejected upload");
            return Err(UploadError::Rejected(format!(
                "{}: {}",
                GENERIC_FAILURE,
                status.as_u16()
            )));
        }

        let body: ImageUploadResponse = response
            .json()
            .await
            .map_err(|_| UploadError::InvalidResponse("响应解析失败".to_string()))?;

        match body {
            ImageUploadResponse {
                success: true,
                url: Some(url),
                ..
            } if !url.is_empty() => self.absolute_url(&url),
            other => Err(UploadError::Rejected(
                other.error.unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            )),
        }
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }
}
