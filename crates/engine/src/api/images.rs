//! Local image upload endpoint, the fallback target of the hosting client.

use axum::{
    extract::{Multipart, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storyforge_shared::{ImageUploadResponse, UploadDirStats};

use crate::app::App;
use crate::infrastructure::rate_limit::client_identifier;
use crate::use_cases::images::{is_allowed_image_type, MAX_IMAGE_SIZE};

pub const UPLOAD_ROUTE: &str = "/api/images/upload";

const PROVIDER: &str = "local";

pub fn routes() -> Router<Arc<App>> {
    Router::new().route(UPLOAD_ROUTE, get(stats).post(upload))
}

type UploadReply = (StatusCode, Json<ImageUploadResponse>);

fn reject(status: StatusCode, error: impl Into<String>) -> UploadReply {
    (status, Json(ImageUploadResponse::failure(error)))
}

struct IncomingImage {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

async fn upload(
    State(app): State<Arc<App>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> UploadReply {
    let client = client_identifier(&headers);
    if !app.upload_limiter.check(&client).await {
        tracing::warn!(client = %client, "Upload rate limit exceeded");
        return reject(StatusCode::TOO_MANY_REQUESTS, "上传频率过高，请稍后再试");
    }

    let image = match read_image(multipart).await {
        Ok(Some(image)) => image,
        Ok(None) => return reject(StatusCode::BAD_REQUEST, "未提供文件"),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read upload form");
            return reject(StatusCode::INTERNAL_SERVER_ERROR, e);
        }
    };

    if !is_allowed_image_type(&image.content_type) {
        return reject(StatusCode::BAD_REQUEST, "不支持的文件类型");
    }
    if image.bytes.len() as u64 > MAX_IMAGE_SIZE {
        return reject(StatusCode::BAD_REQUEST, "文件大小超过限制（最大10MB）");
    }

    let timestamp_ms = app.clock.now().timestamp_millis();
    let stored = match app
        .upload_dir
        .store(&image.file_name, &image.bytes, timestamp_ms)
        .await
    {
        Ok(stored) => stored,
        Err(e) => {
            tracing::error!(error = %e, file = %image.file_name, "Failed to store upload");
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "上传失败");
        }
    };

    tracing::info!(file = %stored.file_name, size = image.bytes.len(), "Image stored locally");
    let size = image.bytes.len() as u64;
    (
        StatusCode::OK,
        Json(ImageUploadResponse {
            success: true,
            url: Some(stored.url),
            file_path: Some(stored.file_path),
            file_name: Some(stored.file_name),
            original_size: Some(size),
            size: Some(size),
            format: image
                .content_type
                .split_once('/')
                .map(|(_, subtype)| subtype.to_string()),
            provider: Some(PROVIDER.to_string()),
            ..ImageUploadResponse::default()
        }),
    )
}

/// The `file` part; `key` is accepted and only logged.
async fn read_image(mut multipart: Multipart) -> Result<Option<IncomingImage>, String> {
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| e.to_string())? {
        match field.name() {
            Some("file") => {
                let Some(file_name) = field.file_name().map(str::to_string) else {
                    continue;
                };
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| e.to_string())?;
                image = Some(IncomingImage {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            Some("key") => {
                let key = field.text().await.map_err(|e| e.to_string())?;
                tracing::debug!(key = %key, "Upload content key");
            }
            _ => {}
        }
    }

    Ok(image)
}

#[derive(Debug, Default, Deserialize)]
struct StatsQuery {
    action: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    success: bool,
    stats: UploadDirStats,
}

async fn stats(
    State(app): State<Arc<App>>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, UploadReply> {
    if query.action.as_deref() != Some("stats") {
        return Err(reject(StatusCode::BAD_REQUEST, "无效的操作"));
    }
    Ok(Json(StatsResponse {
        success: true,
        stats: app.upload_dir.stats().await,
    }))
}
