//! Shared fixtures for route tests.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response, Router};
use serde_json::Value;
use storyforge_domain::{CommunityUser, UserRole};
use tempfile::TempDir;

use super::http::routes;
use crate::app::App;
use crate::infrastructure::clock::FixedClock;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::ports::{CommunityRepo, ImageUploadPort, ImageUploadRequest, UploadError};
use crate::infrastructure::sqlite::test_support::{base_time, pool};
use crate::infrastructure::sqlite::SqliteRepositories;

pub const BOUNDARY: &str = "storyforge-test-boundary";

/// Answers every upload with a URL derived from the file name.
struct StaticUploader;

#[async_trait]
impl ImageUploadPort for StaticUploader {
    async fn upload(&self, request: ImageUploadRequest) -> Result<String, UploadError> {
        Ok(format!("https://img.test/{}", request.file_name))
    }

    fn endpoint(&self) -> String {
        "https://img.test/upload".to_string()
    }
}

pub struct TestApp {
    pub dir: TempDir,
    pub app: Arc<App>,
    pub repos: SqliteRepositories,
}

impl TestApp {
    pub fn router(&self) -> Router {
        routes().with_state(self.app.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        use tower::ServiceExt;
        self.router()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn seed_user(&self, email: &str, name: Option<&str>) -> CommunityUser {
        self.seed_with_role(email, name, UserRole::User).await
    }

    pub async fn seed_with_role(
        &self,
        email: &str,
        name: Option<&str>,
        role: UserRole,
    ) -> CommunityUser {
        let user = CommunityUser::new(email, name.map(str::to_string), base_time()).with_role(role);
        self.repos.community.save_user(&user).await.expect("save user");
        user
    }
}

pub async fn test_app() -> TestApp {
    let (dir, pool) = pool().await;
    let clock = Arc::new(FixedClock(base_time()));
    let config = AppConfig {
        upload_dir: dir.path().join("uploads"),
        public_base_url: "http://localhost:3000".to_string(),
        ..AppConfig::default()
    };

    let app = App::new(
        config,
        SqliteRepositories::new(pool.clone(), clock.clone()),
        clock.clone(),
        None,
        Arc::new(StaticUploader),
    );
    TestApp {
        dir,
        app: Arc::new(app),
        repos: SqliteRepositories::new(pool, clock),
    }
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).expect("json body")
}

/// One multipart form field.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

pub fn multipart_request(method: &str, uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    multipart_builder(method, uri, parts, &[])
}

pub fn multipart_builder(
    method: &str,
    uri: &str,
    parts: &[Part<'_>],
    headers: &[(&str, &str)],
) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body)).expect("valid request")
}

pub fn json_request(method: &str, uri: &str, body: &Value, email: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(email) = email {
        builder = builder.header("x-user-email", email);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request")
}

pub fn delete(uri: &str, email: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("DELETE").uri(uri);
    if let Some(email) = email {
        builder = builder.header("x-user-email", email);
    }
    builder.body(Body::empty()).expect("valid request")
}

pub fn get_as(uri: &str, email: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-user-email", email)
        .body(Body::empty())
        .expect("valid request")
}
