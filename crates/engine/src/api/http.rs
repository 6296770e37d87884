//! HTTP routes.

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use std::sync::Arc;

use super::{admin, community, images, library};
use crate::app::App;
use crate::use_cases::{AdminError, BackupError, CommunityError, LibraryError};

/// Request bodies may carry a full image or game pack.
pub const MAX_REQUEST_BODY: usize = 16 * 1024 * 1024;

/// Create all HTTP routes.
pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/", get(health))
        .route("/api/health", get(health))
        .merge(community::routes())
        .merge(admin::routes())
        .merge(library::routes())
        .merge(images::routes())
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY))
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug)]
pub enum ApiError {
    NotFound,
    BadRequest(String),
    Unauthorized,
    Forbidden,
    Internal(String),
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::NotFound => {
                (axum::http::StatusCode::NOT_FOUND, "Not found").into_response()
            }
            ApiError::BadRequest(msg) => {
                (axum::http::StatusCode::BAD_REQUEST, msg).into_response()
            }
            ApiError::Unauthorized => {
                (axum::http::StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
            }
            ApiError::Forbidden => {
                (axum::http::StatusCode::FORBIDDEN, "Forbidden").into_response()
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error",
                )
                    .into_response()
            }
        }
    }
}

impl From<crate::infrastructure::ports::RepoError> for ApiError {
    fn from(e: crate::infrastructure::ports::RepoError) -> Self {
        if e.is_not_found() {
            return ApiError::NotFound;
        }
        ApiError::Internal(e.to_string())
    }
}

impl From<CommunityError> for ApiError {
    fn from(e: CommunityError) -> Self {
        match e {
            CommunityError::Unauthorized => ApiError::Unauthorized,
            CommunityError::Invalid(reason) => ApiError::BadRequest(reason.to_string()),
            CommunityError::NotFound => ApiError::NotFound,
            CommunityError::Repo(e) => e.into(),
        }
    }
}

impl From<AdminError> for ApiError {
    fn from(e: AdminError) -> Self {
        match e {
            AdminError::Unauthorized => ApiError::Unauthorized,
            AdminError::Forbidden => ApiError::Forbidden,
            AdminError::Invalid(reason) => ApiError::BadRequest(reason.to_string()),
            AdminError::NotFound => ApiError::NotFound,
            AdminError::Repo(e) => e.into(),
        }
    }
}

impl From<LibraryError> for ApiError {
    fn from(e: LibraryError) -> Self {
        match e {
            LibraryError::InvalidInput(msg) => ApiError::BadRequest(msg),
            LibraryError::NotFound(_) => ApiError::NotFound,
            LibraryError::Repo(e) => e.into(),
        }
    }
}

impl From<BackupError> for ApiError {
    fn from(e: BackupError) -> Self {
        match e {
            BackupError::Format(e) => ApiError::BadRequest(e.to_string()),
            BackupError::Encode(msg) => ApiError::Internal(msg),
            BackupError::Repo(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{body_text, get, test_app};
    use axum::{http::StatusCode, response::IntoResponse};

    #[tokio::test]
    async fn health_is_ok() {
        let t = test_app().await;
        let response = t.send(get("/api/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let response =
            ApiError::from(crate::infrastructure::ports::RepoError::database("games", "disk"))
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Internal error");
    }

    #[test]
    fn community_errors_map_to_status() {
        assert!(matches!(
            ApiError::from(CommunityError::Unauthorized),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from(CommunityError::Invalid("Invalid title")),
            ApiError::BadRequest(ref m) if m == "Invalid title"
        ));
        assert!(matches!(
            ApiError::from(CommunityError::NotFound),
            ApiError::NotFound
        ));
    }

    #[tokio::test]
    async fn forbidden_is_403() {
        let response = ApiError::from(AdminError::Forbidden).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_text(response).await, "Forbidden");
    }
}
