//! Moderation routes. Every handler resolves the caller to an admin first.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use storyforge_shared::{
    AdminCommentPage, AdminGameIdQuery, AdminGamePage, AdminListQuery, AdminMessage,
    AdminUserDetail, AdminUserPage, BulkUserRequest, DeleteCommentsRequest, UpdateUserRequest,
    UpdatedUserResponse,
};

use super::auth::CallerEmail;
use super::http::ApiError;
use crate::app::App;

pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/api/admin/games", get(list_games).delete(delete_game))
        .route(
            "/api/admin/comments",
            get(list_comments).delete(delete_comments),
        )
        .route("/api/admin/users", get(list_users).put(bulk_update_users))
        .route("/api/admin/users/{id}", get(get_user).put(update_user))
}

async fn list_games(
    State(app): State<Arc<App>>,
    caller: CallerEmail,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<AdminGamePage>, ApiError> {
    let admin = &app.use_cases.admin;
    admin.authenticate(caller.as_deref()).await?;
    Ok(Json(admin.list_games(&query).await?))
}

async fn delete_game(
    State(app): State<Arc<App>>,
    caller: CallerEmail,
    Query(query): Query<AdminGameIdQuery>,
) -> Result<Json<AdminMessage>, ApiError> {
    let admin = &app.use_cases.admin;
    let moderator = admin.authenticate(caller.as_deref()).await?;
    Ok(Json(admin.delete_game(&moderator, query.id.as_deref()).await?))
}

async fn list_comments(
    State(app): State<Arc<App>>,
    caller: CallerEmail,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<AdminCommentPage>, ApiError> {
    let admin = &app.use_cases.admin;
    admin.authenticate(caller.as_deref()).await?;
    Ok(Json(admin.list_comments(&query).await?))
}

async fn delete_comments(
    State(app): State<Arc<App>>,
    caller: CallerEmail,
    Json(body): Json<DeleteCommentsRequest>,
) -> Result<Json<AdminMessage>, ApiError> {
    let admin = &app.use_cases.admin;
    let moderator = admin.authenticate(caller.as_deref()).await?;
    Ok(Json(
        admin
            .delete_comments(&moderator, body.comment_ids.as_ref())
            .await?,
    ))
}

async fn list_users(
    State(app): State<Arc<App>>,
    caller: CallerEmail,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<AdminUserPage>, ApiError> {
    let admin = &app.use_cases.admin;
    admin.authenticate(caller.as_deref()).await?;
    Ok(Json(admin.list_users(&query).await?))
}

async fn bulk_update_users(
    State(app): State<Arc<App>>,
    caller: CallerEmail,
    Json(body): Json<BulkUserRequest>,
) -> Result<Json<AdminMessage>, ApiError> {
    let admin = &app.use_cases.admin;
    let moderator = admin.authenticate(caller.as_deref()).await?;
    Ok(Json(admin.bulk_update_users(&moderator, &body).await?))
}

async fn get_user(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
    caller: CallerEmail,
) -> Result<Json<AdminUserDetail>, ApiError> {
    let admin = &app.use_cases.admin;
    admin.authenticate(caller.as_deref()).await?;
    Ok(Json(admin.user_detail(&id).await?))
}

async fn update_user(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
    caller: CallerEmail,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<UpdatedUserResponse>, ApiError> {
    let admin = &app.use_cases.admin;
    let moderator = admin.authenticate(caller.as_deref()).await?;
    Ok(Json(admin.update_user(&moderator, &id, &body).await?))
}
