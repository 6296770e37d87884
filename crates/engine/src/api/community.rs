//! Community routes: published games, votes and comments.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use storyforge_shared::{
    CommentPage, CommentQuery, CommentRequest, CommentResponse, CommunityGameDetail,
    CommunityGameSummary, CreatedResponse, VoteRequest, VoteResponse,
};

use super::auth::CallerEmail;
use super::http::ApiError;
use crate::app::App;
use crate::use_cases::{PublishForm, UploadedFile};

pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/api/games", get(list_games).post(create_game))
        .route("/api/games/{id}", get(get_game))
        .route("/api/games/{id}/vote", post(vote))
        .route(
            "/api/games/{id}/comments",
            get(list_comments).post(create_comment),
        )
}

async fn list_games(
    State(app): State<Arc<App>>,
) -> Result<Json<Vec<CommunityGameSummary>>, ApiError> {
    Ok(Json(app.use_cases.community.list_games().await?))
}

async fn create_game(
    State(app): State<Arc<App>>,
    caller: CallerEmail,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let community = &app.use_cases.community;
    let author = community.authenticate(caller.as_deref()).await?;
    let form = read_publish_form(multipart).await?;

    let id = community.publish_game(&author, form).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse { id: id.to_string() }),
    ))
}

/// Text fields stay text; a file sent under a text name is ignored, and a
/// text value sent as `file` does not count as a file.
async fn read_publish_form(mut multipart: Multipart) -> Result<PublishForm, ApiError> {
    let mut form = PublishForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);

        match (name.as_str(), file_name) {
            ("file", Some(file_name)) => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                form.file = Some(UploadedFile {
                    name: file_name,
                    bytes: bytes.to_vec(),
                });
            }
            ("title" | "description" | "coverUrl", None) => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                match name.as_str() {
                    "title" => form.title = Some(value),
                    "description" => form.description = Some(value),
                    _ => form.cover_url = Some(value),
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn get_game(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
) -> Result<Json<CommunityGameDetail>, ApiError> {
    let detail = app
        .use_cases
        .community
        .get_game(&id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(detail))
}

async fn vote(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
    caller: CallerEmail,
    Json(body): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, ApiError> {
    let community = &app.use_cases.community;
    let user = community.authenticate(caller.as_deref()).await?;
    let vote = community.vote(&user, &id, body.vote_type.as_ref()).await?;
    Ok(Json(vote))
}

async fn list_comments(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
    Query(query): Query<CommentQuery>,
) -> Result<Json<CommentPage>, ApiError> {
    let page = app
        .use_cases
        .community
        .list_comments(&id, query.cursor.as_deref(), query.take.as_deref())
        .await?;
    Ok(Json(page))
}

async fn create_comment(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
    caller: CallerEmail,
    Json(body): Json<CommentRequest>,
) -> Result<Json<CommentResponse>, ApiError> {
    let community = &app.use_cases.community;
    let user = community.authenticate(caller.as_deref()).await?;
    let comment = community
        .add_comment(&user, &id, body.content.as_ref())
        .await?;
    Ok(Json(comment))
}
