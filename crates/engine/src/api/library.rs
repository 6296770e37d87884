//! Local library routes: listing, import, backup and restore.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use storyforge_domain::{BackupData, GameId, GameIndexEntry, GameRecord, MergeMode, RestoreReport};
use storyforge_shared::ImportReport;

use super::http::ApiError;
use crate::app::App;

pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/api/library", get(list_games))
        .route("/api/library/import", post(import_pack))
        .route("/api/library/backup", get(backup))
        .route("/api/library/restore", post(restore))
        .route("/api/library/{id}", get(get_game).delete(delete_game))
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    limit: Option<u32>,
    offset: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RestoreQuery {
    mode: Option<String>,
}

fn parse_game_id(id: &str) -> Result<GameId, ApiError> {
    id.parse().map_err(|_| ApiError::NotFound)
}

async fn list_games(
    State(app): State<Arc<App>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<GameIndexEntry>>, ApiError> {
    let games = app
        .use_cases
        .library
        .list_games(query.limit, query.offset)
        .await?;
    Ok(Json(games))
}

async fn get_game(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
) -> Result<Json<GameRecord>, ApiError> {
    let record = app
        .use_cases
        .library
        .get_game(parse_game_id(&id)?)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(record))
}

async fn delete_game(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    app.use_cases
        .library
        .delete_game(parse_game_id(&id)?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Multipart `file` holding a `.json` payload or a `.zip` pack. Import
/// failures come back in the report, not as an error status.
async fn import_pack(
    State(app): State<Arc<App>>,
    mut multipart: Multipart,
) -> Result<Json<ImportReport>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let report = app
            .use_cases
            .import
            .import_game_pack(&file_name, &bytes)
            .await;
        return Ok(Json(report));
    }

    Err(ApiError::BadRequest("未提供文件".to_string()))
}

async fn backup(State(app): State<Arc<App>>) -> Result<Json<BackupData>, ApiError> {
    Ok(Json(app.use_cases.backup.create_backup().await?))
}

/// Body is a backup document; `?mode=replace|merge|skip` (default merge).
async fn restore(
    State(app): State<Arc<App>>,
    Query(query): Query<RestoreQuery>,
    Json(raw): Json<Value>,
) -> Result<Json<RestoreReport>, ApiError> {
    let mode = match query.mode.as_deref() {
        Some(mode) => mode
            .parse::<MergeMode>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => MergeMode::default(),
    };
    let report = app.use_cases.backup.restore_from_value(&raw, mode).await?;
    Ok(Json(report))
}
