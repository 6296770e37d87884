//! Moderation API bodies (`/api/admin/*`)

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Query of every admin listing. Unparseable numbers fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub author_id: Option<String>,
    pub user_id: Option<String>,
    pub game_id: Option<String>,
    /// A role name, or `all`
    pub role: Option<String>,
}

/// Query of `DELETE /api/admin/games`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminGameIdQuery {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUserRef {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminGameRef {
    pub id: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameCounts {
    pub votes: u64,
    pub comments: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminGame {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub author: AdminUserRef,
    #[serde(rename = "_count")]
    pub counts: GameCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminGamePage {
    pub games: Vec<AdminGame>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminComment {
    pub id: String,
    pub content: String,
    pub created_at: String,
    pub is_deleted: bool,
    pub user: AdminUserRef,
    pub game: AdminGameRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCommentPage {
    pub comments: Vec<AdminComment>,
    pub pagination: Pagination,
}

/// Body of `DELETE /api/admin/comments`. The shape is checked by the handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCommentsRequest {
    #[serde(default)]
    pub comment_ids: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCounts {
    pub games: u64,
    pub comments: u64,
    pub votes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
    #[serde(rename = "_count", skip_serializing_if = "Option::is_none", default)]
    pub counts: Option<UserCounts>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUserPage {
    pub users: Vec<AdminUser>,
    pub pagination: Pagination,
}

/// Body of `PUT /api/admin/users`: `action` is `activate`, `deactivate` or `role`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUserRequest {
    #[serde(default)]
    pub user_ids: Option<Value>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
}

/// Body of `PUT /api/admin/users/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub games_count: u64,
    pub comments_count: u64,
    pub votes_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGameEntry {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCommentEntry {
    pub id: String,
    pub content: String,
    pub created_at: String,
    pub game: AdminGameRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVoteEntry {
    #[serde(rename = "type")]
    pub vote_type: String,
    pub created_at: String,
    pub game: AdminGameRef,
}

/// Body of `GET /api/admin/users/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUserDetail {
    pub user: AdminUser,
    pub stats: UserStats,
    pub games: Vec<UserGameEntry>,
    pub comments: Vec<UserCommentEntry>,
    pub votes: Vec<UserVoteEntry>,
}

/// Acknowledgement of a moderation write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminMessage {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedUserResponse {
    pub message: String,
    pub user: AdminUser,
}
