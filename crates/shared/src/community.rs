//! Community API bodies

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: String,
    pub name: Option<String>,
}

/// Entry of `GET /api/games`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityGameSummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub author: AuthorSummary,
    /// upvotes - downvotes
    pub score: i64,
    pub upvotes: u64,
    pub downvotes: u64,
    pub comments_count: u64,
}

/// Body of `GET /api/games/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityGameDetail {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub author: AuthorSummary,
    pub json_data: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: String,
}

/// Body of `POST /api/games/{id}/vote`. `type` is checked by the handler, not by serde.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteRequest {
    #[serde(rename = "type", default)]
    pub vote_type: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub user_id: String,
    pub game_id: String,
    #[serde(rename = "type")]
    pub vote_type: String,
    pub created_at: String,
}

/// Body of `POST /api/games/{id}/comments`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub content: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: String,
    pub content: String,
    pub created_at: String,
    pub user: AuthorSummary,
}

/// Query of `GET /api/games/{id}/comments`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentQuery {
    pub cursor: Option<String>,
    pub take: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPage {
    pub items: Vec<CommentResponse>,
    /// Id of the first comment of the next page
    pub next_cursor: Option<String>,
}
