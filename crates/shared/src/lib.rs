//! Storyforge Shared - wire types for the HTTP surface
//!
//! This crate contains the request and response bodies exchanged with the engine's
//! HTTP endpoints and with external image hosts:
//! - Community API DTOs (published games, votes, comments)
//! - Moderation API DTOs
//! - Image upload endpoint contract
//! - Library import reports
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - Only serde and serde_json
//! 2. **No business logic** - Pure data types and serialization
//! 3. **No domain IDs** - ids and timestamps travel as strings

pub mod admin;
pub mod community;
pub mod images;
pub mod library;

pub use admin::{
    AdminComment, AdminCommentPage, AdminGame, AdminGameIdQuery, AdminGamePage, AdminGameRef,
    AdminListQuery, AdminMessage, AdminUser, AdminUserDetail, AdminUserPage, AdminUserRef,
    BulkUserRequest, DeleteCommentsRequest, GameCounts, Pagination, UpdateUserRequest,
    UpdatedUserResponse, UserCommentEntry, UserCounts, UserGameEntry, UserStats, UserVoteEntry,
};
pub use community::{
    AuthorSummary, CommentPage, CommentQuery, CommentRequest, CommentResponse,
    CommunityGameDetail, CommunityGameSummary, CreatedResponse, VoteRequest, VoteResponse,
};
pub use images::{ImageUploadResponse, ImageUploadResult, UploadDirStats};
pub use library::ImportReport;
