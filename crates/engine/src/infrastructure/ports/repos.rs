//! Repository port traits for database access.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use storyforge_domain::*;

use super::error::RepoError;

// =============================================================================
// Settings Storage
// =============================================================================

/// Key/value application settings (`app_settings` table).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettingsRepo: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, RepoError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), RepoError>;
    async fn remove(&self, key: &str) -> Result<(), RepoError>;
}

// =============================================================================
// Local Library
// =============================================================================

/// Game index and payload rows. Every write touching both rows is atomic.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameRepo: Send + Sync {
    /// Insert or replace both rows of one game.
    async fn save(&self, index: &GameIndexEntry, data: &GameData) -> Result<(), RepoError>;

    /// Write whichever rows are given, in one transaction.
    async fn update(
        &self,
        index: Option<GameIndexEntry>,
        data: Option<GameData>,
    ) -> Result<(), RepoError>;

    async fn get_index(&self, id: GameId) -> Result<Option<GameIndexEntry>, RepoError>;
    async fn get_data(&self, id: GameId) -> Result<Option<GameData>, RepoError>;

    /// Priority descending, then `created_at` descending, then id.
    async fn list(
        &self,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<GameIndexEntry>, RepoError>;

    /// Removes index, payload and saved progress. Unknown ids are ignored.
    async fn delete(&self, ids: Vec<GameId>) -> Result<(), RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetRepo: Send + Sync {
    async fn save(&self, asset: &AssetEntry) -> Result<(), RepoError>;
    async fn get(&self, id: AssetId) -> Result<Option<AssetEntry>, RepoError>;
    async fn delete(&self, id: AssetId) -> Result<(), RepoError>;
    /// Returns how many rows were removed.
    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgressRepo: Send + Sync {
    /// Upsert by game id.
    async fn save(&self, progress: &GameProgress) -> Result<(), RepoError>;
    async fn get(&self, game_id: GameId) -> Result<Option<GameProgress>, RepoError>;
    async fn delete(&self, game_id: GameId) -> Result<(), RepoError>;
}

// =============================================================================
// Image Cache
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageCacheRepo: Send + Sync {
    async fn get(&self, file_hash: &str) -> Result<Option<ImageCacheEntry>, RepoError>;
    /// Upsert by file hash.
    async fn put(&self, entry: &ImageCacheEntry) -> Result<(), RepoError>;
    async fn delete(&self, file_hash: &str) -> Result<(), RepoError>;
    async fn delete_by_url(&self, image_url: &str) -> Result<u64, RepoError>;
    async fn delete_uploaded_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepoError>;
    /// Keep the `keep` most recently accessed entries, delete the rest.
    async fn trim_to(&self, keep: u64) -> Result<u64, RepoError>;
    async fn count(&self) -> Result<u64, RepoError>;
    async fn list_all(&self) -> Result<Vec<ImageCacheEntry>, RepoError>;
    async fn clear(&self) -> Result<(), RepoError>;
}

// =============================================================================
// Community
// =============================================================================

/// 1-based page of a moderation listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }
}

/// `search` matches title or description, ignoring ASCII case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameFilter {
    pub search: Option<String>,
    pub author_id: Option<UserId>,
}

/// `search` matches content. Deleted comments never match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentFilter {
    pub search: Option<String>,
    pub user_id: Option<UserId>,
    pub game_id: Option<CommunityGameId>,
}

/// `search` matches email or name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub search: Option<String>,
    pub role: Option<UserRole>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommunityRepo: Send + Sync {
    // Users
    async fn find_user_by_email(&self, email: &str) -> Result<Option<CommunityUser>, RepoError>;
    async fn get_users(&self, ids: Vec<UserId>) -> Result<Vec<CommunityUser>, RepoError>;
    async fn save_user(&self, user: &CommunityUser) -> Result<(), RepoError>;

    // Games
    async fn create_game(&self, game: &CommunityGame) -> Result<(), RepoError>;
    async fn get_game(&self, id: CommunityGameId) -> Result<Option<CommunityGame>, RepoError>;
    /// Newest first.
    async fn list_recent_games(&self, limit: u32) -> Result<Vec<CommunityGame>, RepoError>;

    // Aggregates
    async fn vote_counts(&self, game_ids: Vec<CommunityGameId>)
        -> Result<Vec<VoteCount>, RepoError>;
    async fn comment_counts(
        &self,
        game_ids: Vec<CommunityGameId>,
    ) -> Result<Vec<(CommunityGameId, u64)>, RepoError>;

    // Votes
    /// Insert or change the caller's vote; returns the stored row.
    async fn upsert_vote(&self, vote: &Vote) -> Result<Vote, RepoError>;

    // Comments
    async fn create_comment(&self, comment: &Comment) -> Result<(), RepoError>;
    /// Newest first. With a cursor, the page starts at (and includes) that comment;
    /// an unknown cursor yields an empty page.
    async fn list_comments(
        &self,
        game_id: CommunityGameId,
        cursor: Option<CommentId>,
        limit: u32,
    ) -> Result<Vec<Comment>, RepoError>;

    // Moderation
    async fn get_games(&self, ids: Vec<CommunityGameId>) -> Result<Vec<CommunityGame>, RepoError>;
    /// Newest first, with activity; the second value counts every match.
    async fn search_games(
        &self,
        filter: &GameFilter,
        page: PageRequest,
    ) -> Result<(Vec<(CommunityGame, GameActivity)>, u64), RepoError>;
    /// Removes the game with its votes and comments. `false` if it did not exist.
    async fn delete_game(&self, id: CommunityGameId) -> Result<bool, RepoError>;
    /// Newest first; the second value counts every match.
    async fn search_comments(
        &self,
        filter: &CommentFilter,
        page: PageRequest,
    ) -> Result<(Vec<Comment>, u64), RepoError>;
    /// Hides comments from every listing and count. Returns how many were newly hidden.
    async fn soft_delete_comments(&self, ids: Vec<CommentId>) -> Result<u64, RepoError>;
    /// Newest first, with activity; the second value counts every match.
    async fn search_users(
        &self,
        filter: &UserFilter,
        page: PageRequest,
    ) -> Result<(Vec<(CommunityUser, UserActivity)>, u64), RepoError>;
    async fn user_activity(&self, id: UserId) -> Result<UserActivity, RepoError>;
    /// Returns how many users matched.
    async fn update_users(
        &self,
        ids: Vec<UserId>,
        update: &UserUpdate,
        at: DateTime<Utc>,
    ) -> Result<u64, RepoError>;
    /// Newest first.
    async fn list_user_votes(&self, user_id: UserId, limit: u32) -> Result<Vec<Vote>, RepoError>;
}
