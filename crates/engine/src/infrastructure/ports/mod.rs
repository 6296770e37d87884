//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - Database access (SQLite today)
//! - Image hosting (remote host, local fallback endpoint)
//! - Clock (for testing)

mod error;
mod external;
mod repos;
mod testing;

// =============================================================================
// Errors
// =============================================================================
pub use error::{RepoError, UploadError};

// =============================================================================
// Repository Ports
// =============================================================================
pub use repos::{
    AssetRepo, CommentFilter, CommunityRepo, GameFilter, GameRepo, ImageCacheRepo, PageRequest,
    ProgressRepo, SettingsRepo, UserFilter,
};

// =============================================================================
// External Service Ports
// =============================================================================
pub use external::{ImageUploadPort, ImageUploadRequest};

// =============================================================================
// Test-Only Mocks (only available during test builds)
// =============================================================================
#[cfg(test)]
pub use repos::{
    MockAssetRepo, MockCommunityRepo, MockGameRepo, MockImageCacheRepo, MockProgressRepo,
    MockSettingsRepo,
};

#[cfg(test)]
pub use external::MockImageUploadPort;

#[cfg(test)]
pub use testing::MockClockPort;

// =============================================================================
// Testing Ports
// =============================================================================
pub use testing::ClockPort;
