//! Storyforge domain: game library entities, the canonical story model, payload
//! validation, status changes, the narrative interpreter and the backup format.
//!
//! Everything here is pure. Storage, HTTP and time live in `storyforge-engine`;
//! functions that need "now" take it as an argument.

extern crate self as storyforge_domain;

pub mod backup;
pub mod common;
pub mod entities;
pub mod error;
pub mod ids;
pub mod narrative;
pub mod story;
pub mod validation;
pub mod value_objects;

pub use backup::{
    validate_backup, BackupData, BackupFormatError, BackupGame, BackupMetadata, MergeMode,
    RestoreReport, BACKUP_FORMAT_VERSION,
};
pub use entities::{
    is_hosted_url, AssetEntry, AssetKind, AssetRef, Comment, CommunityGame, CommunityUser,
    GameActivity, GameData, GameIndexEntry, GameProgress, GameRecord, GameUpdate,
    ImageCacheEntry, ImageCacheStats, NewGameOptions, UserActivity, UserRole, UserUpdate, Vote,
    VoteCount, VoteTally, VoteType, ASSET_RETENTION_DAYS,
    DEFAULT_AUTHOR, IMAGE_CACHE_MAX_ENTRIES, IMAGE_CACHE_TTL_DAYS, INITIAL_GAME_VERSION,
};
pub use error::DomainError;
pub use ids::{AssetId, CommentId, CommunityGameId, GameId, UserId};
pub use narrative::{Command, LineKind, NarrativeSession, OutputLine, OutputLog, SessionError, StepOutcome};
pub use story::{
    extract_metadata, extract_thumbnail, migrate_legacy_fields, Branch, Choice, GameMetadata,
    StateDefinition, Story, StoryError, UNTITLED_GAME,
};
pub use validation::{validate_game_data, ValidationReport};
pub use value_objects::{
    apply_status_changes, GameTitle, StatusChange, StatusOp, StatusState,
};
