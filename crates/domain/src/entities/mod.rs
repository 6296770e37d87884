//! Domain entities - Core business objects with identity

mod asset;
mod community;
mod game;
mod image_cache;
mod progress;

pub use asset::{is_hosted_url, AssetEntry, AssetKind, AssetRef, ASSET_RETENTION_DAYS};
pub use community::{
    Comment, CommunityGame, CommunityUser, GameActivity, UserActivity, UserRole, UserUpdate,
    Vote, VoteCount, VoteTally, VoteType,
};
pub use game::{
    GameData, GameIndexEntry, GameRecord, GameUpdate, NewGameOptions, DEFAULT_AUTHOR,
    INITIAL_GAME_VERSION,
};
pub use image_cache::{
    ImageCacheEntry, ImageCacheStats, IMAGE_CACHE_MAX_ENTRIES, IMAGE_CACHE_TTL_DAYS,
};
pub use progress::GameProgress;
