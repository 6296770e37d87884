//! Use cases - User story orchestration.
//!
//! Each module contains use cases for one area of the system.
//! Use cases orchestrate port traits to fulfill user stories.

pub mod admin;
pub mod assets;
pub mod backup;
pub mod community;
pub mod images;
pub mod import;
pub mod library;

// Re-export main types
pub use admin::{AdminError, AdminService};
pub use assets::{AssetError, AssetLookup, AssetStore};
pub use backup::{BackupError, BackupService};
pub use community::{CommunityError, CommunityService, PublishForm, UploadedFile};
pub use images::{ImageCache, ImageFile, ImageHostingService};
pub use import::GameImporter;
pub use library::{GameLibrary, LibraryError};
