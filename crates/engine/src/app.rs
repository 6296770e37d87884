//! Application state and composition.

use std::sync::Arc;

use crate::infrastructure::{
    config::AppConfig,
    ports::{ClockPort, ImageUploadPort},
    rate_limit::RateLimiter,
    sqlite::SqliteRepositories,
    upload_dir::UploadDir,
};
use crate::use_cases;

/// Main application state.
///
/// Holds the use cases plus the pieces the HTTP layer needs directly.
/// Passed to HTTP handlers via Axum state.
pub struct App {
    pub config: AppConfig,
    pub use_cases: UseCases,
    /// Per-client limit on `POST /api/images/upload`.
    pub upload_limiter: RateLimiter,
    pub upload_dir: UploadDir,
    pub clock: Arc<dyn ClockPort>,
}

/// Container for all use cases.
pub struct UseCases {
    pub library: Arc<use_cases::GameLibrary>,
    pub assets: Arc<use_cases::AssetStore>,
    pub images: Arc<use_cases::ImageHostingService>,
    pub import: use_cases::GameImporter,
    pub backup: use_cases::BackupService,
    pub community: use_cases::CommunityService,
    pub admin: use_cases::AdminService,
}

impl App {
    /// Create a new App with all dependencies wired up.
    pub fn new(
        config: AppConfig,
        repos: SqliteRepositories,
        clock: Arc<dyn ClockPort>,
        primary_uploader: Option<Arc<dyn ImageUploadPort>>,
        fallback_uploader: Arc<dyn ImageUploadPort>,
    ) -> Self {
        let image_cache = Arc::new(use_cases::ImageCache::new(
            repos.image_cache.clone(),
            clock.clone(),
        ));
        let images = Arc::new(
            use_cases::ImageHostingService::new(
                image_cache,
                primary_uploader,
                fallback_uploader,
                config.image_upload_timeout,
            )
            .with_imgbb(config.use_imgbb),
        );

        let library = Arc::new(use_cases::GameLibrary::new(
            repos.games.clone(),
            repos.progress.clone(),
            repos.settings.clone(),
            clock.clone(),
        ));
        let assets = Arc::new(use_cases::AssetStore::new(
            repos.assets.clone(),
            images.clone(),
            clock.clone(),
        ));

        let use_cases = UseCases {
            import: use_cases::GameImporter::new(library.clone(), assets.clone()),
            backup: use_cases::BackupService::new(repos.games.clone(), clock.clone()),
            community: use_cases::CommunityService::new(repos.community.clone(), clock.clone()),
            admin: use_cases::AdminService::new(repos.community.clone(), clock.clone()),
            library,
            assets,
            images,
        };

        let upload_dir = UploadDir::new(config.upload_dir.clone(), &config.public_base_url);

        Self {
            config,
            use_cases,
            upload_limiter: RateLimiter::for_uploads(),
            upload_dir,
            clock,
        }
    }
}
