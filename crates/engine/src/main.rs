//! Storyforge Engine - Main entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::HeaderName;
use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storyforge_engine::api;
use storyforge_engine::api::auth::USER_EMAIL_HEADER;
use storyforge_engine::app::App;
use storyforge_engine::infrastructure::{
    clock::SystemClock,
    config::AppConfig,
    image_host::HttpImageUploader,
    ports::{ClockPort, ImageUploadPort},
    sqlite::SqliteRepositories,
    upload_dir::UPLOADS_URL_PATH,
};

/// How often in-memory upload rate windows are swept.
const RATE_LIMIT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from repo root (the engine may be started from `crates/engine`).
    load_dotenv_from_repo_root();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storyforge_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Storyforge Engine");

    // Load configuration
    let config = AppConfig::from_env();

    let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());

    tracing::info!(path = %config.database_path, "Opening SQLite database");
    let repos = SqliteRepositories::open(&config.database_path, clock.clone()).await?;

    // Image uploaders: optional remote host first, local endpoint as fallback
    let primary: Option<Arc<dyn ImageUploadPort>> = config
        .image_upload_url
        .as_deref()
        .map(|url| Arc::new(HttpImageUploader::new(url)) as Arc<dyn ImageUploadPort>);
    let fallback: Arc<dyn ImageUploadPort> =
        Arc::new(HttpImageUploader::new(&config.image_fallback_url));
    tracing::info!(
        primary = ?config.image_upload_url,
        fallback = %config.image_fallback_url,
        timeout_secs = config.image_upload_timeout.as_secs(),
        "Image hosting configured"
    );

    let app = Arc::new(App::new(
        config.clone(),
        repos,
        clock,
        primary,
        fallback,
    ));

    // Startup housekeeping
    let removed_assets = app.use_cases.assets.cleanup().await;
    let expired_images = app.use_cases.images.cache().clear_expired().await;
    tracing::info!(removed_assets, expired_images, "Startup cleanup finished");

    // Sweep finished rate-limit windows
    let sweep_app = app.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(RATE_LIMIT_SWEEP_INTERVAL).await;
            let removed = sweep_app.upload_limiter.cleanup_expired().await;
            if removed > 0 {
                tracing::debug!(removed, "Swept upload rate-limit windows");
            }
        }
    });

    let mut router = api::http::routes()
        .with_state(app)
        .nest_service(UPLOADS_URL_PATH, ServeDir::new(&config.upload_dir))
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = build_cors_layer_from_env() {
        router = router.layer(cors);
    }

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}

fn build_cors_layer_from_env() -> Option<CorsLayer> {
    let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())?;

    let mut cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        // Browsers send X-User-Email and JSON/multipart content types, which trigger preflights.
        .allow_headers([
            HeaderName::from_static(USER_EMAIL_HEADER),
            axum::http::header::CONTENT_TYPE,
        ]);

    if allowed_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| HeaderValue::from_str(s).ok())
            .collect();

        if origins.is_empty() {
            return None;
        }

        cors = cors.allow_origin(origins);
    }

    Some(cors)
}
