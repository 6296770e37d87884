//! Engine configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// SQLite file holding the library, image cache and community tables.
    pub database_path: String,
    pub server_host: String,
    pub server_port: u16,
    /// Primary image host. Without one, uploads go straight to the fallback.
    pub image_upload_url: Option<String>,
    pub image_fallback_url: String,
    pub image_upload_timeout: Duration,
    /// Sent as `useImgBB` with every upload.
    pub use_imgbb: bool,
    pub upload_dir: PathBuf,
    /// Prefix for URLs of locally stored uploads; always absolute.
    pub public_base_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let server_port: u16 = var("SERVER_PORT")
            .or_else(|| var("PORT"))
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let image_upload_timeout = var("IMAGE_UPLOAD_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_UPLOAD_TIMEOUT);

        Self {
            database_path: var("STORYFORGE_DB").unwrap_or_else(|| "storyforge.db".into()),
            server_host: var("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            server_port,
            image_upload_url: var("IMAGE_UPLOAD_URL"),
            image_fallback_url: var("IMAGE_FALLBACK_URL").unwrap_or_else(|| {
                format!("http://localhost:{}/api/images/upload", server_port)
            }),
            image_upload_timeout,
            use_imgbb: var("USE_IMGBB").is_some_and(|v| v == "true"),
            upload_dir: var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads/images")),
            public_base_url: var("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://localhost:{}", server_port)),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
