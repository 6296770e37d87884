//! Local directory backing `/api/images/upload`.

use std::path::{Path, PathBuf};

use storyforge_shared::UploadDirStats;

/// URL path prefix the stored files are served under.
pub const UPLOADS_URL_PATH: &str = "/uploads/images";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub url: String,
    pub file_path: String,
    pub file_name: String,
}

pub struct UploadDir {
    root: PathBuf,
    public_base_url: String,
}

impl UploadDir {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` as `{timestamp_ms}_{original_name}`.
    pub async fn store(
        &self,
        original_name: &str,
        bytes: &[u8],
        timestamp_ms: i64,
    ) -> std::io::Result<StoredUpload> {
        tokio::fs::create_dir_all(&self.root).await?;

        let file_name = format!("{}_{}", timestamp_ms, sanitize_file_name(original_name));
        tokio::fs::write(self.root.join(&file_name), bytes).await?;

        let file_path = format!("{}/{}", UPLOADS_URL_PATH, file_name);
        Ok(StoredUpload {
            url: format!("{}{}", self.public_base_url, file_path),
            file_path,
            file_name,
        })
    }

    /// File count and total size. A missing or unreadable directory counts as empty.
    pub async fn stats(&self) -> UploadDirStats {
        match self.scan().await {
            Ok((total_files, total_size)) => UploadDirStats {
                total_files,
                total_size,
                total_size_mb: format_megabytes(total_size),
            },
            Err(e) => {
                tracing::debug!(dir = %self.root.display(), error = %e, "Upload directory not readable");
                UploadDirStats {
                    total_files: 0,
                    total_size: 0,
                    total_size_mb: format_megabytes(0),
                }
            }
        }
    }

    async fn scan(&self) -> std::io::Result<(u64, u64)> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut files = 0;
        let mut size = 0;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            files += 1;
            size += metadata.len();
        }
        Ok((files, size))
    }
}

fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base == "." || base == ".." {
        "image".to_string()
    } else {
        base.to_string()
    }
}

fn format_megabytes(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / (1024.0 * 1024.0))
}
