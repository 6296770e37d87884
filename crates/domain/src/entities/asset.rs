//! Asset entities - locally stored media blobs and references to them

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::AssetId;

/// Local assets older than this are removed by cleanup.
pub const ASSET_RETENTION_DAYS: i64 = 30;

/// Kind of media held by an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Audio,
    Video,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            other => Err(DomainError::parse(format!("Unknown asset kind: {}", other))),
        }
    }
}

/// A media blob kept in the local asset table (audio and video only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEntry {
    pub id: AssetId,
    #[serde(skip_serializing, default)]
    pub blob: Vec<u8>,
    pub kind: AssetKind,
    pub name: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

impl AssetEntry {
    pub fn new(blob: Vec<u8>, name: impl Into<String>, kind: AssetKind, now: DateTime<Utc>) -> Self {
        let size = blob.len() as u64;
        Self {
            id: AssetId::new(),
            blob,
            kind,
            name: name.into(),
            size,
            created_at: now,
        }
    }
}

/// Whether an asset id is an absolute URL to an externally hosted file.
pub fn is_hosted_url(id: &str) -> bool {
    id.starts_with("http://") || id.starts_with("https://")
}

/// Reference to an asset: either a local row or an externally hosted URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetRef {
    Local(AssetId),
    Hosted(String),
}

impl AssetRef {
    /// Parse an asset id as stored on a game (`thumbnailAssetId` etc).
    pub fn parse(id: &str) -> Result<Self, DomainError> {
        if is_hosted_url(id) {
            Ok(Self::Hosted(id.to_string()))
        } else {
            Ok(Self::Local(id.parse()?))
        }
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(id) => write!(f, "{}", id),
            Self::Hosted(url) => write!(f, "{}", url),
        }
    }
}
