//! Library backup format and restore policy

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::entities::GameIndexEntry;
use crate::error::DomainError;

pub const BACKUP_FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub game_count: usize,
    /// Size in bytes of the serialized `games` array
    pub total_size: u64,
    pub app_version: String,
}

/// One game: its index row plus its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupGame {
    pub index: GameIndexEntry,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupData {
    pub metadata: BackupMetadata,
    pub games: Vec<BackupGame>,
}

impl BackupData {
    pub fn new(games: Vec<BackupGame>, app_version: impl Into<String>, now: DateTime<Utc>) -> Self {
        let total_size = serde_json::to_vec(&games)
            .map(|bytes| bytes.len() as u64)
            .unwrap_or(0);
        Self {
            metadata: BackupMetadata {
                version: BACKUP_FORMAT_VERSION.to_string(),
                created_at: now,
                game_count: games.len(),
                total_size,
                app_version: app_version.into(),
            },
            games,
        }
    }
}

/// Structural problems in an uploaded backup file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackupFormatError {
    #[error("无效的备份文件格式")]
    InvalidFormat,
    #[error("备份文件缺少必要的数据结构")]
    MissingSections,
    #[error("备份元数据不完整")]
    IncompleteMetadata,
    #[error("游戏数据格式错误")]
    MalformedGames,
    #[error("游戏数量与元数据不匹配")]
    CountMismatch,
}

/// Check a raw backup document and read it.
pub fn validate_backup(raw: &Value) -> Result<BackupData, BackupFormatError> {
    let root = raw.as_object().ok_or(BackupFormatError::InvalidFormat)?;

    let (Some(metadata), Some(games)) = (root.get("metadata"), root.get("games")) else {
        return Err(BackupFormatError::MissingSections);
    };

    let has_text = |key: &str| {
        metadata
            .get(key)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty())
    };
    let game_count = metadata.get("gameCount").and_then(Value::as_u64);
    let Some(game_count) = game_count.filter(|_| has_text("version") && has_text("createdAt"))
    else {
        return Err(BackupFormatError::IncompleteMetadata);
    };

    let games = games.as_array().ok_or(BackupFormatError::MalformedGames)?;
    if game_count != games.len() as u64 {
        return Err(BackupFormatError::CountMismatch);
    }

    let complete = games.iter().all(|game| {
        let index = game.get("index");
        let present = |key: &str| index.and_then(|i| i.get(key)).is_some_and(|v| !v.is_null());
        present("id") && present("title") && game.get("data").is_some_and(|d| !d.is_null())
    });
    if !complete {
        return Err(BackupFormatError::MalformedGames);
    }

    serde_json::from_value(raw.clone()).map_err(|_| BackupFormatError::MalformedGames)
}

/// How restore treats games whose id already exists in the library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Overwrite existing games
    Replace,
    /// Keep whichever copy was updated last
    #[default]
    Merge,
    /// Leave existing games untouched
    Skip,
}

impl MergeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Merge => "merge",
            Self::Skip => "skip",
        }
    }

    /// Whether `incoming` should be written given the library's current copy.
    pub fn should_write(&self, incoming: &GameIndexEntry, existing: Option<&GameIndexEntry>) -> bool {
        match (self, existing) {
            (_, None) => true,
            (Self::Replace, Some(_)) => true,
            (Self::Merge, Some(current)) => incoming.updated_at > current.updated_at,
            (Self::Skip, Some(_)) => false,
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MergeMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "replace" => Ok(Self::Replace),
            "merge" => Ok(Self::Merge),
            "skip" => Ok(Self::Skip),
            other => Err(DomainError::parse(format!("Unknown merge mode: {}", other))),
        }
    }
}

/// Outcome of a restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub restored: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::NewGameOptions;
    use crate::value_objects::GameTitle;
    use crate::GameId;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
    }

    fn entry(updated_at: DateTime<Utc>) -> GameIndexEntry {
        let mut entry = GameIndexEntry::new(
            GameId::new(),
            GameTitle::new("备份测试").unwrap(),
            NewGameOptions::default(),
            now(),
        );
        entry.updated_at = updated_at;
        entry
    }

    fn backup() -> BackupData {
        BackupData::new(
            vec![BackupGame {
                index: entry(now()),
                data: json!({"game_title": "备份测试", "branches": []}),
            }],
            "0.1.0",
            now(),
        )
    }

    #[test]
    fn new_backup_fills_metadata() {
        let data = backup();
        assert_eq!(data.metadata.version, "1.0");
        assert_eq!(data.metadata.game_count, 1);
        assert!(data.metadata.total_size > 0);
    }

    #[test]
    fn serialized_backup_validates() {
        let original = backup();
        let raw = serde_json::to_value(&original).unwrap();
        let parsed = validate_backup(&raw).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn rejects_structural_problems() {
        assert_eq!(validate_backup(&json!("x")), Err(BackupFormatError::InvalidFormat));
        assert_eq!(
            validate_backup(&json!({"games": []})),
            Err(BackupFormatError::MissingSections)
        );
        assert_eq!(
            validate_backup(&json!({"metadata": {"version": "1.0"}, "games": []})),
            Err(BackupFormatError::IncompleteMetadata)
        );

        let mut raw = serde_json::to_value(backup()).unwrap();
        raw["metadata"]["gameCount"] = json!(3);
        assert_eq!(validate_backup(&raw), Err(BackupFormatError::CountMismatch));

        let mut raw = serde_json::to_value(backup()).unwrap();
        raw["games"][0]["data"] = Value::Null;
        assert_eq!(validate_backup(&raw), Err(BackupFormatError::MalformedGames));
    }

    #[test]
    fn merge_keeps_newer_copy() {
        let older = entry(now());
        let newer = entry(now() + Duration::hours(1));

        assert!(MergeMode::Merge.should_write(&newer, Some(&older)));
        assert!(!MergeMode::Merge.should_write(&older, Some(&newer)));
        assert!(!MergeMode::Merge.should_write(&older, Some(&older)));
    }

    #[test]
    fn replace_and_skip() {
        let existing = entry(now());
        let incoming = entry(now() - Duration::days(1));

        assert!(MergeMode::Replace.should_write(&incoming, Some(&existing)));
        assert!(!MergeMode::Skip.should_write(&incoming, Some(&existing)));
        assert!(MergeMode::Skip.should_write(&incoming, None));
    }
}
