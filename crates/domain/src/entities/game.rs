//! Game entities - the index row, the payload row and the updates applied to them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DomainError;
use crate::value_objects::GameTitle;
use crate::GameId;

/// Version stamped on every new index entry. Never incremented.
pub const INITIAL_GAME_VERSION: u32 = 1;

/// Author recorded when none is given.
pub const DEFAULT_AUTHOR: &str = "Unknown";

/// Lightweight metadata row, listed and sorted without touching payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameIndexEntry {
    pub id: GameId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "initial_version")]
    pub version: u32,
    /// Local asset id or absolute URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_asset_id: Option<String>,
    /// Local asset id or absolute URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_asset_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_author")]
    pub author: String,
}

fn initial_version() -> u32 {
    INITIAL_GAME_VERSION
}

fn default_author() -> String {
    DEFAULT_AUTHOR.to_string()
}

/// Optional metadata supplied when a game is created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGameOptions {
    pub description: Option<String>,
    pub priority: Option<i64>,
    pub thumbnail_asset_id: Option<String>,
    pub background_asset_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author: Option<String>,
}

impl GameIndexEntry {
    pub fn new(id: GameId, title: GameTitle, options: NewGameOptions, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            description: options.description,
            priority: options.priority.unwrap_or(0),
            created_at: now,
            updated_at: now,
            version: INITIAL_GAME_VERSION,
            thumbnail_asset_id: options.thumbnail_asset_id,
            background_asset_id: options.background_asset_id,
            tags: options.tags,
            author: options
                .author
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(default_author),
        }
    }
}

/// The authoritative game content, stored apart from the index under the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameData {
    pub id: GameId,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GameData {
    pub fn new(id: GameId, data: Value, now: DateTime<Utc>) -> Self {
        Self {
            id,
            data,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Both rows of one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub index: GameIndexEntry,
    pub payload: GameData,
}

/// Partial update. Index fields and `data` are independent; only touched rows change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<i64>,
    pub thumbnail_asset_id: Option<String>,
    pub background_asset_id: Option<String>,
    pub tags: Option<Vec<String>>,
    pub author: Option<String>,
    pub data: Option<Value>,
}

impl GameUpdate {
    pub fn priority(priority: i64) -> Self {
        Self {
            priority: Some(priority),
            ..Self::default()
        }
    }

    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// Whether any index field is set.
    pub fn touches_index(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.priority.is_some()
            || self.thumbnail_asset_id.is_some()
            || self.background_asset_id.is_some()
            || self.tags.is_some()
            || self.author.is_some()
    }

    pub fn touches_data(&self) -> bool {
        self.data.is_some()
    }

    /// Apply the index fields to `entry`, bumping `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` when a new title is blank.
    pub fn apply_to_index(
        &self,
        entry: &GameIndexEntry,
        now: DateTime<Utc>,
    ) -> Result<GameIndexEntry, DomainError> {
        let mut next = entry.clone();
        if let Some(title) = &self.title {
            next.title = GameTitle::new(title.clone())?.into();
        }
        if let Some(description) = &self.description {
            next.description = Some(description.clone());
        }
        if let Some(priority) = self.priority {
            next.priority = priority;
        }
        if let Some(thumbnail) = &self.thumbnail_asset_id {
            next.thumbnail_asset_id = Some(thumbnail.clone());
        }
        if let Some(background) = &self.background_asset_id {
            next.background_asset_id = Some(background.clone());
        }
        if let Some(tags) = &self.tags {
            next.tags = tags.clone();
        }
        if let Some(author) = &self.author {
            next.author = author.clone();
        }
        next.updated_at = now;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn new_entry_uses_defaults() {
        let title = GameTitle::new("测试游戏").unwrap();
        let entry = GameIndexEntry::new(GameId::new(), title, NewGameOptions::default(), now());

        assert_eq!(entry.title, "测试游戏");
        assert_eq!(entry.priority, 0);
        assert_eq!(entry.version, 1);
        assert_eq!(entry.author, "Unknown");
        assert_eq!(entry.created_at, entry.updated_at);
    }

    #[test]
    fn blank_author_falls_back_to_default() {
        let options = NewGameOptions {
            author: Some("  ".into()),
            ..NewGameOptions::default()
        };
        let entry = GameIndexEntry::new(GameId::new(), GameTitle::new("t").unwrap(), options, now());
        assert_eq!(entry.author, DEFAULT_AUTHOR);
    }

    #[test]
    fn priority_update_only_touches_index() {
        let update = GameUpdate::priority(5);
        assert!(update.touches_index());
        assert!(!update.touches_data());

        let data_only = GameUpdate::data(json!({"branches": []}));
        assert!(!data_only.touches_index());
        assert!(data_only.touches_data());
    }

    #[test]
    fn apply_to_index_bumps_updated_at_and_keeps_created_at() {
        let entry = GameIndexEntry::new(
            GameId::new(),
            GameTitle::new("old").unwrap(),
            NewGameOptions::default(),
            now(),
        );
        let later = now() + chrono::Duration::minutes(5);
        let update = GameUpdate {
            title: Some(" new ".into()),
            tags: Some(vec!["mystery".into()]),
            ..GameUpdate::default()
        };

        let next = update.apply_to_index(&entry, later).unwrap();

        assert_eq!(next.title, "new");
        assert_eq!(next.tags, vec!["mystery".to_string()]);
        assert_eq!(next.created_at, entry.created_at);
        assert_eq!(next.updated_at, later);
    }

    #[test]
    fn apply_to_index_rejects_blank_title() {
        let entry = GameIndexEntry::new(
            GameId::new(),
            GameTitle::new("old").unwrap(),
            NewGameOptions::default(),
            now(),
        );
        let update = GameUpdate {
            title: Some("   ".into()),
            ..GameUpdate::default()
        };
        assert!(update.apply_to_index(&entry, now()).is_err());
    }

    #[test]
    fn index_entry_serializes_camel_case() {
        let entry = GameIndexEntry::new(
            GameId::new(),
            GameTitle::new("t").unwrap(),
            NewGameOptions::default(),
            now(),
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("createdAt").is_some());
        assert!(value.get("thumbnailAssetId").is_none());
    }
}
