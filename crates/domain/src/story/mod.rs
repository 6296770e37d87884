//! Canonical story model.
//!
//! Game payloads are free-form JSON authored by several editors, each with its own
//! field names. [`migrate_legacy_fields`] rewrites them into one canonical shape at
//! the import boundary; [`Story::from_payload`] then reads that shape into typed
//! structs for the interpreter.

mod metadata;
mod migrate;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::value_objects::{StatusChange, StatusState};

pub use metadata::{extract_metadata, extract_thumbnail, GameMetadata, UNTITLED_GAME};
pub use migrate::migrate_legacy_fields;

/// Why a payload cannot be read as a playable story.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoryError {
    /// `{ scenes: {...} }` payloads validate but cannot be played
    #[error("scene-map payloads are not playable")]
    UnsupportedShape,

    #[error("story has no branches")]
    NoBranches,

    #[error("malformed story: {0}")]
    Malformed(String),
}

/// A complete game in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    #[serde(default, deserialize_with = "lenient_string")]
    pub game_title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    /// Declared attributes with their starting values and bounds
    #[serde(default)]
    pub game_states: Vec<StateDefinition>,
    pub branches: Vec<Branch>,
}

/// One node of the branch graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    #[serde(default, deserialize_with = "lenient_string")]
    pub branch_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub chapter: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub scene_detail: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default, deserialize_with = "lenient_target")]
    pub background_image: Option<String>,
    #[serde(default, deserialize_with = "lenient_target")]
    pub background_asset_id: Option<String>,
}

/// An edge out of a branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    /// Display text
    #[serde(default, deserialize_with = "lenient_string")]
    pub choice: String,
    /// Target branch id; empty strings read as `None`
    #[serde(default, deserialize_with = "lenient_target")]
    pub next_branch: Option<String>,
    #[serde(default, deserialize_with = "lenient_target")]
    pub effect: Option<String>,
    /// Free-text summary shown to the player, e.g. `暴露度+10`
    #[serde(default, deserialize_with = "lenient_target")]
    pub status_update: Option<String>,
    #[serde(default)]
    pub status_changes: Vec<StatusChange>,
    #[serde(default, deserialize_with = "truthy")]
    pub end_game: bool,
}

/// A declared attribute (`game_states` entry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDefinition {
    #[serde(deserialize_with = "lenient_string")]
    pub state_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default)]
    pub initial_value: f64,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub display_format: Option<String>,
}

impl Story {
    /// Read a payload (legacy field names allowed) as a playable story.
    pub fn from_payload(payload: &Value) -> Result<Self, StoryError> {
        let migrated = migrate_legacy_fields(payload);

        match migrated.get("branches") {
            Some(Value::Array(_)) => {}
            Some(_) => return Err(StoryError::Malformed("branches must be an array".into())),
            None if migrated.get("scenes").is_some() => return Err(StoryError::UnsupportedShape),
            None => return Err(StoryError::NoBranches),
        }

        let story: Story =
            serde_json::from_value(migrated).map_err(|e| StoryError::Malformed(e.to_string()))?;
        if story.branches.is_empty() {
            return Err(StoryError::NoBranches);
        }
        Ok(story)
    }

    /// The first branch is the implicit start node.
    pub fn start_branch(&self) -> Option<&Branch> {
        self.branches.first()
    }

    pub fn branch_index(&self, branch_id: &str) -> Option<usize> {
        self.branches.iter().position(|b| b.branch_id == branch_id)
    }

    pub fn branch(&self, branch_id: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.branch_id == branch_id)
    }

    /// Starting attribute values from `game_states`.
    pub fn initial_state(&self) -> StatusState {
        self.game_states
            .iter()
            .map(|s| (s.state_id.clone(), s.initial_value))
            .collect()
    }

    pub fn state_definition(&self, state_id: &str) -> Option<&StateDefinition> {
        self.game_states.iter().find(|s| s.state_id == state_id)
    }
}

impl Choice {
    /// Status changes with declared bounds filled in where the author gave none.
    pub fn bounded_changes(&self, story: &Story) -> Vec<StatusChange> {
        self.status_changes
            .iter()
            .map(|change| {
                let mut change = change.clone();
                if let Some(def) = story.state_definition(&change.attribute) {
                    change.min = change.min.or(def.min_value);
                    change.max = change.max.or(def.max_value);
                }
                change
            })
            .collect()
    }
}

/// Strings as-is, numbers stringified, anything else empty.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_target<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = lenient_string(deserializer)?;
    Ok(if s.trim().is_empty() { None } else { Some(s) })
}

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(crate::validation::is_truthy(&value))
}
