//! Library metadata read out of a payload at import time

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::DEFAULT_AUTHOR;

/// Title used when a payload names none.
pub const UNTITLED_GAME: &str = "未命名游戏";

const THUMBNAIL_FIELDS: [&str; 6] = [
    "thumbnail",
    "cover_image",
    "background_image",
    "image",
    "img",
    "icon",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameMetadata {
    pub title: String,
    pub description: String,
    pub author: String,
    pub tags: Vec<String>,
    /// File name inside a pack, or an absolute URL
    pub thumbnail: Option<String>,
}

pub fn extract_metadata(payload: &Value) -> GameMetadata {
    GameMetadata {
        title: first_string(payload, &["game_title", "title"])
            .unwrap_or_else(|| UNTITLED_GAME.to_string()),
        description: first_string(payload, &["description", "game_description"])
            .unwrap_or_default(),
        author: first_string(payload, &["author", "creator"])
            .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
        tags: ["tags", "categories"]
            .iter()
            .find_map(|key| payload.get(*key).and_then(Value::as_array))
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        thumbnail: extract_thumbnail(payload),
    }
}

/// First thumbnail-like field on the game, then on its first branch.
pub fn extract_thumbnail(payload: &Value) -> Option<String> {
    first_string(payload, &THUMBNAIL_FIELDS).or_else(|| {
        payload
            .get("branches")
            .and_then(Value::as_array)
            .and_then(|branches| branches.first())
            .and_then(|branch| first_string(branch, &THUMBNAIL_FIELDS))
    })
}

fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
