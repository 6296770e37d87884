//! Saved play progress, one record per game

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::StatusState;
use crate::GameId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameProgress {
    pub game_id: GameId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_branch: Option<String>,
    #[serde(default)]
    pub attributes: StatusState,
    #[serde(default)]
    pub visited: Vec<String>,
    #[serde(default)]
    pub ended: bool,
    pub saved_at: DateTime<Utc>,
}
