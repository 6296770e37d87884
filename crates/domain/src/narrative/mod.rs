//! Narrative interpreter - plays one story in memory.
//!
//! A [`NarrativeSession`] owns a private copy of a [`Story`], the player's attribute
//! state and an append-only [`OutputLog`]. Input is free text: a choice number, a
//! choice id, the choice text itself, or one of the built-in commands. The session
//! never touches storage; callers persist it through [`NarrativeSession::snapshot`].

mod command;
mod log;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::entities::GameProgress;
use crate::story::{Branch, Choice, Story, StoryError};
use crate::value_objects::{apply_status_changes, StatusState};
use crate::GameId;

pub use command::Command;
pub use log::{LineKind, OutputLine, OutputLog};

const HELP_TEXT: &str = "可用命令：\n  数字/选项文字 - 选择对应选项\n  LOOK/观察 - 重新查看当前场景\n  STATUS/状态 - 查看当前属性\n  RESTART/重新开始 - 从头开始\n  HELP/帮助 - 显示此帮助消息";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Story(#[from] StoryError),

    /// Saved progress points at a branch the story no longer has
    #[error("unknown branch in saved progress: {0}")]
    UnknownBranch(String),
}

/// What a single input did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Moved to another branch
    Moved { branch_id: String },
    /// The story reached an ending
    Ended,
    /// Input was not applied; the current choices were shown again
    Redisplayed,
    /// Informational command (look, help, status)
    Info,
}

#[derive(Debug, Clone)]
pub struct NarrativeSession {
    story: Story,
    current: usize,
    state: StatusState,
    visited: Vec<String>,
    ended: bool,
    log: OutputLog,
}

impl NarrativeSession {
    /// Start a new session at the first branch of `payload`.
    pub fn start(payload: &Value) -> Result<Self, SessionError> {
        Ok(Self::from_story(Story::from_payload(payload)?))
    }

    pub fn from_story(story: Story) -> Self {
        let state = story.initial_state();
        let mut session = Self {
            story,
            current: 0,
            state,
            visited: Vec::new(),
            ended: false,
            log: OutputLog::default(),
        };
        session.enter(0);
        session
    }

    /// Resume from saved progress. Saved attributes override declared initial values.
    pub fn resume(payload: &Value, progress: &GameProgress) -> Result<Self, SessionError> {
        let story = Story::from_payload(payload)?;
        let current = match &progress.current_branch {
            Some(id) => story
                .branch_index(id)
                .ok_or_else(|| SessionError::UnknownBranch(id.clone()))?,
            None => 0,
        };

        let mut state = story.initial_state();
        state.extend(progress.attributes.iter().map(|(k, v)| (k.clone(), *v)));

        let mut session = Self {
            story,
            current,
            state,
            visited: progress.visited.clone(),
            ended: progress.ended,
            log: OutputLog::default(),
        };
        session.log.push(LineKind::System, "已恢复进度。");
        session.display_scene();
        Ok(session)
    }

    pub fn story(&self) -> &Story {
        &self.story
    }

    pub fn current_branch(&self) -> &Branch {
        // `current` always indexes into a non-empty branch list
        &self.story.branches[self.current]
    }

    pub fn state(&self) -> &StatusState {
        &self.state
    }

    pub fn visited(&self) -> &[String] {
        &self.visited
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn log(&self) -> &OutputLog {
        &self.log
    }

    /// Handle one line of player input.
    pub fn submit(&mut self, input: &str) -> StepOutcome {
        let input = input.trim();
        self.log.push(LineKind::Input, format!("> {}", input));

        match Command::parse(input, &self.current_branch().choices) {
            Command::Look => {
                self.display_scene();
                StepOutcome::Info
            }
            Command::Help => {
                self.log.push(LineKind::System, HELP_TEXT);
                StepOutcome::Info
            }
            Command::Status => {
                self.display_status();
                StepOutcome::Info
            }
            Command::Restart => {
                self.restart();
                StepOutcome::Moved {
                    branch_id: self.current_branch().branch_id.clone(),
                }
            }
            Command::Choose(index) => self.choose(index),
            Command::Unknown(text) => {
                self.log.push(
                    LineKind::System,
                    format!("未知命令：{}。输入 HELP 查看可用命令。", text),
                );
                self.display_choices();
                StepOutcome::Redisplayed
            }
        }
    }

    /// Take the choice at `index` (zero-based) of the current branch.
    ///
    /// A target that does not resolve leaves the session where it was, with its
    /// state untouched, and shows the current choices again.
    pub fn choose(&mut self, index: usize) -> StepOutcome {
        if self.ended {
            self.log
                .push(LineKind::System, "游戏已结束。输入 重新开始 再玩一次。");
            return StepOutcome::Ended;
        }

        let Some(choice) = self.current_branch().choices.get(index).cloned() else {
            self.log.push(LineKind::Error, "没有这个选项。");
            self.display_choices();
            return StepOutcome::Redisplayed;
        };

        let target = match &choice.next_branch {
            Some(id) if !choice.end_game => match self.story.branch_index(id) {
                Some(target) => Some(target),
                None => {
                    self.log
                        .push(LineKind::Error, format!("无法找到场景：{}", id));
                    self.display_choices();
                    return StepOutcome::Redisplayed;
                }
            },
            _ => None,
        };

        self.log.push(LineKind::ChoiceTaken, choice.choice.clone());
        self.apply_choice_effects(&choice);

        if choice.end_game {
            self.finish();
            return StepOutcome::Ended;
        }

        match target {
            Some(target) => {
                self.enter(target);
                if self.ended {
                    StepOutcome::Ended
                } else {
                    StepOutcome::Moved {
                        branch_id: self.current_branch().branch_id.clone(),
                    }
                }
            }
            None => {
                self.log
                    .push(LineKind::System, "这条路似乎没有通向任何地方。");
                self.display_choices();
                StepOutcome::Redisplayed
            }
        }
    }

    pub fn restart(&mut self) {
        self.state = self.story.initial_state();
        self.visited.clear();
        self.ended = false;
        self.log.push(LineKind::System, "重新开始游戏。");
        self.enter(0);
    }

    /// Progress record for the library's progress table.
    pub fn snapshot(&self, game_id: GameId, now: DateTime<Utc>) -> GameProgress {
        GameProgress {
            game_id,
            current_branch: Some(self.current_branch().branch_id.clone()),
            attributes: self.state.clone(),
            visited: self.visited.clone(),
            ended: self.ended,
            saved_at: now,
        }
    }

    fn apply_choice_effects(&mut self, choice: &Choice) {
        if !choice.status_changes.is_empty() {
            let changes = choice.bounded_changes(&self.story);
            self.state = apply_status_changes(&self.state, &changes);
        }
        if let Some(effect) = &choice.effect {
            self.log.push(LineKind::System, effect.clone());
        }
        if let Some(update) = &choice.status_update {
            self.log.push(LineKind::Status, update.clone());
        }
    }

    fn enter(&mut self, index: usize) {
        self.current = index;
        let branch_id = self.current_branch().branch_id.clone();
        if !self.visited.contains(&branch_id) {
            self.visited.push(branch_id);
        }
        self.display_scene();
        // Branches without choices are endings
        if self.current_branch().choices.is_empty() {
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.ended = true;
        self.log.push(LineKind::System, "—— 游戏结束 ——");
    }

    fn display_scene(&mut self) {
        let branch = self.current_branch().clone();
        if !branch.chapter.is_empty() {
            self.log.push(LineKind::SceneTitle, branch.chapter);
        }
        if !branch.scene_detail.is_empty() {
            self.log.push(LineKind::SceneText, branch.scene_detail);
        }
        self.display_choices();
    }

    fn display_choices(&mut self) {
        let lines: Vec<String> = self
            .current_branch()
            .choices
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {}", i + 1, c.choice))
            .collect();
        for line in lines {
            self.log.push(LineKind::Choice, line);
        }
    }

    fn display_status(&mut self) {
        if self.state.is_empty() {
            self.log.push(LineKind::Status, "当前没有任何属性。");
            return;
        }
        let lines: Vec<String> = self
            .state
            .iter()
            .map(|(id, value)| {
                let label = self
                    .story
                    .state_definition(id)
                    .map(|d| d.name.as_str())
                    .filter(|n| !n.is_empty())
                    .unwrap_or(id);
                format!("{}: {}", label, value)
            })
            .collect();
        for line in lines {
            self.log.push(LineKind::Status, line);
        }
    }
}
