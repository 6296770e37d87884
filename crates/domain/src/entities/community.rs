//! Community entities - published games, their authors, votes and comments

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DomainError;
use crate::{CommentId, CommunityGameId, UserId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    #[default]
    User,
    Admin,
    SuperAdmin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
            Self::SuperAdmin => "SUPER_ADMIN",
        }
    }

    /// May use the moderation routes.
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            "SUPER_ADMIN" => Ok(Self::SuperAdmin),
            other => Err(DomainError::parse(format!("Unknown user role: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityUser {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub role: UserRole,
    /// Deactivated users are treated as unknown callers.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommunityUser {
    /// An active user with the `USER` role.
    pub fn new(email: impl Into<String>, name: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            email: email.into(),
            name,
            role: UserRole::User,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_role(mut self, role: UserRole) -> Self {
        self.role = role;
        self
    }
}

/// Partial change to a user. `None` leaves the field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.role.is_none() && self.is_active.is_none()
    }
}

/// How much a user has contributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserActivity {
    pub games: u64,
    pub comments: u64,
    pub votes: u64,
}

/// Vote and live comment totals of one published game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameActivity {
    pub votes: u64,
    pub comments: u64,
}

/// A game published to the shared list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityGame {
    pub id: CommunityGameId,
    pub title: String,
    pub description: Option<String>,
    /// Absolute http(s) URL when present
    pub cover_url: Option<String>,
    pub json_data: Value,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoteType {
    Up,
    Down,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VoteType {
    type Err = DomainError;

    /// Exact match only: `"up"` is not a vote.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UP" => Ok(Self::Up),
            "DOWN" => Ok(Self::Down),
            other => Err(DomainError::parse(format!("Unknown vote type: {}", other))),
        }
    }
}

/// One user's vote on one game. A later vote by the same user replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub user_id: UserId,
    pub game_id: CommunityGameId,
    #[serde(rename = "type")]
    pub vote_type: VoteType,
    pub created_at: DateTime<Utc>,
}

/// Number of votes of one type on one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteCount {
    pub game_id: CommunityGameId,
    pub vote_type: VoteType,
    pub count: u64,
}

/// Up/down totals for one game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub upvotes: u64,
    pub downvotes: u64,
}

impl VoteTally {
    pub fn add(&mut self, vote_type: VoteType, count: u64) {
        match vote_type {
            VoteType::Up => self.upvotes = count,
            VoteType::Down => self.downvotes = count,
        }
    }

    pub fn score(&self) -> i64 {
        self.upvotes as i64 - self.downvotes as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub game_id: CommunityGameId,
    pub user_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_type_is_case_sensitive() {
        assert_eq!("UP".parse::<VoteType>().unwrap(), VoteType::Up);
        assert!("up".parse::<VoteType>().is_err());
        assert!("SIDEWAYS".parse::<VoteType>().is_err());
    }

    #[test]
    fn only_admin_roles_moderate() {
        assert!(!UserRole::User.is_admin());
        assert!(UserRole::Admin.is_admin());
        assert!("SUPER_ADMIN".parse::<UserRole>().unwrap().is_admin());
        assert!("admin".parse::<UserRole>().is_err());
        assert_eq!(
            serde_json::to_value(UserRole::SuperAdmin).unwrap(),
            "SUPER_ADMIN"
        );
    }

    #[test]
    fn new_users_are_active_plain_users() {
        let user = CommunityUser::new("a@example.com", None, Utc::now());
        assert_eq!(user.role, UserRole::User);
        assert!(user.is_active);
        assert!(UserUpdate::default().is_empty());
    }

    #[test]
    fn tally_score_can_go_negative() {
        let mut tally = VoteTally::default();
        tally.add(VoteType::Up, 1);
        tally.add(VoteType::Down, 4);
        assert_eq!(tally.score(), -3);
    }

    #[test]
    fn vote_serializes_type_field() {
        let vote = Vote {
            user_id: UserId::new(),
            game_id: CommunityGameId::new(),
            vote_type: VoteType::Down,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&vote).unwrap();
        assert_eq!(value["type"], "DOWN");
    }
}
