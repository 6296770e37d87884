//! Moderation use cases: listing and removing published games and comments,
//! and managing community users.
//!
//! Every operation requires an active caller whose role is `ADMIN` or
//! `SUPER_ADMIN`. Filters that name a malformed id or an unknown role match
//! nothing, so they produce an empty page rather than an error.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;
use storyforge_domain::common::format_wire_time;
use storyforge_domain::{
    CommentId, CommunityGame, CommunityGameId, CommunityUser, UserActivity, UserId, UserRole,
    UserUpdate,
};
use storyforge_shared::{
    AdminComment, AdminCommentPage, AdminGame, AdminGamePage, AdminGameRef, AdminListQuery,
    AdminMessage, AdminUser, AdminUserDetail, AdminUserPage, AdminUserRef, BulkUserRequest,
    GameCounts, Pagination, UpdateUserRequest, UpdatedUserResponse, UserCommentEntry, UserCounts,
    UserGameEntry, UserStats, UserVoteEntry,
};

use crate::infrastructure::ports::{
    ClockPort, CommentFilter, CommunityRepo, GameFilter, PageRequest, RepoError, UserFilter,
};

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;
/// Comments and votes shown on a user's detail page.
pub const USER_DETAIL_RECENT: u32 = 10;
/// Games shown on a user's detail page.
pub const USER_DETAIL_GAMES: u32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Unauthorized")]
    Unauthorized,
    /// Known caller without an admin role.
    #[error("Forbidden")]
    Forbidden,
    /// Rejected input; the message is the response body.
    #[error("{0}")]
    Invalid(&'static str),
    #[error("Not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct AdminService {
    repo: Arc<dyn CommunityRepo>,
    clock: Arc<dyn ClockPort>,
}

impl AdminService {
    pub fn new(repo: Arc<dyn CommunityRepo>, clock: Arc<dyn ClockPort>) -> Self {
        Self { repo, clock }
    }

    pub async fn authenticate(&self, email: Option<&str>) -> Result<CommunityUser, AdminError> {
        let email = email
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or(AdminError::Unauthorized)?;
        let user = self
            .repo
            .find_user_by_email(email)
            .await?
            .filter(|user| user.is_active)
            .ok_or(AdminError::Unauthorized)?;
        if !user.role.is_admin() {
            tracing::warn!(user_id = %user.id, role = %user.role, "Moderation refused");
            return Err(AdminError::Forbidden);
        }
        Ok(user)
    }

    pub async fn list_games(&self, query: &AdminListQuery) -> Result<AdminGamePage, AdminError> {
        let page = page_request(query);
        let Some(author_id) = filter_id::<UserId>(query.author_id.as_deref()) else {
            return Ok(AdminGamePage {
                games: Vec::new(),
                pagination: pagination(page, 0),
            });
        };
        let filter = GameFilter {
            search: search_term(query.search.as_deref()),
            author_id,
        };

        let (rows, total) = self.repo.search_games(&filter, page).await?;
        let authors = self
            .users_by_id(rows.iter().map(|(g, _)| g.author_id).collect())
            .await?;

        let games = rows
            .into_iter()
            .map(|(game, activity)| AdminGame {
                id: game.id.to_string(),
                author: user_ref(&authors, game.author_id),
                counts: GameCounts {
                    votes: activity.votes,
                    comments: activity.comments,
                },
                created_at: format_wire_time(&game.created_at),
                updated_at: format_wire_time(&game.updated_at),
                title: game.title,
                description: game.description,
                cover_url: game.cover_url,
            })
            .collect();

        Ok(AdminGamePage {
            games,
            pagination: pagination(page, total),
        })
    }

    /// Removes the game together with its votes and comments.
    pub async fn delete_game(
        &self,
        admin: &CommunityUser,
        id: Option<&str>,
    ) -> Result<AdminMessage, AdminError> {
        let id = id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(AdminError::Invalid("Game id is required"))?;
        let id: CommunityGameId = id.parse().map_err(|_| AdminError::NotFound)?;

        if !self.repo.delete_game(id).await? {
            return Err(AdminError::NotFound);
        }
        tracing::info!(game_id = %id, admin_id = %admin.id, "Community game removed");
        Ok(AdminMessage {
            message: "Game deleted".to_string(),
            count: None,
        })
    }

    /// Live comments only.
    pub async fn list_comments(
        &self,
        query: &AdminListQuery,
    ) -> Result<AdminCommentPage, AdminError> {
        let page = page_request(query);
        let empty = AdminCommentPage {
            comments: Vec::new(),
            pagination: pagination(page, 0),
        };
        let Some(user_id) = filter_id::<UserId>(query.user_id.as_deref()) else {
            return Ok(empty);
        };
        let Some(game_id) = filter_id::<CommunityGameId>(query.game_id.as_deref()) else {
            return Ok(empty);
        };
        let filter = CommentFilter {
            search: search_term(query.search.as_deref()),
            user_id,
            game_id,
        };

        let (rows, total) = self.repo.search_comments(&filter, page).await?;
        let users = self
            .users_by_id(rows.iter().map(|c| c.user_id).collect())
            .await?;
        let games = self
            .games_by_id(rows.iter().map(|c| c.game_id).collect())
            .await?;

        let comments = rows
            .into_iter()
            .map(|comment| AdminComment {
                id: comment.id.to_string(),
                created_at: format_wire_time(&comment.created_at),
                is_deleted: false,
                user: user_ref(&users, comment.user_id),
                game: game_ref(&games, comment.game_id),
                content: comment.content,
            })
            .collect();

        Ok(AdminCommentPage {
            comments,
            pagination: pagination(page, total),
        })
    }

    /// `ids` must be a non-empty array of strings. Ids naming no live comment
    /// are skipped; `count` reports how many were hidden.
    pub async fn delete_comments(
        &self,
        admin: &CommunityUser,
        ids: Option<&Value>,
    ) -> Result<AdminMessage, AdminError> {
        const INVALID: AdminError = AdminError::Invalid("commentIds must be a non-empty array");

        let raw = string_list(ids).ok_or(INVALID)?;
        let ids: Vec<CommentId> = raw.iter().filter_map(|id| id.parse().ok()).collect();

        let count = self.repo.soft_delete_comments(ids).await?;
        tracing::info!(count, admin_id = %admin.id, "Comments hidden");
        Ok(AdminMessage {
            message: "Comments deleted".to_string(),
            count: Some(count),
        })
    }

    /// `role` may be a role name or `all`.
    pub async fn list_users(&self, query: &AdminListQuery) -> Result<AdminUserPage, AdminError> {
        let page = page_request(query);
        let role = match query.role.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(raw) => match raw.parse::<UserRole>() {
                Ok(role) => Some(role),
                Err(_) => {
                    return Ok(AdminUserPage {
                        users: Vec::new(),
                        pagination: pagination(page, 0),
                    })
                }
            },
        };
        let filter = UserFilter {
            search: search_term(query.search.as_deref()),
            role,
        };

        let (rows, total) = self.repo.search_users(&filter, page).await?;
        Ok(AdminUserPage {
            users: rows
                .iter()
                .map(|(user, activity)| admin_user(user, Some(*activity)))
                .collect(),
            pagination: pagination(page, total),
        })
    }

    /// Applies one action to many users: `activate`, `deactivate`, or `role`
    /// with the role name in `value`.
    pub async fn bulk_update_users(
        &self,
        admin: &CommunityUser,
        request: &BulkUserRequest,
    ) -> Result<AdminMessage, AdminError> {
        const INVALID: AdminError = AdminError::Invalid("Invalid parameters");

        let raw = string_list(request.user_ids.as_ref()).ok_or(INVALID)?;
        let action = request
            .action
            .as_deref()
            .filter(|a| !a.is_empty())
            .ok_or(INVALID)?;

        let update = match action {
            "activate" => UserUpdate {
                is_active: Some(true),
                ..UserUpdate::default()
            },
            "deactivate" => UserUpdate {
                is_active: Some(false),
                ..UserUpdate::default()
            },
            "role" => {
                let role = request
                    .value
                    .as_ref()
                    .and_then(Value::as_str)
                    .and_then(|v| v.parse::<UserRole>().ok())
                    .ok_or(INVALID)?;
                UserUpdate {
                    role: Some(role),
                    ..UserUpdate::default()
                }
            }
            _ => return Err(AdminError::Invalid("Unsupported action")),
        };

        let ids: Vec<UserId> = raw.iter().filter_map(|id| id.parse().ok()).collect();
        let count = self.repo.update_users(ids, &update, self.clock.now()).await?;
        tracing::info!(action, count, admin_id = %admin.id, "Users updated");
        Ok(AdminMessage {
            message: "Users updated".to_string(),
            count: Some(count),
        })
    }

    pub async fn user_detail(&self, id: &str) -> Result<AdminUserDetail, AdminError> {
        let user = self.existing_user(id).await?;
        let activity = self.repo.user_activity(user.id).await?;

        let by_user = GameFilter {
            author_id: Some(user.id),
            ..GameFilter::default()
        };
        let (games, _) = self
            .repo
            .search_games(&by_user, first_page(USER_DETAIL_GAMES))
            .await?;
        let comment_filter = CommentFilter {
            user_id: Some(user.id),
            ..CommentFilter::default()
        };
        let (comments, _) = self
            .repo
            .search_comments(&comment_filter, first_page(USER_DETAIL_RECENT))
            .await?;
        let votes = self
            .repo
            .list_user_votes(user.id, USER_DETAIL_RECENT)
            .await?;

        let titles = self
            .games_by_id(
                comments
                    .iter()
                    .map(|c| c.game_id)
                    .chain(votes.iter().map(|v| v.game_id))
                    .collect(),
            )
            .await?;

        Ok(AdminUserDetail {
            user: admin_user(&user, None),
            stats: UserStats {
                games_count: activity.games,
                comments_count: activity.comments,
                votes_count: activity.votes,
            },
            games: games
                .into_iter()
                .map(|(game, _)| UserGameEntry {
                    id: game.id.to_string(),
                    created_at: format_wire_time(&game.created_at),
                    updated_at: format_wire_time(&game.updated_at),
                    title: game.title,
                })
                .collect(),
            comments: comments
                .into_iter()
                .map(|comment| UserCommentEntry {
                    id: comment.id.to_string(),
                    created_at: format_wire_time(&comment.created_at),
                    game: game_ref(&titles, comment.game_id),
                    content: comment.content,
                })
                .collect(),
            votes: votes
                .into_iter()
                .map(|vote| UserVoteEntry {
                    vote_type: vote.vote_type.to_string(),
                    created_at: format_wire_time(&vote.created_at),
                    game: game_ref(&titles, vote.game_id),
                })
                .collect(),
        })
    }

    /// A blank `name` counts as absent. At least one field must be given.
    pub async fn update_user(
        &self,
        admin: &CommunityUser,
        id: &str,
        request: &UpdateUserRequest,
    ) -> Result<UpdatedUserResponse, AdminError> {
        let update = UserUpdate {
            name: request
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            role: request
                .role
                .as_deref()
                .map(|r| r.parse::<UserRole>())
                .transpose()
                .map_err(|_| AdminError::Invalid("Invalid role"))?,
            is_active: request.is_active,
        };
        if update.is_empty() {
            return Err(AdminError::Invalid("No fields to update"));
        }

        let user = self.existing_user(id).await?;
        if self
            .repo
            .update_users(vec![user.id], &update, self.clock.now())
            .await?
            == 0
        {
            return Err(AdminError::NotFound);
        }
        let updated = self.existing_user(id).await?;

        tracing::info!(user_id = %updated.id, admin_id = %admin.id, "User updated");
        Ok(UpdatedUserResponse {
            message: "User updated".to_string(),
            user: admin_user(&updated, None),
        })
    }

    async fn existing_user(&self, id: &str) -> Result<CommunityUser, AdminError> {
        let id: UserId = id.parse().map_err(|_| AdminError::NotFound)?;
        self.repo
            .get_users(vec![id])
            .await?
            .into_iter()
            .next()
            .ok_or(AdminError::NotFound)
    }

    async fn users_by_id(
        &self,
        mut ids: Vec<UserId>,
    ) -> Result<HashMap<UserId, CommunityUser>, AdminError> {
        ids.sort();
        ids.dedup();
        Ok(self
            .repo
            .get_users(ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect())
    }

    async fn games_by_id(
        &self,
        mut ids: Vec<CommunityGameId>,
    ) -> Result<HashMap<CommunityGameId, CommunityGame>, AdminError> {
        ids.sort();
        ids.dedup();
        Ok(self
            .repo
            .get_games(ids)
            .await?
            .into_iter()
            .map(|g| (g.id, g))
            .collect())
    }
}

/// `page` defaults to 1, `limit` to 20 and is capped at 100.
fn page_request(query: &AdminListQuery) -> PageRequest {
    let number = |raw: Option<&str>| raw.and_then(|v| v.trim().parse::<u32>().ok());
    PageRequest {
        page: number(query.page.as_deref()).unwrap_or(1).max(1),
        limit: number(query.limit.as_deref())
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT),
    }
}

fn first_page(limit: u32) -> PageRequest {
    PageRequest { page: 1, limit }
}

fn pagination(page: PageRequest, total: u64) -> Pagination {
    Pagination {
        page: page.page,
        limit: page.limit,
        total,
        total_pages: total.div_ceil(u64::from(page.limit)),
    }
}

fn search_term(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// An optional id filter. The outer `None` means the id was given but is
/// malformed, so nothing can match it.
fn filter_id<T: FromStr>(raw: Option<&str>) -> Option<Option<T>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Some(None),
        Some(raw) => raw.parse().ok().map(Some),
    }
}

/// A non-empty JSON array of strings.
fn string_list(value: Option<&Value>) -> Option<Vec<&str>> {
    let items = value?.as_array().filter(|items| !items.is_empty())?;
    items.iter().map(Value::as_str).collect()
}

fn user_ref(users: &HashMap<UserId, CommunityUser>, id: UserId) -> AdminUserRef {
    let user = users.get(&id);
    AdminUserRef {
        id: id.to_string(),
        name: user.and_then(|u| u.name.clone()),
        email: user.map(|u| u.email.clone()),
    }
}

fn game_ref(games: &HashMap<CommunityGameId, CommunityGame>, id: CommunityGameId) -> AdminGameRef {
    AdminGameRef {
        id: id.to_string(),
        title: games.get(&id).map(|g| g.title.clone()),
    }
}

fn admin_user(user: &CommunityUser, activity: Option<UserActivity>) -> AdminUser {
    AdminUser {
        id: user.id.to_string(),
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role.to_string(),
        is_active: user.is_active,
        created_at: format_wire_time(&user.created_at),
        updated_at: format_wire_time(&user.updated_at),
        counts: activity.map(|a| UserCounts {
            games: a.games,
            comments: a.comments,
            votes: a.votes,
        }),
    }
}
