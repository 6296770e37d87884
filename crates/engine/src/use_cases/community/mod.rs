//! Community use cases: published games, votes and comments.
//!
//! Callers are identified by email. Input checks happen here so the HTTP
//! layer only translates; storage failures are returned as-is.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use storyforge_domain::common::format_wire_time;
use storyforge_domain::{
    is_hosted_url, Comment, CommentId, CommunityGame, CommunityGameId, CommunityUser, UserId,
    Vote, VoteTally, VoteType,
};
use storyforge_shared::{
    AuthorSummary, CommentPage, CommentResponse, CommunityGameDetail, CommunityGameSummary,
    VoteResponse,
};

use crate::infrastructure::ports::{ClockPort, CommunityRepo, RepoError};

/// Size of the public game list.
pub const RECENT_GAMES_LIMIT: u32 = 50;
pub const DEFAULT_COMMENT_PAGE: u32 = 20;
pub const MAX_COMMENT_PAGE: u32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum CommunityError {
    #[error("Unauthorized")]
    Unauthorized,
    /// Rejected input; the message is the response body.
    #[error("{0}")]
    Invalid(&'static str),
    #[error("Not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// A file field of the publish form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// The publish form as received; nothing is checked yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub file: Option<UploadedFile>,
}

pub struct CommunityService {
    repo: Arc<dyn CommunityRepo>,
    clock: Arc<dyn ClockPort>,
}

impl CommunityService {
    pub fn new(repo: Arc<dyn CommunityRepo>, clock: Arc<dyn ClockPort>) -> Self {
        Self { repo, clock }
    }

    /// Resolve the caller. A missing or blank email, one no user has, or a
    /// deactivated user is unauthorized.
    pub async fn authenticate(&self, email: Option<&str>) -> Result<CommunityUser, CommunityError> {
        let email = email
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or(CommunityError::Unauthorized)?;
        self.repo
            .find_user_by_email(email)
            .await?
            .filter(|user| user.is_active)
            .ok_or(CommunityError::Unauthorized)
    }

    pub async fn list_games(&self) -> Result<Vec<CommunityGameSummary>, CommunityError> {
        let games = self.repo.list_recent_games(RECENT_GAMES_LIMIT).await?;
        if games.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<CommunityGameId> = games.iter().map(|g| g.id).collect();
        let mut tallies: HashMap<CommunityGameId, VoteTally> = HashMap::new();
        for count in self.repo.vote_counts(ids.clone()).await? {
            tallies
                .entry(count.game_id)
                .or_default()
                .add(count.vote_type, count.count);
        }
        let comments: HashMap<CommunityGameId, u64> =
            self.repo.comment_counts(ids).await?.into_iter().collect();
        let authors = self
            .authors(games.iter().map(|g| g.author_id).collect())
            .await?;

        Ok(games
            .into_iter()
            .map(|game| {
                let tally = tallies.get(&game.id).copied().unwrap_or_default();
                CommunityGameSummary {
                    id: game.id.to_string(),
                    author: author_summary(&authors, game.author_id),
                    score: tally.score(),
                    upvotes: tally.upvotes,
                    downvotes: tally.downvotes,
                    comments_count: comments.get(&game.id).copied().unwrap_or(0),
                    title: game.title,
                    description: game.description,
                    cover_url: game.cover_url,
                    created_at: format_wire_time(&game.created_at),
                    updated_at: format_wire_time(&game.updated_at),
                }
            })
            .collect())
    }

    /// Checks run in form order: title, file presence, extension, JSON content, cover URL.
    pub async fn publish_game(
        &self,
        author: &CommunityUser,
        form: PublishForm,
    ) -> Result<CommunityGameId, CommunityError> {
        let title = form
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(CommunityError::Invalid("Invalid title"))?
            .to_string();

        let file = form
            .file
            .ok_or(CommunityError::Invalid("JSON file is required"))?;
        if !file.name.to_lowercase().ends_with(".json") {
            return Err(CommunityError::Invalid("Only JSON files are allowed"));
        }
        let json_data: Value = serde_json::from_slice(&file.bytes)
            .map_err(|_| CommunityError::Invalid("Invalid JSON content"))?;

        let cover_url = match form.cover_url.as_deref().map(str::trim) {
            Some(url) if url.is_empty() => None,
            Some(url) if is_hosted_url(url) => Some(url.to_string()),
            Some(_) => {
                return Err(CommunityError::Invalid(
                    "Invalid cover URL. Must be a valid image hosting URL",
                ))
            }
            None => None,
        };

        let now = self.clock.now();
        let game = CommunityGame {
            id: CommunityGameId::new(),
            title,
            description: form.description,
            cover_url,
            json_data,
            author_id: author.id,
            created_at: now,
            updated_at: now,
        };
        self.repo.create_game(&game).await?;

        tracing::info!(game_id = %game.id, author_id = %author.id, "Community game published");
        Ok(game.id)
    }

    /// `None` for an unknown or malformed id.
    pub async fn get_game(&self, id: &str) -> Result<Option<CommunityGameDetail>, CommunityError> {
        let Ok(id) = id.parse::<CommunityGameId>() else {
            return Ok(None);
        };
        let Some(game) = self.repo.get_game(id).await? else {
            return Ok(None);
        };
        let authors = self.authors(vec![game.author_id]).await?;

        Ok(Some(CommunityGameDetail {
            id: game.id.to_string(),
            author: author_summary(&authors, game.author_id),
            title: game.title,
            description: game.description,
            cover_url: game.cover_url,
            created_at: format_wire_time(&game.created_at),
            updated_at: format_wire_time(&game.updated_at),
            json_data: game.json_data,
        }))
    }

    /// `vote_type` must be exactly the string `"UP"` or `"DOWN"`.
    pub async fn vote(
        &self,
        user: &CommunityUser,
        game_id: &str,
        vote_type: Option<&Value>,
    ) -> Result<VoteResponse, CommunityError> {
        let vote_type: VoteType = vote_type
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .ok_or(CommunityError::Invalid("Invalid vote type"))?;
        let game_id = self.existing_game(game_id).await?;

        let stored = self
            .repo
            .upsert_vote(&Vote {
                user_id: user.id,
                game_id,
                vote_type,
                created_at: self.clock.now(),
            })
            .await?;

        tracing::debug!(game_id = %game_id, user_id = %user.id, vote = %stored.vote_type, "Vote recorded");
        Ok(VoteResponse {
            user_id: stored.user_id.to_string(),
            game_id: stored.game_id.to_string(),
            vote_type: stored.vote_type.to_string(),
            created_at: format_wire_time(&stored.created_at),
        })
    }

    /// Newest first. `take` defaults to 20 (capped at 100); one extra row is
    /// read to find `next_cursor`.
    pub async fn list_comments(
        &self,
        game_id: &str,
        cursor: Option<&str>,
        take: Option<&str>,
    ) -> Result<CommentPage, CommunityError> {
        let take = parse_take(take);
        let empty = CommentPage {
            items: Vec::new(),
            next_cursor: None,
        };

        let Ok(game_id) = game_id.parse::<CommunityGameId>() else {
            return Ok(empty);
        };
        let cursor = match cursor.filter(|c| !c.is_empty()) {
            Some(raw) => match raw.parse::<CommentId>() {
                Ok(id) => Some(id),
                Err(_) => return Ok(empty),
            },
            None => None,
        };

        let mut comments = self.repo.list_comments(game_id, cursor, take + 1).await?;
        let next_cursor = if comments.len() > take as usize {
            comments.pop().map(|c| c.id.to_string())
        } else {
            None
        };

        let authors = self
            .authors(comments.iter().map(|c| c.user_id).collect())
            .await?;
        let items = comments
            .into_iter()
            .map(|c| comment_response(&authors, c))
            .collect();

        Ok(CommentPage { items, next_cursor })
    }

    pub async fn add_comment(
        &self,
        user: &CommunityUser,
        game_id: &str,
        content: Option<&Value>,
    ) -> Result<CommentResponse, CommunityError> {
        let content = content
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(CommunityError::Invalid("Invalid content"))?
            .to_string();
        let game_id = self.existing_game(game_id).await?;

        let comment = Comment {
            id: CommentId::new(),
            game_id,
            user_id: user.id,
            content,
            created_at: self.clock.now(),
        };
        self.repo.create_comment(&comment).await?;

        tracing::debug!(game_id = %game_id, comment_id = %comment.id, "Comment added");
        let authors = HashMap::from([(user.id, user.clone())]);
        Ok(comment_response(&authors, comment))
    }

    async fn existing_game(&self, id: &str) -> Result<CommunityGameId, CommunityError> {
        let id: CommunityGameId = id.parse().map_err(|_| CommunityError::NotFound)?;
        match self.repo.get_game(id).await? {
            Some(_) => Ok(id),
            None => Err(CommunityError::NotFound),
        }
    }

    async fn authors(
        &self,
        mut ids: Vec<UserId>,
    ) -> Result<HashMap<UserId, CommunityUser>, CommunityError> {
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(self
            .repo
            .get_users(ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect())
    }
}

fn parse_take(take: Option<&str>) -> u32 {
    take.and_then(|t| t.trim().parse::<u32>().ok())
        .unwrap_or(DEFAULT_COMMENT_PAGE)
        .min(MAX_COMMENT_PAGE)
}

fn author_summary(authors: &HashMap<UserId, CommunityUser>, id: UserId) -> AuthorSummary {
    AuthorSummary {
        id: id.to_string(),
        name: authors.get(&id).and_then(|u| u.name.clone()),
    }
}

fn comment_response(authors: &HashMap<UserId, CommunityUser>, comment: Comment) -> CommentResponse {
    CommentResponse {
        id: comment.id.to_string(),
        user: author_summary(authors, comment.user_id),
        content: comment.content,
        created_at: format_wire_time(&comment.created_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::{FixedClock, SteppingClock};
    use crate::infrastructure::ports::MockCommunityRepo;
    use crate::infrastructure::sqlite::test_support::{base_time, pool};
    use crate::infrastructure::sqlite::SqliteCommunityRepo;
    use chrono::Duration;
    use serde_json::json;

    struct Harness {
        _dir: tempfile::TempDir,
        repo: Arc<SqliteCommunityRepo>,
        clock: Arc<SteppingClock>,
        service: CommunityService,
        alice: CommunityUser,
        bob: CommunityUser,
    }

    async fn harness() -> Harness {
        let (dir, pool) = pool().await;
        let repo = Arc::new(SqliteCommunityRepo::new(pool));
        let clock = Arc::new(SteppingClock::new(base_time()));
        let alice = CommunityUser::new("alice@example.com", Some("Alice".into()), base_time());
        let bob = CommunityUser::new("bob@example.com", None, base_time());
        repo.save_user(&alice).await.unwrap();
        repo.save_user(&bob).await.unwrap();
        let service = CommunityService::new(repo.clone(), clock.clone());
        Harness {
            _dir: dir,
            repo,
            clock,
            service,
            alice,
            bob,
        }
    }

    fn form(title: &str, file_name: &str, body: &str) -> PublishForm {
        PublishForm {
            title: Some(title.into()),
            description: Some("desc".into()),
            cover_url: None,
            file: Some(UploadedFile {
                name: file_name.into(),
                bytes: body.as_bytes().to_vec(),
            }),
        }
    }

    fn invalid(result: Result<CommunityGameId, CommunityError>) -> &'static str {
        match result {
            Err(CommunityError::Invalid(reason)) => reason,
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn authenticate_requires_known_email() {
        let h = harness().await;
        assert_eq!(
            h.service.authenticate(Some("alice@example.com")).await.unwrap(),
            h.alice
        );
        assert!(matches!(
            h.service.authenticate(None).await,
            Err(CommunityError::Unauthorized)
        ));
        assert!(matches!(
            h.service.authenticate(Some("  ")).await,
            Err(CommunityError::Unauthorized)
        ));
        assert!(matches!(
            h.service.authenticate(Some("eve@example.com")).await,
            Err(CommunityError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn deactivated_user_is_unauthorized() {
        let h = harness().await;
        let mut alice = h.alice.clone();
        alice.is_active = false;
        h.repo.save_user(&alice).await.unwrap();

        assert!(matches!(
            h.service.authenticate(Some("alice@example.com")).await,
            Err(CommunityError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn list_scores_eight_up_three_down_as_five() {
        let h = harness().await;
        let id = h
            .service
            .publish_game(&h.alice, form("Moon", "g.json", "{}"))
            .await
            .unwrap()
            .to_string();

        for n in 0..11 {
            let voter = CommunityUser::new(format!("voter{n}@example.com"), None, base_time());
            h.repo.save_user(&voter).await.unwrap();
            let vote_type = if n < 8 { "UP" } else { "DOWN" };
            h.service.vote(&voter, &id, Some(&json!(vote_type))).await.unwrap();
        }

        let list = h.service.list_games().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].score, 5);
        assert_eq!(list[0].upvotes, 8);
        assert_eq!(list[0].downvotes, 3);
    }

    #[tokio::test]
    async fn publish_validates_in_order() {
        let h = harness().await;
        let s = &h.service;

        assert_eq!(invalid(s.publish_game(&h.alice, form("", "g.json", "{}")).await), "Invalid title");
        assert_eq!(invalid(s.publish_game(&h.alice, form("  ", "g.txt", "x")).await), "Invalid title");

        let mut no_file = form("Moon", "g.json", "{}");
        no_file.file = None;
        assert_eq!(invalid(s.publish_game(&h.alice, no_file).await), "JSON file is required");

        assert_eq!(
            invalid(s.publish_game(&h.alice, form("Moon", "g.txt", "{}")).await),
            "Only JSON files are allowed"
        );
        assert_eq!(
            invalid(s.publish_game(&h.alice, form("Moon", "g.JSON", "{nope")).await),
            "Invalid JSON content"
        );

        let mut bad_cover = form("Moon", "g.json", "{}");
        bad_cover.cover_url = Some("ftp://x/y.png".into());
        assert_eq!(
            invalid(s.publish_game(&h.alice, bad_cover).await),
            "Invalid cover URL. Must be a valid image hosting URL"
        );
    }

    #[tokio::test]
    async fn publish_trims_title_and_cover() {
        let h = harness().await;
        let mut f = form("  Moon  ", "g.json", r#"{"game_title": "Moon"}"#);
        f.cover_url = Some("  https://img/cover.png ".into());

        let id = h.service.publish_game(&h.alice, f).await.unwrap();
        let detail = h.service.get_game(&id.to_string()).await.unwrap().unwrap();

        assert_eq!(detail.title, "Moon");
        assert_eq!(detail.cover_url.as_deref(), Some("https://img/cover.png"));
        assert_eq!(detail.json_data, json!({"game_title": "Moon"}));
        assert_eq!(detail.author.name.as_deref(), Some("Alice"));
        assert_eq!(detail.created_at, "2023-11-14T22:13:20.000Z");

        let mut blank_cover = form("Sun", "g.json", "{}");
        blank_cover.cover_url = Some("   ".into());
        let id = h.service.publish_game(&h.alice, blank_cover).await.unwrap();
        let detail = h.service.get_game(&id.to_string()).await.unwrap().unwrap();
        assert_eq!(detail.cover_url, None);
    }

    #[tokio::test]
    async fn unknown_game_detail_is_none() {
        let h = harness().await;
        assert!(h.service.get_game("not-a-uuid").await.unwrap().is_none());
        assert!(h
            .service
            .get_game(&CommunityGameId::new().to_string())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn list_reports_scores_and_comment_counts_newest_first() {
        let h = harness().await;
        let old = h
            .service
            .publish_game(&h.alice, form("Old", "g.json", "{}"))
            .await
            .unwrap();
        h.clock.advance(Duration::minutes(1));
        let new = h
            .service
            .publish_game(&h.bob, form("New", "g.json", "{}"))
            .await
            .unwrap();

        let old_id = old.to_string();
        h.service.vote(&h.alice, &old_id, Some(&json!("UP"))).await.unwrap();
        h.service.vote(&h.bob, &old_id, Some(&json!("DOWN"))).await.unwrap();
        h.service.vote(&h.bob, &old_id, Some(&json!("UP"))).await.unwrap();
        h.service
            .add_comment(&h.bob, &old_id, Some(&json!("nice")))
            .await
            .unwrap();

        let list = h.service.list_games().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, new.to_string());
        assert_eq!(list[0].score, 0);
        assert_eq!(list[0].author.name, None);
        assert_eq!(list[1].upvotes, 2);
        assert_eq!(list[1].downvotes, 0);
        assert_eq!(list[1].score, 2);
        assert_eq!(list[1].comments_count, 1);
    }

    #[tokio::test]
    async fn vote_type_must_match_exactly() {
        let h = harness().await;
        let id = h
            .service
            .publish_game(&h.alice, form("Moon", "g.json", "{}"))
            .await
            .unwrap()
            .to_string();

        for bad in [json!("up"), json!(1), json!(null)] {
            assert!(matches!(
                h.service.vote(&h.alice, &id, Some(&bad)).await,
                Err(CommunityError::Invalid("Invalid vote type"))
            ));
        }
        assert!(matches!(
            h.service.vote(&h.alice, &id, None).await,
            Err(CommunityError::Invalid("Invalid vote type"))
        ));

        let vote = h.service.vote(&h.alice, &id, Some(&json!("DOWN"))).await.unwrap();
        assert_eq!(vote.vote_type, "DOWN");
        assert_eq!(vote.game_id, id);
    }

    #[tokio::test]
    async fn vote_and_comment_on_unknown_game_are_not_found() {
        let h = harness().await;
        let missing = CommunityGameId::new().to_string();
        assert!(matches!(
            h.service.vote(&h.alice, &missing, Some(&json!("UP"))).await,
            Err(CommunityError::NotFound)
        ));
        assert!(matches!(
            h.service.add_comment(&h.alice, &missing, Some(&json!("hi"))).await,
            Err(CommunityError::NotFound)
        ));
    }

    #[tokio::test]
    async fn comments_page_with_next_cursor() {
        let h = harness().await;
        let id = h
            .service
            .publish_game(&h.alice, form("Moon", "g.json", "{}"))
            .await
            .unwrap()
            .to_string();

        for n in 0..5 {
            h.clock.advance(Duration::seconds(1));
            h.service
                .add_comment(&h.bob, &id, Some(&json!(format!(" comment {} ", n))))
                .await
                .unwrap();
        }

        let first = h.service.list_comments(&id, None, Some("2")).await.unwrap();
        let texts: Vec<_> = first.items.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(texts, vec!["comment 4", "comment 3"]);
        let cursor = first.next_cursor.unwrap();

        let second = h
            .service
            .list_comments(&id, Some(&cursor), Some("2"))
            .await
            .unwrap();
        assert_eq!(second.items[0].id, cursor);
        assert_eq!(second.items[0].content, "comment 2");

        let rest = h.service.list_comments(&id, None, None).await.unwrap();
        assert_eq!(rest.items.len(), 5);
        assert!(rest.next_cursor.is_none());
    }

    #[tokio::test]
    async fn blank_comment_is_rejected() {
        let h = harness().await;
        let id = h
            .service
            .publish_game(&h.alice, form("Moon", "g.json", "{}"))
            .await
            .unwrap()
            .to_string();
        for bad in [json!("   "), json!(42)] {
            assert!(matches!(
                h.service.add_comment(&h.alice, &id, Some(&bad)).await,
                Err(CommunityError::Invalid("Invalid content"))
            ));
        }
        assert_eq!(h.repo.comment_counts(vec![id.parse().unwrap()]).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn storage_errors_propagate() {
        let mut repo = MockCommunityRepo::new();
        repo.expect_list_recent_games()
            .returning(|_| Err(RepoError::database("community_games", "locked")));
        let service = CommunityService::new(Arc::new(repo), Arc::new(FixedClock(base_time())));

        assert!(matches!(
            service.list_games().await,
            Err(CommunityError::Repo(_))
        ));
    }

    #[test]
    fn take_defaults_and_caps() {
        assert_eq!(parse_take(None), 20);
        assert_eq!(parse_take(Some("abc")), 20);
        assert_eq!(parse_take(Some("5")), 5);
        assert_eq!(parse_take(Some("1000")), 100);
    }
}
