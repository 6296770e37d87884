//! Local game library use cases.
//!
//! CRUD over the index and payload rows of each game, the default-game setting
//! and saved progress. The library is an explicitly constructed handle; nothing
//! here is process-global.

use std::sync::Arc;

use serde_json::Value;
use storyforge_domain::{
    validate_game_data, DomainError, GameData, GameId, GameIndexEntry, GameProgress, GameRecord,
    GameTitle, GameUpdate, NewGameOptions, ValidationReport,
};

use crate::infrastructure::ports::{ClockPort, GameRepo, ProgressRepo, RepoError, SettingsRepo};

/// Settings key holding the default game id.
pub const DEFAULT_GAME_KEY: &str = "defaultGameId";

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Game not found: {0}")]
    NotFound(GameId),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<DomainError> for LibraryError {
    fn from(err: DomainError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

pub struct GameLibrary {
    games: Arc<dyn GameRepo>,
    progress: Arc<dyn ProgressRepo>,
    settings: Arc<dyn SettingsRepo>,
    clock: Arc<dyn ClockPort>,
}

impl GameLibrary {
    pub fn new(
        games: Arc<dyn GameRepo>,
        progress: Arc<dyn ProgressRepo>,
        settings: Arc<dyn SettingsRepo>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            games,
            progress,
            settings,
            clock,
        }
    }

    /// Create a game. Index and payload share one id and one timestamp and are
    /// written in a single transaction.
    pub async fn create_game(
        &self,
        title: &str,
        payload: Value,
        options: NewGameOptions,
    ) -> Result<GameIndexEntry, LibraryError> {
        let title = GameTitle::new(title)?;
        let now = self.clock.now();
        let id = GameId::new();

        let index = GameIndexEntry::new(id, title, options, now);
        let data = GameData::new(id, payload, now);
        self.games.save(&index, &data).await?;

        tracing::info!(game_id = %id, title = %index.title, "Game created");
        Ok(index)
    }

    pub async fn list_games(
        &self,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<GameIndexEntry>, LibraryError> {
        Ok(self.games.list(limit, offset).await?)
    }

    /// Both rows, or `None` when either is missing.
    pub async fn get_game(&self, id: GameId) -> Result<Option<GameRecord>, LibraryError> {
        let Some(index) = self.games.get_index(id).await? else {
            return Ok(None);
        };
        let Some(payload) = self.games.get_data(id).await? else {
            tracing::warn!(game_id = %id, "Index row without payload");
            return Ok(None);
        };
        Ok(Some(GameRecord { index, payload }))
    }

    /// Apply a partial update. Only the touched rows get a new `updated_at`.
    pub async fn update_game(
        &self,
        id: GameId,
        update: GameUpdate,
    ) -> Result<GameRecord, LibraryError> {
        let record = self.get_game(id).await?.ok_or(LibraryError::NotFound(id))?;
        let now = self.clock.now();

        let index = if update.touches_index() {
            Some(update.apply_to_index(&record.index, now)?)
        } else {
            None
        };
        let payload = update.data.clone().map(|data| GameData {
            data,
            updated_at: now,
            ..record.payload.clone()
        });

        // A delete may land between the read above and this write.
        self.games
            .update(index.clone(), payload.clone())
            .await
            .map_err(|e| match e {
                e if e.is_not_found() => LibraryError::NotFound(id),
                e => LibraryError::Repo(e),
            })?;

        tracing::debug!(
            game_id = %id,
            index = update.touches_index(),
            data = update.touches_data(),
            "Game updated"
        );
        Ok(GameRecord {
            index: index.unwrap_or(record.index),
            payload: payload.unwrap_or(record.payload),
        })
    }

    pub async fn update_game_priority(
        &self,
        id: GameId,
        priority: i64,
    ) -> Result<GameRecord, LibraryError> {
        self.update_game(id, GameUpdate::priority(priority)).await
    }

    /// Idempotent; also removes saved progress.
    pub async fn delete_game(&self, id: GameId) -> Result<(), LibraryError> {
        self.delete_games(vec![id]).await
    }

    pub async fn delete_games(&self, ids: Vec<GameId>) -> Result<(), LibraryError> {
        let count = ids.len();
        self.games.delete(ids).await?;
        tracing::info!(count, "Games deleted");
        Ok(())
    }

    pub fn validate_game_data(&self, payload: &Value) -> ValidationReport {
        validate_game_data(payload)
    }

    // =========================================================================
    // Default game (best-effort)
    // =========================================================================

    pub async fn get_default_game(&self) -> Option<GameRecord> {
        let id = match self.settings.get(DEFAULT_GAME_KEY).await {
            Ok(Some(id)) => id,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read default game setting");
                return None;
            }
        };
        let id: GameId = match id.parse() {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "Stored default game id is invalid");
                return None;
            }
        };
        match self.get_game(id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(game_id = %id, error = %e, "Failed to load default game");
                None
            }
        }
    }

    pub async fn set_default_game(&self, id: GameId) -> Result<(), LibraryError> {
        self.settings.set(DEFAULT_GAME_KEY, &id.to_string()).await?;
        Ok(())
    }

    pub async fn clear_default_game(&self) -> Result<(), LibraryError> {
        self.settings.remove(DEFAULT_GAME_KEY).await?;
        Ok(())
    }

    pub async fn get_highest_priority_game(&self) -> Option<GameRecord> {
        let first = match self.games.list(Some(1), None).await {
            Ok(mut games) if !games.is_empty() => games.swap_remove(0),
            Ok(_) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list games");
                return None;
            }
        };
        match self.get_game(first.id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(game_id = %first.id, error = %e, "Failed to load game");
                None
            }
        }
    }

    // =========================================================================
    // Progress
    // =========================================================================

    /// Upsert: overwrites any progress saved for the same game.
    pub async fn save_progress(&self, progress: GameProgress) -> Result<(), LibraryError> {
        self.progress.save(&progress).await?;
        Ok(())
    }

    pub async fn get_game_progress(
        &self,
        game_id: GameId,
    ) -> Result<Option<GameProgress>, LibraryError> {
        Ok(self.progress.get(game_id).await?)
    }

    pub async fn delete_game_progress(&self, game_id: GameId) -> Result<(), LibraryError> {
        self.progress.delete(game_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::ports::{MockGameRepo, MockProgressRepo, MockSettingsRepo};
    use crate::infrastructure::sqlite::test_support::{base_time, pool};
    use crate::infrastructure::sqlite::SqliteRepositories;
    use crate::infrastructure::clock::SteppingClock;
    use chrono::Duration;
    use serde_json::json;

    fn library_with(games: MockGameRepo, settings: MockSettingsRepo) -> GameLibrary {
        GameLibrary::new(
            Arc::new(games),
            Arc::new(MockProgressRepo::new()),
            Arc::new(settings),
            Arc::new(FixedClock(base_time())),
        )
    }

    async fn sqlite_library() -> (tempfile::TempDir, GameLibrary, Arc<SteppingClock>) {
        let (dir, pool) = pool().await;
        let clock = Arc::new(SteppingClock::new(base_time()));
        let repos = SqliteRepositories::new(pool, clock.clone());
        let library = GameLibrary::new(repos.games, repos.progress, repos.settings, clock.clone());
        (dir, library, clock)
    }

    #[tokio::test]
    async fn create_rejects_blank_title_without_writing() {
        let library = library_with(MockGameRepo::new(), MockSettingsRepo::new());

        for title in ["", "   "] {
            let result = library.create_game(title, json!({}), NewGameOptions::default()).await;
            assert!(matches!(result, Err(LibraryError::InvalidInput(_))));
        }
    }

    #[tokio::test]
    async fn create_writes_both_rows_with_one_timestamp() {
        let mut games = MockGameRepo::new();
        games
            .expect_save()
            .withf(|index, data| {
                index.id == data.id
                    && index.created_at == data.created_at
                    && index.updated_at == data.updated_at
                    && index.version == 1
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let library = library_with(games, MockSettingsRepo::new());

        let entry = library
            .create_game("Moon", json!({"branches": []}), NewGameOptions::default())
            .await
            .expect("create");

        assert_eq!(entry.title, "Moon");
        assert_eq!(entry.author, "Unknown");
        assert_eq!(entry.created_at, base_time());
    }

    #[tokio::test]
    async fn get_game_is_none_when_payload_missing() {
        let mut games = MockGameRepo::new();
        let id = GameId::new();
        let index = GameIndexEntry::new(
            id,
            GameTitle::new("Moon").unwrap(),
            NewGameOptions::default(),
            base_time(),
        );
        games
            .expect_get_index()
            .returning(move |_| Ok(Some(index.clone())));
        games.expect_get_data().returning(|_| Ok(None));
        let library = library_with(games, MockSettingsRepo::new());

        assert_eq!(library.get_game(id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_missing_game_is_not_found() {
        let mut games = MockGameRepo::new();
        games.expect_get_index().returning(|_| Ok(None));
        let library = library_with(games, MockSettingsRepo::new());

        let id = GameId::new();
        let result = library.update_game(id, GameUpdate::priority(3)).await;
        assert!(matches!(result, Err(LibraryError::NotFound(found)) if found == id));
    }

    #[tokio::test]
    async fn update_racing_a_delete_is_not_found() {
        let mut games = MockGameRepo::new();
        let id = GameId::new();
        let index = GameIndexEntry::new(
            id,
            GameTitle::new("Moon").unwrap(),
            NewGameOptions::default(),
            base_time(),
        );
        let data = GameData::new(id, json!({}), base_time());
        games
            .expect_get_index()
            .returning(move |_| Ok(Some(index.clone())));
        games
            .expect_get_data()
            .returning(move |_| Ok(Some(data.clone())));
        games
            .expect_update()
            .times(1)
            .returning(move |_, _| Err(RepoError::not_found("Game", id)));
        let library = library_with(games, MockSettingsRepo::new());

        let result = library.update_game_priority(id, 3).await;
        assert!(matches!(result, Err(LibraryError::NotFound(found)) if found == id));
    }

    #[tokio::test]
    async fn update_after_delete_leaves_library_empty() {
        let (_dir, library, _clock) = sqlite_library().await;
        let entry = library
            .create_game("Moon", json!({}), NewGameOptions::default())
            .await
            .unwrap();
        library.delete_game(entry.id).await.unwrap();

        let result = library.update_game_priority(entry.id, 5).await;
        assert!(matches!(result, Err(LibraryError::NotFound(_))));
        assert!(library.list_games(None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn long_titles_are_stored_whole() {
        let (_dir, library, _clock) = sqlite_library().await;
        let title = "a".repeat(201);

        let entry = library
            .create_game(&title, json!({"game_title": title}), NewGameOptions::default())
            .await
            .expect("long title is valid");

        assert_eq!(entry.title, title);
        let record = library.get_game(entry.id).await.unwrap().expect("game");
        assert_eq!(record.index.title.chars().count(), 201);
    }

    #[tokio::test]
    async fn created_game_round_trips_with_defaults() {
        let (_dir, library, _clock) = sqlite_library().await;
        let payload = json!({
            "game_title": "测试游戏",
            "branches": [{
                "branch_id": "b1",
                "chapter": "c1",
                "scene_detail": "d1",
                "choices": []
            }]
        });

        let entry = library
            .create_game("测试游戏", payload.clone(), NewGameOptions::default())
            .await
            .unwrap();
        assert_eq!(entry.title, "测试游戏");
        assert_eq!(entry.priority, 0);
        assert_eq!(entry.version, 1);
        assert_eq!(entry.author, "Unknown");

        let record = library.get_game(entry.id).await.unwrap().expect("game");
        assert_eq!(record.index, entry);
        assert_eq!(record.payload.data, payload);
        assert_eq!(record.payload.data["branches"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn default_game_lookup_swallows_errors() {
        let mut settings = MockSettingsRepo::new();
        settings
            .expect_get()
            .returning(|_| Err(RepoError::database("settings", "disk gone")));
        let library = library_with(MockGameRepo::new(), settings);

        assert_eq!(library.get_default_game().await, None);
    }

    #[tokio::test]
    async fn highest_priority_lookup_swallows_errors() {
        let mut games = MockGameRepo::new();
        games
            .expect_list()
            .returning(|_, _| Err(RepoError::database("games_index", "locked")));
        let library = library_with(games, MockSettingsRepo::new());

        assert_eq!(library.get_highest_priority_game().await, None);
    }

    #[tokio::test]
    async fn pagination_is_a_slice_of_the_full_listing() {
        let (_dir, library, clock) = sqlite_library().await;
        for (i, priority) in [1, 3, 3, 0, 2].into_iter().enumerate() {
            library
                .create_game(
                    &format!("g{i}"),
                    json!({}),
                    NewGameOptions {
                        priority: Some(priority),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            clock.advance(Duration::seconds(1));
        }

        let all = library.list_games(None, None).await.unwrap();
        let priorities: Vec<i64> = all.iter().map(|g| g.priority).collect();
        assert_eq!(priorities, vec![3, 3, 2, 1, 0]);

        let page = library.list_games(Some(2), Some(1)).await.unwrap();
        assert_eq!(page, all[1..3].to_vec());
    }

    #[tokio::test]
    async fn update_refreshes_only_touched_row() {
        let (_dir, library, clock) = sqlite_library().await;
        let entry = library
            .create_game("Moon", json!({"v": 1}), NewGameOptions::default())
            .await
            .unwrap();
        clock.advance(Duration::minutes(5));

        let updated = library.update_game_priority(entry.id, 7).await.unwrap();
        assert_eq!(updated.index.priority, 7);
        assert_eq!(updated.index.updated_at, base_time() + Duration::minutes(5));
        assert_eq!(updated.payload.updated_at, base_time());

        clock.advance(Duration::minutes(5));
        library
            .update_game(entry.id, GameUpdate::data(json!({"v": 2})))
            .await
            .unwrap();
        let record = library.get_game(entry.id).await.unwrap().expect("game");
        assert_eq!(record.payload.data, json!({"v": 2}));
        assert_eq!(record.payload.updated_at, base_time() + Duration::minutes(10));
        assert_eq!(record.index.updated_at, base_time() + Duration::minutes(5));
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_clears_progress() {
        let (_dir, library, _clock) = sqlite_library().await;
        let entry = library
            .create_game("Moon", json!({}), NewGameOptions::default())
            .await
            .unwrap();
        library
            .save_progress(GameProgress {
                game_id: entry.id,
                current_branch: Some("start".into()),
                attributes: Default::default(),
                visited: vec![],
                ended: false,
                saved_at: base_time(),
            })
            .await
            .unwrap();

        library.delete_game(entry.id).await.unwrap();
        library.delete_game(entry.id).await.unwrap();

        assert_eq!(library.get_game(entry.id).await.unwrap(), None);
        assert_eq!(library.get_game_progress(entry.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn default_game_round_trip() {
        let (_dir, library, _clock) = sqlite_library().await;
        let entry = library
            .create_game("Moon", json!({}), NewGameOptions::default())
            .await
            .unwrap();

        assert_eq!(library.get_default_game().await, None);
        library.set_default_game(entry.id).await.unwrap();
        assert_eq!(
            library.get_default_game().await.map(|r| r.index.id),
            Some(entry.id)
        );
        assert_eq!(
            library.get_highest_priority_game().await.map(|r| r.index.id),
            Some(entry.id)
        );

        library.clear_default_game().await.unwrap();
        assert_eq!(library.get_default_game().await, None);
    }
}
