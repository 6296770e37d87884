//! Library backup and restore.

use std::sync::Arc;

use serde_json::Value;
use storyforge_domain::{
    validate_backup, BackupData, BackupFormatError, BackupGame, GameData, GameTitle, MergeMode,
    RestoreReport,
};

use crate::infrastructure::ports::{ClockPort, GameRepo, RepoError};

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error(transparent)]
    Format(#[from] BackupFormatError),
    #[error("Failed to encode backup: {0}")]
    Encode(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct BackupService {
    games: Arc<dyn GameRepo>,
    clock: Arc<dyn ClockPort>,
}

impl BackupService {
    pub fn new(games: Arc<dyn GameRepo>, clock: Arc<dyn ClockPort>) -> Self {
        Self { games, clock }
    }

    /// Snapshot every game in library order. A game whose payload row is
    /// missing is left out.
    pub async fn create_backup(&self) -> Result<BackupData, BackupError> {
        let entries = self.games.list(None, None).await?;
        let mut games = Vec::with_capacity(entries.len());

        for index in entries {
            match self.games.get_data(index.id).await? {
                Some(payload) => games.push(BackupGame {
                    index,
                    data: payload.data,
                }),
                None => {
                    tracing::warn!(game_id = %index.id, "Game has no payload, left out of backup")
                }
            }
        }

        let backup = BackupData::new(games, env!("CARGO_PKG_VERSION"), self.clock.now());
        tracing::info!(
            game_count = backup.metadata.game_count,
            total_size = backup.metadata.total_size,
            "Backup created"
        );
        Ok(backup)
    }

    pub async fn export_json(&self) -> Result<String, BackupError> {
        let backup = self.create_backup().await?;
        serde_json::to_string_pretty(&backup).map_err(|e| BackupError::Encode(e.to_string()))
    }

    /// Validate an uploaded backup document, then restore it.
    pub async fn restore_from_value(
        &self,
        raw: &Value,
        mode: MergeMode,
    ) -> Result<RestoreReport, BackupError> {
        let backup = validate_backup(raw)?;
        Ok(self.restore(backup, mode).await)
    }

    /// Games keep their ids and timestamps. Per-game failures, including a
    /// blank title, are counted and do not stop the rest.
    pub async fn restore(&self, backup: BackupData, mode: MergeMode) -> RestoreReport {
        let mut report = RestoreReport::default();

        for game in backup.games {
            let id = game.index.id;
            if let Err(e) = GameTitle::new(game.index.title.as_str()) {
                report.failed += 1;
                report.errors.push(format!("{}: {}", id, e));
                continue;
            }
            let existing = match self.games.get_index(id).await {
                Ok(existing) => existing,
                Err(e) => {
                    report.failed += 1;
                    report.errors.push(format!("{}: {}", game.index.title, e));
                    continue;
                }
            };

            if !mode.should_write(&game.index, existing.as_ref()) {
                report.skipped += 1;
                continue;
            }

            let data = GameData {
                id,
                data: game.data,
                created_at: game.index.created_at,
                updated_at: game.index.updated_at,
            };
            match self.games.save(&game.index, &data).await {
                Ok(()) => report.restored += 1,
                Err(e) => {
                    tracing::warn!(game_id = %id, error = %e, "Failed to restore game");
                    report.failed += 1;
                    report.errors.push(format!("{}: {}", game.index.title, e));
                }
            }
        }

        tracing::info!(
            mode = %mode,
            restored = report.restored,
            skipped = report.skipped,
            failed = report.failed,
            "Restore finished"
        );
        report
    }
}
