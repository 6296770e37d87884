//! Game pack import (single JSON payloads and ZIP packs).
//!
//! Every payload goes through `migrate_legacy_fields` before validation, so
//! stored games always use the canonical field names. Inside a ZIP each JSON
//! entry is imported on its own; one broken entry never aborts the rest.

use std::io::{Cursor, Read};
use std::sync::Arc;

use serde_json::Value;
use storyforge_domain::{
    extract_metadata, is_hosted_url, migrate_legacy_fields, validate_game_data, AssetKind,
    GameMetadata, NewGameOptions,
};
use storyforge_shared::ImportReport;

use crate::use_cases::assets::AssetStore;
use crate::use_cases::images::is_allowed_image_type;
use crate::use_cases::library::GameLibrary;

/// One file taken out of an archive.
struct ArchiveEntry {
    name: String,
    bytes: Vec<u8>,
}

/// Archive contents split into game payloads and candidate assets, in archive order.
struct ArchiveContents {
    json: Vec<ArchiveEntry>,
    assets: Vec<ArchiveEntry>,
}

pub struct GameImporter {
    library: Arc<GameLibrary>,
    assets: Arc<AssetStore>,
}

impl GameImporter {
    pub fn new(library: Arc<GameLibrary>, assets: Arc<AssetStore>) -> Self {
        Self { library, assets }
    }

    /// Dispatch on the file extension.
    pub async fn import_game_pack(&self, file_name: &str, bytes: &[u8]) -> ImportReport {
        let lower = file_name.to_lowercase();
        if lower.ends_with(".zip") {
            self.import_zip(bytes).await
        } else if lower.ends_with(".json") {
            self.import_json(bytes).await
        } else {
            ImportReport::failed(vec!["不支持的文件格式".to_string()])
        }
    }

    pub async fn import_json(&self, bytes: &[u8]) -> ImportReport {
        let raw: Value = match serde_json::from_slice(bytes) {
            Ok(value) => value,
            Err(e) => return ImportReport::failed(vec![format!("JSON导入失败: {}", e)]),
        };

        let payload = migrate_legacy_fields(&raw);
        let validation = validate_game_data(&payload);
        if !validation.valid {
            return ImportReport::failed(validation.errors);
        }

        let metadata = extract_metadata(&payload);
        let options = options_from(&metadata, None);
        match self
            .library
            .create_game(&metadata.title, payload, options)
            .await
        {
            Ok(entry) => {
                tracing::info!(game_id = %entry.id, "Imported game from JSON");
                ImportReport {
                    success: true,
                    count: 1,
                    errors: Vec::new(),
                    warnings: validation.warnings,
                }
            }
            Err(e) => ImportReport {
                warnings: validation.warnings,
                ..ImportReport::failed(vec![format!("JSON导入失败: {}", e)])
            },
        }
    }

    pub async fn import_zip(&self, bytes: &[u8]) -> ImportReport {
        let contents = match read_archive(bytes) {
            Ok(contents) => contents,
            Err(e) => return ImportReport::failed(vec![format!("ZIP导入失败: {}", e)]),
        };

        if contents.json.is_empty() {
            return ImportReport::failed(vec!["ZIP文件中没有找到JSON文件".to_string()]);
        }

        let mut report = ImportReport::default();
        for entry in &contents.json {
            if let Err(reason) = self
                .import_archive_entry(entry, &contents.assets, &mut report)
                .await
            {
                tracing::warn!(file = %entry.name, error = %reason, "Archive entry failed");
                report
                    .errors
                    .push(format!("处理文件 {} 失败: {}", entry.name, reason));
            }
        }
        report.success = report.count > 0;

        tracing::info!(
            imported = report.count,
            errors = report.errors.len(),
            "ZIP import finished"
        );
        report
    }

    /// Validation failures are recorded in `report`; anything else is returned
    /// as the reason for a `处理文件 ... 失败` line.
    async fn import_archive_entry(
        &self,
        entry: &ArchiveEntry,
        assets: &[ArchiveEntry],
        report: &mut ImportReport,
    ) -> Result<(), String> {
        let raw: Value = serde_json::from_slice(&entry.bytes).map_err(|e| e.to_string())?;
        let payload = migrate_legacy_fields(&raw);

        let validation = validate_game_data(&payload);
        if !validation.valid {
            report
                .errors
                .push(format!("文件 {} 验证失败:", entry.name));
            report.errors.extend(validation.errors);
            return Ok(());
        }
        report.warnings.extend(validation.warnings);

        let metadata = extract_metadata(&payload);
        let thumbnail_asset_id = match metadata.thumbnail.as_deref() {
            Some(url) if is_hosted_url(url) => Some(url.to_string()),
            Some(reference) => match find_asset(assets, reference) {
                Some(asset) => {
                    let stored = self
                        .assets
                        .store_asset(asset.bytes.clone(), &asset.name, AssetKind::Image)
                        .await
                        .map_err(|e| e.to_string())?;
                    Some(stored.to_string())
                }
                None => None,
            },
            None => None,
        };

        let options = options_from(&metadata, thumbnail_asset_id);
        let created = self
            .library
            .create_game(&metadata.title, payload, options)
            .await
            .map_err(|e| e.to_string())?;

        tracing::debug!(game_id = %created.id, file = %entry.name, "Imported game from archive");
        report.count += 1;
        Ok(())
    }
}

fn options_from(metadata: &GameMetadata, thumbnail_asset_id: Option<String>) -> NewGameOptions {
    NewGameOptions {
        description: Some(metadata.description.clone()).filter(|d| !d.is_empty()),
        author: Some(metadata.author.clone()),
        tags: metadata.tags.clone(),
        thumbnail_asset_id,
        ..NewGameOptions::default()
    }
}

/// Exact name first, then a substring match in either direction.
fn find_asset<'a>(assets: &'a [ArchiveEntry], reference: &str) -> Option<&'a ArchiveEntry> {
    assets.iter().find(|a| a.name == reference).or_else(|| {
        assets
            .iter()
            .find(|a| a.name.contains(reference) || reference.contains(a.name.as_str()))
    })
}

/// Archive entries (besides JSON) that may become thumbnails: only image
/// types the hosting service accepts.
fn is_thumbnail_candidate(name: &str) -> bool {
    mime_guess::from_path(name)
        .first()
        .is_some_and(|mime| is_allowed_image_type(mime.essence_str()))
}

/// Read the whole archive up front; nothing is held open across an await.
fn read_archive(bytes: &[u8]) -> Result<ArchiveContents, zip::result::ZipError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut contents = ArchiveContents {
        json: Vec::new(),
        assets: Vec::new(),
    };

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if !file.is_file() {
            continue;
        }
        let name = file.name().to_string();
        let is_json = name.ends_with(".json");
        if !is_json && !is_thumbnail_candidate(&name) {
            continue;
        }

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let entry = ArchiveEntry { name, bytes };
        if is_json {
            contents.json.push(entry);
        } else {
            contents.assets.push(entry);
        }
    }

    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::ports::{ClockPort, MockImageUploadPort, UploadError};
    use crate::infrastructure::sqlite::test_support::{base_time, pool};
    use crate::infrastructure::sqlite::SqliteRepositories;
    use crate::use_cases::images::{ImageCache, ImageHostingService};
    use serde_json::json;
    use std::io::Write;
    use std::time::Duration;

    struct Harness {
        _dir: tempfile::TempDir,
        library: Arc<GameLibrary>,
        importer: GameImporter,
    }

    async fn harness(upload: Result<&'static str, UploadError>) -> Harness {
        let (dir, pool) = pool().await;
        let clock: Arc<dyn ClockPort> = Arc::new(FixedClock(base_time()));
        let repos = SqliteRepositories::new(pool, clock.clone());

        let mut uploader = MockImageUploadPort::new();
        uploader
            .expect_upload()
            .returning(move |_| upload.clone().map(str::to_string));
        uploader.expect_endpoint().returning(|| "mock".to_string());
        let cache = Arc::new(ImageCache::new(repos.image_cache.clone(), clock.clone()));
        let hosting = Arc::new(ImageHostingService::new(
            cache,
            None,
            Arc::new(uploader),
            Duration::from_secs(5),
        ));

        let library = Arc::new(GameLibrary::new(
            repos.games.clone(),
            repos.progress.clone(),
            repos.settings.clone(),
            clock.clone(),
        ));
        let assets = Arc::new(AssetStore::new(repos.assets.clone(), hosting, clock));
        let importer = GameImporter::new(library.clone(), assets);
        Harness {
            _dir: dir,
            library,
            importer,
        }
    }

    fn valid_game(title: &str) -> Value {
        json!({
            "game_title": title,
            "description": "A short tale",
            "author": "Ada",
            "tags": ["demo"],
            "branches": [
                {
                    "branch_id": "start",
                    "chapter": "Start",
                    "scene_detail": "You wake up.",
                    "choices": [{"id": "c1", "choice": "Leave", "next_branch": "end"}]
                },
                {
                    "branch_id": "end",
                    "chapter": "End",
                    "scene_detail": "Fin.",
                    "choices": [{"id": "c2", "choice": "Done", "end_game": true}]
                }
            ]
        })
    }

    fn zip_of(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, bytes) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[tokio::test]
    async fn json_import_creates_one_game_with_metadata() {
        let h = harness(Ok("unused")).await;
        let bytes = serde_json::to_vec(&valid_game("Moon")).unwrap();

        let report = h.importer.import_game_pack("moon.json", &bytes).await;

        assert!(report.success, "{:?}", report.errors);
        assert_eq!(report.count, 1);
        let games = h.library.list_games(None, None).await.unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].title, "Moon");
        assert_eq!(games[0].author, "Ada");
        assert_eq!(games[0].tags, vec!["demo".to_string()]);
    }

    #[tokio::test]
    async fn json_import_migrates_legacy_fields() {
        let h = harness(Ok("unused")).await;
        let legacy = json!({
            "title": "Old",
            "branches": [{
                "id": "start",
                "branch_title": "Start",
                "options": [{"text": "Stay", "end_game": true}]
            }]
        });

        let report = h
            .importer
            .import_json(&serde_json::to_vec(&legacy).unwrap())
            .await;

        assert!(report.success, "{:?}", report.errors);
        let games = h.library.list_games(None, None).await.unwrap();
        let record = h.library.get_game(games[0].id).await.unwrap().unwrap();
        assert_eq!(record.index.title, "Old");
        assert_eq!(record.payload.data["game_title"], "Old");
        assert_eq!(record.payload.data["branches"][0]["branch_id"], "start");
        assert_eq!(record.payload.data["branches"][0]["choices"][0]["choice"], "Stay");
    }

    #[tokio::test]
    async fn invalid_json_reports_without_creating() {
        let h = harness(Ok("unused")).await;

        let broken = h.importer.import_game_pack("a.json", b"{not json").await;
        assert!(!broken.success);
        assert_eq!(broken.count, 0);
        assert!(broken.errors[0].starts_with("JSON导入失败"));

        let invalid = h.importer.import_game_pack("b.json", b"{}").await;
        assert!(!invalid.success);
        assert!(invalid.errors.contains(&"缺少游戏标题".to_string()));
        assert!(h.library.list_games(None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected() {
        let h = harness(Ok("unused")).await;
        let report = h.importer.import_game_pack("game.txt", b"{}").await;
        assert_eq!(report, ImportReport::failed(vec!["不支持的文件格式".into()]));
    }

    #[tokio::test]
    async fn zip_without_json_fails() {
        let h = harness(Ok("unused")).await;
        let bytes = zip_of(&[("cover.png", vec![1, 2, 3])]);

        let report = h.importer.import_game_pack("pack.zip", &bytes).await;

        assert!(!report.success);
        assert_eq!(report.errors, vec!["ZIP文件中没有找到JSON文件".to_string()]);
    }

    #[tokio::test]
    async fn zip_partial_failure_keeps_good_entries() {
        let h = harness(Ok("unused")).await;
        let bytes = zip_of(&[
            ("one.json", serde_json::to_vec(&valid_game("One")).unwrap()),
            ("broken.json", b"{oops".to_vec()),
            ("invalid.json", b"{\"branches\": []}".to_vec()),
            ("two.json", serde_json::to_vec(&valid_game("Two")).unwrap()),
        ]);

        let report = h.importer.import_game_pack("pack.zip", &bytes).await;

        assert!(report.success);
        assert_eq!(report.count, 2);
        assert!(report.errors.iter().any(|e| e.starts_with("处理文件 broken.json 失败:")));
        assert!(report.errors.contains(&"文件 invalid.json 验证失败:".to_string()));
        assert!(report.errors.contains(&"缺少游戏标题".to_string()));
        assert_eq!(h.library.list_games(None, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn zip_thumbnail_is_uploaded_and_linked() {
        let h = harness(Ok("https://img/cover.png")).await;
        let mut game = valid_game("Moon");
        game["thumbnail"] = json!("cover.png");
        let bytes = zip_of(&[
            ("moon.json", serde_json::to_vec(&game).unwrap()),
            ("images/cover.png", vec![1, 2, 3]),
            ("images/unused.png", vec![4, 5, 6]),
        ]);

        let report = h.importer.import_game_pack("pack.zip", &bytes).await;

        assert!(report.success, "{:?}", report.errors);
        let games = h.library.list_games(None, None).await.unwrap();
        assert_eq!(
            games[0].thumbnail_asset_id.as_deref(),
            Some("https://img/cover.png")
        );
    }

    #[tokio::test]
    async fn zip_thumbnail_url_is_used_directly() {
        let h = harness(Err(UploadError::Timeout)).await;
        let mut game = valid_game("Moon");
        game["cover_image"] = json!("https://cdn.example.com/moon.png");
        let bytes = zip_of(&[("moon.json", serde_json::to_vec(&game).unwrap())]);

        let report = h.importer.import_game_pack("pack.zip", &bytes).await;

        assert!(report.success, "{:?}", report.errors);
        let games = h.library.list_games(None, None).await.unwrap();
        assert_eq!(
            games[0].thumbnail_asset_id.as_deref(),
            Some("https://cdn.example.com/moon.png")
        );
    }

    #[tokio::test]
    async fn failed_thumbnail_upload_fails_only_that_entry() {
        let h = harness(Err(UploadError::Timeout)).await;
        let mut with_thumb = valid_game("Moon");
        with_thumb["thumbnail"] = json!("cover.png");
        let bytes = zip_of(&[
            ("moon.json", serde_json::to_vec(&with_thumb).unwrap()),
            ("sun.json", serde_json::to_vec(&valid_game("Sun")).unwrap()),
            ("cover.png", vec![1, 2, 3]),
        ]);

        let report = h.importer.import_game_pack("pack.zip", &bytes).await;

        assert_eq!(report.count, 1);
        assert!(report.errors[0].starts_with("处理文件 moon.json 失败:"));
        assert!(report.errors[0].contains("timeout"));
    }

    #[tokio::test]
    async fn non_image_reference_is_left_unresolved() {
        let h = harness(Err(UploadError::Timeout)).await;
        let mut game = valid_game("Moon");
        game["thumbnail"] = json!("cover.svg");
        let bytes = zip_of(&[
            ("moon.json", serde_json::to_vec(&game).unwrap()),
            ("cover.svg", b"<svg/>".to_vec()),
            ("theme.mp3", vec![0; 4]),
        ]);

        let report = h.importer.import_game_pack("pack.zip", &bytes).await;

        assert!(report.success, "{:?}", report.errors);
        let games = h.library.list_games(None, None).await.unwrap();
        assert_eq!(games[0].thumbnail_asset_id, None);
    }

    #[test]
    fn only_hostable_images_are_thumbnail_candidates() {
        for name in ["a.png", "b.JPG", "c.jpeg", "d.gif", "e.webp", "f.bmp"] {
            assert!(is_thumbnail_candidate(name), "{name}");
        }
        for name in ["a.svg", "b.mp3", "c.wav", "d.ogg", "e.txt", "noext"] {
            assert!(!is_thumbnail_candidate(name), "{name}");
        }
    }

    #[test]
    fn asset_matching_prefers_exact_name() {
        let assets = vec![
            ArchiveEntry {
                name: "big_cover.png".into(),
                bytes: vec![],
            },
            ArchiveEntry {
                name: "cover.png".into(),
                bytes: vec![],
            },
        ];
        assert_eq!(find_asset(&assets, "cover.png").unwrap().name, "cover.png");
        assert_eq!(find_asset(&assets, "big").unwrap().name, "big_cover.png");
        assert_eq!(
            find_asset(&assets, "assets/cover.png").unwrap().name,
            "cover.png"
        );
        assert!(find_asset(&assets, "other.jpg").is_none());
    }
}
