#![cfg(unix)]

mod common;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use common::{
    downloader_writing, extractor_writing, files_in, test_config, write_script, ScriptedLLM,
    ANALYSIS_REPLY,
};
use intro_analyzer::direction::{DirectionRecord, NewDirection};
use intro_analyzer::error::{ErrorKind, StoreError};
use intro_analyzer::models::{IngestRequest, IntroRecord, NewIntro, SubmitterMetadata};
use intro_analyzer::store::{IntroStore, JsonFileStore, ListQuery, Page, StoreStats};
use intro_analyzer::{Config, IngestionPipeline};

/// Store whose writes always fail
struct FailingStore;

fn disk_full() -> StoreError {
    StoreError::Io(std::io::Error::other("disk full"))
}

#[async_trait]
impl IntroStore for FailingStore {
    async fn create(&self, _intro: NewIntro) -> Result<IntroRecord, StoreError> {
        Err(disk_full())
    }

    async fn get(&self, _id: u64) -> Result<Option<IntroRecord>, StoreError> {
        Ok(None)
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<IntroRecord>, StoreError> {
        Ok(Page {
            items: Vec::new(),
            total: 0,
            page: query.page(),
            limit: query.limit(),
        })
    }

    async fn delete(&self, _id: u64) -> Result<bool, StoreError> {
        Err(disk_full())
    }

    async fn count(&self, _category: Option<&str>, _mood: Option<&str>) -> Result<usize, StoreError> {
        Ok(0)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(StoreStats {
            total: 0,
            top_categories: Vec::new(),
            top_moods: Vec::new(),
        })
    }

    async fn all(&self) -> Result<Vec<IntroRecord>, StoreError> {
        Ok(Vec::new())
    }

    async fn save_direction(&self, _direction: NewDirection) -> Result<DirectionRecord, StoreError> {
        Err(disk_full())
    }

    async fn get_direction(&self, _id: u64) -> Result<Option<DirectionRecord>, StoreError> {
        Ok(None)
    }

    async fn list_directions(&self) -> Result<Vec<DirectionRecord>, StoreError> {
        Ok(Vec::new())
    }
}

fn request(start: i64, end: i64) -> IngestRequest {
    IngestRequest {
        video_url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
        start_time: start,
        end_time: end,
        submitter: SubmitterMetadata {
            channel_name: "Neon Nights".to_string(),
            video_title: "Synthwave Mix".to_string(),
            category: "Music".to_string(),
            thumbnail_url: None,
        },
    }
}

/// Fake tools that leave a marker file when the downloader runs
fn fake_tools(dir: &Path, clip_bytes: usize) -> Config {
    let marker = dir.join("downloader-ran");
    let downloader = write_script(
        dir,
        "yt-dlp",
        &format!("touch '{}'\n{}", marker.display(), downloader_writing(8192)),
    );
    let extractor = write_script(dir, "ffmpeg", &extractor_writing(clip_bytes));
    test_config(dir, &downloader, &extractor)
}

async fn json_store(config: &Config) -> Arc<dyn IntroStore> {
    Arc::new(JsonFileStore::open(&config.storage.data_file).await.unwrap())
}

#[tokio::test]
async fn test_successful_ingest_stores_record_and_cleans_up() {
    let dir = TempDir::new().unwrap();
    let config = fake_tools(dir.path(), 4096);
    let store = json_store(&config).await;
    let llm = Arc::new(ScriptedLLM::replying(ANALYSIS_REPLY));
    let pipeline = IngestionPipeline::from_config(&config, llm.clone(), store.clone());

    let record = pipeline.ingest(request(5, 15)).await.unwrap();

    assert_eq!(record.id, 1);
    assert_eq!(record.intro.video_id, "dQw4w9WgXcQ");
    assert_eq!(record.duration(), 10);
    assert_eq!(record.analysis().mood, "Energetic");
    assert_eq!(llm.calls(), 1);
    assert_eq!(store.count(None, None).await.unwrap(), 1);
    assert!(files_in(&config.acquisition.scratch_dir).is_empty());
}

#[tokio::test]
async fn test_invalid_request_never_reaches_downloader() {
    let dir = TempDir::new().unwrap();
    let config = fake_tools(dir.path(), 4096);
    let store = json_store(&config).await;
    let llm = Arc::new(ScriptedLLM::replying(ANALYSIS_REPLY));
    let pipeline = IngestionPipeline::from_config(&config, llm.clone(), store.clone());

    for bad in [request(15, 5), request(-1, 10), request(0, 61)] {
        let err = pipeline.ingest(bad).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    let mut missing_title = request(0, 10);
    missing_title.submitter.video_title = "  ".to_string();
    let err = pipeline.ingest(missing_title).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let mut bad_url = request(0, 10);
    bad_url.video_url = "https://example.com/video".to_string();
    let err = pipeline.ingest(bad_url).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    assert!(!dir.path().join("downloader-ran").exists());
    assert_eq!(llm.calls(), 0);
    assert_eq!(store.count(None, None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_acquisition_failure_is_a_source_error() {
    let dir = TempDir::new().unwrap();
    let config = fake_tools(dir.path(), 10);
    let store = json_store(&config).await;
    let llm = Arc::new(ScriptedLLM::replying(ANALYSIS_REPLY));
    let pipeline = IngestionPipeline::from_config(&config, llm.clone(), store);

    let err = pipeline.ingest(request(0, 10)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceFetch);
    assert!(dir.path().join("downloader-ran").exists());
    assert_eq!(llm.calls(), 0);
    assert!(files_in(&config.acquisition.scratch_dir).is_empty());
}

#[tokio::test]
async fn test_analysis_failure_deletes_clip() {
    let dir = TempDir::new().unwrap();
    let config = fake_tools(dir.path(), 4096);
    let store = json_store(&config).await;
    let llm = Arc::new(ScriptedLLM::replying(r#"{"description": "no mood here"}"#));
    let pipeline = IngestionPipeline::from_config(&config, llm, store.clone());

    let err = pipeline.ingest(request(0, 10)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Analysis);
    assert_eq!(store.count(None, None).await.unwrap(), 0);
    assert!(files_in(&config.acquisition.scratch_dir).is_empty());
}

#[tokio::test]
async fn test_store_failure_deletes_clip() {
    let dir = TempDir::new().unwrap();
    let config = fake_tools(dir.path(), 4096);
    let llm = Arc::new(ScriptedLLM::replying(ANALYSIS_REPLY));
    let pipeline = IngestionPipeline::from_config(&config, llm.clone(), Arc::new(FailingStore));

    let err = pipeline.ingest(request(0, 10)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert_eq!(llm.calls(), 1);
    assert!(files_in(&config.acquisition.scratch_dir).is_empty());
}
