//! Persistence of intro records and generated visual directions.
//!
//! `IntroStore` is the seam the pipeline and the HTTP surface depend on;
//! `JsonFileStore` keeps everything in one JSON document on disk.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::direction::{DirectionRecord, NewDirection};
use crate::error::StoreError;
use crate::models::{IntroRecord, NewIntro};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Filters and pagination for listing records, newest first
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub category: Option<String>,
    pub mood: Option<String>,
    /// 1-based page number
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl ListQuery {
    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    fn matches(&self, record: &IntroRecord) -> bool {
        let category_ok = self
            .category
            .as_deref()
            .map_or(true, |c| record.category() == c);
        let mood_ok = self
            .mood
            .as_deref()
            .map_or(true, |m| record.analysis().mood == m);
        category_ok && mood_ok
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoodCount {
    pub mood: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total: usize,
    pub top_categories: Vec<CategoryCount>,
    pub top_moods: Vec<MoodCount>,
}

/// Storage collaborator for intro records
#[async_trait]
pub trait IntroStore: Send + Sync {
    /// Persist a new record, assigning its id and creation time
    async fn create(&self, intro: NewIntro) -> Result<IntroRecord, StoreError>;
    async fn get(&self, id: u64) -> Result<Option<IntroRecord>, StoreError>;
    async fn list(&self, query: &ListQuery) -> Result<Page<IntroRecord>, StoreError>;
    /// Returns whether a record was removed
    async fn delete(&self, id: u64) -> Result<bool, StoreError>;
    async fn count(&self, category: Option<&str>, mood: Option<&str>) -> Result<usize, StoreError>;
    async fn stats(&self) -> Result<StoreStats, StoreError>;
    /// The full corpus, in insertion order, for search
    async fn all(&self) -> Result<Vec<IntroRecord>, StoreError>;

    async fn save_direction(&self, direction: NewDirection) -> Result<DirectionRecord, StoreError>;
    async fn get_direction(&self, id: u64) -> Result<Option<DirectionRecord>, StoreError>;
    async fn list_directions(&self) -> Result<Vec<DirectionRecord>, StoreError>;
}

fn first_id() -> u64 {
    1
}

/// On-disk document layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Database {
    #[serde(default)]
    intros: Vec<IntroRecord>,
    #[serde(default = "first_id")]
    next_id: u64,
    #[serde(default)]
    visual_directions: Vec<DirectionRecord>,
    #[serde(default = "first_id")]
    next_vd_id: u64,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            intros: Vec::new(),
            next_id: 1,
            visual_directions: Vec::new(),
            next_vd_id: 1,
        }
    }
}

impl Database {
    /// Make sure counters are ahead of every stored id
    fn repair_counters(&mut self) {
        if let Some(max) = self.intros.iter().map(|r| r.id).max() {
            self.next_id = self.next_id.max(max + 1);
        }
        if let Some(max) = self.visual_directions.iter().map(|d| d.id).max() {
            self.next_vd_id = self.next_vd_id.max(max + 1);
        }
    }
}

/// JSON-file backed store. Writes are serialized behind a lock and land via
/// a temp file plus rename, so a crash never leaves a half-written document.
pub struct JsonFileStore {
    path: PathBuf,
    db: RwLock<Database>,
}

impl JsonFileStore {
    /// Open the store at `path`, creating an empty document if needed
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let db = match fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Database::default(),
            Ok(content) => {
                let mut db: Database = serde_json::from_str(&content)?;
                db.repair_counters();
                info!(
                    "📂 Loaded {} intro(s) and {} visual direction(s) from {}",
                    db.intros.len(),
                    db.visual_directions.len(),
                    path.display()
                );
                db
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let db = Database::default();
                write_atomically(&path, &db).await?;
                info!("✅ Database file created: {}", path.display());
                db
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            db: RwLock::new(db),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy of the document, persist it, then publish it.
    /// A failed write leaves the in-memory state untouched.
    async fn mutate<T>(&self, change: impl FnOnce(&mut Database) -> T) -> Result<T, StoreError> {
        let mut db = self.db.write().await;
        let mut next = db.clone();
        let out = change(&mut next);
        write_atomically(&self.path, &next).await?;
        *db = next;
        Ok(out)
    }
}

async fn write_atomically(path: &Path, db: &Database) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(db)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, &json).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        warn!("Failed to replace {}: {}", path.display(), e);
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    debug!("💾 Wrote {} bytes to {}", json.len(), path.display());
    Ok(())
}

fn top_counts<'a>(values: impl Iterator<Item = &'a str>, n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values.filter(|v| !v.is_empty()) {
        *counts.entry(value).or_insert(0) += 1;
    }
    let mut counts: Vec<(String, usize)> = counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts.truncate(n);
    counts
}

#[async_trait]
impl IntroStore for JsonFileStore {
    async fn create(&self, intro: NewIntro) -> Result<IntroRecord, StoreError> {
        let record = self
            .mutate(|db| {
                let record = IntroRecord {
                    id: db.next_id,
                    intro,
                    created_at: Utc::now(),
                };
                db.next_id += 1;
                db.intros.push(record.clone());
                record
            })
            .await?;
        info!("💾 Saved intro {} ({})", record.id, record.intro.video_title);
        Ok(record)
    }

    async fn get(&self, id: u64) -> Result<Option<IntroRecord>, StoreError> {
        let db = self.db.read().await;
        Ok(db.intros.iter().find(|r| r.id == id).cloned())
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<IntroRecord>, StoreError> {
        let db = self.db.read().await;
        let mut filtered: Vec<&IntroRecord> = db.intros.iter().filter(|r| query.matches(r)).collect();
        filtered.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        let (page, limit) = (query.page(), query.limit());
        let items = filtered
            .iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .map(|r| (*r).clone())
            .collect();

        Ok(Page {
            items,
            total: filtered.len(),
            page,
            limit,
        })
    }

    async fn delete(&self, id: u64) -> Result<bool, StoreError> {
        if !self.db.read().await.intros.iter().any(|r| r.id == id) {
            return Ok(false);
        }
        let deleted = self
            .mutate(|db| {
                let before = db.intros.len();
                db.intros.retain(|r| r.id != id);
                db.intros.len() < before
            })
            .await?;
        if deleted {
            info!("🗑️ Deleted intro {}", id);
        }
        Ok(deleted)
    }

    async fn count(&self, category: Option<&str>, mood: Option<&str>) -> Result<usize, StoreError> {
        let query = ListQuery {
            category: category.map(str::to_string),
            mood: mood.map(str::to_string),
            ..ListQuery::default()
        };
        let db = self.db.read().await;
        Ok(db.intros.iter().filter(|r| query.matches(r)).count())
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let db = self.db.read().await;
        let top_categories = top_counts(db.intros.iter().map(|r| r.category()), 5)
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect();
        let top_moods = top_counts(db.intros.iter().map(|r| r.analysis().mood.as_str()), 5)
            .into_iter()
            .map(|(mood, count)| MoodCount { mood, count })
            .collect();

        Ok(StoreStats {
            total: db.intros.len(),
            top_categories,
            top_moods,
        })
    }

    async fn all(&self) -> Result<Vec<IntroRecord>, StoreError> {
        Ok(self.db.read().await.intros.clone())
    }

    async fn save_direction(&self, direction: NewDirection) -> Result<DirectionRecord, StoreError> {
        let record = self
            .mutate(|db| {
                let record = DirectionRecord {
                    id: db.next_vd_id,
                    created_at: Utc::now(),
                    direction,
                };
                db.next_vd_id += 1;
                db.visual_directions.push(record.clone());
                record
            })
            .await?;
        info!("💾 Saved visual direction {}", record.id);
        Ok(record)
    }

    async fn get_direction(&self, id: u64) -> Result<Option<DirectionRecord>, StoreError> {
        let db = self.db.read().await;
        Ok(db.visual_directions.iter().find(|d| d.id == id).cloned())
    }

    async fn list_directions(&self) -> Result<Vec<DirectionRecord>, StoreError> {
        Ok(self.db.read().await.visual_directions.clone())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{AnalysisResult, Pace};
    use tempfile::TempDir;

    pub(crate) fn sample_intro(category: &str, mood: &str) -> NewIntro {
        NewIntro {
            video_url: "https://youtu.be/dQw4w9WgXcQ".to_string(),
            video_id: "dQw4w9WgXcQ".to_string(),
            start_time: 0,
            end_time: 10,
            duration: 10,
            thumbnail_url: "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg".to_string(),
            channel_name: "Channel".to_string(),
            video_title: "Title".to_string(),
            category: category.to_string(),
            analysis: AnalysisResult {
                description: "Slow pans over mountains".to_string(),
                mood: mood.to_string(),
                visual_style: "Cinematic".to_string(),
                pace: Pace::Slow,
                color_scheme: "Cold blues".to_string(),
                has_text: false,
                has_person: false,
                music_type: "none".to_string(),
                transition_count: 3,
                technical_details: "No special effects detected".to_string(),
                keywords: vec!["mountains".to_string(), "aerial".to_string()],
            },
        }
    }

    #[tokio::test]
    async fn test_ids_are_never_reused() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path().join("intros.json")).await.unwrap();

        let a = store.create(sample_intro("Tech", "Calm")).await.unwrap();
        let b = store.create(sample_intro("Tech", "Calm")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        assert!(store.delete(b.id).await.unwrap());
        assert!(!store.delete(b.id).await.unwrap());

        let c = store.create(sample_intro("Tech", "Calm")).await.unwrap();
        assert_eq!(c.id, 3);
    }

    #[tokio::test]
    async fn test_reopen_preserves_records_and_counter() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("intros.json");

        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store.create(sample_intro("Gaming", "Epic")).await.unwrap();
            let removed = store.create(sample_intro("Gaming", "Epic")).await.unwrap();
            store.delete(removed.id).await.unwrap();
        }

        let store = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(store.all().await.unwrap().len(), 1);
        let next = store.create(sample_intro("Gaming", "Epic")).await.unwrap();
        assert_eq!(next.id, 3);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["nextId"], 4);
        assert!(raw["intros"][0]["analysis"]["visualStyle"].is_string());
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path().join("intros.json")).await.unwrap();
        for i in 0..5 {
            let mood = if i % 2 == 0 { "Calm" } else { "Epic" };
            store.create(sample_intro("Tech", mood)).await.unwrap();
        }
        store.create(sample_intro("Music", "Calm")).await.unwrap();

        let page = store
            .list(&ListQuery {
                category: Some("Tech".to_string()),
                page: Some(1),
                limit: Some(2),
                ..ListQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id, 5, "newest first");

        let calm = store
            .list(&ListQuery {
                mood: Some("Calm".to_string()),
                ..ListQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(calm.total, 4);
        assert_eq!(store.count(Some("Tech"), Some("Epic")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_stats_top_counts() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path().join("intros.json")).await.unwrap();
        store.create(sample_intro("Tech", "Calm")).await.unwrap();
        store.create(sample_intro("Tech", "Epic")).await.unwrap();
        store.create(sample_intro("Music", "Epic")).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(
            stats.top_categories[0],
            CategoryCount {
                category: "Tech".to_string(),
                count: 2
            }
        );
        assert_eq!(stats.top_moods[0].mood, "Epic");
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("intros.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(JsonFileStore::open(&path).await, Err(StoreError::Json(_))));
    }
}
