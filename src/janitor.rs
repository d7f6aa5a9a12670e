use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of one sweep of the scratch directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted: usize,
    pub errors: usize,
}

/// Removes clip files from the scratch directory, on demand and by age
#[derive(Debug, Clone)]
pub struct TempFileJanitor {
    scratch_dir: PathBuf,
}

impl TempFileJanitor {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Delete one file. A file that is already gone is not an error; any
    /// other failure is logged and swallowed. Returns whether a file was removed.
    pub async fn delete_file(&self, path: &Path) -> bool {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(
                    "🗑️ Deleted: {}",
                    path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
                );
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                warn!("Failed to delete {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Delete every non-hidden file in the scratch directory whose last
    /// modification is older than `max_age`
    pub async fn sweep(&self, max_age: Duration) -> SweepReport {
        let mut report = SweepReport::default();

        if let Err(e) = tokio::fs::create_dir_all(&self.scratch_dir).await {
            warn!("❌ Cannot create scratch directory {}: {}", self.scratch_dir.display(), e);
            report.errors += 1;
            return report;
        }

        let mut entries = match tokio::fs::read_dir(&self.scratch_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("❌ Cannot list scratch directory {}: {}", self.scratch_dir.display(), e);
                report.errors += 1;
                return report;
            }
        };

        let now = SystemTime::now();

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Error reading scratch directory: {}", e);
                    report.errors += 1;
                    break;
                }
            };

            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }

            report.scanned += 1;
            let path = entry.path();

            let modified = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata.modified(),
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => Err(e),
            };

            let modified = match modified {
                Ok(modified) => modified,
                Err(e) => {
                    warn!("Error checking file {}: {}", path.display(), e);
                    report.errors += 1;
                    continue;
                }
            };

            // Future mtimes (clock skew) count as fresh.
            let age = now.duration_since(modified).unwrap_or_default();
            if age <= max_age {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => report.deleted += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Failed to delete {}: {}", path.display(), e);
                    report.errors += 1;
                }
            }
        }

        if report.deleted > 0 {
            info!("🧹 Cleanup complete: removed {} old file(s)", report.deleted);
        }

        report
    }

    /// Sweep now, then once per `interval`, for as long as the runtime lives
    pub fn schedule(&self, interval: Duration, max_age: Duration) -> JoinHandle<()> {
        let janitor = self.clone();
        info!(
            "🕐 Starting cleanup schedule: every {} minute(s), max age {} minute(s)",
            interval.as_secs() / 60,
            max_age.as_secs() / 60
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                // The first tick completes immediately.
                ticker.tick().await;
                let report = janitor.sweep(max_age).await;
                debug!("Sweep report: {:?}", report);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn write_aged(dir: &Path, name: &str, age: Duration) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
        path
    }

    #[tokio::test]
    async fn test_sweep_deletes_only_old_files() {
        let dir = TempDir::new().unwrap();
        let fresh = write_aged(dir.path(), "fresh.mp4", Duration::from_millis(300_000));
        let stale = write_aged(dir.path(), "stale.mp4", Duration::from_millis(900_000));
        let hidden = write_aged(dir.path(), ".gitkeep", Duration::from_secs(3600));

        let janitor = TempFileJanitor::new(dir.path());
        let report = janitor.sweep(Duration::from_millis(600_000)).await;

        assert_eq!(report.deleted, 1);
        assert_eq!(report.scanned, 2);
        assert_eq!(report.errors, 0);
        assert!(fresh.exists());
        assert!(!stale.exists());
        assert!(hidden.exists());
    }

    #[tokio::test]
    async fn test_sweep_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let scratch = dir.path().join("nested").join("temp");
        let janitor = TempFileJanitor::new(&scratch);

        let report = janitor.sweep(Duration::from_secs(600)).await;
        assert_eq!(report, SweepReport::default());
        assert!(scratch.is_dir());
    }

    #[tokio::test]
    async fn test_delete_file_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        tokio::fs::write(&path, b"data").await.unwrap();

        let janitor = TempFileJanitor::new(dir.path());
        assert!(janitor.delete_file(&path).await);
        assert!(!janitor.delete_file(&path).await);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_schedule_sweeps_immediately() {
        let dir = TempDir::new().unwrap();
        let stale = write_aged(dir.path(), "stale.mp4", Duration::from_secs(3600));

        let janitor = TempFileJanitor::new(dir.path());
        let handle = janitor.schedule(Duration::from_secs(3600), Duration::from_secs(60));

        for _ in 0..50 {
            if !stale.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();
        assert!(!stale.exists());
    }
}
