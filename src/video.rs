use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::AcquisitionConfig;
use crate::error::{AcquisitionError, ToolError};
use crate::process::{self, ToolLimits};

/// How the requested window is cut out of the downloaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Copy streams without re-encoding
    StreamCopy { avoid_negative_ts: bool },
    /// Re-encode with bounded CPU effort
    Reencode {
        preset: String,
        crf: u8,
        audio_bitrate: String,
    },
}

/// One entry of the acquisition strategy chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionStrategy {
    /// Short name used in scratch file names and logs
    pub label: String,
    /// Downloader format selector (`-f`)
    pub format_selector: String,
    pub extraction: ExtractionMode,
    pub download_timeout_secs: u64,
    pub extract_timeout_secs: u64,
    pub download_output_limit: usize,
    pub extract_output_limit: usize,
}

impl AcquisitionStrategy {
    fn download_limits(&self) -> ToolLimits {
        ToolLimits {
            timeout: Duration::from_secs(self.download_timeout_secs),
            max_output: self.download_output_limit,
        }
    }

    fn extract_limits(&self) -> ToolLimits {
        ToolLimits {
            timeout: Duration::from_secs(self.extract_timeout_secs),
            max_output: self.extract_output_limit,
        }
    }
}

/// A trimmed clip on local disk, owned by one pipeline invocation
#[derive(Debug, Clone, Serialize)]
pub struct AcquiredClip {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub strategy_index: usize,
    pub strategy_label: String,
}

/// Why a single strategy gave up
#[derive(Debug)]
enum StrategyFailure {
    Tool(ToolError),
    TooSmall { size: u64 },
    Missing,
}

impl StrategyFailure {
    fn is_timeout(&self) -> bool {
        matches!(self, StrategyFailure::Tool(ToolError::TimedOut { .. }))
    }

    /// Text the tool itself printed; synthetic failures have none
    fn diagnostics(&self) -> Option<&str> {
        match self {
            StrategyFailure::Tool(ToolError::Failed { diagnostics, .. }) => Some(diagnostics),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            StrategyFailure::Tool(e) => e.to_string(),
            StrategyFailure::TooSmall { size } => format!("output too small ({} bytes)", size),
            StrategyFailure::Missing => "no output file produced".to_string(),
        }
    }
}

static RESTRICTED: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)sign in|age[- ]restricted|members[- ]only|private video|confirm your age")
        .expect("valid restricted pattern")
});

static UNAVAILABLE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)unavailable|has been removed|does not exist|not available|HTTP Error 404")
        .expect("valid unavailable pattern")
});

static TIMEOUT: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?i)timed out|timeout").expect("valid timeout pattern"));

/// Classify the terminal failure from what the tools reported.
/// Access restrictions win over unavailability, which wins over timeouts.
fn classify_failures(failures: &[StrategyFailure]) -> AcquisitionError {
    let text = failures
        .iter()
        .filter_map(StrategyFailure::diagnostics)
        .collect::<Vec<_>>()
        .join("\n");

    if RESTRICTED.is_match(&text) {
        AcquisitionError::Restricted
    } else if UNAVAILABLE.is_match(&text) {
        AcquisitionError::Unavailable
    } else if failures.iter().any(StrategyFailure::is_timeout) || TIMEOUT.is_match(&text) {
        AcquisitionError::Timeout
    } else {
        let last = failures
            .last()
            .map(StrategyFailure::describe)
            .unwrap_or_else(|| "no acquisition strategies configured".to_string());
        AcquisitionError::Unknown(process::tail(&last, 300).to_string())
    }
}

static SCRATCH_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Collision-free scratch file stem for one invocation
fn scratch_stem(source_id: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let seq = SCRATCH_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}_{}_{}", source_id, millis, seq)
}

async fn remove_if_present(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("🗑️ Removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial output {}: {}", path.display(), e),
    }
}

/// Downloads a source and trims the requested window, walking the strategy
/// chain until one produces a plausible file
#[derive(Debug, Clone)]
pub struct ClipAcquirer {
    scratch_dir: PathBuf,
    downloader_bin: String,
    extractor_bin: String,
    min_output_bytes: u64,
    strategies: Vec<AcquisitionStrategy>,
}

impl ClipAcquirer {
    pub fn new(config: &AcquisitionConfig) -> Self {
        Self {
            scratch_dir: config.scratch_dir.clone(),
            downloader_bin: config.downloader_bin.clone(),
            extractor_bin: config.extractor_bin.clone(),
            min_output_bytes: config.min_output_bytes,
            strategies: config.strategies.clone(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn strategies(&self) -> &[AcquisitionStrategy] {
        &self.strategies
    }

    /// Produce a local file containing `[start, end)` of `source_url`.
    ///
    /// Only the winning strategy's trimmed file survives this call; every
    /// intermediate and partial output is deleted on the way.
    pub async fn acquire(
        &self,
        source_url: &str,
        start: u32,
        end: u32,
        source_id: &str,
    ) -> Result<AcquiredClip, AcquisitionError> {
        if end <= start {
            return Err(AcquisitionError::Unknown(format!(
                "invalid clip window {}s-{}s",
                start, end
            )));
        }

        tokio::fs::create_dir_all(&self.scratch_dir).await?;

        let stem = scratch_stem(source_id);
        let output_path = self.scratch_dir.join(format!("{}.mp4", stem));
        let duration = end - start;

        info!(
            "📥 Downloading {}: {}s - {}s ({}s)",
            source_id, start, end, duration
        );

        let mut failures = Vec::with_capacity(self.strategies.len());

        for (index, strategy) in self.strategies.iter().enumerate() {
            info!(
                "🎯 Strategy {}/{} ({}): format {}",
                index + 1,
                self.strategies.len(),
                strategy.label,
                strategy.format_selector
            );

            let full_path = self.scratch_dir.join(format!("{}_{}.mp4", stem, strategy.label));
            let outcome = self
                .run_strategy(strategy, source_url, start, duration, &full_path, &output_path)
                .await;
            remove_if_present(&full_path).await;

            match outcome {
                Ok(size_bytes) => {
                    info!(
                        "✅ Acquired {} with strategy {} ({:.2} MB)",
                        source_id,
                        strategy.label,
                        size_bytes as f64 / 1024.0 / 1024.0
                    );
                    return Ok(AcquiredClip {
                        path: output_path,
                        size_bytes,
                        strategy_index: index,
                        strategy_label: strategy.label.clone(),
                    });
                }
                Err(failure) => {
                    warn!(
                        "⚠️ Strategy {} failed: {}",
                        strategy.label,
                        process::tail(&failure.describe(), 200)
                    );
                    remove_if_present(&output_path).await;
                    failures.push(failure);
                }
            }
        }

        let error = classify_failures(&failures);
        warn!("❌ All download strategies failed for {}: {}", source_id, error);
        Err(error)
    }

    async fn run_strategy(
        &self,
        strategy: &AcquisitionStrategy,
        source_url: &str,
        start: u32,
        duration: u32,
        full_path: &Path,
        output_path: &Path,
    ) -> Result<u64, StrategyFailure> {
        let download_args = self.download_args(strategy, source_url, full_path);
        process::run_tool(&self.downloader_bin, &download_args, strategy.download_limits())
            .await
            .map_err(StrategyFailure::Tool)?;

        let extract_args = self.extract_args(strategy, full_path, start, duration, output_path);
        process::run_tool(&self.extractor_bin, &extract_args, strategy.extract_limits())
            .await
            .map_err(StrategyFailure::Tool)?;

        let size = match tokio::fs::metadata(output_path).await {
            Ok(metadata) => metadata.len(),
            Err(_) => return Err(StrategyFailure::Missing),
        };

        if size > self.min_output_bytes {
            Ok(size)
        } else {
            Err(StrategyFailure::TooSmall { size })
        }
    }

    fn download_args(&self, strategy: &AcquisitionStrategy, source_url: &str, full_path: &Path) -> Vec<String> {
        vec![
            "--no-playlist".to_string(),
            "--no-check-certificate".to_string(),
            "-f".to_string(),
            strategy.format_selector.clone(),
            "-o".to_string(),
            full_path.to_string_lossy().into_owned(),
            source_url.to_string(),
        ]
    }

    fn extract_args(
        &self,
        strategy: &AcquisitionStrategy,
        input: &Path,
        start: u32,
        duration: u32,
        output: &Path,
    ) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-ss".into(),
            start.to_string(),
            "-i".into(),
            input.to_string_lossy().into_owned(),
            "-t".into(),
            duration.to_string(),
        ];

        match &strategy.extraction {
            ExtractionMode::StreamCopy { avoid_negative_ts } => {
                args.extend(["-c".into(), "copy".into()]);
                if *avoid_negative_ts {
                    args.extend(["-avoid_negative_ts".into(), "make_zero".into()]);
                }
            }
            ExtractionMode::Reencode {
                preset,
                crf,
                audio_bitrate,
            } => {
                args.extend([
                    "-c:v".into(),
                    "libx264".into(),
                    "-preset".into(),
                    preset.clone(),
                    "-crf".into(),
                    crf.to_string(),
                    "-c:a".into(),
                    "aac".into(),
                    "-b:a".into(),
                    audio_bitrate.clone(),
                ]);
            }
        }

        args.extend(["-y".into(), output.to_string_lossy().into_owned()]);
        args
    }

    /// Startup check: are the downloader and extractor installed?
    pub async fn check_tools(&self) -> ToolStatus {
        ToolStatus {
            downloader: process::is_installed(&self.downloader_bin, "--version").await,
            extractor: process::is_installed(&self.extractor_bin, "-version").await,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub downloader: bool,
    pub extractor: bool,
}
