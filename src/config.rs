use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::llm::LLMConfig;
use crate::video::{AcquisitionStrategy, ExtractionMode};

const CONFIG_PATHS: [&str; 3] = [
    "intro-analyzer.toml",
    "config/intro-analyzer.toml",
    "/etc/intro-analyzer/config.toml",
];

/// Configuration for the intro analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Clip download and trimming
    pub acquisition: AcquisitionConfig,

    /// Remote model used for analysis
    pub llm: LLMConfig,

    /// Scratch directory sweeping
    pub janitor: JanitorConfig,

    /// Record persistence
    pub storage: StorageConfig,

    /// HTTP surface
    pub server: ServerConfig,

    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Directory for intermediate and trimmed clips
    pub scratch_dir: PathBuf,

    /// Downloader executable (yt-dlp compatible)
    pub downloader_bin: String,

    /// Extraction executable (ffmpeg compatible)
    pub extractor_bin: String,

    /// Outputs at or below this size are treated as failed
    pub min_output_bytes: u64,

    /// Longest clip window accepted, in seconds
    pub max_clip_seconds: u32,

    /// Strategy chain, most compatible first
    pub strategies: Vec<AcquisitionStrategy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JanitorConfig {
    /// Minutes between scratch sweeps
    pub interval_minutes: u64,

    /// Files older than this are swept
    pub max_age_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file holding intro records
    pub data_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Pipeline invocations allowed to run at once
    pub max_concurrent_ingests: usize,

    /// Include tool, provider and storage error details in responses
    pub expose_internal_errors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when RUST_LOG is unset
    pub level: String,
}

impl JanitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_minutes * 60)
    }
}

impl Config {
    /// First existing file among the standard config locations
    pub fn find_file() -> Option<PathBuf> {
        CONFIG_PATHS.iter().map(PathBuf::from).find(|path| path.exists())
    }

    /// Load the first config file found, falling back to defaults.
    /// Environment overrides are applied in both cases; a file that does
    /// not parse is an error rather than a silent fallback.
    pub fn load() -> Result<Self> {
        match Self::find_file() {
            Some(path) => Self::load_from(&path),
            None => Self::from_env(),
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Defaults plus environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("INTRO_ANALYZER_SCRATCH_DIR") {
            self.acquisition.scratch_dir = PathBuf::from(dir);
        }

        if let Ok(file) = std::env::var("INTRO_ANALYZER_DATA_FILE") {
            self.storage.data_file = PathBuf::from(file);
        }

        if let Ok(level) = std::env::var("INTRO_ANALYZER_LOG_LEVEL") {
            self.logging.level = level;
        }

        let port = std::env::var("INTRO_ANALYZER_PORT").or_else(|_| std::env::var("PORT"));
        if let Ok(port) = port {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid port override: {}", port))?;
        }

        if let Ok(api_key) = std::env::var("GEMINI_API_KEY") {
            if !api_key.trim().is_empty() {
                self.llm.api_key = Some(api_key);
            }
        }

        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            self.llm.model = model;
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Check policy values against their accepted ranges
    pub fn validate(&self) -> Result<()> {
        let acquisition = &self.acquisition;

        if !(1..=300).contains(&acquisition.max_clip_seconds) {
            return Err(anyhow!("max_clip_seconds must be between 1 and 300"));
        }

        if acquisition.min_output_bytes == 0 {
            return Err(anyhow!("min_output_bytes must be greater than 0"));
        }

        if acquisition.strategies.is_empty() {
            return Err(anyhow!("at least one acquisition strategy is required"));
        }

        for strategy in &acquisition.strategies {
            for (name, secs) in [
                ("download_timeout_secs", strategy.download_timeout_secs),
                ("extract_timeout_secs", strategy.extract_timeout_secs),
            ] {
                if !(1..=600).contains(&secs) {
                    return Err(anyhow!(
                        "strategy '{}': {} must be between 1 and 600",
                        strategy.label,
                        name
                    ));
                }
            }
            if strategy.download_output_limit == 0 || strategy.extract_output_limit == 0 {
                return Err(anyhow!("strategy '{}': output limits must be non-zero", strategy.label));
            }
            if strategy.format_selector.trim().is_empty() {
                return Err(anyhow!("strategy '{}': format_selector is empty", strategy.label));
            }
        }

        if self.janitor.interval_minutes == 0 {
            return Err(anyhow!("janitor interval_minutes must be at least 1"));
        }

        if self.server.max_concurrent_ingests == 0 {
            return Err(anyhow!("max_concurrent_ingests must be greater than 0"));
        }

        if self.llm.timeout_seconds == 0 {
            return Err(anyhow!("llm timeout_seconds must be greater than 0"));
        }

        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Intro Analyzer Configuration:\n\
            - Scratch Directory: {}\n\
            - Data File: {}\n\
            - Strategies: {}\n\
            - Max Clip Length: {}s\n\
            - Model: {:?} / {}\n\
            - Janitor: every {}min, max age {}min",
            self.acquisition.scratch_dir.display(),
            self.storage.data_file.display(),
            self.acquisition
                .strategies
                .iter()
                .map(|s| s.label.as_str())
                .collect::<Vec<_>>()
                .join(" → "),
            self.acquisition.max_clip_seconds,
            self.llm.provider,
            self.llm.model,
            self.janitor.interval_minutes,
            self.janitor.max_age_minutes,
        )
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("./temp"),
            downloader_bin: "yt-dlp".to_string(),
            extractor_bin: "ffmpeg".to_string(),
            min_output_bytes: 1000,
            max_clip_seconds: 60,
            strategies: vec![
                AcquisitionStrategy {
                    label: "f18".to_string(),
                    format_selector: "18".to_string(),
                    extraction: ExtractionMode::StreamCopy { avoid_negative_ts: true },
                    download_timeout_secs: 120,
                    extract_timeout_secs: 30,
                    download_output_limit: 50 * 1024 * 1024,
                    extract_output_limit: 20 * 1024 * 1024,
                },
                AcquisitionStrategy {
                    label: "best".to_string(),
                    format_selector: "bestvideo[height<=480]+bestaudio/best[height<=480]/18".to_string(),
                    extraction: ExtractionMode::Reencode {
                        preset: "ultrafast".to_string(),
                        crf: 28,
                        audio_bitrate: "128k".to_string(),
                    },
                    download_timeout_secs: 120,
                    extract_timeout_secs: 60,
                    download_output_limit: 50 * 1024 * 1024,
                    extract_output_limit: 30 * 1024 * 1024,
                },
                AcquisitionStrategy {
                    label: "worst".to_string(),
                    format_selector: "worst".to_string(),
                    extraction: ExtractionMode::StreamCopy { avoid_negative_ts: false },
                    download_timeout_secs: 90,
                    extract_timeout_secs: 30,
                    download_output_limit: 50 * 1024 * 1024,
                    extract_output_limit: 20 * 1024 * 1024,
                },
            ],
        }
    }
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 5,
            max_age_minutes: 10,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("./data/intros.json"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_concurrent_ingests: num_cpus::get().min(4),
            expose_internal_errors: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            acquisition: AcquisitionConfig::default(),
            llm: LLMConfig::default(),
            janitor: JanitorConfig::default(),
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_scratch_dir(mut self, dir: PathBuf) -> Self {
        self.config.acquisition.scratch_dir = dir;
        self
    }

    pub fn with_data_file(mut self, file: PathBuf) -> Self {
        self.config.storage.data_file = file;
        self
    }

    pub fn with_tools(mut self, downloader: &str, extractor: &str) -> Self {
        self.config.acquisition.downloader_bin = downloader.to_string();
        self.config.acquisition.extractor_bin = extractor.to_string();
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<AcquisitionStrategy>) -> Self {
        self.config.acquisition.strategies = strategies;
        self
    }

    pub fn with_max_clip_seconds(mut self, seconds: u32) -> Self {
        self.config.acquisition.max_clip_seconds = seconds;
        self
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.config.llm.api_key = Some(api_key);
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
