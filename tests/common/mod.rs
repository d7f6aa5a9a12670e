#![allow(dead_code)]

use std::path::{Path, PathBuf};

use intro_analyzer::config::{Config, ConfigBuilder};
pub use intro_analyzer::llm::scripted::ScriptedLLM;
use intro_analyzer::video::{AcquisitionStrategy, ExtractionMode};

pub const ANALYSIS_REPLY: &str = r#"Here you go:
```json
{
  "description": "Quick cuts across a glowing city skyline at night.",
  "mood": "Energetic",
  "visualStyle": "Cinematic",
  "pace": "fast",
  "colorScheme": "Neon magenta and deep blue",
  "hasText": true,
  "hasPerson": false,
  "musicType": "Electronic",
  "transitionCount": 9,
  "technicalDetails": "Speed ramps and light leaks",
  "keywords": ["neon", "city", "night", "synthwave", "fast"]
}
```"#;

/// Write an executable shell script
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Downloader that writes `bytes` bytes to its `-o` argument
pub fn downloader_writing(bytes: usize) -> String {
    format!(
        r#"out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; shift; fi
  shift
done
head -c {} /dev/zero > "$out""#,
        bytes
    )
}

/// Extractor that writes `bytes` bytes to its last argument
pub fn extractor_writing(bytes: usize) -> String {
    format!(
        r#"for last; do :; done
head -c {} /dev/zero > "$last""#,
        bytes
    )
}

pub fn quick_strategies() -> Vec<AcquisitionStrategy> {
    let strategy = |label: &str, extraction: ExtractionMode| AcquisitionStrategy {
        label: label.to_string(),
        format_selector: label.to_string(),
        extraction,
        download_timeout_secs: 5,
        extract_timeout_secs: 5,
        download_output_limit: 64 * 1024,
        extract_output_limit: 64 * 1024,
    };

    vec![
        strategy("f18", ExtractionMode::StreamCopy { avoid_negative_ts: true }),
        strategy(
            "best",
            ExtractionMode::Reencode {
                preset: "ultrafast".to_string(),
                crf: 28,
                audio_bitrate: "128k".to_string(),
            },
        ),
        strategy("worst", ExtractionMode::StreamCopy { avoid_negative_ts: false }),
    ]
}

/// Configuration pointing at fake tools inside `root`
pub fn test_config(root: &Path, downloader: &Path, extractor: &Path) -> Config {
    ConfigBuilder::new()
        .with_scratch_dir(root.join("temp"))
        .with_data_file(root.join("data").join("intros.json"))
        .with_tools(&downloader.to_string_lossy(), &extractor.to_string_lossy())
        .with_strategies(quick_strategies())
        .build()
}

/// Visible files left in a directory
pub fn files_in(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| !n.starts_with('.'))
            .collect(),
        Err(_) => Vec::new(),
    }
}
