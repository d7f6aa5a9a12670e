//! Core data model: clip requests, analysis results and persisted intro records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use url::Url;

use crate::error::ValidationError;

static VIDEO_ID: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("valid video id pattern"));

/// Extract the YouTube video id from a watch, short-link, embed, `/v/` or
/// shorts URL. Returns `None` for anything else, including ids with
/// characters that would be unsafe in a file name.
pub fn extract_video_id(locator: &str) -> Option<String> {
    let locator = locator.trim();
    let parsed = Url::parse(locator)
        .or_else(|_| Url::parse(&format!("https://{}", locator)))
        .ok()?;

    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    let host = host.strip_prefix("m.").unwrap_or(host);

    let candidate = match host {
        "youtu.be" => parsed.path_segments()?.next().map(str::to_string),
        "youtube.com" | "music.youtube.com" | "youtube-nocookie.com" => {
            let mut segments = parsed.path_segments()?;
            match segments.next() {
                Some("watch") => parsed
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned()),
                Some("embed") | Some("v") | Some("shorts") => segments.next().map(str::to_string),
                _ => None,
            }
        }
        _ => None,
    }?;

    VIDEO_ID.is_match(&candidate).then_some(candidate)
}

/// A validated request to acquire one clip window from a source video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipRequest {
    source_url: String,
    source_id: String,
    start_time: u32,
    end_time: u32,
}

impl ClipRequest {
    /// Validate a raw clip window. `max_duration` is the configured cap in
    /// seconds; the window must satisfy `0 < end - start <= max_duration`.
    pub fn new(
        source_url: &str,
        start_time: i64,
        end_time: i64,
        max_duration: u32,
    ) -> Result<Self, ValidationError> {
        if source_url.trim().is_empty() {
            return Err(ValidationError::MissingField("videoUrl"));
        }
        let source_id = extract_video_id(source_url).ok_or(ValidationError::InvalidUrl)?;

        if start_time < 0 {
            return Err(ValidationError::NegativeStart);
        }
        if end_time <= start_time {
            return Err(ValidationError::InvalidTimeRange);
        }
        if end_time - start_time > i64::from(max_duration) {
            return Err(ValidationError::DurationExceeded { max: max_duration });
        }

        let start_time = u32::try_from(start_time)
            .map_err(|_| ValidationError::Invalid("Start time is out of range".to_string()))?;
        let end_time = u32::try_from(end_time)
            .map_err(|_| ValidationError::Invalid("End time is out of range".to_string()))?;

        Ok(Self {
            source_url: source_url.trim().to_string(),
            source_id,
            start_time,
            end_time,
        })
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn start_time(&self) -> u32 {
        self.start_time
    }

    pub fn end_time(&self) -> u32 {
        self.end_time
    }

    pub fn duration(&self) -> u32 {
        self.end_time - self.start_time
    }
}

/// Metadata chosen by whoever submitted the clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitterMetadata {
    pub channel_name: String,
    pub video_title: String,
    pub category: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

impl SubmitterMetadata {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.channel_name.trim().is_empty() {
            return Err(ValidationError::MissingField("channelName"));
        }
        if self.video_title.trim().is_empty() {
            return Err(ValidationError::MissingField("videoTitle"));
        }
        if self.category.trim().is_empty() {
            return Err(ValidationError::MissingField("category"));
        }
        Ok(())
    }
}

/// Raw submission as received from a caller, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub video_url: String,
    pub start_time: i64,
    pub end_time: i64,
    #[serde(flatten)]
    pub submitter: SubmitterMetadata,
}

/// Editing pace reported by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pace {
    Slow,
    Medium,
    Fast,
}

impl Pace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pace::Slow => "slow",
            Pace::Medium => "medium",
            Pace::Fast => "fast",
        }
    }
}

impl fmt::Display for Pace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "slow" => Ok(Pace::Slow),
            "medium" => Ok(Pace::Medium),
            "fast" => Ok(Pace::Fast),
            other => Err(format!("invalid pace: {}", other)),
        }
    }
}

/// Normalized output of one clip analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub description: String,
    pub mood: String,
    pub visual_style: String,
    pub pace: Pace,
    pub color_scheme: String,
    pub has_text: bool,
    pub has_person: bool,
    pub music_type: String,
    pub transition_count: u32,
    pub technical_details: String,
    pub keywords: Vec<String>,
}

impl AnalysisResult {
    pub fn has_music(&self) -> bool {
        !self.music_type.eq_ignore_ascii_case("none")
    }
}

/// Everything needed to persist a record; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIntro {
    pub video_url: String,
    pub video_id: String,
    pub start_time: u32,
    pub end_time: u32,
    pub duration: u32,
    pub thumbnail_url: String,
    pub channel_name: String,
    pub video_title: String,
    pub category: String,
    pub analysis: AnalysisResult,
}

impl NewIntro {
    pub fn new(request: &ClipRequest, submitter: &SubmitterMetadata, analysis: AnalysisResult) -> Self {
        let thumbnail_url = submitter
            .thumbnail_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!("https://i.ytimg.com/vi/{}/maxresdefault.jpg", request.source_id())
            });

        Self {
            video_url: request.source_url().to_string(),
            video_id: request.source_id().to_string(),
            start_time: request.start_time(),
            end_time: request.end_time(),
            duration: request.duration(),
            thumbnail_url,
            channel_name: submitter.channel_name.trim().to_string(),
            video_title: submitter.video_title.trim().to_string(),
            category: submitter.category.trim().to_string(),
            analysis,
        }
    }
}

/// A persisted, analyzed intro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntroRecord {
    pub id: u64,
    #[serde(flatten)]
    pub intro: NewIntro,
    pub created_at: DateTime<Utc>,
}

impl IntroRecord {
    pub fn analysis(&self) -> &AnalysisResult {
        &self.intro.analysis
    }

    pub fn category(&self) -> &str {
        &self.intro.category
    }

    pub fn channel_name(&self) -> &str {
        &self.intro.channel_name
    }

    pub fn duration(&self) -> u32 {
        self.intro.duration
    }
}
