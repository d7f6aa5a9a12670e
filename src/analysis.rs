//! Clip analysis through a multimodal model.
//!
//! The model is asked for a single JSON object. Replies are tolerated with
//! code fences or prose around the object; everything else is rejected.

use base64::Engine;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::AnalysisError;
use crate::llm::{LLMError, MediaAttachment, LLM};
use crate::models::{AnalysisResult, Pace};

/// Upper bound on text scanned for a JSON object
pub const MAX_SCAN_BYTES: usize = 1024 * 1024;

const MAX_KEYWORDS: usize = 7;
const MIN_KEYWORDS: usize = 5;

const ANALYSIS_PROMPT: &str = r#"You are an expert film director and cinematographer. Analyze this video intro with professional precision.

CRITICAL REQUIREMENT: Your response MUST be ONLY valid JSON. No markdown, no explanations, no prose outside the JSON structure.

Analyze the clip covering:

1. CINEMATOGRAPHY: camera angles, shot types, camera movement, focal depth, framing
2. EDITING: cut frequency, transition types, pacing rhythm, montage style
3. VISUAL DESIGN: color grading, lighting, dominant palette, contrast
4. MOTION GRAPHICS: text overlays, animated elements, typography
5. PRODUCTION QUALITY: polish, effects complexity, technical execution
6. EMOTIONAL TONE: mood, energy level, intended viewer response

Return this EXACT JSON structure:

{
  "description": "3-4 sentences describing HOW the intro is shot and edited: camera work, composition, editing rhythm and visual progression.",
  "mood": "Single word (Dramatic/Energetic/Calm/Mysterious/Epic/Intimate/Playful/Serious/Inspiring/Tense/etc)",
  "visualStyle": "Single descriptor (Cinematic/Documentary/Animated/Motion-Graphics/Minimalist/Stylized/Raw/Polished/Vintage/Modern/etc)",
  "pace": "slow or medium or fast",
  "colorScheme": "Dominant colors, contrast style and grading approach",
  "hasText": true or false,
  "hasPerson": true or false,
  "musicType": "Music genre or 'none' (Epic-Orchestral/Electronic/Ambient/Hip-hop/Rock/Acoustic/Upbeat/Dramatic/none)",
  "transitionCount": number_of_visible_cuts_or_transitions,
  "technicalDetails": "Camera techniques, effects, motion graphics, editing style and other notable technical choices",
  "keywords": ["5-7 descriptive tags covering style, mood, technique, genre, energy and distinctive elements"]
}

RESPONSE RULES:
- Output ONLY the JSON object
- Start the response with { and end it with }
- No markdown code blocks
- Keep description under 500 characters and technicalDetails under 400 characters
- Ensure valid JSON syntax"#;

/// Remove markdown code fences (```json ... ```) wrapped around a reply.
/// Only the fence tokens and the whitespace after them go; content on the
/// same line as a fence is kept.
pub fn strip_code_fences(text: &str) -> String {
    let mut rest = text.trim();
    let mut stripped = String::with_capacity(rest.len());

    while let Some(pos) = rest.find("```") {
        stripped.push_str(&rest[..pos]);
        rest = &rest[pos + 3..];
        rest = rest.strip_prefix("json").unwrap_or(rest).trim_start();
    }
    stripped.push_str(rest);

    stripped.trim().to_string()
}

/// Find the first balanced `{...}` span.
///
/// Braces inside JSON strings (including escaped quotes) do not count. The
/// scan stops after `MAX_SCAN_BYTES`, so a reply that never closes its
/// object cannot make this quadratic or unbounded.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let limit = bytes.len().min(start.saturating_add(MAX_SCAN_BYTES));

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..limit].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse a reply into a JSON object map
pub(crate) fn parse_json_reply(reply: &str) -> Result<Map<String, Value>, AnalysisError> {
    let cleaned = strip_code_fences(reply);
    let candidate = extract_json_object(&cleaned).ok_or_else(|| {
        AnalysisError::MalformedResponse("no JSON object found in response".to_string())
    })?;

    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AnalysisError::MalformedResponse("response is not a JSON object".to_string())),
        Err(e) => Err(AnalysisError::MalformedResponse(e.to_string())),
    }
}

/// Required string field: absent, null or blank counts as missing
pub(crate) fn required_str(map: &Map<String, Value>, key: &str) -> Result<String, AnalysisError> {
    match map.get(key) {
        None | Some(Value::Null) => Err(AnalysisError::MissingField(key.to_string())),
        Some(Value::String(s)) if s.trim().is_empty() => Err(AnalysisError::MissingField(key.to_string())),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(other) => Err(AnalysisError::MalformedResponse(format!(
            "field {} should be a string, got {}",
            key, other
        ))),
    }
}

pub(crate) fn optional_str(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn transition_count(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f.round() as u64))
            .map(|n| n.min(u32::MAX as u64) as u32)
            .unwrap_or(0),
        _ => 0,
    }
}

/// Validate and normalize a model reply into an `AnalysisResult`
pub fn parse_analysis(reply: &str) -> Result<AnalysisResult, AnalysisError> {
    let map = parse_json_reply(reply)?;

    let description = required_str(&map, "description")?;
    let mood = required_str(&map, "mood")?;
    let visual_style = required_str(&map, "visualStyle")?;
    let pace_text = required_str(&map, "pace")?;
    let color_scheme = required_str(&map, "colorScheme")?;

    let mut keywords = match map.get("keywords") {
        None | Some(Value::Null) => return Err(AnalysisError::MissingField("keywords".to_string())),
        Some(Value::Array(_)) => string_list(map.get("keywords")),
        Some(other) => {
            return Err(AnalysisError::MalformedResponse(format!(
                "field keywords should be an array, got {}",
                other
            )))
        }
    };
    if keywords.is_empty() {
        return Err(AnalysisError::MissingField("keywords".to_string()));
    }

    let pace: Pace = pace_text.parse().map_err(AnalysisError::MalformedResponse)?;

    if keywords.len() > MAX_KEYWORDS {
        debug!("Truncating {} keywords to {}", keywords.len(), MAX_KEYWORDS);
        keywords.truncate(MAX_KEYWORDS);
    } else if keywords.len() < MIN_KEYWORDS {
        warn!("Model returned only {} keywords", keywords.len());
    }

    Ok(AnalysisResult {
        description,
        mood,
        visual_style,
        pace,
        color_scheme,
        has_text: map.get("hasText").and_then(Value::as_bool).unwrap_or(false),
        has_person: map.get("hasPerson").and_then(Value::as_bool).unwrap_or(false),
        music_type: optional_str(&map, "musicType").unwrap_or_else(|| "none".to_string()),
        transition_count: transition_count(map.get("transitionCount")),
        technical_details: optional_str(&map, "technicalDetails")
            .unwrap_or_else(|| "No special effects detected".to_string()),
        keywords,
    })
}

impl From<LLMError> for AnalysisError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::QuotaExceeded(_) => AnalysisError::QuotaExceeded,
            LLMError::InvalidCredential(_) | LLMError::Configuration(_) => AnalysisError::InvalidCredential,
            other => {
                let message = other.to_string();
                if message.contains("quota") {
                    AnalysisError::QuotaExceeded
                } else if message.contains("API key") {
                    AnalysisError::InvalidCredential
                } else {
                    AnalysisError::Generic(message)
                }
            }
        }
    }
}

/// Sends clips to the model and turns replies into `AnalysisResult`s
#[derive(Clone)]
pub struct ContentAnalyzer {
    llm: Arc<dyn LLM>,
}

impl ContentAnalyzer {
    pub fn new(llm: Arc<dyn LLM>) -> Self {
        Self { llm }
    }

    pub fn llm(&self) -> &Arc<dyn LLM> {
        &self.llm
    }

    /// Analyze the clip at `path`. No retry: one remote call per invocation.
    pub async fn analyze(&self, path: &Path) -> Result<AnalysisResult, AnalysisError> {
        let video = tokio::fs::read(path).await?;
        info!(
            "🤖 Analyzing clip {} ({:.2} MB)",
            path.display(),
            video.len() as f64 / 1024.0 / 1024.0
        );

        let attachment = MediaAttachment {
            mime_type: "video/mp4".to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(&video),
        };
        drop(video);

        let start_time = Instant::now();
        let response = match self.llm.generate(ANALYSIS_PROMPT, Some(&attachment)).await {
            Ok(response) => response,
            Err(e) => {
                error!("❌ Model request failed: {}", e);
                return Err(e.into());
            }
        };

        debug!(
            "Model responded in {:.1}s ({} chars, {:?} tokens)",
            start_time.elapsed().as_secs_f64(),
            response.content.len(),
            response.tokens_used
        );

        let analysis = parse_analysis(&response.content).inspect_err(|e| {
            warn!("Rejected model response: {}", e);
        })?;

        info!(
            "📊 Mood: {} | Style: {} | Pace: {}",
            analysis.mood, analysis.visual_style, analysis.pace
        );
        info!("🏷️ Tags: {}", analysis.keywords.join(", "));

        Ok(analysis)
    }

    /// Startup check that the model answers at all
    pub async fn test_connection(&self) -> bool {
        self.llm.is_available().await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::llm::scripted::ScriptedLLM;
    use tempfile::TempDir;

    pub(crate) const VALID_REPLY: &str = r#"{
        "description": "Fast cuts between aerial shots of a neon city.",
        "mood": "Energetic",
        "visualStyle": "Cinematic",
        "pace": "fast",
        "colorScheme": "Neon blue and magenta",
        "hasText": true,
        "musicType": "Electronic",
        "transitionCount": 14,
        "keywords": ["neon", "city", "aerial", "night", "synthwave"]
    }"#;

    #[test]
    fn test_valid_reply_applies_defaults() {
        let analysis = parse_analysis(VALID_REPLY).unwrap();
        assert_eq!(analysis.pace, Pace::Fast);
        assert!(analysis.has_text);
        assert!(!analysis.has_person);
        assert!(analysis.has_music());
        assert_eq!(analysis.transition_count, 14);
        assert_eq!(analysis.technical_details, "No special effects detected");
        assert_eq!(analysis.keywords.len(), 5);
    }

    #[test]
    fn test_missing_mood_is_reported() {
        let reply = r#"{"description":"d","visualStyle":"Raw","pace":"slow","colorScheme":"grey","keywords":["a"]}"#;
        let err = parse_analysis(reply).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingField(ref f) if f == "mood"));
        assert_eq!(err.to_string(), "missing field: mood");

        let blank = r#"{"description":"d","mood":"  ","visualStyle":"Raw","pace":"slow","colorScheme":"grey","keywords":["a"]}"#;
        assert!(matches!(parse_analysis(blank), Err(AnalysisError::MissingField(_))));

        let no_keywords = r#"{"description":"d","mood":"Calm","visualStyle":"Raw","pace":"slow","colorScheme":"grey","keywords":[]}"#;
        assert!(matches!(
            parse_analysis(no_keywords),
            Err(AnalysisError::MissingField(ref f)) if f == "keywords"
        ));
    }

    #[test]
    fn test_fenced_reply_with_prose() {
        let reply = format!(
            "Sure! Here is the analysis you asked for:\n```json\n{}\n```\nLet me know if you need more.",
            VALID_REPLY
        );
        let analysis = parse_analysis(&reply).unwrap();
        assert_eq!(analysis.mood, "Energetic");
    }

    #[test]
    fn test_fence_on_same_line_as_json() {
        let reply = r#"```json {"description":"d","mood":"Calm","visualStyle":"Raw","pace":"slow","colorScheme":"grey","keywords":["a","b","c","d","e"]} ```"#;
        let analysis = parse_analysis(reply).unwrap();
        assert_eq!(analysis.mood, "Calm");
        assert_eq!(analysis.pace, Pace::Slow);

        assert_eq!(strip_code_fences("```{\"a\": 1}```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("no fences"), "no fences");
    }

    #[test]
    fn test_invalid_pace_and_non_json() {
        let reply = VALID_REPLY.replace("\"fast\"", "\"frantic\"");
        assert!(matches!(parse_analysis(&reply), Err(AnalysisError::MalformedResponse(_))));
        assert!(matches!(
            parse_analysis("I cannot analyze this video."),
            Err(AnalysisError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_keywords_truncated() {
        let reply = VALID_REPLY.replace(
            r#"["neon", "city", "aerial", "night", "synthwave"]"#,
            r#"["a1", "a2", "a3", "a4", "a5", "a6", "a7", "a8", "a9"]"#,
        );
        let analysis = parse_analysis(&reply).unwrap();
        assert_eq!(analysis.keywords, vec!["a1", "a2", "a3", "a4", "a5", "a6", "a7"]);
    }

    #[test]
    fn test_extract_json_ignores_braces_in_strings() {
        let text = r#"prefix {"a": "close } and open {", "b": "quote \" }"} trailing }"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"a": "close } and open {", "b": "quote \" }"}"#)
        );
        assert_eq!(extract_json_object("{ never closed"), None);
        assert_eq!(extract_json_object("no braces"), None);
    }

    #[test]
    fn test_extract_json_scan_is_bounded() {
        let text = format!("{{\"a\": \"{}\"}}", "x".repeat(MAX_SCAN_BYTES + 10));
        assert_eq!(extract_json_object(&text), None);
    }

    #[test]
    fn test_llm_error_mapping() {
        assert!(matches!(
            AnalysisError::from(LLMError::QuotaExceeded("429".to_string())),
            AnalysisError::QuotaExceeded
        ));
        assert!(matches!(
            AnalysisError::from(LLMError::InvalidCredential("bad".to_string())),
            AnalysisError::InvalidCredential
        ));
        let err = AnalysisError::from(LLMError::Api {
            status: 500,
            message: "backend".to_string(),
        });
        assert!(err.to_string().starts_with("AI analysis failed:"));
    }

    #[tokio::test]
    async fn test_analyze_sends_clip_inline() {
        let dir = TempDir::new().unwrap();
        let clip = dir.path().join("clip.mp4");
        tokio::fs::write(&clip, vec![0u8; 2048]).await.unwrap();

        let llm = Arc::new(ScriptedLLM::replying(VALID_REPLY));
        let analyzer = ContentAnalyzer::new(llm.clone());
        let analysis = analyzer.analyze(&clip).await.unwrap();

        assert_eq!(analysis.visual_style, "Cinematic");
        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].1, "clip should be attached");
    }

    #[tokio::test]
    async fn test_analyze_missing_file() {
        let analyzer = ContentAnalyzer::new(Arc::new(ScriptedLLM::replying(VALID_REPLY)));
        let err = analyzer.analyze(Path::new("/nonexistent/clip.mp4")).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Io(_)));
    }
}
