//! Visual direction documents: a production brief for a new intro, written
//! by the model from three reference intros and a free-text request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::analysis::{parse_json_reply, required_str, string_list};
use crate::error::{AnalysisError, PipelineError, ValidationError};
use crate::llm::LLM;
use crate::models::IntroRecord;
use crate::store::IntroStore;

/// Number of reference intros a direction is built from
pub const REFERENCE_COUNT: usize = 3;

fn default_duration() -> u32 {
    15
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionPreferences {
    /// Target intro length in seconds
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default = "default_true")]
    pub include_text: bool,
    #[serde(default)]
    pub include_person: bool,
}

impl Default for DirectionPreferences {
    fn default() -> Self {
        Self {
            duration: default_duration(),
            include_text: true,
            include_person: false,
        }
    }
}

/// One timeline section of the brief
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DirectionSection {
    pub timecode: String,
    pub description: String,
    pub visual_style: String,
    pub camera_work: String,
    pub effects: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualDirection {
    pub title: String,
    pub overview_summary: String,
    pub sections: Vec<DirectionSection>,
    pub cinematography: Value,
    pub editing: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion_graphics: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_suggestions: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspiration_breakdown: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production_notes: Option<Value>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A direction ready to be stored
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDirection {
    pub user_description: String,
    pub selected_intro_ids: Vec<u64>,
    #[serde(default)]
    pub preferences: DirectionPreferences,
    #[serde(rename = "generatedVD")]
    pub generated: VisualDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionRecord {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub direction: NewDirection,
}

impl DirectionRecord {
    pub fn title(&self) -> &str {
        &self.direction.generated.title
    }
}

fn required_object(map: &serde_json::Map<String, Value>, key: &str) -> Result<Value, AnalysisError> {
    match map.get(key) {
        None | Some(Value::Null) => Err(AnalysisError::MissingField(key.to_string())),
        Some(value @ Value::Object(_)) => Ok(value.clone()),
        Some(other) => Err(AnalysisError::MalformedResponse(format!(
            "field {} should be an object, got {}",
            key, other
        ))),
    }
}

fn optional_object(map: &serde_json::Map<String, Value>, key: &str) -> Option<Value> {
    map.get(key).filter(|v| v.is_object()).cloned()
}

/// Validate a model reply into a `VisualDirection`
pub fn parse_direction(reply: &str) -> Result<VisualDirection, AnalysisError> {
    let map = parse_json_reply(reply)?;

    let title = required_str(&map, "title")?;
    let overview_summary = required_str(&map, "overviewSummary")?;

    let sections = match map.get("sections") {
        Some(Value::Array(items)) if !items.is_empty() => items
            .iter()
            .map(|item| serde_json::from_value::<DirectionSection>(item.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AnalysisError::MalformedResponse(format!("invalid section: {}", e)))?,
        Some(Value::Array(_)) | None | Some(Value::Null) => {
            return Err(AnalysisError::MissingField("sections".to_string()))
        }
        Some(other) => {
            return Err(AnalysisError::MalformedResponse(format!(
                "field sections should be an array, got {}",
                other
            )))
        }
    };

    Ok(VisualDirection {
        title,
        overview_summary,
        sections,
        cinematography: required_object(&map, "cinematography")?,
        editing: required_object(&map, "editing")?,
        motion_graphics: optional_object(&map, "motionGraphics"),
        audio_suggestions: optional_object(&map, "audioSuggestions"),
        inspiration_breakdown: optional_object(&map, "inspirationBreakdown"),
        production_notes: optional_object(&map, "productionNotes"),
        keywords: string_list(map.get("keywords")),
    })
}

/// Prompt for one generation request
pub fn build_prompt(selected: &[IntroRecord], description: &str, preferences: &DirectionPreferences) -> String {
    let mut prompt = String::with_capacity(4096);
    prompt.push_str(
        "You are a professional film director and motion graphics designer specializing in video intro creation.\n\n",
    );
    let _ = writeln!(prompt, "USER'S REQUEST:\n\"{}\"\n", description.trim());
    let _ = writeln!(
        prompt,
        "USER PREFERENCES:\n- Target Duration: {} seconds\n- Include Text: {}\n- Include Person: {}\n",
        preferences.duration, preferences.include_text, preferences.include_person
    );
    prompt.push_str("REFERENCE INTROS (Selected by User):\n");

    for (i, record) in selected.iter().enumerate() {
        let intro = &record.intro;
        let analysis = &intro.analysis;
        let _ = writeln!(
            prompt,
            "\nINTRO {}: \"{}\" by {}\n- Category: {}\n- Duration: {}s\n- AI Description: {}\n- Mood: {}\n- Visual Style: {}\n- Pace: {}\n- Color Scheme: {}\n- Has Text: {}\n- Has Person: {}\n- Music Type: {}\n- Transition Count: {}\n- AI Tags: {}",
            i + 1,
            intro.video_title,
            intro.channel_name,
            intro.category,
            intro.duration,
            analysis.description,
            analysis.mood,
            analysis.visual_style,
            analysis.pace,
            analysis.color_scheme,
            analysis.has_text,
            analysis.has_person,
            if analysis.has_music() { "Present" } else { "None" },
            analysis.transition_count,
            analysis.keywords.join(", "),
        );
    }

    prompt.push_str(DIRECTION_INSTRUCTIONS);
    prompt
}

const DIRECTION_INSTRUCTIONS: &str = r#"
YOUR TASK:
Create a Visual Direction document for a custom intro that:
1. Combines the best elements from the 3 reference intros
2. Aligns with the user's description and preferences
3. Gives specific, actionable direction to an editor or director

Return ONLY valid JSON in this EXACT structure:
{
  "title": "Brief catchy title",
  "overviewSummary": "2-3 sentence overview of the concept",
  "sections": [
    {
      "timecode": "0:00 - 0:XX",
      "description": "What happens in this section",
      "visualStyle": "Colors, composition, mood",
      "cameraWork": "Angles, movements, framing",
      "effects": "Transitions, graphics, overlays"
    }
  ],
  "cinematography": {
    "shotTypes": ["3-5 shot types"],
    "cameraMovements": ["2-4 camera movements"],
    "lighting": "lighting description",
    "colorGrading": "color grading approach"
  },
  "editing": {
    "pace": "pace description",
    "transitions": "transition types and when to use them",
    "rhythm": "rhythmic structure and timing",
    "cuts": estimated_number_of_cuts
  },
  "motionGraphics": {
    "textStyle": "typography style",
    "animations": "animation approach",
    "graphicElements": ["3-5 graphic elements"],
    "typography": "text element count and treatment"
  },
  "audioSuggestions": {
    "musicType": "genre or style",
    "soundDesign": "sound effects and audio elements",
    "tempo": "BPM range or tempo",
    "structure": "audio structure breakdown"
  },
  "inspirationBreakdown": {
    "fromIntro1": "elements borrowed from the first intro",
    "fromIntro2": "elements borrowed from the second intro",
    "fromIntro3": "elements borrowed from the third intro"
  },
  "productionNotes": {
    "estimatedComplexity": "Low/Medium/Medium-High/High",
    "recommendedTools": ["2-4 software tools"],
    "shootingRequirements": "what needs to be filmed or captured",
    "timeEstimate": "realistic production time"
  },
  "keywords": ["5-7 descriptive tags"]
}

CRITICAL RULES:
- Return ONLY the JSON object, starting with { and ending with }
- No markdown code blocks, no explanations
- Section timecodes must add up to the target duration
- Use proper JSON syntax throughout"#;

/// Writes visual directions with the model and stores them
#[derive(Clone)]
pub struct DirectionGenerator {
    llm: Arc<dyn LLM>,
}

impl DirectionGenerator {
    pub fn new(llm: Arc<dyn LLM>) -> Self {
        Self { llm }
    }

    /// Generate a direction from already-resolved reference records
    pub async fn generate(
        &self,
        selected: &[IntroRecord],
        description: &str,
        preferences: &DirectionPreferences,
    ) -> Result<VisualDirection, AnalysisError> {
        info!(
            "🎬 Generating visual direction from {} intro(s): \"{}\"",
            selected.len(),
            description
        );

        let prompt = build_prompt(selected, description, preferences);
        let response = self.llm.generate(&prompt, None).await.map_err(|e| {
            error!("❌ Visual direction request failed: {}", e);
            AnalysisError::from(e)
        })?;

        let direction = parse_direction(&response.content)?;
        info!(
            "✅ Visual direction \"{}\" with {} section(s)",
            direction.title,
            direction.sections.len()
        );
        Ok(direction)
    }

    /// Validate the request, resolve the ids, generate and persist.
    /// Returns the stored record and the generation time in seconds.
    pub async fn generate_for_ids(
        &self,
        store: &dyn IntroStore,
        intro_ids: &[u64],
        description: &str,
        preferences: DirectionPreferences,
    ) -> Result<(DirectionRecord, f64), PipelineError> {
        if intro_ids.len() != REFERENCE_COUNT {
            return Err(ValidationError::Invalid(format!(
                "Exactly {} intro IDs must be selected",
                REFERENCE_COUNT
            ))
            .into());
        }
        if description.trim().is_empty() {
            return Err(ValidationError::Invalid("User description is required".to_string()).into());
        }

        let mut selected = Vec::with_capacity(REFERENCE_COUNT);
        for &id in intro_ids {
            match store.get(id).await? {
                Some(record) => selected.push(record),
                None => {
                    return Err(ValidationError::Invalid(format!("Intro with ID {} not found", id)).into())
                }
            }
        }

        let start_time = Instant::now();
        let generated = self.generate(&selected, description, &preferences).await?;
        let elapsed = start_time.elapsed().as_secs_f64();

        let record = store
            .save_direction(NewDirection {
                user_description: description.trim().to_string(),
                selected_intro_ids: intro_ids.to_vec(),
                preferences,
                generated,
            })
            .await?;

        info!("✅ Visual direction {} generated in {:.1}s", record.id, elapsed);
        Ok((record, elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::ScriptedLLM;
    use crate::error::ErrorKind;
    use crate::store::tests::sample_intro;
    use crate::store::JsonFileStore;
    use tempfile::TempDir;

    const DIRECTION_REPLY: &str = r#"```json
    {
      "title": "Neon Pulse",
      "overviewSummary": "A fast neon-lit opener.",
      "sections": [
        {"timecode": "0:00 - 0:05", "description": "City flyover", "cameraWork": "Drone push-in"},
        {"timecode": "0:05 - 0:15", "description": "Logo reveal"}
      ],
      "cinematography": {"shotTypes": ["wide"], "lighting": "Neon"},
      "editing": {"pace": "fast", "cuts": 12},
      "productionNotes": {"estimatedComplexity": "Medium"},
      "keywords": ["neon", "city"]
    }
    ```"#;

    #[test]
    fn test_parse_direction() {
        let direction = parse_direction(DIRECTION_REPLY).unwrap();
        assert_eq!(direction.title, "Neon Pulse");
        assert_eq!(direction.sections.len(), 2);
        assert_eq!(direction.sections[0].camera_work, "Drone push-in");
        assert_eq!(direction.sections[1].effects, "");
        assert_eq!(direction.editing["cuts"], 12);
        assert!(direction.motion_graphics.is_none());
        assert!(direction.production_notes.is_some());
    }

    #[test]
    fn test_parse_direction_requires_sections() {
        let reply = r#"{"title":"T","overviewSummary":"O","sections":[],"cinematography":{},"editing":{}}"#;
        assert!(matches!(
            parse_direction(reply),
            Err(AnalysisError::MissingField(ref f)) if f == "sections"
        ));

        let reply = r#"{"title":"T","overviewSummary":"O","sections":[{}],"cinematography":{}}"#;
        assert!(matches!(
            parse_direction(reply),
            Err(AnalysisError::MissingField(ref f)) if f == "editing"
        ));
    }

    #[test]
    fn test_parse_single_line_fenced_direction() {
        let reply = r#"```json {"title":"T","overviewSummary":"O","sections":[{"timecode":"0:00"}],"cinematography":{},"editing":{}} ```"#;
        let direction = parse_direction(reply).unwrap();
        assert_eq!(direction.title, "T");
        assert_eq!(direction.sections[0].timecode, "0:00");
    }

    #[test]
    fn test_preferences_defaults() {
        let prefs: DirectionPreferences = serde_json::from_str("{}").unwrap();
        assert_eq!(prefs, DirectionPreferences::default());
        let prefs: DirectionPreferences = serde_json::from_str(r#"{"duration": 8}"#).unwrap();
        assert_eq!(prefs.duration, 8);
        assert!(prefs.include_text);
    }

    #[tokio::test]
    async fn test_generate_for_ids_validates_and_stores() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path().join("intros.json")).await.unwrap();
        for _ in 0..3 {
            store.create(sample_intro("Tech", "Calm")).await.unwrap();
        }

        let llm = Arc::new(ScriptedLLM::replying(DIRECTION_REPLY));
        let generator = DirectionGenerator::new(llm.clone());

        let err = generator
            .generate_for_ids(&store, &[1, 2], "modern tech intro", DirectionPreferences::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = generator
            .generate_for_ids(&store, &[1, 2, 99], "modern tech intro", DirectionPreferences::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(llm.calls(), 0);

        let (record, _) = generator
            .generate_for_ids(&store, &[1, 2, 3], "modern tech intro", DirectionPreferences::default())
            .await
            .unwrap();
        assert_eq!(record.id, 1);
        assert_eq!(record.title(), "Neon Pulse");

        let prompts = llm.prompts();
        assert!(prompts[0].0.contains("INTRO 3:"));
        assert!(!prompts[0].1, "directions are text-only");

        let stored = store.get_direction(1).await.unwrap().unwrap();
        assert_eq!(stored.direction.selected_intro_ids, vec![1, 2, 3]);
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["generatedVD"]["title"], "Neon Pulse");
    }
}
