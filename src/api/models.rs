//! API data models

use serde::{Deserialize, Serialize};

use crate::direction::{DirectionPreferences, DirectionRecord, VisualDirection};
use crate::models::IntroRecord;
use crate::search::{ScoredRecord, SearchFilters};

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

impl ApiResponse<()> {
    /// Success without a payload
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntroListResponse {
    pub intros: Vec<IntroRecord>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartSearchRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub user_context: Option<String>,
    #[serde(default)]
    pub filters: SearchFilters,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartSearchResponse {
    pub query: String,
    pub count: usize,
    pub results: Vec<ScoredRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuggestionQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateDirectionRequest {
    #[serde(default)]
    pub selected_intro_ids: Vec<u64>,
    #[serde(default)]
    pub user_description: String,
    #[serde(default)]
    pub preferences: DirectionPreferences,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateDirectionResponse {
    pub vd_id: u64,
    /// Seconds, one decimal
    pub generation_time: f64,
    pub visual_direction: VisualDirection,
}

/// Listing entry for stored directions
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionSummary {
    pub id: u64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub user_description: String,
    pub title: String,
    pub selected_intro_ids: Vec<u64>,
}

impl From<&DirectionRecord> for DirectionSummary {
    fn from(record: &DirectionRecord) -> Self {
        let title = match record.title().trim() {
            "" => "Untitled".to_string(),
            title => title.to_string(),
        };
        Self {
            id: record.id,
            created_at: record.created_at,
            user_description: record.direction.user_description.clone(),
            title,
            selected_intro_ids: record.direction.selected_intro_ids.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionDetail {
    pub vd: DirectionRecord,
    pub selected_intros: Vec<IntroRecord>,
}
