use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::models::IntroRecord;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "with", "for", "i", "want", "to", "and", "or", "in", "on", "at", "is", "are", "was",
    "were",
];

/// Maximum number of suggestions returned
pub const MAX_SUGGESTIONS: usize = 10;

/// Points awarded per matching keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreWeights {
    pub tag_exact: u32,
    pub tag_partial: u32,
    pub description: u32,
    /// Mood, visual style and pace, each
    pub attribute: u32,
    pub context_category: u32,
    pub context_channel: u32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            tag_exact: 10,
            tag_partial: 5,
            description: 7,
            attribute: 8,
            context_category: 3,
            context_channel: 2,
        }
    }
}

/// Hard include/exclude applied before scoring
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilters {
    pub category: Option<String>,
    /// Inclusive, seconds
    pub min_duration: Option<u32>,
    /// Inclusive, seconds
    pub max_duration: Option<u32>,
}

impl SearchFilters {
    pub fn matches(&self, record: &IntroRecord) -> bool {
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            if record.category() != category {
                return false;
            }
        }
        if let Some(min) = self.min_duration {
            if record.duration() < min {
                return false;
            }
        }
        if let Some(max) = self.max_duration {
            if record.duration() > max {
                return false;
            }
        }
        true
    }
}

/// Which fields contributed to a score
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetails {
    pub tags: Vec<String>,
    pub description: Vec<String>,
    pub mood: bool,
    pub visual_style: bool,
    pub pace: bool,
    pub category: bool,
    pub channel: bool,
}

/// A record with its relevance for one query
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredRecord {
    #[serde(flatten)]
    pub record: IntroRecord,
    pub relevance_score: u32,
    pub match_details: MatchDetails,
}

/// Weighted keyword matching over analyzed intros
#[derive(Debug, Clone, Default)]
pub struct RelevanceSearchEngine {
    weights: ScoreWeights,
}

impl RelevanceSearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    /// Lowercase, split on whitespace, drop stop words and short tokens,
    /// then strip everything that is not `[a-z0-9]`
    pub fn extract_keywords(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split_whitespace()
            .filter(|word| !STOP_WORDS.contains(word) && word.chars().count() > 2)
            .map(|word| {
                word.chars()
                    .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
                    .collect::<String>()
            })
            .filter(|word| !word.is_empty())
            .collect()
    }

    /// Score one record against query keywords and optional context keywords
    pub fn score(&self, record: &IntroRecord, keywords: &[String], context: &[String]) -> (u32, MatchDetails) {
        let w = &self.weights;
        let analysis = record.analysis();
        let mut score = 0u32;
        let mut details = MatchDetails::default();

        let tags: Vec<(String, &str)> = analysis
            .keywords
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| (t.to_lowercase(), t.as_str()))
            .collect();
        let description = analysis.description.to_lowercase();
        let mood = analysis.mood.to_lowercase();
        let visual_style = analysis.visual_style.to_lowercase();
        let pace = analysis.pace.as_str();

        for keyword in keywords {
            for (tag_lower, tag) in &tags {
                if tag_lower == keyword {
                    score += w.tag_exact;
                    details.tags.push(tag.to_string());
                } else if tag_lower.contains(keyword.as_str()) || keyword.contains(tag_lower.as_str()) {
                    score += w.tag_partial;
                    details.tags.push(tag.to_string());
                }
            }

            if description.contains(keyword.as_str()) {
                score += w.description;
                details.description.push(keyword.clone());
            }

            if mood.contains(keyword.as_str()) {
                score += w.attribute;
                details.mood = true;
            }
            if visual_style.contains(keyword.as_str()) {
                score += w.attribute;
                details.visual_style = true;
            }
            if pace.contains(keyword.as_str()) {
                score += w.attribute;
                details.pace = true;
            }
        }

        if !context.is_empty() {
            let category = record.category().to_lowercase();
            let channel = record.channel_name().to_lowercase();
            for keyword in context {
                if category.contains(keyword.as_str()) {
                    score += w.context_category;
                    details.category = true;
                }
                if channel.contains(keyword.as_str()) {
                    score += w.context_channel;
                    details.channel = true;
                }
            }
        }

        (score, details)
    }

    /// Rank `corpus` for `query`.
    ///
    /// A blank query returns every filtered record with score 0, unscored and
    /// in corpus order. Otherwise zero-score records are dropped and the rest
    /// are ordered by descending score, ties keeping corpus order.
    pub fn search(
        &self,
        query: &str,
        corpus: &[IntroRecord],
        user_context: Option<&str>,
        filters: &SearchFilters,
    ) -> Vec<ScoredRecord> {
        let candidates = corpus.iter().filter(|r| filters.matches(r));

        if query.trim().is_empty() {
            return candidates
                .map(|record| ScoredRecord {
                    record: record.clone(),
                    relevance_score: 0,
                    match_details: MatchDetails::default(),
                })
                .collect();
        }

        let keywords = Self::extract_keywords(query);
        let context = user_context.map(Self::extract_keywords).unwrap_or_default();
        debug!("🔍 Smart search keywords: {}", keywords.join(", "));

        let mut results: Vec<ScoredRecord> = candidates
            .filter_map(|record| {
                let (relevance_score, match_details) = self.score(record, &keywords, &context);
                (relevance_score > 0).then(|| ScoredRecord {
                    record: record.clone(),
                    relevance_score,
                    match_details,
                })
            })
            .collect();

        // sort_by is stable
        results.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));

        if let Some(top) = results.first() {
            debug!(
                "✅ Found {} relevant intro(s), top score {} ({})",
                results.len(),
                top.relevance_score,
                top.record.intro.video_title
            );
        }

        results
    }

    /// Tags, moods, visual styles and categories containing `partial`
    pub fn suggest(&self, partial: &str, corpus: &[IntroRecord]) -> Vec<String> {
        let needle = partial.to_lowercase();
        let mut seen = HashSet::new();
        let mut suggestions = Vec::new();

        for record in corpus {
            let analysis = record.analysis();
            let fields = analysis
                .keywords
                .iter()
                .map(String::as_str)
                .chain([
                    analysis.mood.as_str(),
                    analysis.visual_style.as_str(),
                    record.category(),
                ]);

            for value in fields {
                if value.is_empty() || !value.to_lowercase().contains(&needle) {
                    continue;
                }
                if seen.insert(value) {
                    suggestions.push(value.to_string());
                    if suggestions.len() == MAX_SUGGESTIONS {
                        return suggestions;
                    }
                }
            }
        }

        suggestions
    }
}
