use serde::{Deserialize, Serialize};

use crate::db::MatchingStats;
use crate::matching::pipeline::FindOutcome;
use crate::matching::request::SearchRequest;
use crate::matching::result::{GeoSearchOutcome, Suggestions, WeightedMatch};

pub const ALGORITHM_VERSION: &str = "2.0";
pub const ALGORITHM_FEATURES: [&str; 6] = [
    "Semantic skill matching",
    "User preference learning",
    "Dynamic weight adjustment",
    "Bayesian rating system",
    "Real-time availability check",
    "Geography-first search with LLM rerank",
];
pub const SIMILARITY_MATCH_THRESHOLD: f64 = 0.75;
pub const RECOMMENDATIONS_MESSAGE: &str = "Personalized recommendations based on your booking history";

/// Counts of the constraints a find request carried.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSummary {
    pub care_level: u8,
    pub required_skills: usize,
    pub preferred_skills: usize,
    pub time_slots: usize,
    pub min_rating: f64,
    pub min_experience: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindMeta {
    pub careseeker_id: Option<String>,
    pub learning_enabled: bool,
    pub requested_top_n: usize,
    pub filters: FilterSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Suggestions>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<WeightedMatch>,
    pub meta: FindMeta,
}

impl FindResponse {
    pub fn new(request: &SearchRequest, outcome: FindOutcome) -> Self {
        Self {
            success: true,
            count: outcome.matches.len(),
            meta: FindMeta {
                careseeker_id: request.requester_id.clone(),
                learning_enabled: outcome.learning_enabled,
                requested_top_n: request.top_n,
                filters: FilterSummary {
                    care_level: request.care_level.get(),
                    required_skills: request.required_skills.len(),
                    preferred_skills: request.preferred_skills.len(),
                    time_slots: request.time_slots.len(),
                    min_rating: request.min_rating,
                    min_experience: request.min_experience,
                },
                suggestions: outcome.suggestions,
            },
            data: outcome.matches,
        }
    }
}

/// Envelope of quick-match and recommendations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchListResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub count: usize,
    pub data: Vec<WeightedMatch>,
}

impl MatchListResponse {
    pub fn new(matches: Vec<WeightedMatch>) -> Self {
        Self {
            success: true,
            message: None,
            count: matches.len(),
            data: matches,
        }
    }

    pub fn with_message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoSearchResponse {
    pub success: bool,
    pub data: GeoSearchOutcome,
}

impl From<GeoSearchOutcome> for GeoSearchResponse {
    fn from(data: GeoSearchOutcome) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmInfo {
    pub version: &'static str,
    pub features: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsData {
    #[serde(flatten)]
    pub counts: MatchingStats,
    pub matching_algorithm: AlgorithmInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub data: StatsData,
}

impl From<MatchingStats> for StatsResponse {
    fn from(counts: MatchingStats) -> Self {
        Self {
            success: true,
            data: StatsData {
                counts,
                matching_algorithm: AlgorithmInfo {
                    version: ALGORITHM_VERSION,
                    features: ALGORITHM_FEATURES.to_vec(),
                },
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimilarityRequest {
    pub skill1: Option<String>,
    pub skill2: Option<String>,
}

impl SimilarityRequest {
    /// Both labels, trimmed and non-blank.
    pub fn labels(&self) -> Result<(&str, &str), super::ValidationError> {
        fn pick(label: &Option<String>) -> Option<&str> {
            label.as_deref().map(str::trim).filter(|l| !l.is_empty())
        }
        match (pick(&self.skill1), pick(&self.skill2)) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(super::ValidationError::MissingSkills),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityReport {
    pub skill1: String,
    pub skill2: String,
    pub similarity: f64,
    pub percentage: String,
    pub is_match: bool,
    pub threshold: f64,
}

impl SimilarityReport {
    pub fn new(skill1: &str, skill2: &str, similarity: f64) -> Self {
        Self {
            skill1: skill1.to_string(),
            skill2: skill2.to_string(),
            similarity: (similarity * 100.0).round() / 100.0,
            percentage: format!("{:.0}%", (similarity * 100.0).round()),
            is_match: similarity >= SIMILARITY_MATCH_THRESHOLD,
            threshold: SIMILARITY_MATCH_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::result::EMPTY_AFTER_FILTERS_MESSAGE;
    use crate::matching::weights::DEFAULT_WEIGHTS;
    use serde_json::json;

    #[test]
    fn find_meta_counts_filters() {
        let request = SearchRequest {
            requester_id: Some("seeker-9".into()),
            required_skills: vec!["cho ăn".into(), "tắm rửa".into()],
            min_rating: 4.0,
            ..SearchRequest::default()
        };
        let outcome = FindOutcome {
            matches: Vec::new(),
            learning_enabled: true,
            weights: DEFAULT_WEIGHTS,
            suggestions: Some(Suggestions::new(EMPTY_AFTER_FILTERS_MESSAGE, true)),
        };
        let value = serde_json::to_value(FindResponse::new(&request, outcome)).unwrap();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["count"], json!(0));
        assert_eq!(value["meta"]["careseekerId"], json!("seeker-9"));
        assert_eq!(value["meta"]["requestedTopN"], json!(10));
        assert_eq!(value["meta"]["filters"]["requiredSkills"], json!(2));
        assert_eq!(value["meta"]["filters"]["careLevel"], json!(1));
        assert_eq!(
            value["meta"]["suggestions"]["removeFilters"],
            json!(["skills"])
        );
    }

    #[test]
    fn stats_are_flattened() {
        let value = serde_json::to_value(StatsResponse::from(MatchingStats {
            total_caregivers: 12,
            approved_caregivers: 9,
            pending_approval: 3,
            total_bookings: 40,
        }))
        .unwrap();
        assert_eq!(value["data"]["approvedCaregivers"], json!(9));
        assert_eq!(value["data"]["pendingApproval"], json!(3));
        assert_eq!(value["data"]["matchingAlgorithm"]["version"], json!("2.0"));
    }

    #[test]
    fn similarity_report_rounds() {
        let report = SimilarityReport::new("a", "b", 0.7549);
        assert_eq!(report.similarity, 0.75);
        assert_eq!(report.percentage, "75%");
        assert!(!report.is_match);
        assert!(SimilarityReport::new("a", "a", 1.0).is_match);
    }

    #[test]
    fn similarity_request_needs_both_labels() {
        let missing = SimilarityRequest {
            skill1: Some("cho ăn".into()),
            skill2: Some(" ".into()),
        };
        assert!(missing.labels().is_err());
    }
}
