use chrono::NaiveDate;
use serde::Serialize;

use super::geo_scoring::{MAX_BASE_POINTS, normalize_base};
use super::rerank::{RankedCandidate, Recommendation};
use super::scoring::ScoreBreakdown;
use crate::{CandidateProfile, CarePackage, Certificate};

pub const EMPTY_POOL_MESSAGE: &str = "Không tìm thấy caregiver. Thử giảm bớt yêu cầu.";
pub const EMPTY_AFTER_FILTERS_MESSAGE: &str =
    "Không tìm thấy caregiver sau khi áp filters bắt buộc.";
pub const FEW_RESULTS_MESSAGE: &str = "Kết quả ít, thử giảm yêu cầu hoặc mở rộng khoảng cách.";

/// Fewer geography-first results than this attach suggestions.
pub const FEW_RESULTS_THRESHOLD: usize = 5;
const HIGHLIGHT_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchLevel {
    High,
    Medium,
    Low,
}

impl MatchLevel {
    pub fn from_score(final_score: f64) -> Self {
        if final_score >= 70.0 {
            Self::High
        } else if final_score >= 55.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Relaxation hints for empty or thin results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestions {
    pub relax_distance: bool,
    pub remove_filters: Vec<String>,
    pub alternative_packages: Vec<String>,
    pub message: String,
}

impl Suggestions {
    pub fn new(message: &str, has_required_skills: bool) -> Self {
        Self {
            relax_distance: true,
            remove_filters: if has_required_skills {
                vec!["skills".to_string()]
            } else {
                Vec::new()
            },
            alternative_packages: Vec::new(),
            message: message.to_string(),
        }
    }
}

/// Per-dimension weighted scores as whole percentages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScorePercentages {
    pub credential: u32,
    pub skills: u32,
    pub availability: u32,
    pub rating: u32,
    pub experience: u32,
    pub distance: u32,
    pub price: u32,
    pub trust: u32,
}

fn percent(value: f64) -> u32 {
    (value.clamp(0.0, 1.0) * 100.0).round() as u32
}

impl From<&ScoreBreakdown> for ScorePercentages {
    fn from(breakdown: &ScoreBreakdown) -> Self {
        let p = |name| percent(breakdown.score_of(name));
        Self {
            credential: p("credential"),
            skills: p("skills"),
            availability: p("availability"),
            rating: p("rating"),
            experience: p("experience"),
            distance: p("distance"),
            price: p("price"),
            trust: p("trust"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankDetails {
    pub delta: f64,
    pub reasoning: String,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
    pub recommendation: Recommendation,
}

/// One find-caregivers result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedMatch {
    pub caregiver_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<&'static str>,
    pub education: Option<&'static str>,
    pub years_of_experience: u32,
    pub rating: f64,
    pub total_reviews: usize,
    pub skills: Vec<String>,
    pub certificates: Vec<Certificate>,
    pub has_availability: bool,
    pub match_score: f64,
    pub match_percentage: String,
    pub score_breakdown: ScorePercentages,
    pub final_score: f64,
    pub level: MatchLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank: Option<RerankDetails>,
}

impl WeightedMatch {
    pub fn new(candidate: &CandidateProfile, breakdown: &ScoreBreakdown, today: NaiveDate) -> Self {
        let total = breakdown.total;
        let percentage = (total * 100.0).round();
        Self {
            caregiver_id: candidate.id.clone(),
            name: candidate.name.clone(),
            email: candidate.email.clone(),
            phone: candidate.phone.clone(),
            age: candidate.age_on(today),
            gender: candidate.gender.map(|g| g.stored_label()),
            education: candidate.education.map(|e| e.label()),
            years_of_experience: candidate.years_of_experience,
            rating: (candidate.average_rating() * 10.0).round() / 10.0,
            total_reviews: candidate.review_ratings.len(),
            skills: candidate.skill_names().map(str::to_string).collect(),
            certificates: candidate.certificates.clone(),
            has_availability: !candidate.availability.is_empty(),
            match_score: (total * 1000.0).round() / 1000.0,
            match_percentage: format!("{percentage:.0}%"),
            score_breakdown: ScorePercentages::from(breakdown),
            final_score: percentage,
            level: MatchLevel::from_score(percentage),
            rerank: None,
        }
    }

    /// Apply an oracle verdict; the final score and level follow the reranked value.
    pub fn with_rerank<T>(mut self, ranked: &RankedCandidate<T>) -> Self {
        self.final_score = ranked.final_score.round();
        self.level = MatchLevel::from_score(ranked.final_score);
        self.rerank = Some(RerankDetails {
            delta: ranked.delta.round(),
            reasoning: ranked.reasoning.clone(),
            strengths: ranked.strengths.clone(),
            concerns: ranked.concerns.clone(),
            recommendation: ranked.recommendation,
        });
        self
    }
}

/// Oracle-led ranking of the caregivers offered for a package.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageRanking {
    pub package: CarePackage,
    /// Approved caregivers before the pool was capped.
    pub total_caregivers: usize,
    pub matches: Vec<WeightedMatch>,
    /// Set when no verdict came back and base scores decided the order.
    pub fallback: bool,
    pub provider: String,
    pub elapsed_ms: u64,
}

/// Oracle ranking next to the weighted search for the same package.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingComparison {
    pub oracle: PackageRanking,
    pub rule_based: Vec<WeightedMatch>,
    pub rule_based_ms: u64,
}

/// One successful oracle round trip on a single real caregiver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleCheck {
    pub provider: String,
    pub caregiver_id: String,
    pub verdicts: usize,
    pub response_time_ms: u64,
}

/// Geography-first breakdown in raw points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoBreakdown {
    pub geographic: f64,
    pub skills: f64,
    pub health: f64,
    pub personality: f64,
    pub availability: f64,
    pub certificates: f64,
    pub previous_booking: f64,
    pub rating: f64,
}

impl From<&ScoreBreakdown> for GeoBreakdown {
    fn from(breakdown: &ScoreBreakdown) -> Self {
        let p = |name| breakdown.score_of(name);
        Self {
            geographic: p("geographic"),
            skills: p("skills"),
            health: p("health"),
            personality: p("personality"),
            availability: p("availability"),
            certificates: p("certificates"),
            previous_booking: p("previousBooking"),
            rating: p("rating"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    pub distance: Option<f64>,
    pub distance_text: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoMatchScore {
    pub score: f64,
    pub base_score: f64,
    pub delta: f64,
    pub level: MatchLevel,
    pub breakdown: GeoBreakdown,
    pub reasoning: String,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlights {
    pub skills: Vec<String>,
    pub certificates: Vec<String>,
    pub specializations: Vec<String>,
}

/// Scored geography-first candidate before reranking.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoCandidate {
    pub profile: CandidateProfile,
    pub distance_km: Option<f64>,
    pub breakdown: ScoreBreakdown,
}

impl GeoCandidate {
    pub fn base_points(&self) -> f64 {
        self.breakdown.total
    }

    pub fn normalized_base(&self) -> f64 {
        normalize_base(self.breakdown.total)
    }
}

/// One geography-first result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoMatch {
    pub caregiver_id: String,
    pub name: String,
    pub gender: Option<&'static str>,
    pub experience_years: u32,
    pub location: GeoLocation,
    #[serde(rename = "match")]
    pub match_score: GeoMatchScore,
    pub highlights: Highlights,
}

impl From<RankedCandidate<GeoCandidate>> for GeoMatch {
    fn from(ranked: RankedCandidate<GeoCandidate>) -> Self {
        let candidate = &ranked.item;
        let profile = &candidate.profile;
        let distance = candidate.distance_km;
        Self {
            caregiver_id: profile.id.clone(),
            name: profile.name.clone(),
            gender: profile.gender.map(|g| g.stored_label()),
            experience_years: profile.years_of_experience,
            location: GeoLocation {
                distance,
                distance_text: distance.map(|d| format!("{d:.1} km")),
                address: profile.address.clone(),
            },
            match_score: GeoMatchScore {
                score: ranked.final_score.round(),
                base_score: (candidate.base_points() / MAX_BASE_POINTS * 100.0)
                    .min(100.0)
                    .round(),
                delta: ranked.delta.round(),
                level: MatchLevel::from_score(ranked.final_score),
                breakdown: GeoBreakdown::from(&candidate.breakdown),
                reasoning: ranked.reasoning.clone(),
                strengths: ranked.strengths.clone(),
                concerns: ranked.concerns.clone(),
                recommendation: ranked.recommendation,
            },
            highlights: Highlights {
                skills: profile
                    .skill_names()
                    .take(HIGHLIGHT_LIMIT)
                    .map(str::to_string)
                    .collect(),
                certificates: profile
                    .certificates
                    .iter()
                    .take(HIGHLIGHT_LIMIT)
                    .map(|c| c.name.to_lowercase())
                    .collect(),
                specializations: Vec::new(),
            },
        }
    }
}

/// Body of a geography-first search response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoSearchOutcome {
    pub total: usize,
    pub returned: usize,
    pub matches: Vec<GeoMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Suggestions>,
}

impl GeoSearchOutcome {
    pub fn empty(message: &str, has_required_skills: bool) -> Self {
        Self {
            total: 0,
            returned: 0,
            matches: Vec::new(),
            suggestions: Some(Suggestions::new(message, has_required_skills)),
        }
    }
}
