use serde::Serialize;

use super::config::MatchingConfig;
use super::request::SearchRequest;
use super::weights::WeightVector;
use crate::CandidateProfile;
use crate::similarity::{SimilarityEngine, normalize_label};

/// Certificate types that count towards credentials at every care level.
const BASE_RELEVANT_CERT_TYPES: &[&str] = &["chăm sóc người già", "y tá", "điều dưỡng", "sơ cứu"];
/// Added from care level 2 upwards.
const ADVANCED_RELEVANT_CERT_TYPES: &[&str] = &["vật lí trị liệu", "dinh dưỡng"];

const MAX_CREDENTIAL_POINTS: f64 = 10.0;
const MAX_RELEVANT_CERTS: usize = 6;

const RATING_PRIOR_MEAN: f64 = 4.0;
const RATING_PRIOR_WEIGHT: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringResult {
    pub score: f64,
    pub max_score: f64,
    pub status: &'static str,
    pub details: String,
}

impl ScoringResult {
    pub fn new(score: f64, max_score: f64, details: impl Into<String>) -> Self {
        let score = score.clamp(0.0, max_score);
        Self {
            score,
            max_score,
            status: status_from_ratio(if max_score > 0.0 { score / max_score } else { 0.0 }),
            details: details.into(),
        }
    }

    /// Full-or-fixed score used when the data needed to judge is absent.
    pub fn neutral(score: f64, max_score: f64, details: impl Into<String>) -> Self {
        Self {
            status: "NEUTRAL",
            ..Self::new(score, max_score, details)
        }
    }

    pub fn ratio(&self) -> f64 {
        if self.max_score > 0.0 {
            self.score / self.max_score
        } else {
            0.0
        }
    }
}

fn status_from_ratio(ratio: f64) -> &'static str {
    if ratio >= 0.999 {
        "PERFECT_MATCH"
    } else if ratio >= 0.7 {
        "MATCH"
    } else if ratio > 0.0 {
        "PARTIAL_MATCH"
    } else {
        "MISS"
    }
}

/// Per-dimension results plus the combined total for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub strategy: &'static str,
    pub total: f64,
    pub max_total: f64,
    pub dimensions: Vec<(&'static str, ScoringResult)>,
}

impl ScoreBreakdown {
    pub fn get(&self, name: &str) -> Option<&ScoringResult> {
        self.dimensions
            .iter()
            .find(|(dimension, _)| *dimension == name)
            .map(|(_, result)| result)
    }

    pub fn score_of(&self, name: &str) -> f64 {
        self.get(name).map_or(0.0, |r| r.score)
    }
}

/// A named way of turning a candidate plus a request into a score breakdown.
pub trait ScoringStrategy {
    type Input: ?Sized;

    fn name(&self) -> &'static str;

    fn score(&self, candidate: &CandidateProfile, input: &Self::Input) -> ScoreBreakdown;
}

/// Eight-dimension weighted average, every dimension in `[0, 1]`.
pub struct WeightedStrategy<'a> {
    engine: &'a SimilarityEngine,
    config: &'a MatchingConfig,
    weights: WeightVector,
}

impl<'a> WeightedStrategy<'a> {
    pub fn new(engine: &'a SimilarityEngine, config: &'a MatchingConfig, weights: WeightVector) -> Self {
        Self {
            engine,
            config,
            weights,
        }
    }

    pub fn weights(&self) -> WeightVector {
        self.weights
    }

    pub fn score_credential(&self, candidate: &CandidateProfile, care_level: u8) -> ScoringResult {
        let education_points = candidate.education.map_or(0.0, |e| e.points());
        let relevant = candidate
            .certificates
            .iter()
            .filter(|cert| {
                cert.certificate_type
                    .as_deref()
                    .is_some_and(|t| is_relevant_certificate_type(t, care_level))
            })
            .count();
        let cert_points = relevant.min(MAX_RELEVANT_CERTS) as f64 * 0.5;
        let score = ((education_points + cert_points) / MAX_CREDENTIAL_POINTS).min(1.0);

        ScoringResult::new(
            score,
            1.0,
            format!(
                "education {education_points:.0} pts + {relevant} relevant certificate(s)"
            ),
        )
    }

    pub fn score_skills(&self, candidate: &CandidateProfile, preferred: &[String]) -> ScoringResult {
        if preferred.is_empty() {
            return ScoringResult::neutral(1.0, 1.0, "no preferred skills requested");
        }

        let threshold = self.config.preferred_skill_threshold;
        let mut matched = 0usize;
        let mut backed = 0usize;

        for wanted in preferred {
            let Some((idx, best)) = self.engine.best_match(wanted, candidate.skill_names()) else {
                continue;
            };
            if best >= threshold {
                matched += 1;
                if skill_backed_by_certificate(candidate, &candidate.skills[idx].name) {
                    backed += 1;
                }
            }
        }

        let base = matched as f64 / preferred.len() as f64;
        let bonus = if matched > 0 {
            backed as f64 / matched as f64 * 0.2
        } else {
            0.0
        };

        ScoringResult::new(
            (base + bonus).min(1.0),
            1.0,
            format!(
                "{matched}/{} preferred skills matched, {backed} certificate-backed",
                preferred.len()
            ),
        )
    }

    pub fn score_availability(&self, candidate: &CandidateProfile, request: &SearchRequest) -> ScoringResult {
        if request.time_slots.is_empty() {
            return ScoringResult::neutral(1.0, 1.0, "no time slots requested");
        }

        let covered = request
            .time_slots
            .iter()
            .filter(|slot| candidate.availability.iter().any(|w| w.covers(slot)))
            .count();

        ScoringResult::new(
            covered as f64 / request.time_slots.len() as f64,
            1.0,
            format!("{covered}/{} requested slots covered", request.time_slots.len()),
        )
    }

    pub fn score_rating(&self, candidate: &CandidateProfile) -> ScoringResult {
        let count = candidate.review_ratings.len() as f64;
        let sum: f64 = candidate.review_ratings.iter().map(|r| f64::from(*r)).sum();
        let smoothed = (sum + RATING_PRIOR_WEIGHT * RATING_PRIOR_MEAN) / (count + RATING_PRIOR_WEIGHT);
        let score = smoothed / 5.0;

        if candidate.review_ratings.is_empty() {
            return ScoringResult::neutral(score, 1.0, "no reviews, prior mean applied");
        }

        ScoringResult::new(
            score,
            1.0,
            format!("bayesian rating {smoothed:.2} over {count:.0} review(s)"),
        )
    }

    pub fn score_experience(&self, candidate: &CandidateProfile) -> ScoringResult {
        let years = f64::from(candidate.years_of_experience);
        ScoringResult::new(
            (years / 10.0).clamp(0.1, 1.0),
            1.0,
            format!("{years:.0} year(s) of experience"),
        )
    }

    pub fn score_distance(&self, candidate: &CandidateProfile, request: &SearchRequest) -> ScoringResult {
        let (Some(origin), Some(target)) = (request.location, candidate.coordinates) else {
            return ScoringResult::neutral(
                self.config.neutral_distance_score,
                1.0,
                "coordinates unavailable",
            );
        };

        let distance = origin.distance_km(&target);
        ScoringResult::new(
            distance_decay(distance, request.max_distance_km),
            1.0,
            format!("{distance:.1} km (max {:.0} km)", request.max_distance_km),
        )
    }

    pub fn score_price(&self, candidate: &CandidateProfile, budget: Option<f64>) -> ScoringResult {
        let Some(budget) = budget.filter(|b| *b > 0.0) else {
            return ScoringResult::neutral(1.0, 1.0, "no budget supplied");
        };

        let rate = candidate
            .hourly_rate
            .map_or(self.config.default_hourly_rate, |r| r as f64);

        let score = if rate <= budget {
            let ratio = rate / budget;
            if ratio < 0.5 {
                1.0
            } else {
                1.0 - (ratio - 0.5) * 0.2
            }
        } else {
            (1.0 - (rate - budget) / budget).max(0.0)
        };

        ScoringResult::new(score, 1.0, format!("rate {rate:.0} vs budget {budget:.0}"))
    }

    pub fn score_trust(&self, candidate: &CandidateProfile) -> ScoringResult {
        let stats = candidate.booking_stats;
        if stats.total_bookings == 0 {
            return ScoringResult::neutral(0.5, 1.0, "no booking history");
        }

        let volume_tier = match stats.total_bookings {
            n if n >= 50 => 1.0,
            n if n >= 20 => 0.8,
            n if n >= 10 => 0.6,
            n if n >= 5 => 0.4,
            _ => 0.2,
        };
        let verified = if candidate.has_verified_identity() {
            1.0
        } else {
            0.5
        };

        let score = 0.4 * stats.completion_rate
            + 0.3 * (1.0 - 5.0 * stats.cancel_rate).max(0.0)
            + 0.2 * volume_tier
            + 0.1 * verified;

        ScoringResult::new(
            score,
            1.0,
            format!(
                "{} booking(s), {:.0}% completed, {:.0}% cancelled",
                stats.total_bookings,
                stats.completion_rate * 100.0,
                stats.cancel_rate * 100.0
            ),
        )
    }
}

impl ScoringStrategy for WeightedStrategy<'_> {
    type Input = SearchRequest;

    fn name(&self) -> &'static str {
        "weighted"
    }

    fn score(&self, candidate: &CandidateProfile, request: &SearchRequest) -> ScoreBreakdown {
        let w = self.weights;
        let dimensions = vec![
            ("credential", self.score_credential(candidate, request.care_level.get()), w.credential),
            ("skills", self.score_skills(candidate, &request.preferred_skills), w.skills),
            ("availability", self.score_availability(candidate, request), w.availability),
            ("rating", self.score_rating(candidate), w.rating),
            ("experience", self.score_experience(candidate), w.experience),
            ("distance", self.score_distance(candidate, request), w.distance),
            ("price", self.score_price(candidate, request.budget_per_hour), w.price),
            ("trust", self.score_trust(candidate), w.trust),
        ];

        let total = dimensions
            .iter()
            .map(|(_, result, weight)| result.score * weight)
            .sum::<f64>()
            .clamp(0.0, 1.0);

        ScoreBreakdown {
            strategy: self.name(),
            total,
            max_total: 1.0,
            dimensions: dimensions
                .into_iter()
                .map(|(name, result, _)| (name, result))
                .collect(),
        }
    }
}

/// 1.0 within a kilometre, linear to 0 at `max_km`, 0 beyond.
pub fn distance_decay(distance_km: f64, max_km: f64) -> f64 {
    if distance_km <= 1.0 {
        return 1.0;
    }
    if distance_km > max_km {
        return 0.0;
    }
    let span = if max_km - 1.0 > 0.0 { max_km - 1.0 } else { 1.0 };
    (1.0 - (distance_km - 1.0) / span).clamp(0.0, 1.0)
}

fn is_relevant_certificate_type(certificate_type: &str, care_level: u8) -> bool {
    let wanted = normalize_label(certificate_type);
    let base = BASE_RELEVANT_CERT_TYPES.iter();
    let advanced = ADVANCED_RELEVANT_CERT_TYPES
        .iter()
        .filter(|_| care_level >= 2);
    base.chain(advanced)
        .any(|allowed| normalize_label(allowed) == wanted)
}

fn skill_backed_by_certificate(candidate: &CandidateProfile, skill_name: &str) -> bool {
    let skill = normalize_label(skill_name);
    if skill.is_empty() {
        return false;
    }
    candidate.certificates.iter().any(|cert| {
        [Some(cert.name.as_str()), cert.certificate_type.as_deref()]
            .into_iter()
            .flatten()
            .map(normalize_label)
            .filter(|label| !label.is_empty())
            .any(|label| skill.contains(&label) || label.contains(&skill))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::request::CareLevel;
    use crate::{
        AvailabilityWindow, BookingStats, BookingStatus, Certificate, Coordinates, EducationLevel,
        Recurrence, Skill, TimeRange, TimeSlot, Weekday,
    };

    fn strategy_parts() -> (SimilarityEngine, MatchingConfig) {
        (SimilarityEngine::uncached(), MatchingConfig::default())
    }

    fn cert(name: &str, certificate_type: &str) -> Certificate {
        Certificate {
            name: name.into(),
            certificate_type: Some(certificate_type.into()),
            ..Certificate::default()
        }
    }

    fn skill(name: &str) -> Skill {
        Skill {
            name: name.into(),
            description: None,
        }
    }

    #[test]
    fn zero_reviews_regress_to_prior() {
        let (engine, config) = strategy_parts();
        let strategy = WeightedStrategy::new(&engine, &config, config.weights);
        let result = strategy.score_rating(&CandidateProfile::default());
        assert!((result.score - 0.8).abs() < 1e-12);
        assert_eq!(result.status, "NEUTRAL");
    }

    #[test]
    fn bayesian_rating_pulls_towards_prior() {
        let (engine, config) = strategy_parts();
        let strategy = WeightedStrategy::new(&engine, &config, config.weights);
        let candidate = CandidateProfile {
            review_ratings: vec![5, 5, 5, 5, 5],
            ..CandidateProfile::default()
        };
        // (25 + 20) / 10 / 5
        assert!((strategy.score_rating(&candidate).score - 0.9).abs() < 1e-12);
    }

    #[test]
    fn experience_ramp_has_floor_and_ceiling() {
        let (engine, config) = strategy_parts();
        let strategy = WeightedStrategy::new(&engine, &config, config.weights);
        let with_years = |years| CandidateProfile {
            years_of_experience: years,
            ..CandidateProfile::default()
        };
        assert!((strategy.score_experience(&with_years(3)).score - 0.3).abs() < 1e-12);
        assert!((strategy.score_experience(&with_years(0)).score - 0.1).abs() < 1e-12);
        assert_eq!(strategy.score_experience(&with_years(25)).score, 1.0);
    }

    #[test]
    fn credential_counts_relevant_certificates_by_care_level() {
        let (engine, config) = strategy_parts();
        let strategy = WeightedStrategy::new(&engine, &config, config.weights);
        let candidate = CandidateProfile {
            education: Some(EducationLevel::Bachelor),
            certificates: vec![
                cert("Chứng chỉ điều dưỡng", "điều dưỡng"),
                cert("Dinh dưỡng cơ bản", "dinh dưỡng"),
                cert("Tin học", "tin học"),
            ],
            ..CandidateProfile::default()
        };

        assert!((strategy.score_credential(&candidate, 1).score - 0.35).abs() < 1e-12);
        assert!((strategy.score_credential(&candidate, 2).score - 0.40).abs() < 1e-12);
    }

    #[test]
    fn credential_caps_relevant_certificates() {
        let (engine, config) = strategy_parts();
        let strategy = WeightedStrategy::new(&engine, &config, config.weights);
        let candidate = CandidateProfile {
            education: Some(EducationLevel::Graduate),
            certificates: (0..10).map(|i| cert(&format!("sơ cứu {i}"), "sơ cứu")).collect(),
            ..CandidateProfile::default()
        };
        assert!((strategy.score_credential(&candidate, 1).score - 0.7).abs() < 1e-12);
    }

    #[test]
    fn skills_neutral_without_preferences_and_bonus_for_certified() {
        let (engine, config) = strategy_parts();
        let strategy = WeightedStrategy::new(&engine, &config, config.weights);
        let candidate = CandidateProfile {
            skills: vec![skill("đo huyết áp"), skill("tắm rửa")],
            certificates: vec![cert("Đo huyết áp", "y tá")],
            ..CandidateProfile::default()
        };

        assert_eq!(strategy.score_skills(&candidate, &[]).score, 1.0);

        let half = strategy.score_skills(
            &candidate,
            &["blood pressure".to_string(), "quản lý tài chính".to_string()],
        );
        // 1 of 2 matched, and the matched skill is certificate-backed
        assert!((half.score - 0.7).abs() < 1e-12);
    }

    #[test]
    fn availability_is_fraction_of_covered_slots() {
        let (engine, config) = strategy_parts();
        let strategy = WeightedStrategy::new(&engine, &config, config.weights);
        let candidate = CandidateProfile {
            availability: vec![AvailabilityWindow {
                recurrence: Recurrence::Weekly,
                days_of_week: vec![Weekday::Monday],
                time_slots: vec![TimeRange::parse("08:00", "12:00").unwrap()],
            }],
            ..CandidateProfile::default()
        };
        let request = SearchRequest {
            time_slots: vec![
                TimeSlot {
                    day: Weekday::Monday,
                    range: TimeRange::parse("09:00", "10:00").unwrap(),
                },
                TimeSlot {
                    day: Weekday::Friday,
                    range: TimeRange::parse("09:00", "10:00").unwrap(),
                },
            ],
            ..SearchRequest::default()
        };
        assert!((strategy.score_availability(&candidate, &request).score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn price_follows_budget_curve() {
        let (engine, config) = strategy_parts();
        let strategy = WeightedStrategy::new(&engine, &config, config.weights);
        let at_rate = |rate| CandidateProfile {
            hourly_rate: Some(rate),
            ..CandidateProfile::default()
        };

        assert_eq!(strategy.score_price(&at_rate(40_000), Some(100_000.0)).score, 1.0);
        assert!((strategy.score_price(&at_rate(100_000), Some(100_000.0)).score - 0.9).abs() < 1e-12);
        assert!((strategy.score_price(&at_rate(150_000), Some(100_000.0)).score - 0.5).abs() < 1e-12);
        assert_eq!(strategy.score_price(&at_rate(250_000), Some(100_000.0)).score, 0.0);
        assert_eq!(strategy.score_price(&at_rate(250_000), None).score, 1.0);
        // missing rate falls back to the configured default
        assert!((strategy.score_price(&CandidateProfile::default(), Some(100_000.0)).score - 0.9).abs() < 1e-12);
    }

    #[test]
    fn trust_is_neutral_without_history() {
        let (engine, config) = strategy_parts();
        let strategy = WeightedStrategy::new(&engine, &config, config.weights);
        assert_eq!(strategy.score_trust(&CandidateProfile::default()).score, 0.5);

        let only_pending = CandidateProfile {
            booking_stats: BookingStats::from_status_counts([(BookingStatus::Pending, 3)]),
            ..CandidateProfile::default()
        };
        assert_eq!(strategy.score_trust(&only_pending).score, 0.5);

        let candidate = CandidateProfile {
            id_card_number: Some("079123456789".into()),
            booking_stats: BookingStats::from_counts(20, 18, 1),
            ..CandidateProfile::default()
        };
        // 0.4*0.9 + 0.3*0.75 + 0.2*0.8 + 0.1*1.0
        let expected = 0.36 + 0.225 + 0.16 + 0.1;
        assert!((strategy.score_trust(&candidate).score - expected).abs() < 1e-12);
    }

    #[test]
    fn distance_uses_neutral_value_without_coordinates() {
        let (engine, config) = strategy_parts();
        let strategy = WeightedStrategy::new(&engine, &config, config.weights);
        let request = SearchRequest::default();
        let result = strategy.score_distance(&CandidateProfile::default(), &request);
        assert_eq!(result.score, config.neutral_distance_score);

        let near = CandidateProfile {
            coordinates: Some(Coordinates::new(10.7769, 106.7009)),
            ..CandidateProfile::default()
        };
        let request = SearchRequest {
            location: Some(Coordinates::new(10.7769, 106.7009)),
            ..SearchRequest::default()
        };
        assert_eq!(strategy.score_distance(&near, &request).score, 1.0);
    }

    #[test]
    fn distance_decay_shape() {
        assert_eq!(distance_decay(0.5, 7.0), 1.0);
        assert!((distance_decay(4.0, 7.0) - 0.5).abs() < 1e-12);
        assert_eq!(distance_decay(7.5, 7.0), 0.0);
        assert_eq!(distance_decay(1.0, 1.0), 1.0);
    }

    #[test]
    fn weighted_total_is_bounded_and_uses_all_dimensions() {
        let (engine, config) = strategy_parts();
        let strategy = WeightedStrategy::new(&engine, &config, config.weights);
        let candidate = CandidateProfile {
            education: Some(EducationLevel::Graduate),
            years_of_experience: 12,
            ..CandidateProfile::default()
        };
        let request = SearchRequest {
            care_level: CareLevel::new(1).unwrap(),
            ..SearchRequest::default()
        };

        let breakdown = strategy.score(&candidate, &request);
        assert_eq!(breakdown.dimensions.len(), 8);
        assert!((0.0..=1.0).contains(&breakdown.total));
        for (_, result) in &breakdown.dimensions {
            assert!((0.0..=1.0).contains(&result.score));
        }

        let expected: f64 = [
            ("credential", config.weights.credential),
            ("skills", config.weights.skills),
            ("availability", config.weights.availability),
            ("rating", config.weights.rating),
            ("experience", config.weights.experience),
            ("distance", config.weights.distance),
            ("price", config.weights.price),
            ("trust", config.weights.trust),
        ]
        .iter()
        .map(|(name, w)| breakdown.score_of(name) * w)
        .sum();
        assert!((breakdown.total - expected).abs() < 1e-12);
    }
}
