//! Additive 145-point scale for the location-mandatory search.
//!
//! Unlike the weighted strategy, dimensions carry fixed point maxima and required
//! skills compare by case-insensitive equality, not similarity.

use super::request::GeoCriteria;
use super::scoring::{ScoreBreakdown, ScoringResult, ScoringStrategy};
use crate::CandidateProfile;

pub const GEOGRAPHIC_POINTS: f64 = 30.0;
pub const SKILLS_POINTS: f64 = 30.0;
pub const HEALTH_POINTS: f64 = 20.0;
pub const PERSONALITY_POINTS: f64 = 15.0;
pub const AVAILABILITY_POINTS: f64 = 10.0;
pub const CERTIFICATE_POINTS: f64 = 15.0;
pub const PREVIOUS_BOOKING_POINTS: f64 = 10.0;
pub const RATING_POINTS: f64 = 5.0;

pub const MAX_BASE_POINTS: f64 = GEOGRAPHIC_POINTS
    + SKILLS_POINTS
    + HEALTH_POINTS
    + PERSONALITY_POINTS
    + AVAILABILITY_POINTS
    + CERTIFICATE_POINTS
    + PREVIOUS_BOOKING_POINTS
    + RATING_POINTS;

/// Base points on the 0..=100 scale sent to the reranker.
pub fn normalize_base(points: f64) -> f64 {
    (points / MAX_BASE_POINTS * 100.0).round().min(100.0)
}

fn lowercase_all<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    items.map(|s| s.trim().to_lowercase()).collect()
}

fn count_present(wanted: &[String], have: &[String]) -> usize {
    wanted
        .iter()
        .filter(|w| have.contains(&w.trim().to_lowercase()))
        .count()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GeographyPointStrategy;

impl GeographyPointStrategy {
    pub fn distance_km(&self, candidate: &CandidateProfile, criteria: &GeoCriteria) -> Option<f64> {
        let origin = criteria.location?;
        let target = candidate.coordinates?;
        Some(origin.distance_km(&target))
    }

    pub fn score_geographic(&self, distance_km: Option<f64>, max_km: f64) -> ScoringResult {
        let Some(distance) = distance_km else {
            return ScoringResult::neutral(GEOGRAPHIC_POINTS, GEOGRAPHIC_POINTS, "distance unknown");
        };

        let points = if distance <= 1.0 {
            GEOGRAPHIC_POINTS
        } else if distance <= max_km {
            let span = if max_km - 1.0 != 0.0 { max_km - 1.0 } else { 1.0 };
            ((1.0 - (distance - 1.0) / span) * GEOGRAPHIC_POINTS).max(0.0)
        } else {
            0.0
        };

        ScoringResult::new(
            points,
            GEOGRAPHIC_POINTS,
            format!("{distance:.1} km of {max_km:.0} km"),
        )
    }

    pub fn score_skills(&self, skills: &[String], required: &[String]) -> ScoringResult {
        if required.is_empty() {
            return ScoringResult::neutral(SKILLS_POINTS, SKILLS_POINTS, "no required skills");
        }
        let matched = count_present(required, skills);
        ScoringResult::new(
            matched as f64 / required.len() as f64 * SKILLS_POINTS,
            SKILLS_POINTS,
            format!("{matched}/{} required skills", required.len()),
        )
    }

    pub fn score_health(&self, skills: &[String], conditions: &[String]) -> ScoringResult {
        if conditions.is_empty() {
            return ScoringResult::neutral(HEALTH_POINTS, HEALTH_POINTS, "no health conditions");
        }
        let matched = count_present(conditions, skills);
        let points = if matched == 0 {
            HEALTH_POINTS * 0.5
        } else {
            matched as f64 / conditions.len() as f64 * HEALTH_POINTS
        };
        ScoringResult::new(
            points,
            HEALTH_POINTS,
            format!("{matched}/{} health conditions covered", conditions.len()),
        )
    }

    pub fn score_certificates(
        &self,
        certificates: &[String],
        required: &[String],
        preferred: &[String],
    ) -> ScoringResult {
        let all_required =
            !required.is_empty() && count_present(required, certificates) == required.len();
        let preferred_matched = count_present(preferred, certificates);

        let mut points = 0.0;
        if all_required {
            points += CERTIFICATE_POINTS * 0.7;
        }
        if !preferred.is_empty() {
            points += (CERTIFICATE_POINTS * 0.3).min(preferred_matched as f64 * 2.0);
        }

        ScoringResult::new(
            points.min(CERTIFICATE_POINTS),
            CERTIFICATE_POINTS,
            format!(
                "required certificates {}, {preferred_matched}/{} preferred",
                if all_required { "complete" } else { "incomplete" },
                preferred.len()
            ),
        )
    }
}

impl ScoringStrategy for GeographyPointStrategy {
    type Input = GeoCriteria;

    fn name(&self) -> &'static str {
        "geography_first"
    }

    fn score(&self, candidate: &CandidateProfile, criteria: &GeoCriteria) -> ScoreBreakdown {
        let skills = lowercase_all(candidate.skill_names());
        let certificates = lowercase_all(candidate.certificates.iter().map(|c| c.name.as_str()));
        let distance = self.distance_km(candidate, criteria);

        let dimensions = vec![
            ("geographic", self.score_geographic(distance, criteria.max_distance_km)),
            ("skills", self.score_skills(&skills, &criteria.required_skills)),
            ("health", self.score_health(&skills, &criteria.health_conditions)),
            // No personality or availability data is modelled yet; both award full points.
            (
                "personality",
                ScoringResult::neutral(PERSONALITY_POINTS, PERSONALITY_POINTS, "placeholder"),
            ),
            (
                "availability",
                ScoringResult::neutral(AVAILABILITY_POINTS, AVAILABILITY_POINTS, "placeholder"),
            ),
            (
                "certificates",
                self.score_certificates(
                    &certificates,
                    &criteria.required_certificates,
                    &criteria.preferred_certificates,
                ),
            ),
            (
                "previousBooking",
                ScoringResult::new(0.0, PREVIOUS_BOOKING_POINTS, "not scored"),
            ),
            ("rating", ScoringResult::new(0.0, RATING_POINTS, "not scored")),
        ];

        ScoreBreakdown {
            strategy: self.name(),
            total: dimensions.iter().map(|(_, r)| r.score).sum(),
            max_total: MAX_BASE_POINTS,
            dimensions,
        }
    }
}
