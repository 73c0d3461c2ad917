use chrono::NaiveDate;

use super::config::MatchingConfig;
use super::request::{GeoCriteria, SearchRequest};
use crate::CandidateProfile;
use crate::similarity::SimilarityEngine;

/// Outcome of a single hard filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterDecision {
    Pass,
    Reject { reason: String },
}

impl FilterDecision {
    pub fn is_reject(&self) -> bool {
        matches!(self, FilterDecision::Reject { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            FilterDecision::Reject { reason } => Some(reason),
            FilterDecision::Pass => None,
        }
    }

    fn reject_if(rejected: bool, reason: impl FnOnce() -> String) -> Self {
        if rejected {
            FilterDecision::Reject { reason: reason() }
        } else {
            FilterDecision::Pass
        }
    }
}

/// Every named decision for one candidate. A single reject excludes the candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub decisions: Vec<(&'static str, FilterDecision)>,
}

impl FilterOutcome {
    pub fn new(decisions: Vec<(&'static str, FilterDecision)>) -> Self {
        Self { decisions }
    }

    pub fn passed(&self) -> bool {
        !self.decisions.iter().any(|(_, d)| d.is_reject())
    }

    /// Reject reasons joined with `; `, `None` when the candidate passed.
    pub fn reject_reasons(&self) -> Option<String> {
        let reasons: Vec<_> = self
            .decisions
            .iter()
            .filter_map(|(name, d)| d.reason().map(|r| format!("{name}: {r}")))
            .collect();

        if reasons.is_empty() {
            None
        } else {
            Some(reasons.join("; "))
        }
    }
}

/// All hard filters of the weighted path. Constraints left empty pass automatically.
pub fn run_hard_filters(
    candidate: &CandidateProfile,
    request: &SearchRequest,
    engine: &SimilarityEngine,
    config: &MatchingConfig,
    today: NaiveDate,
) -> FilterOutcome {
    FilterOutcome::new(vec![
        ("care_level", check_care_level(candidate, request)),
        (
            "required_skills",
            check_required_skills(candidate, &request.required_skills, engine, config),
        ),
        (
            "required_certificates",
            check_certificates(candidate, &request.required_certificates),
        ),
        ("time_slots", check_time_slots(candidate, request)),
        ("min_rating", check_min_rating(candidate, request.min_rating)),
        (
            "min_experience",
            check_min_experience(candidate, request.min_experience),
        ),
        ("gender", check_gender(candidate, request)),
        ("age_range", check_age_range(candidate, request, today)),
    ])
}

/// Survivors of [`run_hard_filters`], input order preserved.
pub fn filter_candidates(
    candidates: Vec<CandidateProfile>,
    request: &SearchRequest,
    engine: &SimilarityEngine,
    config: &MatchingConfig,
    today: NaiveDate,
) -> Vec<CandidateProfile> {
    candidates
        .into_iter()
        .filter(|candidate| {
            let outcome = run_hard_filters(candidate, request, engine, config, today);
            if let Some(reasons) = outcome.reject_reasons() {
                tracing::debug!(caregiver_id = %candidate.id, %reasons, "candidate filtered out");
            }
            outcome.passed()
        })
        .collect()
}

/// Hard filters of the geography-first path: exact skills, certificate names, distance cap.
pub fn run_geo_filters(
    candidate: &CandidateProfile,
    criteria: &GeoCriteria,
    distance_km: Option<f64>,
) -> FilterOutcome {
    let skills: Vec<String> = candidate
        .skill_names()
        .map(|s| s.trim().to_lowercase())
        .collect();
    let missing_skills: Vec<&str> = criteria
        .required_skills
        .iter()
        .filter(|s| !skills.contains(&s.trim().to_lowercase()))
        .map(String::as_str)
        .collect();

    FilterOutcome::new(vec![
        (
            "required_skills",
            FilterDecision::reject_if(!missing_skills.is_empty(), || {
                format!("missing {}", missing_skills.join(", "))
            }),
        ),
        (
            "required_certificates",
            check_certificates(candidate, &criteria.required_certificates),
        ),
        (
            "distance",
            match distance_km {
                Some(d) => FilterDecision::reject_if(d > criteria.max_distance_km, || {
                    format!("{d:.1} km > {:.1} km", criteria.max_distance_km)
                }),
                None => FilterDecision::Pass,
            },
        ),
    ])
}

fn check_care_level(candidate: &CandidateProfile, request: &SearchRequest) -> FilterDecision {
    if !request.care_level.requires_higher_education() {
        return FilterDecision::Pass;
    }
    FilterDecision::reject_if(
        !candidate.education.is_some_and(|e| e.is_higher_education()),
        || {
            format!(
                "care level {} requires bachelor or graduate education",
                request.care_level.get()
            )
        },
    )
}

fn check_required_skills(
    candidate: &CandidateProfile,
    required: &[String],
    engine: &SimilarityEngine,
    config: &MatchingConfig,
) -> FilterDecision {
    let missing = required.iter().find(|wanted| {
        !candidate
            .skill_names()
            .any(|have| engine.similarity(wanted, have) >= config.required_skill_threshold)
    });

    match missing {
        Some(skill) => FilterDecision::Reject {
            reason: format!("no skill similar to `{skill}`"),
        },
        None => FilterDecision::Pass,
    }
}

fn check_certificates(candidate: &CandidateProfile, required: &[String]) -> FilterDecision {
    match required.iter().find(|name| !candidate.has_certificate_named(name)) {
        Some(name) => FilterDecision::Reject {
            reason: format!("missing certificate `{name}`"),
        },
        None => FilterDecision::Pass,
    }
}

fn check_time_slots(candidate: &CandidateProfile, request: &SearchRequest) -> FilterDecision {
    let uncovered = request
        .time_slots
        .iter()
        .filter(|slot| !candidate.availability.iter().any(|w| w.covers(slot)))
        .count();
    FilterDecision::reject_if(uncovered > 0, || {
        format!("{uncovered} requested slot(s) not covered")
    })
}

fn check_min_rating(candidate: &CandidateProfile, min_rating: f64) -> FilterDecision {
    let rating = candidate.average_rating();
    FilterDecision::reject_if(rating < min_rating, || {
        format!("rating {rating:.2} < {min_rating:.2}")
    })
}

fn check_min_experience(candidate: &CandidateProfile, min_years: u32) -> FilterDecision {
    FilterDecision::reject_if(candidate.years_of_experience < min_years, || {
        format!(
            "{} year(s) < {min_years}",
            candidate.years_of_experience
        )
    })
}

fn check_gender(candidate: &CandidateProfile, request: &SearchRequest) -> FilterDecision {
    match request.gender {
        Some(wanted) => FilterDecision::reject_if(candidate.gender != Some(wanted), || {
            format!("gender is not {}", wanted.stored_label())
        }),
        None => FilterDecision::Pass,
    }
}

fn check_age_range(
    candidate: &CandidateProfile,
    request: &SearchRequest,
    today: NaiveDate,
) -> FilterDecision {
    let Some(range) = request.age_range else {
        return FilterDecision::Pass;
    };
    match candidate.age_on(today) {
        Some(age) => FilterDecision::reject_if(!range.contains(age), || {
            format!("age {age} outside {}..={}", range.min, range.max)
        }),
        None => FilterDecision::Reject {
            reason: "date of birth unknown".into(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::request::{AgeRange, CareLevel, GeoSearchRequest};
    use crate::{
        AvailabilityWindow, Certificate, EducationLevel, Gender, Recurrence, Skill, TimeRange,
        TimeSlot, Weekday,
    };

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn candidate() -> CandidateProfile {
        CandidateProfile {
            id: "cg-1".into(),
            gender: Some(Gender::Female),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1),
            education: Some(EducationLevel::Bachelor),
            years_of_experience: 4,
            certificates: vec![Certificate {
                name: "Chứng chỉ sơ cứu".into(),
                ..Certificate::default()
            }],
            skills: vec![
                Skill {
                    name: "tiêm thuốc".into(),
                    description: None,
                },
                Skill {
                    name: "Tắm rửa".into(),
                    description: None,
                },
            ],
            availability: vec![AvailabilityWindow {
                recurrence: Recurrence::Weekly,
                days_of_week: vec![Weekday::Monday, Weekday::Wednesday],
                time_slots: vec![TimeRange::parse("08:00", "17:00").unwrap()],
            }],
            review_ratings: vec![4, 5],
            ..CandidateProfile::default()
        }
    }

    fn passes(request: &SearchRequest) -> bool {
        let engine = SimilarityEngine::uncached();
        run_hard_filters(&candidate(), request, &engine, &MatchingConfig::default(), today()).passed()
    }

    #[test]
    fn empty_request_passes() {
        assert!(passes(&SearchRequest::default()));
    }

    #[test]
    fn insulin_request_matches_injection_skill() {
        let request = SearchRequest {
            required_skills: vec!["tiêm insulin".into()],
            ..SearchRequest::default()
        };
        assert!(passes(&request));
    }

    #[test]
    fn unrelated_required_skill_rejects() {
        let request = SearchRequest {
            required_skills: vec!["tiêm insulin".into(), "quản lý tài chính".into()],
            ..SearchRequest::default()
        };
        let engine = SimilarityEngine::uncached();
        let outcome = run_hard_filters(
            &candidate(),
            &request,
            &engine,
            &MatchingConfig::default(),
            today(),
        );
        assert!(!outcome.passed());
        assert!(outcome.reject_reasons().unwrap().starts_with("required_skills"));
    }

    #[test]
    fn care_level_two_needs_higher_education() {
        let request = SearchRequest {
            care_level: CareLevel::new(2).unwrap(),
            ..SearchRequest::default()
        };
        assert!(passes(&request));

        let engine = SimilarityEngine::uncached();
        let secondary = CandidateProfile {
            education: Some(EducationLevel::UpperSecondary),
            ..candidate()
        };
        let outcome = run_hard_filters(&secondary, &request, &engine, &MatchingConfig::default(), today());
        assert!(outcome.decisions[0].1.is_reject());
    }

    #[test]
    fn certificate_names_compare_case_insensitively() {
        let mut request = SearchRequest {
            required_certificates: vec!["CHỨNG CHỈ SƠ CỨU".into()],
            ..SearchRequest::default()
        };
        assert!(passes(&request));
        request.required_certificates.push("Điều dưỡng".into());
        assert!(!passes(&request));
    }

    #[test]
    fn every_time_slot_must_be_covered() {
        let monday = TimeSlot {
            day: Weekday::Monday,
            range: TimeRange::parse("09:00", "11:00").unwrap(),
        };
        let sunday = TimeSlot {
            day: Weekday::Sunday,
            ..monday
        };
        let mut request = SearchRequest {
            time_slots: vec![monday],
            ..SearchRequest::default()
        };
        assert!(passes(&request));
        request.time_slots.push(sunday);
        assert!(!passes(&request));
    }

    #[test]
    fn unreviewed_candidates_count_as_zero_rating() {
        let engine = SimilarityEngine::uncached();
        let request = SearchRequest {
            min_rating: 0.5,
            ..SearchRequest::default()
        };
        let unreviewed = CandidateProfile {
            review_ratings: vec![],
            ..candidate()
        };
        assert!(passes(&request));
        assert!(
            !run_hard_filters(&unreviewed, &request, &engine, &MatchingConfig::default(), today())
                .passed()
        );
    }

    #[test]
    fn experience_gender_and_age() {
        assert!(!passes(&SearchRequest {
            min_experience: 5,
            ..SearchRequest::default()
        }));
        assert!(!passes(&SearchRequest {
            gender: Some(Gender::Male),
            ..SearchRequest::default()
        }));
        assert!(passes(&SearchRequest {
            age_range: AgeRange::new(30, 40),
            ..SearchRequest::default()
        }));
        assert!(!passes(&SearchRequest {
            age_range: AgeRange::new(18, 30),
            ..SearchRequest::default()
        }));
    }

    #[test]
    fn adding_constraints_never_grows_the_pool() {
        let engine = SimilarityEngine::uncached();
        let config = MatchingConfig::default();
        let pool: Vec<CandidateProfile> = (0..6)
            .map(|i| CandidateProfile {
                id: format!("cg-{i}"),
                years_of_experience: i,
                review_ratings: vec![(i % 5 + 1) as u8],
                ..candidate()
            })
            .collect();

        let mut request = SearchRequest::default();
        let mut previous = filter_candidates(pool.clone(), &request, &engine, &config, today()).len();
        for step in 0..3 {
            match step {
                0 => request.min_experience = 2,
                1 => request.min_rating = 3.0,
                _ => request.required_skills.push("tắm rửa".into()),
            }
            let size = filter_candidates(pool.clone(), &request, &engine, &config, today()).len();
            assert!(size <= previous);
            previous = size;
        }
    }

    #[test]
    fn geo_filters_use_exact_names_and_distance_cap() {
        let mut criteria = GeoCriteria::merge(&GeoSearchRequest::new("Quận 1"), None, None, None);
        criteria.required_skills = vec!["tắm rửa".into()];
        assert!(run_geo_filters(&candidate(), &criteria, Some(3.0)).passed());
        assert!(!run_geo_filters(&candidate(), &criteria, Some(7.5)).passed());
        assert!(run_geo_filters(&candidate(), &criteria, None).passed());

        criteria.required_skills = vec!["tiêm insulin".into()];
        assert!(!run_geo_filters(&candidate(), &criteria, None).passed());
    }
}
