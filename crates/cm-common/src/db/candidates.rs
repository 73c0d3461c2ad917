use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_postgres::PoolError;
use serde::Serialize;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Error as PgError, Row};
use tracing::{debug, instrument};

use super::PgPool;
use super::util::TimedClientExt;
use crate::{
    AvailabilityWindow, BookingStats, BookingStatus, CandidateContext, CandidateProfile,
    CarePackage, Certificate, Coordinates, EducationLevel, ElderlyProfile, Gender, ProfileStatus,
    Recurrence, Skill, TimeRange, Weekday,
};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),
    #[error("failed to map row: {0}")]
    Mapping(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Cheap pre-prune pushed down to the store before any detail is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CandidateQuery {
    pub gender: Option<Gender>,
    pub min_experience: u32,
}

/// A caregiver the requester booked before, as seen by preference learning.
#[derive(Debug, Clone, PartialEq)]
pub struct BookedCandidate {
    pub caregiver_id: String,
    /// Mean review rating, 0 when the caregiver has none.
    pub average_rating: f64,
    pub years_of_experience: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingStats {
    pub total_caregivers: u64,
    pub approved_caregivers: u64,
    pub pending_approval: u64,
    pub total_bookings: u64,
}

/// Read-only projection over caregiver persistence.
#[async_trait]
pub trait CandidateRepository: Send + Sync {
    /// Approved caregivers with an active account. Skills, availability, reviews and
    /// booking stats are left empty; see [`CandidateRepository::load_candidate_context`].
    async fn load_approved_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<CandidateProfile>, RepositoryError>;

    async fn load_candidate_context(
        &self,
        candidate_id: &str,
    ) -> Result<CandidateContext, RepositoryError>;

    /// Completed and cancelled bookings of a careseeker, newest first.
    async fn load_requester_booking_history(
        &self,
        requester_id: &str,
    ) -> Result<Vec<BookedCandidate>, RepositoryError>;

    async fn find_elderly_profile(
        &self,
        id: &str,
    ) -> Result<Option<ElderlyProfile>, RepositoryError>;

    async fn find_care_package(&self, id: &str) -> Result<Option<CarePackage>, RepositoryError>;

    async fn matching_stats(&self) -> Result<MatchingStats, RepositoryError>;
}

const APPROVED_CANDIDATES_SQL: &str = r#"
SELECT p.user_id, u.name, u.email, u.phone, p.profile_status, p.gender, p.date_of_birth,
       p.education_level, p.years_of_experience, p.latitude, p.longitude, p.id_card_number,
       p.permanent_address, p.hourly_rate
FROM cm.caregiver_profiles p
JOIN cm.users u ON u.id = p.user_id
WHERE p.profile_status = 'approved'
  AND u.is_active
  AND ($1::TEXT IS NULL OR p.gender = $1)
  AND p.years_of_experience >= $2
ORDER BY p.user_id
"#;

const CERTIFICATES_SQL: &str = r#"
SELECT caregiver_id, name, certificate_type, issuing_organization, issue_date
FROM cm.caregiver_certificates
WHERE caregiver_id = ANY($1)
ORDER BY caregiver_id, id
"#;

const SKILLS_SQL: &str = r#"
SELECT skill_name, description
FROM cm.caregiver_skills
WHERE caregiver_id = $1
ORDER BY id
"#;

const AVAILABILITY_SQL: &str = r#"
SELECT recurrence, days_of_week, start_times, end_times
FROM cm.caregiver_availability
WHERE caregiver_id = $1 AND is_active
ORDER BY id
"#;

const REVIEWS_SQL: &str = "SELECT rating FROM cm.reviews WHERE caregiver_id = $1 ORDER BY id";

const BOOKING_COUNTS_SQL: &str = r#"
SELECT status, COUNT(*) AS n
FROM cm.bookings
WHERE caregiver_id = $1
  AND status IN ('completed', 'cancelled')
GROUP BY status
"#;

const BOOKING_HISTORY_SQL: &str = r#"
SELECT b.caregiver_id,
       p.years_of_experience,
       COALESCE(
           (SELECT AVG(r.rating)::FLOAT8 FROM cm.reviews r WHERE r.caregiver_id = b.caregiver_id),
           0
       ) AS average_rating
FROM cm.bookings b
JOIN cm.caregiver_profiles p ON p.user_id = b.caregiver_id
WHERE b.careseeker_id = $1
  AND b.status IN ('completed', 'cancelled')
ORDER BY b.created_at DESC, b.id DESC
"#;

const ELDERLY_PROFILE_SQL: &str = r#"
SELECT id, medical_conditions, personality_type, special_needs
FROM cm.elderly_profiles
WHERE id = $1
"#;

const CARE_PACKAGE_SQL: &str = r#"
SELECT id, package_name, package_type, price::FLOAT8 AS price, duration_hours::FLOAT8 AS duration_hours,
       required_skills, required_certificates, optional_certificates
FROM cm.care_packages
WHERE id = $1 AND is_active
"#;

const STATS_SQL: &str = r#"
SELECT (SELECT COUNT(*) FROM cm.caregiver_profiles) AS total,
       (SELECT COUNT(*) FROM cm.caregiver_profiles WHERE profile_status = 'approved') AS approved,
       (SELECT COUNT(*) FROM cm.caregiver_profiles WHERE profile_status = 'pending') AS pending,
       (SELECT COUNT(*) FROM cm.bookings) AS bookings
"#;

/// Postgres-backed repository over the `cm` schema.
#[derive(Clone)]
pub struct PgCandidateRepository {
    pool: PgPool,
}

impl PgCandidateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Unknown and unfinished statuses do not count towards the trust signal.
fn booking_stats_from_rows(rows: &[(String, i64)]) -> BookingStats {
    BookingStats::from_status_counts(rows.iter().filter_map(|(label, n)| {
        let status = BookingStatus::parse(label)?;
        Some((status, u32::try_from(non_negative(*n)).unwrap_or(u32::MAX)))
    }))
}

fn map_profile(row: &Row) -> Result<CandidateProfile, RepositoryError> {
    let years: i32 = row.try_get("years_of_experience")?;
    let latitude: Option<f64> = row.try_get("latitude")?;
    let longitude: Option<f64> = row.try_get("longitude")?;
    let hourly_rate: Option<i64> = row.try_get("hourly_rate")?;
    let status: String = row.try_get("profile_status")?;

    Ok(CandidateProfile {
        id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        status: ProfileStatus::parse(&status),
        gender: row
            .try_get::<_, Option<String>>("gender")?
            .as_deref()
            .and_then(Gender::from_label),
        date_of_birth: row.try_get("date_of_birth")?,
        education: row
            .try_get::<_, Option<String>>("education_level")?
            .as_deref()
            .and_then(EducationLevel::from_label),
        years_of_experience: u32::try_from(years)
            .map_err(|_| RepositoryError::Mapping(format!("negative experience: {years}")))?,
        certificates: Vec::new(),
        coordinates: latitude
            .zip(longitude)
            .map(|(lat, lon)| Coordinates::new(lat, lon))
            .filter(Coordinates::is_valid),
        id_card_number: row.try_get("id_card_number")?,
        address: row.try_get("permanent_address")?,
        hourly_rate: hourly_rate.and_then(|r| u64::try_from(r).ok()),
        ..CandidateProfile::default()
    })
}

fn map_certificate(row: &Row) -> Result<(String, Certificate), RepositoryError> {
    Ok((
        row.try_get("caregiver_id")?,
        Certificate {
            name: row.try_get("name")?,
            certificate_type: row.try_get("certificate_type")?,
            issuing_organization: row.try_get("issuing_organization")?,
            issue_date: row.try_get("issue_date")?,
        },
    ))
}

fn map_availability(row: &Row) -> Result<AvailabilityWindow, RepositoryError> {
    let recurrence: String = row.try_get("recurrence")?;
    let days: Vec<String> = row.try_get("days_of_week")?;
    let starts: Vec<String> = row.try_get("start_times")?;
    let ends: Vec<String> = row.try_get("end_times")?;

    let time_slots = starts
        .iter()
        .zip(&ends)
        .filter_map(|(start, end)| {
            let range = TimeRange::parse(start, end);
            if range.is_none() {
                debug!(start, end, "skipping malformed availability slot");
            }
            range
        })
        .collect();

    Ok(AvailabilityWindow {
        recurrence: Recurrence::parse(&recurrence),
        days_of_week: days.iter().filter_map(|d| Weekday::parse(d)).collect(),
        time_slots,
    })
}

fn map_rating(row: &Row) -> Result<u8, RepositoryError> {
    let rating: i16 = row.try_get("rating")?;
    u8::try_from(rating)
        .ok()
        .filter(|r| (1..=5).contains(r))
        .ok_or_else(|| RepositoryError::Mapping(format!("rating out of range: {rating}")))
}

#[async_trait]
impl CandidateRepository for PgCandidateRepository {
    #[instrument(skip(self))]
    async fn load_approved_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<CandidateProfile>, RepositoryError> {
        let client = self.pool.get().await?;
        let gender = query.gender.map(|g| g.stored_label());
        let min_experience = i32::try_from(query.min_experience).unwrap_or(i32::MAX);

        let rows = client
            .timed_query(
                APPROVED_CANDIDATES_SQL,
                &[&gender, &min_experience],
                "load_approved_candidates",
            )
            .await?;
        let mut candidates = rows
            .iter()
            .map(map_profile)
            .collect::<Result<Vec<_>, _>>()?;

        if candidates.is_empty() {
            return Ok(candidates);
        }

        let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
        let cert_rows = client
            .timed_query(CERTIFICATES_SQL, &[&ids], "load_candidate_certificates")
            .await?;
        let mut certificates: HashMap<String, Vec<Certificate>> = HashMap::new();
        for row in &cert_rows {
            let (caregiver_id, certificate) = map_certificate(row)?;
            certificates.entry(caregiver_id).or_default().push(certificate);
        }

        for candidate in &mut candidates {
            candidate.certificates = certificates.remove(&candidate.id).unwrap_or_default();
        }

        debug!(count = candidates.len(), "loaded approved candidates");
        Ok(candidates)
    }

    #[instrument(skip(self))]
    async fn load_candidate_context(
        &self,
        candidate_id: &str,
    ) -> Result<CandidateContext, RepositoryError> {
        let client = self.pool.get().await?;

        let params: [&(dyn ToSql + Sync); 1] = [&candidate_id];
        let (skill_rows, availability_rows, review_rows, count_rows) = tokio::try_join!(
            client.timed_query(SKILLS_SQL, &params, "load_candidate_skills"),
            client.timed_query(AVAILABILITY_SQL, &params, "load_candidate_availability"),
            client.timed_query(REVIEWS_SQL, &params, "load_candidate_reviews"),
            client.timed_query(BOOKING_COUNTS_SQL, &params, "load_booking_counts"),
        )?;

        let skills = skill_rows
            .iter()
            .map(|row| -> Result<Skill, RepositoryError> {
                Ok(Skill {
                    name: row.try_get("skill_name")?,
                    description: row.try_get("description")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let availability = availability_rows
            .iter()
            .map(map_availability)
            .collect::<Result<Vec<_>, _>>()?;
        let review_ratings = review_rows
            .iter()
            .map(map_rating)
            .collect::<Result<Vec<_>, _>>()?;

        let status_counts = count_rows
            .iter()
            .map(|row| -> Result<(String, i64), RepositoryError> {
                Ok((row.try_get("status")?, row.try_get("n")?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CandidateContext {
            skills,
            availability,
            review_ratings,
            booking_stats: booking_stats_from_rows(&status_counts),
        })
    }

    #[instrument(skip(self))]
    async fn load_requester_booking_history(
        &self,
        requester_id: &str,
    ) -> Result<Vec<BookedCandidate>, RepositoryError> {
        let client = self.pool.get().await?;
        let rows = client
            .timed_query(BOOKING_HISTORY_SQL, &[&requester_id], "load_requester_booking_history")
            .await?;

        rows.iter()
            .map(|row| -> Result<BookedCandidate, RepositoryError> {
                let years: i32 = row.try_get("years_of_experience")?;
                Ok(BookedCandidate {
                    caregiver_id: row.try_get("caregiver_id")?,
                    average_rating: row.try_get("average_rating")?,
                    years_of_experience: u32::try_from(years).unwrap_or(0),
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn find_elderly_profile(
        &self,
        id: &str,
    ) -> Result<Option<ElderlyProfile>, RepositoryError> {
        let client = self.pool.get().await?;
        let row = client
            .timed_query_opt(ELDERLY_PROFILE_SQL, &[&id], "find_elderly_profile")
            .await?;

        row.map(|row| -> Result<ElderlyProfile, RepositoryError> {
            Ok(ElderlyProfile {
                id: row.try_get("id")?,
                medical_conditions: row.try_get("medical_conditions")?,
                personality_type: row.try_get("personality_type")?,
                special_needs: row.try_get("special_needs")?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self))]
    async fn find_care_package(&self, id: &str) -> Result<Option<CarePackage>, RepositoryError> {
        let client = self.pool.get().await?;
        let row = client
            .timed_query_opt(CARE_PACKAGE_SQL, &[&id], "find_care_package")
            .await?;

        row.map(|row| -> Result<CarePackage, RepositoryError> {
            Ok(CarePackage {
                id: row.try_get("id")?,
                name: row.try_get("package_name")?,
                package_type: row.try_get("package_type")?,
                price: row.try_get("price")?,
                duration_hours: row.try_get("duration_hours")?,
                required_skills: row.try_get("required_skills")?,
                required_certificates: row.try_get("required_certificates")?,
                optional_certificates: row.try_get("optional_certificates")?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self))]
    async fn matching_stats(&self) -> Result<MatchingStats, RepositoryError> {
        let client = self.pool.get().await?;
        let row = client.timed_query_one(STATS_SQL, &[], "matching_stats").await?;

        Ok(MatchingStats {
            total_caregivers: non_negative(row.try_get("total")?),
            approved_caregivers: non_negative(row.try_get("approved")?),
            pending_approval: non_negative(row.try_get("pending")?),
            total_bookings: non_negative(row.try_get("bookings")?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_counts_clamp_to_zero() {
        assert_eq!(non_negative(-3), 0);
        assert_eq!(non_negative(12), 12);
    }

    #[test]
    fn queries_target_the_cm_schema() {
        for sql in [
            APPROVED_CANDIDATES_SQL,
            CERTIFICATES_SQL,
            SKILLS_SQL,
            AVAILABILITY_SQL,
            REVIEWS_SQL,
            BOOKING_COUNTS_SQL,
            BOOKING_HISTORY_SQL,
            ELDERLY_PROFILE_SQL,
            CARE_PACKAGE_SQL,
            STATS_SQL,
        ] {
            assert!(sql.contains("cm."), "{sql}");
        }
    }

    #[test]
    fn booking_counts_only_read_finished_bookings() {
        assert!(BOOKING_COUNTS_SQL.contains("status IN ('completed', 'cancelled')"));
    }

    #[test]
    fn pending_only_history_maps_to_empty_stats() {
        let rows = vec![("pending".to_string(), 3), ("ongoing".to_string(), 2)];
        assert_eq!(booking_stats_from_rows(&rows), BookingStats::default());

        let rows = vec![
            ("completed".to_string(), 6),
            ("cancelled".to_string(), 2),
            ("mystery".to_string(), 9),
        ];
        let stats = booking_stats_from_rows(&rows);
        assert_eq!(stats.total_bookings, 8);
        assert!((stats.completion_rate - 0.75).abs() < 1e-9);
    }

    #[test]
    fn approved_query_filters_status_and_active_accounts() {
        assert!(APPROVED_CANDIDATES_SQL.contains("profile_status = 'approved'"));
        assert!(APPROVED_CANDIDATES_SQL.contains("u.is_active"));
    }
}
