use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::candidates::{
    BookedCandidate, CandidateQuery, CandidateRepository, MatchingStats, RepositoryError,
};
use crate::{
    BookingStats, BookingStatus, CandidateContext, CandidateProfile, CarePackage, ElderlyProfile,
    ProfileStatus,
};

#[derive(Debug, Default)]
struct MemoryState {
    /// Full profiles including context, in insertion order.
    candidates: Vec<CandidateProfile>,
    inactive: Vec<String>,
    histories: HashMap<String, Vec<BookedCandidate>>,
    /// Raw booking statuses per caregiver; when present they replace the seeded stats.
    bookings: HashMap<String, Vec<BookingStatus>>,
    elderly: HashMap<String, ElderlyProfile>,
    packages: HashMap<String, CarePackage>,
    failure: Option<String>,
}

/// Seedable repository for tests and local runs without Postgres.
#[derive(Debug, Default)]
pub struct InMemoryCandidateRepository {
    state: Mutex<MemoryState>,
    calls: AtomicUsize,
}

impl InMemoryCandidateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candidates(candidates: impl IntoIterator<Item = CandidateProfile>) -> Self {
        let repo = Self::default();
        for candidate in candidates {
            repo.insert_candidate(candidate);
        }
        repo
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a caregiver, keyed by id.
    pub fn insert_candidate(&self, candidate: CandidateProfile) {
        let mut state = self.state();
        match state.candidates.iter_mut().find(|c| c.id == candidate.id) {
            Some(existing) => *existing = candidate,
            None => state.candidates.push(candidate),
        }
    }

    /// Hide a caregiver as if the linked account were deactivated.
    pub fn deactivate_account(&self, candidate_id: &str) {
        self.state().inactive.push(candidate_id.to_string());
    }

    pub fn set_booking_history(&self, requester_id: &str, history: Vec<BookedCandidate>) {
        self.state()
            .histories
            .insert(requester_id.to_string(), history);
    }

    pub fn record_booking(&self, caregiver_id: &str, status: BookingStatus) {
        self.state()
            .bookings
            .entry(caregiver_id.to_string())
            .or_default()
            .push(status);
    }

    pub fn insert_elderly_profile(&self, profile: ElderlyProfile) {
        self.state().elderly.insert(profile.id.clone(), profile);
    }

    pub fn insert_care_package(&self, package: CarePackage) {
        self.state().packages.insert(package.id.clone(), package);
    }

    /// Make every subsequent call fail with [`RepositoryError::Unavailable`].
    pub fn fail_with(&self, message: impl Into<String>) {
        self.state().failure = Some(message.into());
    }

    /// Number of repository calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<MutexGuard<'_, MemoryState>, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        match &state.failure {
            Some(message) => Err(RepositoryError::Unavailable(message.clone())),
            None => Ok(state),
        }
    }
}

#[async_trait]
impl CandidateRepository for InMemoryCandidateRepository {
    async fn load_approved_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<CandidateProfile>, RepositoryError> {
        let state = self.check()?;
        Ok(state
            .candidates
            .iter()
            .filter(|c| c.status == ProfileStatus::Approved)
            .filter(|c| !state.inactive.contains(&c.id))
            .filter(|c| query.gender.is_none_or(|g| c.gender == Some(g)))
            .filter(|c| c.years_of_experience >= query.min_experience)
            .map(|c| CandidateProfile {
                skills: Vec::new(),
                availability: Vec::new(),
                review_ratings: Vec::new(),
                booking_stats: Default::default(),
                ..c.clone()
            })
            .collect())
    }

    async fn load_candidate_context(
        &self,
        candidate_id: &str,
    ) -> Result<CandidateContext, RepositoryError> {
        let state = self.check()?;
        let recorded = state
            .bookings
            .get(candidate_id)
            .map(|statuses| BookingStats::from_status_counts(statuses.iter().map(|s| (*s, 1))));

        Ok(state
            .candidates
            .iter()
            .find(|c| c.id == candidate_id)
            .map(|c| CandidateContext {
                skills: c.skills.clone(),
                availability: c.availability.clone(),
                review_ratings: c.review_ratings.clone(),
                booking_stats: recorded.unwrap_or(c.booking_stats),
            })
            .unwrap_or_default())
    }

    async fn load_requester_booking_history(
        &self,
        requester_id: &str,
    ) -> Result<Vec<BookedCandidate>, RepositoryError> {
        let state = self.check()?;
        Ok(state.histories.get(requester_id).cloned().unwrap_or_default())
    }

    async fn find_elderly_profile(
        &self,
        id: &str,
    ) -> Result<Option<ElderlyProfile>, RepositoryError> {
        Ok(self.check()?.elderly.get(id).cloned())
    }

    async fn find_care_package(&self, id: &str) -> Result<Option<CarePackage>, RepositoryError> {
        Ok(self.check()?.packages.get(id).cloned())
    }

    async fn matching_stats(&self) -> Result<MatchingStats, RepositoryError> {
        let state = self.check()?;
        let count = |status: ProfileStatus| {
            state.candidates.iter().filter(|c| c.status == status).count() as u64
        };
        Ok(MatchingStats {
            total_caregivers: state.candidates.len() as u64,
            approved_caregivers: count(ProfileStatus::Approved),
            pending_approval: count(ProfileStatus::Pending),
            total_bookings: state
                .candidates
                .iter()
                .map(|c| u64::from(c.booking_stats.total_bookings))
                .sum(),
        })
    }
}
