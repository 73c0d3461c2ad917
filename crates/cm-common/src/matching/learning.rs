use tracing::{debug, warn};

use super::weights::WeightVector;
use crate::db::{BookedCandidate, CandidateRepository};

/// Terminal bookings a requester needs before their weights are adjusted.
pub const MIN_BOOKINGS_FOR_LEARNING: usize = 3;

const HIGH_RATING_THRESHOLD: f64 = 4.5;
const RATING_SHIFT: f64 = 0.05;
const SENIOR_EXPERIENCE_THRESHOLD: f64 = 5.0;
const EXPERIENCE_SHIFT: f64 = 0.03;

/// Derives per-requester weights from the caregivers they booked before.
pub struct PreferenceLearner<'a> {
    repository: &'a dyn CandidateRepository,
}

impl<'a> PreferenceLearner<'a> {
    pub fn new(repository: &'a dyn CandidateRepository) -> Self {
        Self { repository }
    }

    /// Never fails: repository errors fall back to `defaults`.
    pub async fn learn_weights(&self, requester_id: &str, defaults: WeightVector) -> WeightVector {
        match self.repository.load_requester_booking_history(requester_id).await {
            Ok(history) => {
                let learned = adjust_weights(&history, defaults);
                debug!(requester_id, bookings = history.len(), ?learned, "learned weights");
                learned
            }
            Err(err) => {
                warn!(requester_id, error = %err, "weight learning failed, using defaults");
                defaults
            }
        }
    }
}

/// Pure shift rules, exposed for testing.
pub fn adjust_weights(history: &[BookedCandidate], defaults: WeightVector) -> WeightVector {
    if history.len() < MIN_BOOKINGS_FOR_LEARNING {
        return defaults;
    }

    let count = history.len() as f64;
    let avg_rating = history.iter().map(|b| b.average_rating).sum::<f64>() / count;
    let avg_experience = history
        .iter()
        .map(|b| f64::from(b.years_of_experience))
        .sum::<f64>()
        / count;

    let mut weights = defaults;
    if avg_rating > HIGH_RATING_THRESHOLD {
        weights.rating += RATING_SHIFT;
        weights.credential -= RATING_SHIFT;
    }
    if avg_experience > SENIOR_EXPERIENCE_THRESHOLD {
        weights.experience += EXPERIENCE_SHIFT;
        weights.price -= EXPERIENCE_SHIFT;
    }

    weights.renormalized()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryCandidateRepository;
    use crate::matching::weights::DEFAULT_WEIGHTS;

    fn booked(rating: f64, years: u32) -> BookedCandidate {
        BookedCandidate {
            caregiver_id: "cg".into(),
            average_rating: rating,
            years_of_experience: years,
        }
    }

    #[test]
    fn too_little_history_keeps_defaults() {
        let history = vec![booked(5.0, 10), booked(5.0, 10)];
        assert_eq!(adjust_weights(&history, DEFAULT_WEIGHTS), DEFAULT_WEIGHTS);
    }

    #[test]
    fn high_ratings_shift_credential_to_rating() {
        let history = vec![booked(4.8, 2), booked(4.9, 3), booked(5.0, 1)];
        let learned = adjust_weights(&history, DEFAULT_WEIGHTS);

        assert!((learned.sum() - 1.0).abs() < 1e-6);
        assert!((learned.rating - 0.17).abs() < 1e-9);
        assert!((learned.credential - 0.20).abs() < 1e-9);
        assert!((learned.price - DEFAULT_WEIGHTS.price).abs() < 1e-9);
    }

    #[test]
    fn senior_caregivers_shift_price_to_experience() {
        let history = vec![booked(4.0, 8), booked(3.5, 6), booked(4.2, 7)];
        let learned = adjust_weights(&history, DEFAULT_WEIGHTS);

        assert!((learned.sum() - 1.0).abs() < 1e-6);
        assert!((learned.experience - 0.11).abs() < 1e-9);
        assert!((learned.price - 0.02).abs() < 1e-9);
    }

    #[tokio::test]
    async fn learns_from_repository_history() {
        let repo = InMemoryCandidateRepository::default();
        repo.set_booking_history("seeker-1", vec![booked(5.0, 9), booked(4.9, 6), booked(4.7, 12)]);

        let learned = PreferenceLearner::new(&repo)
            .learn_weights("seeker-1", DEFAULT_WEIGHTS)
            .await;
        assert!(learned.rating > DEFAULT_WEIGHTS.rating);
        assert!(learned.experience > DEFAULT_WEIGHTS.experience);
        assert!((learned.sum() - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn repository_failure_falls_back_to_defaults() {
        let repo = InMemoryCandidateRepository::default();
        repo.fail_with("database offline");

        let learned = PreferenceLearner::new(&repo)
            .learn_weights("seeker-1", DEFAULT_WEIGHTS)
            .await;
        assert_eq!(learned, DEFAULT_WEIGHTS);
    }
}
