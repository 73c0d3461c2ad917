use serde::Serialize;
use thiserror::Error;

const SUM_TOLERANCE: f64 = 1e-6;

/// Default weights for general matching. Credentials and skills dominate.
pub const DEFAULT_WEIGHTS: WeightVector = WeightVector {
    credential: 0.25,
    skills: 0.25,
    availability: 0.15,
    rating: 0.12,
    experience: 0.08,
    distance: 0.08,
    price: 0.05,
    trust: 0.02,
};

#[derive(Debug, Error, PartialEq)]
pub enum WeightError {
    #[error("weight `{0}` must be a finite non-negative number")]
    Invalid(&'static str),
    #[error("weights must sum to 1.0 (got {0})")]
    BadSum(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightVector {
    pub credential: f64,
    pub skills: f64,
    pub availability: f64,
    pub rating: f64,
    pub experience: f64,
    pub distance: f64,
    pub price: f64,
    pub trust: f64,
}

impl Default for WeightVector {
    fn default() -> Self {
        DEFAULT_WEIGHTS
    }
}

impl WeightVector {
    /// Validated constructor: every weight finite and non-negative, sum within 1e-6 of 1.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        credential: f64,
        skills: f64,
        availability: f64,
        rating: f64,
        experience: f64,
        distance: f64,
        price: f64,
        trust: f64,
    ) -> Result<Self, WeightError> {
        let weights = Self {
            credential,
            skills,
            availability,
            rating,
            experience,
            distance,
            price,
            trust,
        };
        weights.validate()?;
        Ok(weights)
    }

    fn named(&self) -> [(&'static str, f64); 8] {
        [
            ("credential", self.credential),
            ("skills", self.skills),
            ("availability", self.availability),
            ("rating", self.rating),
            ("experience", self.experience),
            ("distance", self.distance),
            ("price", self.price),
            ("trust", self.trust),
        ]
    }

    pub fn validate(&self) -> Result<(), WeightError> {
        if let Some((name, _)) = self
            .named()
            .into_iter()
            .find(|(_, w)| !w.is_finite() || *w < 0.0)
        {
            return Err(WeightError::Invalid(name));
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(WeightError::BadSum(sum));
        }
        Ok(())
    }

    pub fn sum(&self) -> f64 {
        self.named().iter().map(|(_, w)| w).sum()
    }

    /// Rescale so the weights sum to 1. Negative entries are clamped to 0 first; an
    /// all-zero vector falls back to the defaults.
    pub fn renormalized(&self) -> Self {
        let clamp = |w: f64| if w.is_finite() { w.max(0.0) } else { 0.0 };
        let clamped = Self {
            credential: clamp(self.credential),
            skills: clamp(self.skills),
            availability: clamp(self.availability),
            rating: clamp(self.rating),
            experience: clamp(self.experience),
            distance: clamp(self.distance),
            price: clamp(self.price),
            trust: clamp(self.trust),
        };

        let sum = clamped.sum();
        if sum <= f64::EPSILON {
            return DEFAULT_WEIGHTS;
        }

        Self {
            credential: clamped.credential / sum,
            skills: clamped.skills / sum,
            availability: clamped.availability / sum,
            rating: clamped.rating / sum,
            experience: clamped.experience / sum,
            distance: clamped.distance / sum,
            price: clamped.price / sum,
            trust: clamped.trust / sum,
        }
    }
}
