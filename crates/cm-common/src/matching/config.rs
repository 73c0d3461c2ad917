use super::weights::{DEFAULT_WEIGHTS, WeightVector};

/// Upper bound on how many candidates are sent to the reranking oracle.
pub const MAX_RERANK_CANDIDATES: usize = 15;

/// Caregivers handed to the oracle when it ranks a package on its own.
pub const PACKAGE_RANK_POOL: usize = 20;
pub const DEFAULT_PACKAGE_MATCHES: usize = 5;

/// Thresholds and neutral values shared by the matching stages.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchingConfig {
    pub weights: WeightVector,
    /// Similarity a required skill needs to pass the hard filter.
    pub required_skill_threshold: f64,
    /// Similarity a preferred skill needs to count towards the skills score.
    pub preferred_skill_threshold: f64,
    /// Distance score used when either side has no coordinates.
    pub neutral_distance_score: f64,
    /// Hourly rate assumed for candidates that never set one.
    pub default_hourly_rate: f64,
    pub rerank_top_k: usize,
    pub geo_result_limit: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            weights: DEFAULT_WEIGHTS,
            required_skill_threshold: 0.80,
            preferred_skill_threshold: 0.75,
            neutral_distance_score: 0.8,
            default_hourly_rate: 100_000.0,
            rerank_top_k: MAX_RERANK_CANDIDATES,
            geo_result_limit: 10,
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

impl MatchingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            weights: defaults.weights,
            required_skill_threshold: env_f64(
                "CM_REQUIRED_SKILL_THRESHOLD",
                defaults.required_skill_threshold,
            )
            .clamp(0.0, 1.0),
            preferred_skill_threshold: env_f64(
                "CM_PREFERRED_SKILL_THRESHOLD",
                defaults.preferred_skill_threshold,
            )
            .clamp(0.0, 1.0),
            neutral_distance_score: env_f64(
                "CM_NEUTRAL_DISTANCE_SCORE",
                defaults.neutral_distance_score,
            )
            .clamp(0.0, 1.0),
            default_hourly_rate: env_f64("CM_DEFAULT_HOURLY_RATE", defaults.default_hourly_rate)
                .max(0.0),
            rerank_top_k: env_usize("CM_RERANK_TOP_K", defaults.rerank_top_k)
                .min(MAX_RERANK_CANDIDATES),
            geo_result_limit: env_usize("CM_GEO_RESULT_LIMIT", defaults.geo_result_limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    fn with_env(vars: &[(&str, Option<&str>)], f: impl FnOnce()) {
        let _guard = ENV_GUARD.lock().unwrap();
        let previous: Vec<(&str, Option<String>)> = vars
            .iter()
            .map(|(key, value)| {
                let old = std::env::var(key).ok();
                match value {
                    Some(v) => unsafe { std::env::set_var(key, v) },
                    None => unsafe { std::env::remove_var(key) },
                }
                (*key, old)
            })
            .collect();

        f();

        for (key, old) in previous {
            match old {
                Some(v) => unsafe { std::env::set_var(key, v) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
    }

    #[test]
    fn defaults_without_env() {
        with_env(
            &[
                ("CM_REQUIRED_SKILL_THRESHOLD", None),
                ("CM_RERANK_TOP_K", None),
            ],
            || {
                let config = MatchingConfig::from_env();
                assert_eq!(config.required_skill_threshold, 0.80);
                assert_eq!(config.preferred_skill_threshold, 0.75);
                assert_eq!(config.rerank_top_k, 15);
            },
        );
    }

    #[test]
    fn rerank_top_k_is_capped() {
        with_env(
            &[
                ("CM_RERANK_TOP_K", Some("40")),
                ("CM_NEUTRAL_DISTANCE_SCORE", Some("0.5")),
            ],
            || {
                let config = MatchingConfig::from_env();
                assert_eq!(config.rerank_top_k, MAX_RERANK_CANDIDATES);
                assert_eq!(config.neutral_distance_score, 0.5);
            },
        );
    }
}
