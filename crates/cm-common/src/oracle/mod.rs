//! Reranking oracle: an external LLM that nudges base scores of the shortlisted candidates.
//!
//! The oracle is advisory. Callers merge its verdicts with
//! [`crate::matching::rerank::merge_reranked`], which falls back to base scores for any
//! candidate the oracle skipped and for the whole batch when the call fails.

pub mod groq;

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};

use crate::Coordinates;

pub use groq::GroqRerankOracle;

pub const DEFAULT_RERANK_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_RERANK_MODEL: &str = "llama-3.1-8b-instant";

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("HTTP {status}: {body}")]
    HttpError { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("malformed oracle response: {0}")]
    Malformed(String),

    #[error("max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },

    #[error("rerank oracle is not configured")]
    NotConfigured,
}

/// What the requester asked for, as sent to the oracle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequesterContext {
    pub location: Option<Coordinates>,
    pub address: Option<String>,
    pub health_conditions: Vec<String>,
    pub personality: Option<String>,
    pub special_needs: Option<String>,
    pub required_skills: Vec<String>,
    pub required_certificates: Vec<String>,
    pub preferred_certificates: Vec<String>,
    pub preferred_gender: Option<String>,
    pub min_experience: u32,
    pub max_distance: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankCandidate {
    pub caregiver_id: String,
    pub name: String,
    pub gender: Option<String>,
    pub experience_years: u32,
    pub address: Option<String>,
    pub distance_km: Option<f64>,
    pub skills: Vec<String>,
    pub certificates: Vec<String>,
    pub rating: Option<f64>,
    /// Normalized to 0..=100.
    pub base_score: f64,
    pub breakdown: BTreeMap<String, f64>,
}

/// One entry of the oracle's `matches` array. Every field but the id is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OracleVerdict {
    pub caregiver_id: String,
    pub base_score: Option<f64>,
    pub delta: Option<f64>,
    pub adjusted_score: Option<f64>,
    pub final_score: Option<f64>,
    pub reasoning: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub strengths: Vec<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub concerns: Vec<String>,
    pub recommendation: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl OracleVerdict {
    /// `adjustedScore` wins over `finalScore`; an explicit zero is a score, not a gap.
    pub fn score(&self) -> Option<f64> {
        self.adjusted_score.or(self.final_score)
    }
}

#[async_trait]
pub trait RerankOracle: Send + Sync {
    async fn rerank(
        &self,
        ctx: &RequesterContext,
        candidates: &[RerankCandidate],
    ) -> Result<Vec<OracleVerdict>, OracleError>;

    /// False when every call is known to fail with [`OracleError::NotConfigured`].
    fn is_configured(&self) -> bool {
        true
    }

    /// Human-readable provider and model, echoed in responses.
    fn provider(&self) -> String {
        "LLM rerank".to_string()
    }
}

/// Used when no API key is configured; every call takes the fallback path.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledOracle;

#[async_trait]
impl RerankOracle for DisabledOracle {
    async fn rerank(
        &self,
        _ctx: &RequesterContext,
        _candidates: &[RerankCandidate],
    ) -> Result<Vec<OracleVerdict>, OracleError> {
        Err(OracleError::NotConfigured)
    }

    fn is_configured(&self) -> bool {
        false
    }

    fn provider(&self) -> String {
        "disabled".to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OracleConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: DEFAULT_RERANK_ENDPOINT.into(),
            model: DEFAULT_RERANK_MODEL.into(),
            api_key: String::new(),
            timeout_secs: 30,
            max_retries: 0,
            retry_backoff_ms: 500,
        }
    }
}

impl OracleConfig {
    pub fn from_env() -> Self {
        fn parse_bool(key: &str, default: bool) -> bool {
            match std::env::var(key) {
                Ok(val) => matches!(val.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
                Err(_) => default,
            }
        }

        fn parse_u64(key: &str, default: u64) -> u64 {
            std::env::var(key)
                .ok()
                .and_then(|raw| raw.parse::<u64>().ok())
                .unwrap_or(default)
        }

        let defaults = Self::default();
        let api_key = std::env::var("GROQ_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .unwrap_or_default();

        Self {
            enabled: parse_bool("CM_RERANK_ENABLED", !api_key.is_empty()),
            endpoint: std::env::var("CM_RERANK_ENDPOINT").unwrap_or(defaults.endpoint),
            model: std::env::var("CM_RERANK_MODEL").unwrap_or(defaults.model),
            api_key,
            timeout_secs: parse_u64("CM_RERANK_TIMEOUT_SECS", defaults.timeout_secs).max(1),
            max_retries: u32::try_from(parse_u64("CM_RERANK_MAX_RETRIES", 0)).unwrap_or(0),
            retry_backoff_ms: parse_u64("CM_RERANK_RETRY_BACKOFF_MS", defaults.retry_backoff_ms),
        }
    }

    /// The oracle runs only when enabled and a key is present.
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.api_key.is_empty()
    }
}
