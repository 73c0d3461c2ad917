use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::oracle::{OracleError, OracleVerdict};

/// Final scores at or above this are highly recommended when the oracle gives no tier.
pub const HIGHLY_RECOMMENDED_THRESHOLD: f64 = 70.0;

pub const MISSING_ENTRY_REASONING: &str = "Fallback to base score (LLM missing entry).";
pub const ORACLE_FAILED_REASONING: &str = "Fallback base score (rerank failed).";
const DEFAULT_ORACLE_REASONING: &str = "LLM rerank applied";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    HighlyRecommended,
    Recommended,
    Consider,
    NotRecommended,
}

impl Recommendation {
    pub fn from_score(final_score: f64) -> Self {
        if final_score >= HIGHLY_RECOMMENDED_THRESHOLD {
            Self::HighlyRecommended
        } else {
            Self::Recommended
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
            "HIGHLY_RECOMMENDED" => Some(Self::HighlyRecommended),
            "RECOMMENDED" => Some(Self::Recommended),
            "CONSIDER" => Some(Self::Consider),
            "NOT_RECOMMENDED" => Some(Self::NotRecommended),
            _ => None,
        }
    }
}

/// Oracle answer for one candidate after merging by id.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleOutcome {
    Matched {
        score: Option<f64>,
        delta: Option<f64>,
        reasoning: Option<String>,
        strengths: Vec<String>,
        concerns: Vec<String>,
        recommendation: Option<Recommendation>,
    },
    Unmatched,
}

impl From<OracleVerdict> for OracleOutcome {
    fn from(verdict: OracleVerdict) -> Self {
        let recommendation = verdict.recommendation.as_deref().and_then(|label| {
            let parsed = Recommendation::parse(label);
            if parsed.is_none() {
                warn!(caregiver_id = %verdict.caregiver_id, label, "unknown oracle recommendation");
            }
            parsed
        });
        OracleOutcome::Matched {
            score: verdict.score(),
            delta: verdict.delta,
            reasoning: verdict.reasoning,
            strengths: verdict.strengths,
            concerns: verdict.concerns,
            recommendation,
        }
    }
}

/// A candidate with its base score and the reranked verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate<T> {
    pub item: T,
    /// Base score on the 0..=100 scale.
    pub base_score: f64,
    pub final_score: f64,
    pub delta: f64,
    pub reasoning: String,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
    pub recommendation: Recommendation,
    pub fallback: bool,
}

impl<T> RankedCandidate<T> {
    fn fallback(item: T, base_score: f64, reasoning: &str) -> Self {
        let base_score = base_score.clamp(0.0, 100.0);
        Self {
            item,
            base_score,
            final_score: base_score,
            delta: 0.0,
            reasoning: reasoning.to_string(),
            strengths: Vec::new(),
            concerns: Vec::new(),
            recommendation: Recommendation::from_score(base_score),
            fallback: true,
        }
    }

    fn resolve(item: T, base_score: f64, outcome: OracleOutcome) -> Self {
        match outcome {
            OracleOutcome::Unmatched => Self::fallback(item, base_score, MISSING_ENTRY_REASONING),
            OracleOutcome::Matched {
                score,
                delta,
                reasoning,
                strengths,
                concerns,
                recommendation,
            } => {
                let base_score = base_score.clamp(0.0, 100.0);
                let final_score = score.unwrap_or(base_score).clamp(0.0, 100.0);
                Self {
                    item,
                    base_score,
                    final_score,
                    delta: delta.unwrap_or(final_score - base_score),
                    reasoning: reasoning
                        .filter(|r| !r.trim().is_empty())
                        .unwrap_or_else(|| DEFAULT_ORACLE_REASONING.to_string()),
                    strengths,
                    concerns,
                    recommendation: recommendation
                        .unwrap_or_else(|| Recommendation::from_score(final_score)),
                    fallback: false,
                }
            }
        }
    }
}

/// Merge oracle verdicts back onto `(id, item, base_score)` triples. Every input yields
/// exactly one output, in input order.
pub fn merge_reranked<T>(
    candidates: Vec<(String, T, f64)>,
    verdicts: Result<Vec<OracleVerdict>, OracleError>,
) -> Vec<RankedCandidate<T>> {
    let verdicts = match verdicts {
        Ok(verdicts) => verdicts,
        Err(err) => {
            warn!(error = %err, candidates = candidates.len(), "rerank failed, using base scores");
            return candidates
                .into_iter()
                .map(|(_, item, base)| RankedCandidate::fallback(item, base, ORACLE_FAILED_REASONING))
                .collect();
        }
    };

    let mut by_id: HashMap<String, OracleVerdict> = HashMap::with_capacity(verdicts.len());
    for verdict in verdicts {
        by_id.entry(verdict.caregiver_id.clone()).or_insert(verdict);
    }

    candidates
        .into_iter()
        .map(|(id, item, base)| {
            let outcome = by_id
                .remove(&id)
                .map_or(OracleOutcome::Unmatched, OracleOutcome::from);
            RankedCandidate::resolve(item, base, outcome)
        })
        .collect()
}

/// Stable sort by final score, highest first.
pub fn sort_by_final_score<T>(ranked: &mut [RankedCandidate<T>]) {
    ranked.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
}
