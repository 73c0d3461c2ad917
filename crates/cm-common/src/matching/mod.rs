//! Matching stages: hard filters, scoring strategies, preference learning, oracle
//! reranking and result assembly, orchestrated by [`MatchingEngine`].

pub mod config;
pub mod filters;
pub mod geo_scoring;
pub mod learning;
pub mod pipeline;
pub mod request;
pub mod rerank;
pub mod result;
pub mod scoring;
pub mod weights;

pub use config::{DEFAULT_PACKAGE_MATCHES, MAX_RERANK_CANDIDATES, MatchingConfig, PACKAGE_RANK_POOL};
pub use filters::{FilterDecision, FilterOutcome, filter_candidates, run_geo_filters, run_hard_filters};
pub use geo_scoring::{GeographyPointStrategy, MAX_BASE_POINTS, normalize_base};
pub use learning::{PreferenceLearner, adjust_weights};
pub use pipeline::{FindOutcome, MatchError, MatchingEngine};
pub use request::{AgeRange, CareLevel, GeoCriteria, GeoSearchRequest, ProfileOverride, SearchRequest};
pub use rerank::{RankedCandidate, Recommendation, merge_reranked, sort_by_final_score};
pub use result::{
    GeoMatch, GeoSearchOutcome, MatchLevel, OracleCheck, PackageRanking, RankingComparison,
    Suggestions, WeightedMatch,
};
pub use scoring::{ScoreBreakdown, ScoringResult, ScoringStrategy, WeightedStrategy};
pub use weights::{DEFAULT_WEIGHTS, WeightError, WeightVector};
