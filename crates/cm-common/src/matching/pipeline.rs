use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use futures::future::try_join_all;
use tracing::{debug, info, instrument};

use super::config::{
    DEFAULT_PACKAGE_MATCHES, MAX_RERANK_CANDIDATES, MatchingConfig, PACKAGE_RANK_POOL,
};
use super::filters::{filter_candidates, run_geo_filters};
use super::geo_scoring::GeographyPointStrategy;
use super::learning::PreferenceLearner;
use super::request::{GeoCriteria, GeoSearchRequest, SearchRequest};
use super::rerank::{merge_reranked, sort_by_final_score};
use super::result::{
    EMPTY_AFTER_FILTERS_MESSAGE, EMPTY_POOL_MESSAGE, FEW_RESULTS_MESSAGE, FEW_RESULTS_THRESHOLD,
    GeoCandidate, GeoMatch, GeoSearchOutcome, OracleCheck, PackageRanking, RankingComparison,
    Suggestions, WeightedMatch,
};
use super::scoring::{ScoreBreakdown, ScoringStrategy, WeightedStrategy};
use super::weights::WeightVector;
use crate::db::{CandidateQuery, CandidateRepository, MatchingStats, RepositoryError};
use crate::geocode::{DisabledGeocoder, Geocoder};
use crate::oracle::{DisabledOracle, OracleError, RequesterContext, RerankCandidate, RerankOracle};
use crate::similarity::SimilarityEngine;
use crate::{CandidateProfile, CarePackage, Coordinates};

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("care package {0} not found")]
    PackageNotFound(String),
    #[error("no approved caregivers available")]
    NoCaregivers,
    #[error(transparent)]
    Oracle(#[from] OracleError),
}

/// Result of a weighted search plus what the response `meta` needs.
#[derive(Debug, Clone, PartialEq)]
pub struct FindOutcome {
    pub matches: Vec<WeightedMatch>,
    pub learning_enabled: bool,
    pub weights: WeightVector,
    /// Set only when nothing matched.
    pub suggestions: Option<Suggestions>,
}

/// Owns the collaborators of both search modes. Cheap to share behind an `Arc`.
pub struct MatchingEngine {
    repository: Arc<dyn CandidateRepository>,
    oracle: Arc<dyn RerankOracle>,
    geocoder: Arc<dyn Geocoder>,
    similarity: SimilarityEngine,
    config: MatchingConfig,
}

impl MatchingEngine {
    /// Engine with the oracle and geocoder disabled and a default similarity cache.
    pub fn new(repository: Arc<dyn CandidateRepository>, config: MatchingConfig) -> Self {
        Self {
            repository,
            oracle: Arc::new(DisabledOracle),
            geocoder: Arc::new(DisabledGeocoder),
            similarity: SimilarityEngine::default(),
            config,
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn RerankOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = geocoder;
        self
    }

    pub fn with_similarity(mut self, similarity: SimilarityEngine) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn similarity(&self) -> &SimilarityEngine {
        &self.similarity
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    pub async fn stats(&self) -> Result<MatchingStats, MatchError> {
        Ok(self.repository.matching_stats().await?)
    }

    /// Weighted search: learn, prune, hydrate, filter, score, optionally rerank, truncate.
    pub async fn find_caregivers(&self, request: &SearchRequest) -> Result<FindOutcome, MatchError> {
        self.find_caregivers_on(request, Utc::now().date_naive()).await
    }

    #[instrument(skip(self, request), fields(requester = ?request.requester_id, top_n = request.top_n))]
    pub async fn find_caregivers_on(
        &self,
        request: &SearchRequest,
        today: NaiveDate,
    ) -> Result<FindOutcome, MatchError> {
        let learning_requester = request
            .requester_id
            .as_deref()
            .filter(|_| request.use_learning);
        let weights = match learning_requester {
            Some(requester_id) => {
                PreferenceLearner::new(self.repository.as_ref())
                    .learn_weights(requester_id, self.config.weights)
                    .await
            }
            None => self.config.weights,
        };

        let query = CandidateQuery {
            gender: request.gender,
            min_experience: request.min_experience,
        };
        let pool = self.hydrated_pool(&query).await?;
        let pool_size = pool.len();

        let survivors = filter_candidates(pool, request, &self.similarity, &self.config, today);
        let strategy = WeightedStrategy::new(&self.similarity, &self.config, weights);
        let mut scored: Vec<(CandidateProfile, ScoreBreakdown)> = survivors
            .into_iter()
            .map(|candidate| {
                let breakdown = strategy.score(&candidate, request);
                (candidate, breakdown)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total.total_cmp(&a.1.total));

        let mut matches = if request.use_reranking {
            self.rerank_weighted(request, scored, today).await
        } else {
            scored
                .iter()
                .map(|(candidate, breakdown)| WeightedMatch::new(candidate, breakdown, today))
                .collect()
        };
        matches.truncate(request.top_n);

        let suggestions = matches.is_empty().then(|| {
            let message = if pool_size == 0 {
                EMPTY_POOL_MESSAGE
            } else {
                EMPTY_AFTER_FILTERS_MESSAGE
            };
            Suggestions::new(message, !request.required_skills.is_empty())
        });

        info!(pool = pool_size, returned = matches.len(), "find-caregivers completed");
        Ok(FindOutcome {
            matches,
            learning_enabled: learning_requester.is_some(),
            weights,
            suggestions,
        })
    }

    /// Reranks the head of `scored`; the tail keeps its base order after it.
    async fn rerank_weighted(
        &self,
        request: &SearchRequest,
        mut scored: Vec<(CandidateProfile, ScoreBreakdown)>,
        today: NaiveDate,
    ) -> Vec<WeightedMatch> {
        let top_k = self.rerank_limit().min(scored.len());
        let tail = scored.split_off(top_k);

        let ctx = RequesterContext {
            location: request.location,
            health_conditions: request.health_conditions.clone(),
            required_skills: request.required_skills.clone(),
            required_certificates: request.required_certificates.clone(),
            preferred_gender: request.gender.map(|g| g.stored_label().to_string()),
            min_experience: request.min_experience,
            max_distance: Some(request.max_distance_km),
            ..RequesterContext::default()
        };
        let payload: Vec<RerankCandidate> = scored
            .iter()
            .map(|(candidate, breakdown)| {
                let distance_km = request
                    .location
                    .zip(candidate.coordinates)
                    .map(|(from, to)| from.distance_km(&to));
                rerank_candidate(candidate, breakdown, base_percent(breakdown), distance_km)
            })
            .collect();

        let verdicts = self.oracle.rerank(&ctx, &payload).await;
        let inputs = scored
            .into_iter()
            .map(|(candidate, breakdown)| {
                let base = base_percent(&breakdown);
                (candidate.id.clone(), (candidate, breakdown), base)
            })
            .collect();
        let mut ranked = merge_reranked(inputs, verdicts);
        sort_by_final_score(&mut ranked);

        ranked
            .iter()
            .map(|r| WeightedMatch::new(&r.item.0, &r.item.1, today).with_rerank(r))
            .chain(
                tail.iter()
                    .map(|(candidate, breakdown)| WeightedMatch::new(candidate, breakdown, today)),
            )
            .collect()
    }

    /// Geography-first search: locate, merge requirements, filter, score on 145 points,
    /// rerank the top candidates and keep the best `geo_result_limit`.
    #[instrument(skip(self, request), fields(address = %request.address))]
    pub async fn search_caregivers(
        &self,
        request: &GeoSearchRequest,
    ) -> Result<GeoSearchOutcome, MatchError> {
        let location = self.locate(request).await;

        let elderly = match request.elderly_id.as_deref() {
            Some(id) => self.repository.find_elderly_profile(id).await?,
            None => None,
        };
        let package = match request.package_id.as_deref() {
            Some(id) => self.repository.find_care_package(id).await?,
            None => None,
        };
        let criteria = GeoCriteria::merge(request, location, elderly.as_ref(), package.as_ref());
        let has_required_skills = !criteria.required_skills.is_empty();

        let query = CandidateQuery {
            gender: request.gender_filter(),
            min_experience: request.min_experience,
        };
        let pool = self.hydrated_pool(&query).await?;
        if pool.is_empty() {
            info!("no approved caregivers matched the pre-filter");
            return Ok(GeoSearchOutcome::empty(EMPTY_POOL_MESSAGE, has_required_skills));
        }

        let strategy = GeographyPointStrategy;
        let mut scored: Vec<GeoCandidate> = pool
            .into_iter()
            .filter_map(|profile| {
                let distance_km = strategy.distance_km(&profile, &criteria);
                let outcome = run_geo_filters(&profile, &criteria, distance_km);
                if let Some(reasons) = outcome.reject_reasons() {
                    debug!(caregiver_id = %profile.id, %reasons, "candidate filtered out");
                    return None;
                }
                let breakdown = strategy.score(&profile, &criteria);
                Some(GeoCandidate {
                    profile,
                    distance_km,
                    breakdown,
                })
            })
            .collect();
        if scored.is_empty() {
            info!("every caregiver was removed by the hard filters");
            return Ok(GeoSearchOutcome::empty(
                EMPTY_AFTER_FILTERS_MESSAGE,
                has_required_skills,
            ));
        }

        scored.sort_by(|a, b| b.base_points().total_cmp(&a.base_points()));
        scored.truncate(self.rerank_limit());

        let ctx = requester_context(&criteria);
        let payload: Vec<RerankCandidate> = scored
            .iter()
            .map(|c| rerank_candidate(&c.profile, &c.breakdown, c.normalized_base(), c.distance_km))
            .collect();
        let verdicts = self.oracle.rerank(&ctx, &payload).await;

        let inputs = scored
            .into_iter()
            .map(|c| {
                let base = c.normalized_base();
                (c.profile.id.clone(), c, base)
            })
            .collect();
        let mut ranked = merge_reranked(inputs, verdicts);
        sort_by_final_score(&mut ranked);

        let total = ranked.len();
        let matches: Vec<GeoMatch> = ranked
            .into_iter()
            .take(self.config.geo_result_limit)
            .map(GeoMatch::from)
            .collect();
        let returned = matches.len();
        info!(total, returned, "geography-first search completed");

        Ok(GeoSearchOutcome {
            total,
            returned,
            matches,
            suggestions: (returned < FEW_RESULTS_THRESHOLD)
                .then(|| Suggestions::new(FEW_RESULTS_MESSAGE, has_required_skills)),
        })
    }

    /// Oracle-led ranking of the approved caregivers against a package's services. Weighted
    /// scores are the fallback for anything the oracle skips.
    pub async fn rank_for_package(
        &self,
        package_id: &str,
        max_results: usize,
    ) -> Result<PackageRanking, MatchError> {
        self.rank_for_package_on(package_id, max_results, Utc::now().date_naive())
            .await
    }

    pub async fn rank_for_package_on(
        &self,
        package_id: &str,
        max_results: usize,
        today: NaiveDate,
    ) -> Result<PackageRanking, MatchError> {
        let package = self.care_package(package_id).await?;
        self.rank_package(package, max_results, today).await
    }

    /// Oracle ranking and weighted search side by side, each with its own timing.
    pub async fn compare_for_package(
        &self,
        package_id: &str,
        requester_id: Option<String>,
    ) -> Result<RankingComparison, MatchError> {
        self.compare_for_package_on(package_id, requester_id, Utc::now().date_naive())
            .await
    }

    pub async fn compare_for_package_on(
        &self,
        package_id: &str,
        requester_id: Option<String>,
        today: NaiveDate,
    ) -> Result<RankingComparison, MatchError> {
        let package = self.care_package(package_id).await?;
        let rule_request = SearchRequest {
            required_skills: package.required_skills.clone(),
            ..SearchRequest::unfiltered(requester_id, DEFAULT_PACKAGE_MATCHES)
        };

        let oracle = self.rank_package(package, DEFAULT_PACKAGE_MATCHES, today).await?;
        let started = Instant::now();
        let rule_based = self.find_caregivers_on(&rule_request, today).await?;

        Ok(RankingComparison {
            oracle,
            rule_based: rule_based.matches,
            rule_based_ms: elapsed_ms(started),
        })
    }

    /// One oracle round trip with a single real caregiver. Unlike the ranking paths,
    /// a failure here is returned rather than replaced by base scores.
    #[instrument(skip(self))]
    pub async fn check_oracle(&self) -> Result<OracleCheck, MatchError> {
        if !self.oracle.is_configured() {
            return Err(OracleError::NotConfigured.into());
        }

        let mut pool = self
            .repository
            .load_approved_candidates(&CandidateQuery::default())
            .await?;
        pool.truncate(1);
        let candidate = self
            .hydrate(pool)
            .await?
            .into_iter()
            .next()
            .ok_or(MatchError::NoCaregivers)?;

        let request = SearchRequest::unfiltered(None, 1);
        let breakdown = WeightedStrategy::new(&self.similarity, &self.config, self.config.weights)
            .score(&candidate, &request);
        let payload = [rerank_candidate(&candidate, &breakdown, base_percent(&breakdown), None)];

        let started = Instant::now();
        let verdicts = self.oracle.rerank(&RequesterContext::default(), &payload).await?;
        let response_time_ms = elapsed_ms(started);
        info!(verdicts = verdicts.len(), response_time_ms, "oracle check passed");

        Ok(OracleCheck {
            provider: self.oracle.provider(),
            caregiver_id: candidate.id,
            verdicts: verdicts.len(),
            response_time_ms,
        })
    }

    async fn care_package(&self, package_id: &str) -> Result<CarePackage, MatchError> {
        self.repository
            .find_care_package(package_id)
            .await?
            .ok_or_else(|| MatchError::PackageNotFound(package_id.to_string()))
    }

    #[instrument(skip(self, package), fields(package = %package.id))]
    async fn rank_package(
        &self,
        package: CarePackage,
        max_results: usize,
        today: NaiveDate,
    ) -> Result<PackageRanking, MatchError> {
        let started = Instant::now();
        let mut pool = self
            .repository
            .load_approved_candidates(&CandidateQuery::default())
            .await?;
        if pool.is_empty() {
            return Err(MatchError::NoCaregivers);
        }
        let total_caregivers = pool.len();
        pool.truncate(PACKAGE_RANK_POOL);
        let pool = self.hydrate(pool).await?;

        let request = SearchRequest {
            preferred_skills: package.required_skills.clone(),
            required_certificates: package.required_certificates.clone(),
            use_learning: false,
            ..SearchRequest::unfiltered(None, max_results.clamp(1, PACKAGE_RANK_POOL))
        };
        let strategy = WeightedStrategy::new(&self.similarity, &self.config, self.config.weights);
        let mut scored: Vec<(CandidateProfile, ScoreBreakdown)> = pool
            .into_iter()
            .map(|candidate| {
                let breakdown = strategy.score(&candidate, &request);
                (candidate, breakdown)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total.total_cmp(&a.1.total));

        let ctx = RequesterContext {
            required_skills: package.required_skills.clone(),
            required_certificates: package.required_certificates.clone(),
            preferred_certificates: package.optional_certificates.clone(),
            ..RequesterContext::default()
        };
        let payload: Vec<RerankCandidate> = scored
            .iter()
            .map(|(candidate, breakdown)| {
                rerank_candidate(candidate, breakdown, base_percent(breakdown), None)
            })
            .collect();
        let verdicts = self.oracle.rerank(&ctx, &payload).await;

        let inputs = scored
            .into_iter()
            .map(|(candidate, breakdown)| {
                let base = base_percent(&breakdown);
                (candidate.id.clone(), (candidate, breakdown), base)
            })
            .collect();
        let mut ranked = merge_reranked(inputs, verdicts);
        sort_by_final_score(&mut ranked);

        let fallback = ranked.iter().all(|r| r.fallback);
        let matches: Vec<WeightedMatch> = ranked
            .iter()
            .take(request.top_n)
            .map(|r| WeightedMatch::new(&r.item.0, &r.item.1, today).with_rerank(r))
            .collect();
        info!(total_caregivers, returned = matches.len(), fallback, "package ranking completed");

        Ok(PackageRanking {
            package,
            total_caregivers,
            matches,
            fallback,
            provider: self.oracle.provider(),
            elapsed_ms: elapsed_ms(started),
        })
    }

    async fn locate(&self, request: &GeoSearchRequest) -> Option<Coordinates> {
        match request.coordinates.filter(Coordinates::is_valid) {
            Some(coordinates) => Some(coordinates),
            None => self.geocoder.geocode(&request.address).await,
        }
    }

    /// Pushed-down pool with skills, availability, reviews and booking stats loaded concurrently.
    async fn hydrated_pool(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<CandidateProfile>, RepositoryError> {
        let pool = self.repository.load_approved_candidates(query).await?;
        self.hydrate(pool).await
    }

    async fn hydrate(
        &self,
        pool: Vec<CandidateProfile>,
    ) -> Result<Vec<CandidateProfile>, RepositoryError> {
        let repository = self.repository.as_ref();
        try_join_all(pool.into_iter().map(|candidate| async move {
            let context = repository.load_candidate_context(&candidate.id).await?;
            Ok::<_, RepositoryError>(candidate.with_context(context))
        }))
        .await
    }

    fn rerank_limit(&self) -> usize {
        self.config.rerank_top_k.clamp(1, MAX_RERANK_CANDIDATES)
    }
}

/// Weighted total on the 0..=100 scale the oracle works in.
fn base_percent(breakdown: &ScoreBreakdown) -> f64 {
    (breakdown.total * 100.0).round()
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn requester_context(criteria: &GeoCriteria) -> RequesterContext {
    RequesterContext {
        location: criteria.location,
        address: Some(criteria.address.clone()),
        health_conditions: criteria.health_conditions.clone(),
        personality: criteria.personality.clone(),
        special_needs: criteria.special_needs.clone(),
        required_skills: criteria.required_skills.clone(),
        required_certificates: criteria.required_certificates.clone(),
        preferred_certificates: criteria.preferred_certificates.clone(),
        preferred_gender: criteria.preferred_gender.clone(),
        min_experience: criteria.min_experience,
        max_distance: Some(criteria.max_distance_km),
    }
}

fn rerank_candidate(
    candidate: &CandidateProfile,
    breakdown: &ScoreBreakdown,
    base_score: f64,
    distance_km: Option<f64>,
) -> RerankCandidate {
    let rating = (!candidate.review_ratings.is_empty()).then(|| candidate.average_rating());
    RerankCandidate {
        caregiver_id: candidate.id.clone(),
        name: candidate.name.clone(),
        gender: candidate.gender.map(|g| g.stored_label().to_string()),
        experience_years: candidate.years_of_experience,
        address: candidate.address.clone(),
        distance_km: distance_km.map(|d| (d * 10.0).round() / 10.0),
        skills: candidate.skill_names().map(str::to_string).collect(),
        certificates: candidate.certificates.iter().map(|c| c.name.clone()).collect(),
        rating,
        base_score,
        breakdown: breakdown
            .dimensions
            .iter()
            .map(|(name, result)| ((*name).to_string(), result.score))
            .collect::<BTreeMap<_, _>>(),
    }
}
