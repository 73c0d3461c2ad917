//! Label similarity for free-text skill names.
//!
//! Labels are folded (lowercase, diacritics stripped, `đ` → `d`), expanded through a
//! small bilingual variant table, and compared pairwise with bigram Dice. The best
//! pair wins.

pub mod cache;
pub mod synonyms;

use std::fmt;
use std::sync::Arc;

use strsim::sorensen_dice;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

pub use cache::{CacheSettings, NoopCache, PairKey, SimilarityCache, TtlCache};
pub use synonyms::expand_label;

/// Lowercase, decompose, drop combining marks, fold `đ`, trim.
pub fn normalize_label(label: &str) -> String {
    label
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c == 'đ' { 'd' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

#[derive(Clone)]
pub struct SimilarityEngine {
    cache: Arc<dyn SimilarityCache>,
}

impl fmt::Debug for SimilarityEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimilarityEngine")
            .field("cached_entries", &self.cache.len())
            .field("ttl", &self.cache.ttl())
            .finish()
    }
}

impl Default for SimilarityEngine {
    fn default() -> Self {
        Self::new(Arc::new(TtlCache::default()))
    }
}

impl SimilarityEngine {
    pub fn new(cache: Arc<dyn SimilarityCache>) -> Self {
        Self { cache }
    }

    /// Engine without memoization.
    pub fn uncached() -> Self {
        Self::new(Arc::new(NoopCache))
    }

    pub fn from_settings(settings: CacheSettings) -> Self {
        if settings.enabled {
            Self::new(Arc::new(TtlCache::new(settings.ttl, settings.capacity)))
        } else {
            Self::uncached()
        }
    }

    /// Similarity in `[0, 1]`. Symmetric; identical labels after folding score 1.0.
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        let left = normalize_label(a);
        let right = normalize_label(b);

        if left == right {
            return 1.0;
        }
        if left.is_empty() || right.is_empty() {
            return 0.0;
        }

        let key = PairKey::ordered(&left, &right);
        if let Some(score) = self.cache.get(&key) {
            return score;
        }

        let score = best_pairwise(&expand_label(&left), &expand_label(&right));
        self.cache.insert(key, score);
        score
    }

    /// Index and score of the best-matching label, if any label scores above zero.
    pub fn best_match<'a, I>(&self, wanted: &str, labels: I) -> Option<(usize, f64)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut best: Option<(usize, f64)> = None;
        for (idx, label) in labels.into_iter().enumerate() {
            let score = self.similarity(wanted, label);
            if score > best.map_or(0.0, |(_, s)| s) {
                best = Some((idx, score));
            }
        }
        best
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }
}

fn best_pairwise(left: &[String], right: &[String]) -> f64 {
    left.iter()
        .flat_map(|l| right.iter().map(move |r| sorensen_dice(l, r)))
        .fold(0.0_f64, f64::max)
        .clamp(0.0, 1.0)
}
