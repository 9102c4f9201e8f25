use crate::embeddings::Embedding;
use crate::error::{RagError, Result};
use crate::index::{cosine_similarity, ScoredChunk};
use log::debug;

// Tolerance for float rounding when comparing against the threshold
const SCORE_EPSILON: f32 = 1e-6;

/// Drops retrieved chunks whose cosine similarity to the query is below a threshold
#[derive(Debug, Clone, Copy)]
pub struct RelevanceFilter {
    threshold: f32,
}

impl RelevanceFilter {
    pub fn new(threshold: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(RagError::Configuration(format!(
                "similarity threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        Ok(RelevanceFilter { threshold })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Re-score candidates against the query and keep those at or above the
    /// threshold. Order is preserved; an empty result is a normal outcome.
    pub fn apply(&self, candidates: Vec<ScoredChunk>, query: &Embedding) -> Vec<ScoredChunk> {
        let total = candidates.len();
        let retained: Vec<ScoredChunk> = candidates
            .into_iter()
            .filter_map(|mut candidate| {
                candidate.score = cosine_similarity(query, &candidate.embedding);
                (candidate.score + SCORE_EPSILON >= self.threshold).then_some(candidate)
            })
            .collect();

        debug!(
            "Relevance filter kept {} of {} candidates at threshold {}",
            retained.len(),
            total,
            self.threshold
        );

        retained
    }
}
