//! In-memory exact vector index.
//!
//! Entries are written once while the pipeline is built and then only read.
//! Search scores every entry against the query, so results are exact and ties
//! keep insertion order.

use crate::chunking::TextChunk;
use crate::embeddings::Embedding;
use crate::error::{RagError, Result};
use log::debug;
use std::fmt;
use std::str::FromStr;

/// Similarity measure used to rank entries; higher is always better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    #[default]
    Cosine,
    /// L2 distance `d` mapped to `1 / (1 + d)`
    Euclidean,
}

impl FromStr for Metric {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Metric::Cosine),
            "euclidean" | "l2" => Ok(Metric::Euclidean),
            other => Err(RagError::Configuration(format!(
                "unknown similarity metric: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Cosine => write!(f, "cosine"),
            Metric::Euclidean => write!(f, "euclidean"),
        }
    }
}

/// A chunk together with its embedding
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: TextChunk,
    pub embedding: Embedding,
}

/// A search hit. Carries the stored embedding so later stages can re-score it.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    pub embedding: Embedding,
    pub score: f32,
}

/// Brute-force nearest neighbour index over a fixed dimension
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    metric: Metric,
    entries: Vec<IndexEntry>,
    // Cached magnitudes, parallel to `entries`
    norms: Vec<f32>,
}

impl VectorIndex {
    pub fn new(dimension: usize, metric: Metric) -> Self {
        VectorIndex {
            dimension,
            metric,
            entries: Vec::new(),
            norms: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add entries in order. Nothing is inserted if any entry has the wrong
    /// dimension or a NaN or infinite component.
    pub fn insert(&mut self, entries: Vec<IndexEntry>) -> Result<()> {
        for entry in &entries {
            entry.embedding.check_dimension(self.dimension)?;
            entry.embedding.check_finite()?;
        }

        self.entries.reserve(entries.len());
        self.norms.reserve(entries.len());
        for entry in entries {
            self.norms.push(entry.embedding.norm());
            self.entries.push(entry);
        }

        debug!("Vector index now holds {} entries", self.entries.len());
        Ok(())
    }

    /// Return the `k` most similar entries, best first
    pub fn search(&self, query: &Embedding, k: usize) -> Result<Vec<ScoredChunk>> {
        if self.entries.is_empty() {
            return Err(RagError::EmptyIndex);
        }
        query.check_dimension(self.dimension)?;
        query.check_finite()?;

        let query_norm = query.norm();
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .zip(&self.norms)
            .enumerate()
            .map(|(idx, (entry, norm))| {
                let score = match self.metric {
                    Metric::Cosine => cosine_with_norms(
                        &query.values,
                        &entry.embedding.values,
                        query_norm,
                        *norm,
                    ),
                    Metric::Euclidean => {
                        1.0 / (1.0 + euclidean_distance(&query.values, &entry.embedding.values))
                    }
                };
                (idx, score)
            })
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(idx, score)| {
                let entry = &self.entries[idx];
                ScoredChunk {
                    chunk: entry.chunk.clone(),
                    embedding: entry.embedding.clone(),
                    score,
                }
            })
            .collect())
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn cosine_with_norms(a: &[f32], b: &[f32], norm_a: f32, norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    // Rounding can push exact duplicates slightly past 1
    (dot(a, b) / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Cosine similarity; zero when either vector has no length
pub fn cosine_similarity(a: &Embedding, b: &Embedding) -> f32 {
    cosine_with_norms(&a.values, &b.values, a.norm(), b.norm())
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: usize, values: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk: TextChunk {
                text: format!("chunk {}", id),
                document_id: "doc".to_string(),
                chunk_index: id,
                start_position: 0,
                end_position: 0,
                overlap: 0,
                page: None,
            },
            embedding: Embedding::new(values),
        }
    }

    fn sample_index(metric: Metric) -> VectorIndex {
        let mut index = VectorIndex::new(2, metric);
        index
            .insert(vec![
                entry(0, vec![1.0, 0.0]),
                entry(1, vec![0.0, 1.0]),
                entry(2, vec![0.7, 0.7]),
                entry(3, vec![2.0, 0.0]),
                entry(4, vec![-1.0, 0.0]),
            ])
            .unwrap();
        index
    }

    #[test]
    fn test_search_empty_index() {
        let index = VectorIndex::new(2, Metric::Cosine);
        let result = index.search(&Embedding::new(vec![1.0, 0.0]), 3);
        assert!(matches!(result, Err(RagError::EmptyIndex)));
    }

    #[test]
    fn test_insert_rejects_wrong_dimension() {
        let mut index = VectorIndex::new(2, Metric::Cosine);
        let result = index.insert(vec![entry(0, vec![1.0, 0.0]), entry(1, vec![1.0])]);

        assert!(matches!(result, Err(RagError::DimensionMismatch { .. })));
        assert!(index.is_empty());
    }

    #[test]
    fn test_rejects_non_finite_embeddings() {
        let mut index = VectorIndex::new(2, Metric::Cosine);
        let result = index.insert(vec![entry(0, vec![1.0, 0.0]), entry(1, vec![f32::NAN, 1.0])]);
        assert!(matches!(result, Err(RagError::InvalidResponse(_))));
        assert!(index.is_empty());

        let index = sample_index(Metric::Cosine);
        let result = index.search(&Embedding::new(vec![f32::INFINITY, 0.0]), 3);
        assert!(matches!(result, Err(RagError::InvalidResponse(_))));
    }

    #[test]
    fn test_cosine_is_clamped_to_unit_range() {
        let a = Embedding::new(vec![0.1, 0.2, 0.3, 0.7, 0.9]);
        let b = a.clone();
        let score = cosine_similarity(&a, &b);
        assert!(score <= 1.0);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_query_with_wrong_dimension() {
        let index = sample_index(Metric::Cosine);
        let result = index.search(&Embedding::new(vec![1.0, 0.0, 0.0]), 3);
        assert!(matches!(
            result,
            Err(RagError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_cosine_ranking_and_ties() {
        let index = sample_index(Metric::Cosine);
        let hits = index.search(&Embedding::new(vec![1.0, 0.0]), 5).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.chunk.chunk_index).collect();

        // Entries 0 and 3 point the same way; insertion order breaks the tie
        assert_eq!(order, vec![0, 3, 2, 1, 4]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[4].score + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_ranking() {
        let index = sample_index(Metric::Euclidean);
        let hits = index.search(&Embedding::new(vec![1.0, 0.0]), 2).unwrap();

        assert_eq!(hits[0].chunk.chunk_index, 0);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].chunk.chunk_index, 2);
    }

    #[test]
    fn test_returns_min_k_n_sorted() {
        let index = sample_index(Metric::Cosine);
        let query = Embedding::new(vec![0.3, 0.9]);

        for k in 0..8 {
            let hits = index.search(&query, k).unwrap();
            assert_eq!(hits.len(), k.min(index.len()));
            assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        }
    }

    #[test]
    fn test_search_is_idempotent() {
        let index = sample_index(Metric::Cosine);
        let query = Embedding::new(vec![0.5, 0.2]);

        let first: Vec<(usize, f32)> = index
            .search(&query, 4)
            .unwrap()
            .iter()
            .map(|h| (h.chunk.chunk_index, h.score))
            .collect();
        let second: Vec<(usize, f32)> = index
            .search(&query, 4)
            .unwrap()
            .iter()
            .map(|h| (h.chunk.chunk_index, h.score))
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!("cosine".parse::<Metric>().unwrap(), Metric::Cosine);
        assert_eq!("L2".parse::<Metric>().unwrap(), Metric::Euclidean);
        assert!("manhattan".parse::<Metric>().is_err());
    }
}
