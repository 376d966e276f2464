//! Rank strategies for combining several searches
//!
//! Each sub-search's scores are rewritten by the strategy before the
//! results are merged. The strategy is parsed and validated once, up front;
//! unknown rank types never reach execution.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use crate::result::PrimaryKey;

/// Default `k` of reciprocal rank fusion
pub const DEFAULT_RRF_K: f32 = 60.0;

/// Exclusive upper bound of `k`
pub const MAX_RRF_K: f64 = 16384.0;

/// Result type for rank strategy parsing
pub type RankResult<T> = Result<T, RankError>;

/// Rank strategy errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RankError {
    #[error("unsupported rank type {0}")]
    UnsupportedType(String),

    #[error("{0} not found in rank params")]
    MissingParam(&'static str),

    #[error("rank param {param} should be {expected}")]
    WrongType {
        param: &'static str,
        expected: &'static str,
    },

    #[error("rank param k should be in range (0, 16384), got {0}")]
    KOutOfRange(f64),

    #[error("rank param weight should be in range [0, 1], got {0}")]
    WeightOutOfRange(f64),

    #[error("got {weights} weights for {requests} search requests")]
    WeightCountMismatch { weights: usize, requests: usize },

    #[error("request index {index} outside {requests} search requests")]
    RequestOutOfRange { index: usize, requests: usize },
}

/// Closed set of score rewriting strategies
#[derive(Debug, Clone, PartialEq)]
pub enum RankStrategy {
    /// Reciprocal rank fusion: the hit at rank `i` scores `1 / (k + i + 1)`
    Rrf { k: f32 },
    /// Per-request weight applied to the raw score
    Weighted { weights: Vec<f32> },
}

impl RankStrategy {
    /// Parses a strategy for `n_requests` sub-searches.
    ///
    /// No rank type selects RRF with the default `k`.
    pub fn from_params(rank_type: Option<&str>, params: &Value, n_requests: usize) -> RankResult<Self> {
        let Some(rank_type) = rank_type else {
            tracing::debug!(target: "segcore", "rank type not specified, using rrf");
            return Ok(RankStrategy::Rrf { k: DEFAULT_RRF_K });
        };

        match rank_type {
            "rrf" => {
                let k = params
                    .get("k")
                    .ok_or(RankError::MissingParam("k"))?
                    .as_f64()
                    .ok_or(RankError::WrongType {
                        param: "k",
                        expected: "a number",
                    })?;
                if k <= 0.0 || k >= MAX_RRF_K {
                    return Err(RankError::KOutOfRange(k));
                }
                Ok(RankStrategy::Rrf { k: k as f32 })
            }
            "weighted" => {
                let raw = params
                    .get("weights")
                    .ok_or(RankError::MissingParam("weights"))?
                    .as_array()
                    .ok_or(RankError::WrongType {
                        param: "weights",
                        expected: "an array",
                    })?;
                let weights = raw
                    .iter()
                    .map(|w| {
                        let w = w.as_f64().ok_or(RankError::WrongType {
                            param: "weight",
                            expected: "a number",
                        })?;
                        if !(0.0..=1.0).contains(&w) {
                            return Err(RankError::WeightOutOfRange(w));
                        }
                        Ok(w as f32)
                    })
                    .collect::<RankResult<Vec<_>>>()?;
                if weights.len() != n_requests {
                    return Err(RankError::WeightCountMismatch {
                        weights: weights.len(),
                        requests: n_requests,
                    });
                }
                Ok(RankStrategy::Weighted { weights })
            }
            other => Err(RankError::UnsupportedType(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RankStrategy::Rrf { .. } => "rrf",
            RankStrategy::Weighted { .. } => "weighted",
        }
    }

    /// Rewrites the rank-ordered `scores` of sub-search `request_idx`
    pub fn rescore(&self, request_idx: usize, scores: &mut [f32]) -> RankResult<()> {
        match self {
            RankStrategy::Rrf { k } => {
                for (rank, score) in scores.iter_mut().enumerate() {
                    *score = 1.0 / (k + rank as f32 + 1.0);
                }
            }
            RankStrategy::Weighted { weights } => {
                let weight = weights
                    .get(request_idx)
                    .ok_or(RankError::RequestOutOfRange {
                        index: request_idx,
                        requests: weights.len(),
                    })?;
                for score in scores.iter_mut() {
                    *score *= weight;
                }
            }
        }
        Ok(())
    }

    /// Merges the rank-ordered hits of every sub-search.
    ///
    /// Each sub-search is rescored, scores of the same key are summed and
    /// the best `topk` keys are kept. Input scores must be larger-is-closer;
    /// equal fused scores keep first-seen order.
    pub fn fuse(
        &self,
        requests: Vec<Vec<(PrimaryKey, f32)>>,
        topk: usize,
    ) -> RankResult<Vec<(PrimaryKey, f32)>> {
        let mut fused: Vec<(PrimaryKey, f32)> = Vec::new();
        let mut slots: HashMap<PrimaryKey, usize> = HashMap::new();

        for (request_idx, hits) in requests.into_iter().enumerate() {
            let (keys, mut scores): (Vec<_>, Vec<_>) = hits.into_iter().unzip();
            self.rescore(request_idx, &mut scores)?;
            for (key, score) in keys.into_iter().zip(scores) {
                match slots.get(&key) {
                    Some(&slot) => fused[slot].1 += score,
                    None => {
                        slots.insert(key.clone(), fused.len());
                        fused.push((key, score));
                    }
                }
            }
        }

        fused.sort_by(|a, b| b.1.total_cmp(&a.1));
        fused.truncate(topk);
        Ok(fused)
    }
}
