//! Hybrid score combination.
//!
//! Each candidate carries a raw (semantic, fuzzy, keyword) triple. The
//! ranker optionally min-max normalizes each component across the
//! candidate batch, then combines the components under user weights
//! rescaled to sum to 1. Batch normalization is what makes the three
//! heterogeneous kernels comparable without global calibration; the
//! weights are the caller's policy.

use crate::config;
use crate::search::types::ScoreBreakdown;
use serde::{Deserialize, Serialize};

/// Relative importance of the three score components. Components must be
/// non-negative; they are rescaled to sum to 1 before use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub semantic: f32,
    pub fuzzy: f32,
    pub keyword: f32,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            semantic: config::DEFAULT_SEMANTIC_WEIGHT,
            fuzzy: config::DEFAULT_FUZZY_WEIGHT,
            keyword: config::DEFAULT_KEYWORD_WEIGHT,
        }
    }
}

impl Weights {
    /// Rescales the weights to sum to 1. An all-zero triple falls back
    /// to the defaults.
    pub fn normalized(&self) -> Weights {
        let total = self.semantic + self.fuzzy + self.keyword;
        if total <= 0.0 {
            return Weights::default();
        }
        Weights {
            semantic: self.semantic / total,
            fuzzy: self.fuzzy / total,
            keyword: self.keyword / total,
        }
    }
}

/// A candidate entering the ranker: an index into the caller's item
/// table plus raw kernel scores.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub index: usize,
    pub raw: ScoreBreakdown,
}

/// A candidate after combination, sorted descending by `score`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Ranked {
    pub index: usize,
    pub score: f32,
    pub raw: ScoreBreakdown,
    pub normalized: ScoreBreakdown,
}

/// Min-max scales one component across the batch. A degenerate batch
/// (`max <= min`) maps positive values to 1 and the rest to 0.
fn min_max_scale(values: &mut [f32]) {
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for &v in values.iter() {
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }
    let range = max - min;
    for v in values.iter_mut() {
        *v = if range > 0.0 {
            (*v - min) / range
        } else if *v > 0.0 {
            1.0
        } else {
            0.0
        };
    }
}

/// Combines candidate scores under the given weights.
///
/// Returns candidates sorted descending by final score; ties keep the
/// input order.
pub(crate) fn rank(candidates: &[Candidate], weights: Weights, normalize: bool) -> Vec<Ranked> {
    let weights = weights.normalized();

    let mut semantic: Vec<f32> = candidates.iter().map(|c| c.raw.semantic).collect();
    let mut fuzzy: Vec<f32> = candidates.iter().map(|c| c.raw.fuzzy).collect();
    let mut keyword: Vec<f32> = candidates.iter().map(|c| c.raw.keyword).collect();
    if normalize {
        min_max_scale(&mut semantic);
        min_max_scale(&mut fuzzy);
        min_max_scale(&mut keyword);
    }

    let mut ranked: Vec<Ranked> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let normalized = ScoreBreakdown {
                semantic: semantic[i],
                fuzzy: fuzzy[i],
                keyword: keyword[i],
            };
            Ranked {
                index: c.index,
                score: weights.semantic * normalized.semantic
                    + weights.fuzzy * normalized.fuzzy
                    + weights.keyword * normalized.keyword,
                raw: c.raw,
                normalized,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(index: usize, semantic: f32, fuzzy: f32, keyword: f32) -> Candidate {
        Candidate {
            index,
            raw: ScoreBreakdown {
                semantic,
                fuzzy,
                keyword,
            },
        }
    }

    #[test]
    fn test_weights_normalized_sums_to_one() {
        for weights in [
            Weights {
                semantic: 2.0,
                fuzzy: 1.0,
                keyword: 1.0,
            },
            Weights {
                semantic: 0.1,
                fuzzy: 0.1,
                keyword: 0.8,
            },
            Weights {
                semantic: 5.0,
                fuzzy: 0.0,
                keyword: 0.0,
            },
        ] {
            let n = weights.normalized();
            assert!((n.semantic + n.fuzzy + n.keyword - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_all_zero_weights_fall_back_to_defaults() {
        let n = Weights {
            semantic: 0.0,
            fuzzy: 0.0,
            keyword: 0.0,
        }
        .normalized();
        assert_eq!(n, Weights::default());
    }

    #[test]
    fn test_rank_sorted_descending() {
        let ranked = rank(
            &[
                candidate(0, 0.2, 0.2, 0.2),
                candidate(1, 0.9, 0.9, 0.9),
                candidate(2, 0.5, 0.5, 0.5),
            ],
            Weights::default(),
            false,
        );
        let order: Vec<usize> = ranked.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert!(ranked[0].score >= ranked[1].score);
        assert!(ranked[1].score >= ranked[2].score);
    }

    #[test]
    fn test_normalization_bounds() {
        let ranked = rank(
            &[
                candidate(0, -0.3, 0.1, 0.0),
                candidate(1, 0.7, 0.9, 1.0),
                candidate(2, 0.2, 0.4, 0.5),
            ],
            Weights::default(),
            true,
        );
        for r in &ranked {
            for v in [r.normalized.semantic, r.normalized.fuzzy, r.normalized.keyword] {
                assert!((0.0..=1.0).contains(&v), "normalized value {v} out of range");
            }
        }
        // Extremes map to 0 and 1
        let best = ranked.iter().find(|r| r.index == 1).unwrap();
        assert_eq!(best.normalized.semantic, 1.0);
        let worst = ranked.iter().find(|r| r.index == 0).unwrap();
        assert_eq!(worst.normalized.semantic, 0.0);
    }

    #[test]
    fn test_degenerate_batch_positive_maps_to_one() {
        let ranked = rank(
            &[candidate(0, 0.5, 0.0, 0.3), candidate(1, 0.5, 0.0, 0.3)],
            Weights::default(),
            true,
        );
        for r in &ranked {
            assert_eq!(r.normalized.semantic, 1.0);
            assert_eq!(r.normalized.fuzzy, 0.0);
            assert_eq!(r.normalized.keyword, 1.0);
        }
    }

    #[test]
    fn test_keyword_heavy_weights_change_winner() {
        let candidates = [
            candidate(0, 0.9, 0.1, 0.0), // semantically close, no keyword hit
            candidate(1, 0.4, 0.2, 1.0), // exact keyword hit
        ];
        let semantic_first = rank(&candidates, Weights::default(), false);
        assert_eq!(semantic_first[0].index, 0);
        let keyword_first = rank(
            &candidates,
            Weights {
                semantic: 0.1,
                fuzzy: 0.1,
                keyword: 0.8,
            },
            false,
        );
        assert_eq!(keyword_first[0].index, 1);
    }

    #[test]
    fn test_raw_scores_preserved() {
        let ranked = rank(&[candidate(0, 0.25, 0.5, 0.75)], Weights::default(), true);
        assert_eq!(ranked[0].raw.semantic, 0.25);
        assert_eq!(ranked[0].raw.fuzzy, 0.5);
        assert_eq!(ranked[0].raw.keyword, 0.75);
    }
}
