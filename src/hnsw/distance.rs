//! Distance metrics for the HNSW index.
//!
//! Lower is always better. Cosine distance assumes unit-norm inputs and
//! reduces to `1 - dot`; Euclidean is the squared L2 distance.

use serde::{Deserialize, Serialize};

/// Distance function used for vector comparison inside the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// `1 - inner_product`. Range `[0, 2]` on unit-norm vectors.
    Cosine,
    /// Squared Euclidean distance. Range `[0, ∞)`.
    Euclidean,
}

impl DistanceMetric {
    /// Distance between two equal-length vectors.
    #[inline]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            DistanceMetric::Cosine => {
                1.0 - a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f32>()
            }
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| {
                    let d = x - y;
                    d * d
                })
                .sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_self_distance_zero() {
        let v = [0.6, 0.8, 0.0];
        assert!(DistanceMetric::Cosine.distance(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!((DistanceMetric::Cosine.distance(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = [1.0, 0.0];
        let b = [-1.0, 0.0];
        assert!((DistanceMetric::Cosine.distance(&a, &b) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_squared() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        assert!((DistanceMetric::Euclidean.distance(&a, &b) - 25.0).abs() < 1e-6);
    }
}
