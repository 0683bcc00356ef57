//! Approximate recall of the HNSW index against brute force.

use hybridsearch::{DistanceMetric, HnswConfig, HnswIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_unit(rng: &mut StdRng, dim: usize) -> Vec<f32> {
    let v: Vec<f32> = (0..dim).map(|_| rng.gen::<f32>() * 2.0 - 1.0).collect();
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter().map(|x| x / norm).collect()
}

fn brute_force_top_k(vectors: &[Vec<f32>], query: &[f32], k: usize) -> Vec<u32> {
    let mut scored: Vec<(f32, u32)> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (DistanceMetric::Cosine.distance(query, v), i as u32))
        .collect();
    scored.sort_unstable_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
    scored.into_iter().take(k).map(|(_, id)| id).collect()
}

fn measure_recall(count: usize, queries: usize, dim: usize, k: usize) -> f64 {
    let mut rng = StdRng::seed_from_u64(42);
    let vectors: Vec<Vec<f32>> = (0..count).map(|_| random_unit(&mut rng, dim)).collect();

    let mut index = HnswIndex::new(dim, HnswConfig::default());
    for (id, v) in vectors.iter().enumerate() {
        index.insert(id as u32, v.clone()).unwrap();
    }

    let mut found = 0usize;
    for _ in 0..queries {
        let query = random_unit(&mut rng, dim);
        let exact = brute_force_top_k(&vectors, &query, k);
        let approx = index.search(&query, k).unwrap();
        found += approx
            .iter()
            .filter(|(id, _)| exact.contains(id))
            .count();
    }
    found as f64 / (queries * k) as f64
}

#[test]
fn recall_at_10_beats_point_nine() {
    let recall = measure_recall(2_000, 50, 16, 10);
    assert!(recall >= 0.9, "top-10 recall {recall:.3} below 0.9");
}

#[test]
#[ignore = "slow: 10k vectors at default construction parameters"]
fn recall_at_10_large_corpus() {
    let recall = measure_recall(10_000, 100, 32, 10);
    assert!(recall >= 0.9, "top-10 recall {recall:.3} below 0.9");
}
