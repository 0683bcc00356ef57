//! HNSW search: single-layer frontier search, greedy descent, and the
//! top-level k-NN entry point.

use crate::hnsw::graph::HnswIndex;
use crate::hnsw::visited::VisitedSet;
use crate::error::Result;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Searches one layer with a frontier of capacity `ef`.
///
/// Expands candidates proximity-first; stops once the closest unexpanded
/// candidate is strictly farther than the worst of a full result set.
/// Returns up to `ef` `(distance, id)` pairs sorted ascending.
pub(crate) fn search_layer(
    index: &HnswIndex,
    query: &[f32],
    entry_points: &[u32],
    ef: usize,
    level: usize,
    visited: &mut VisitedSet,
) -> Vec<(f32, u32)> {
    visited.begin(index.id_bound as usize);

    // Min-heap of unexpanded candidates, max-heap of current results.
    let mut candidates: BinaryHeap<Reverse<(OrderedFloat<f32>, u32)>> =
        BinaryHeap::with_capacity(ef * 2);
    let mut results: BinaryHeap<(OrderedFloat<f32>, u32)> = BinaryHeap::with_capacity(ef + 1);

    for &ep in entry_points {
        let node = match index.nodes.get(&ep) {
            Some(node) => node,
            None => continue,
        };
        if visited.mark(ep) {
            let dist = index.config.metric.distance(query, &node.vector);
            candidates.push(Reverse((OrderedFloat(dist), ep)));
            results.push((OrderedFloat(dist), ep));
        }
    }
    while results.len() > ef {
        results.pop();
    }

    while let Some(Reverse((OrderedFloat(dist), id))) = candidates.pop() {
        let worst = results.peek().map_or(f32::MAX, |r| r.0 .0);
        if results.len() >= ef && dist > worst {
            break;
        }

        let node = &index.nodes[&id];
        let Some(neighbors) = node.neighbors.get(level) else {
            continue;
        };
        for &neighbor_id in neighbors {
            if !visited.mark(neighbor_id) {
                continue;
            }
            let neighbor = match index.nodes.get(&neighbor_id) {
                Some(neighbor) => neighbor,
                None => continue,
            };
            let neighbor_dist = index.config.metric.distance(query, &neighbor.vector);
            let worst = results.peek().map_or(f32::MAX, |r| r.0 .0);
            if results.len() < ef || neighbor_dist < worst {
                candidates.push(Reverse((OrderedFloat(neighbor_dist), neighbor_id)));
                results.push((OrderedFloat(neighbor_dist), neighbor_id));
                if results.len() > ef {
                    results.pop();
                }
            }
        }
    }

    let mut sorted: Vec<(f32, u32)> = results
        .into_iter()
        .map(|(OrderedFloat(dist), id)| (dist, id))
        .collect();
    sorted.sort_unstable_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

/// Greedy descent at one layer: hop to the strictly closer neighbor
/// until no neighbor improves. Equivalent to an ef=1 layer search.
pub(crate) fn greedy_descent(index: &HnswIndex, query: &[f32], start: u32, level: usize) -> u32 {
    let mut current = start;
    let mut best = index
        .config
        .metric
        .distance(query, &index.nodes[&current].vector);

    loop {
        let mut improved = false;
        if let Some(neighbors) = index.nodes[&current].neighbors.get(level) {
            for &neighbor_id in neighbors {
                let Some(neighbor) = index.nodes.get(&neighbor_id) else {
                    continue;
                };
                let dist = index.config.metric.distance(query, &neighbor.vector);
                if dist < best {
                    best = dist;
                    current = neighbor_id;
                    improved = true;
                }
            }
        }
        if !improved {
            return current;
        }
    }
}

impl HnswIndex {
    /// Approximate k-nearest-neighbor search.
    ///
    /// Returns up to `k` `(id, distance)` pairs sorted by ascending
    /// distance; an empty graph yields an empty result. A query of the
    /// wrong dimension is a usage error.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u32, f32)>> {
        self.check_dimension(query)?;
        let entry = match self.entry_point {
            Some(entry) => entry,
            None => return Ok(Vec::new()),
        };

        let mut current = entry;
        for level in (1..=self.max_level).rev() {
            current = greedy_descent(self, query, current, level);
        }

        let ef = self.config.ef_search.max(k);
        let mut visited = VisitedSet::with_capacity(self.id_bound as usize);
        let results = search_layer(self, query, &[current], ef, 0, &mut visited);

        Ok(results
            .into_iter()
            .take(k)
            .map(|(dist, id)| (id, dist))
            .collect())
    }
}
