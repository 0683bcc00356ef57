//! HNSW insertion: greedy descent to the target level, ef-construction
//! layer searches, bidirectional linking, and degree pruning.

use crate::error::Result;
use crate::hnsw::graph::{HnswIndex, HnswNode};
use crate::hnsw::search::{greedy_descent, search_layer};
use crate::hnsw::visited::VisitedSet;

impl HnswIndex {
    /// Inserts a vector under the given id.
    ///
    /// An existing node with the same id is removed first (replace
    /// semantics). A vector of the wrong dimension is a usage error.
    pub fn insert(&mut self, id: u32, vector: Vec<f32>) -> Result<()> {
        self.check_dimension(&vector)?;
        if self.contains(id) {
            self.remove(id);
        }
        self.id_bound = self.id_bound.max(id + 1);

        let level = self.random_level();

        let entry = match self.entry_point {
            Some(entry) => entry,
            None => {
                // First node becomes the entry point.
                self.nodes.insert(id, HnswNode::new(vector, level));
                self.entry_point = Some(id);
                self.max_level = level;
                return Ok(());
            }
        };

        let mut visited = VisitedSet::with_capacity(self.id_bound as usize);

        // Descend greedily through layers above the node's level.
        let mut current = entry;
        for layer in (level + 1..=self.max_level).rev() {
            current = greedy_descent(self, &vector, current, layer);
        }

        // Collect neighbors per layer with an ef_construction frontier.
        let top = level.min(self.max_level);
        let mut per_level: Vec<Vec<u32>> = vec![Vec::new(); level + 1];
        let mut seed = current;
        for layer in (0..=top).rev() {
            let candidates = search_layer(
                self,
                &vector,
                &[seed],
                self.config.ef_construction,
                layer,
                &mut visited,
            );
            per_level[layer] = candidates
                .iter()
                .take(self.config.m)
                .map(|&(_, cid)| cid)
                .collect();
            if let Some(&(_, closest)) = candidates.first() {
                seed = closest;
            }
        }

        self.nodes.insert(
            id,
            HnswNode {
                vector,
                level,
                neighbors: per_level,
            },
        );

        // Link back and prune neighbors that exceed the degree bound.
        for layer in 0..=top {
            let my_neighbors = self.nodes[&id].neighbors[layer].clone();
            for neighbor_id in my_neighbors {
                let neighbor = self
                    .nodes
                    .get_mut(&neighbor_id)
                    .expect("layer search only yields live nodes");
                neighbor.neighbors[layer].push(id);
                if neighbor.neighbors[layer].len() > self.config.m {
                    self.prune_neighbors(neighbor_id, layer);
                }
            }
        }

        if level > self.max_level {
            self.max_level = level;
            self.entry_point = Some(id);
        }
        Ok(())
    }

    /// Trims a node's adjacency at one layer to its `m` closest
    /// neighbors, removing dropped edges from both endpoints.
    fn prune_neighbors(&mut self, id: u32, layer: usize) {
        let base = self.nodes[&id].vector.clone();
        let mut scored: Vec<(f32, u32)> = self.nodes[&id].neighbors[layer]
            .iter()
            .map(|&nid| {
                let dist = self.config.metric.distance(&base, &self.nodes[&nid].vector);
                (dist, nid)
            })
            .collect();
        scored.sort_unstable_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let kept: Vec<u32> = scored.iter().take(self.config.m).map(|&(_, nid)| nid).collect();
        let dropped: Vec<u32> = scored.iter().skip(self.config.m).map(|&(_, nid)| nid).collect();

        self.nodes.get_mut(&id).expect("pruned node exists").neighbors[layer] = kept;
        for nid in dropped {
            if let Some(other) = self.nodes.get_mut(&nid) {
                if let Some(list) = other.neighbors.get_mut(layer) {
                    list.retain(|&back| back != id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::hnsw::graph::{HnswConfig, HnswIndex};

    fn unit(v: Vec<f32>) -> Vec<f32> {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.iter().map(|x| x / norm).collect()
    }

    fn pseudo_unit(dim: usize, seed: u64) -> Vec<f32> {
        let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
        unit(
            (0..dim)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    (state >> 40) as f32 / (1u64 << 23) as f32 - 1.0
                })
                .collect(),
        )
    }

    #[test]
    fn test_first_insert_becomes_entry() {
        let mut index = HnswIndex::new(3, HnswConfig::default());
        index.insert(7, unit(vec![1.0, 1.0, 0.0])).unwrap();
        assert_eq!(index.entry_point(), Some(7));
        assert_eq!(index.len(), 1);
        index.assert_invariants();
    }

    #[test]
    fn test_invariants_after_many_inserts() {
        let mut index = HnswIndex::new(
            16,
            HnswConfig {
                m: 8,
                ef_construction: 40,
                ..HnswConfig::default()
            },
        );
        for id in 0..200u32 {
            index.insert(id, pseudo_unit(16, id as u64 + 1)).unwrap();
        }
        assert_eq!(index.len(), 200);
        index.assert_invariants();
    }

    #[test]
    fn test_insert_replaces_existing_id() {
        let mut index = HnswIndex::new(3, HnswConfig::default());
        index.insert(0, unit(vec![1.0, 0.0, 0.0])).unwrap();
        index.insert(1, unit(vec![0.0, 1.0, 0.0])).unwrap();
        index.insert(0, unit(vec![0.0, 0.0, 1.0])).unwrap();
        assert_eq!(index.len(), 2);
        let results = index.search(&unit(vec![0.0, 0.0, 1.0]), 1).unwrap();
        assert_eq!(results[0].0, 0);
        index.assert_invariants();
    }

    #[test]
    fn test_invariants_after_removes() {
        let mut index = HnswIndex::new(
            8,
            HnswConfig {
                m: 6,
                ef_construction: 30,
                ..HnswConfig::default()
            },
        );
        for id in 0..80u32 {
            index.insert(id, pseudo_unit(8, id as u64 + 1)).unwrap();
        }
        for id in (0..80u32).step_by(3) {
            assert!(index.remove(id));
        }
        assert_eq!(index.len(), 80 - 27);
        index.assert_invariants();
        // Remaining nodes stay reachable
        let results = index.search(&pseudo_unit(8, 2), 5).unwrap();
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn test_remove_entry_point_reelects() {
        let mut index = HnswIndex::new(4, HnswConfig::default());
        for id in 0..20u32 {
            index.insert(id, pseudo_unit(4, id as u64 + 1)).unwrap();
        }
        let entry = index.entry_point().unwrap();
        assert!(index.remove(entry));
        assert!(index.entry_point().is_some());
        assert_ne!(index.entry_point(), Some(entry));
        index.assert_invariants();
    }

    #[test]
    fn test_remove_all_clears_entry() {
        let mut index = HnswIndex::new(4, HnswConfig::default());
        for id in 0..5u32 {
            index.insert(id, pseudo_unit(4, id as u64 + 1)).unwrap();
        }
        for id in 0..5u32 {
            assert!(index.remove(id));
        }
        assert!(index.is_empty());
        assert_eq!(index.entry_point(), None);
        assert_eq!(index.max_level(), 0);
    }
}
