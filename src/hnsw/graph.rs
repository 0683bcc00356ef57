//! HNSW graph structure, configuration, and node lifecycle.
//!
//! Nodes live in an arena keyed by integer id with per-level adjacency
//! lists; there are no owning references between nodes, so removal and
//! serialization never touch ownership. Every edge is reciprocal at its
//! level and each adjacency list stays within the configured degree
//! bound (transiently one over during insert, before pruning).

use crate::config;
use crate::error::{Result, SearchError};
use crate::hnsw::distance::DistanceMetric;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tuning parameters of an HNSW index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Maximum neighbors per node per layer.
    pub m: usize,
    /// Frontier capacity while inserting.
    pub ef_construction: usize,
    /// Frontier capacity while searching.
    pub ef_search: usize,
    /// Cap on the geometric level draw.
    pub max_level: usize,
    /// Distance function.
    pub metric: DistanceMetric,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: config::HNSW_DEFAULT_M,
            ef_construction: config::HNSW_DEFAULT_EF_CONSTRUCTION,
            ef_search: config::HNSW_DEFAULT_EF_SEARCH,
            max_level: config::HNSW_MAX_LEVEL,
            metric: DistanceMetric::Cosine,
        }
    }
}

/// A node in the arena: its vector, assigned top level, and one
/// adjacency list per level `0..=level`.
#[derive(Debug, Clone)]
pub(crate) struct HnswNode {
    pub vector: Vec<f32>,
    pub level: usize,
    pub neighbors: Vec<Vec<u32>>,
}

impl HnswNode {
    pub(crate) fn new(vector: Vec<f32>, level: usize) -> Self {
        Self {
            vector,
            level,
            neighbors: vec![Vec::new(); level + 1],
        }
    }
}

/// Hierarchical Navigable Small World index over integer node ids.
#[derive(Debug)]
pub struct HnswIndex {
    pub(crate) config: HnswConfig,
    pub(crate) dimension: usize,
    pub(crate) nodes: HashMap<u32, HnswNode>,
    pub(crate) entry_point: Option<u32>,
    pub(crate) max_level: usize,
    /// Exclusive upper bound on ids ever inserted; sizes the visited set.
    pub(crate) id_bound: u32,
}

impl HnswIndex {
    /// Creates an empty index for vectors of the given dimension.
    pub fn new(dimension: usize, config: HnswConfig) -> Self {
        Self {
            config,
            dimension,
            nodes: HashMap::new(),
            entry_point: None,
            max_level: 0,
            id_bound: 0,
        }
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Vector dimensionality the index was created with.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Index configuration.
    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    /// Current entry point id, `None` when empty.
    pub fn entry_point(&self) -> Option<u32> {
        self.entry_point
    }

    /// Level of the entry point (the highest level in the graph).
    pub fn max_level(&self) -> usize {
        self.max_level
    }

    /// Whether the graph contains a node with this id.
    pub fn contains(&self, id: u32) -> bool {
        self.nodes.contains_key(&id)
    }

    /// The stored vector of a node.
    pub fn vector(&self, id: u32) -> Option<&[f32]> {
        self.nodes.get(&id).map(|n| n.vector.as_slice())
    }

    /// Draws a top level for a new node: repeatedly promote with
    /// probability `1/m`, capped at `max_level`.
    pub(crate) fn random_level(&self) -> usize {
        let promote = 1.0 / self.config.m as f64;
        let mut level = 0;
        while rand::random::<f64>() < promote && level < self.config.max_level {
            level += 1;
        }
        level
    }

    pub(crate) fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }
        Ok(())
    }

    /// Removes a node, unlinking it from every neighbor adjacency list
    /// in place. Returns `false` (no-op) when the id is absent.
    pub fn remove(&mut self, id: u32) -> bool {
        let node = match self.nodes.remove(&id) {
            Some(node) => node,
            None => return false,
        };

        // Edges are reciprocal, so dropping the back-references is enough.
        for (level, neighbors) in node.neighbors.iter().enumerate() {
            for &neighbor_id in neighbors {
                if let Some(neighbor) = self.nodes.get_mut(&neighbor_id) {
                    if let Some(list) = neighbor.neighbors.get_mut(level) {
                        list.retain(|&other| other != id);
                    }
                }
            }
        }

        if self.entry_point == Some(id) {
            // Re-elect the entry point: any node of maximum level.
            let new_entry = self
                .nodes
                .iter()
                .max_by_key(|(_, node)| node.level)
                .map(|(&id, node)| (id, node.level));
            match new_entry {
                Some((entry_id, level)) => {
                    self.entry_point = Some(entry_id);
                    self.max_level = level;
                }
                None => {
                    self.entry_point = None;
                    self.max_level = 0;
                }
            }
        }
        true
    }

    /// Debug-only structural check: reciprocal edges and degree bounds.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        assert_eq!(self.entry_point.is_some(), !self.nodes.is_empty());
        if let Some(entry) = self.entry_point {
            assert_eq!(self.nodes[&entry].level, self.max_level);
        }
        for (&id, node) in &self.nodes {
            assert_eq!(node.neighbors.len(), node.level + 1);
            for (level, neighbors) in node.neighbors.iter().enumerate() {
                assert!(
                    neighbors.len() <= self.config.m,
                    "node {id} level {level} degree {} exceeds m={}",
                    neighbors.len(),
                    self.config.m
                );
                for &neighbor_id in neighbors {
                    let neighbor = &self.nodes[&neighbor_id];
                    assert!(
                        neighbor.neighbors[level].contains(&id),
                        "edge {id}->{neighbor_id} at level {level} not reciprocal"
                    );
                }
            }
        }
    }
}
