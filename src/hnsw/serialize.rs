//! HNSW graph serialization.
//!
//! The on-disk form is JSON: per-node base64 f32 vectors plus one
//! connection list per level. Deserialization validates entry point,
//! connection bounds, and vector dimensions before rebuilding the arena.

use crate::error::{Result, SearchError};
use crate::hnsw::graph::{HnswConfig, HnswIndex, HnswNode};
use crate::quantization::{f32_slice_from_base64, f32_slice_to_base64};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Serialized form of one node. The `connections` list has one entry per
/// level `0..=top_level`, so its length encodes the node's level.
#[derive(Debug, Serialize, Deserialize)]
pub struct HnswNodeSnapshot {
    pub id: u32,
    /// Base64 little-endian f32 vector.
    pub vector: String,
    pub connections: Vec<Vec<u32>>,
}

/// Serialized form of a whole graph.
#[derive(Debug, Serialize, Deserialize)]
pub struct HnswSnapshot {
    pub dimensions: usize,
    pub config: HnswConfig,
    pub nodes: Vec<HnswNodeSnapshot>,
    #[serde(rename = "entryPoint")]
    pub entry_point: Option<u32>,
    #[serde(rename = "maxLevel")]
    pub max_level: usize,
}

impl HnswIndex {
    /// Captures the graph as a serializable snapshot.
    pub fn to_snapshot(&self) -> HnswSnapshot {
        let mut nodes: Vec<HnswNodeSnapshot> = self
            .nodes
            .iter()
            .map(|(&id, node)| HnswNodeSnapshot {
                id,
                vector: f32_slice_to_base64(&node.vector),
                connections: node.neighbors.clone(),
            })
            .collect();
        nodes.sort_unstable_by_key(|n| n.id);
        HnswSnapshot {
            dimensions: self.dimension,
            config: self.config.clone(),
            nodes,
            entry_point: self.entry_point,
            max_level: self.max_level,
        }
    }

    /// Rebuilds a graph from a snapshot, validating structure first.
    pub fn from_snapshot(snapshot: HnswSnapshot) -> Result<Self> {
        let mut nodes: HashMap<u32, HnswNode> = HashMap::with_capacity(snapshot.nodes.len());
        let mut id_bound = 0u32;

        for node in &snapshot.nodes {
            if node.connections.is_empty() {
                return Err(SearchError::Snapshot(format!(
                    "node {} has no connection levels",
                    node.id
                )));
            }
            let vector = f32_slice_from_base64(&node.vector)?;
            if vector.len() != snapshot.dimensions {
                return Err(SearchError::Snapshot(format!(
                    "node {} vector has {} dimensions, expected {}",
                    node.id,
                    vector.len(),
                    snapshot.dimensions
                )));
            }
            id_bound = id_bound.max(node.id + 1);
            nodes.insert(
                node.id,
                HnswNode {
                    vector,
                    level: node.connections.len() - 1,
                    neighbors: node.connections.clone(),
                },
            );
        }

        // Every referenced neighbor must exist.
        for node in nodes.values() {
            for neighbors in &node.neighbors {
                for neighbor_id in neighbors {
                    if !nodes.contains_key(neighbor_id) {
                        return Err(SearchError::Snapshot(format!(
                            "connection references missing node {neighbor_id}"
                        )));
                    }
                }
            }
        }

        match snapshot.entry_point {
            Some(entry) => {
                let entry_node = nodes.get(&entry).ok_or_else(|| {
                    SearchError::Snapshot(format!("entry point {entry} not in node table"))
                })?;
                if entry_node.level != snapshot.max_level {
                    return Err(SearchError::Snapshot(format!(
                        "entry point level {} does not match max_level {}",
                        entry_node.level, snapshot.max_level
                    )));
                }
            }
            None => {
                if !nodes.is_empty() {
                    return Err(SearchError::Snapshot(
                        "non-empty graph without entry point".into(),
                    ));
                }
            }
        }

        Ok(Self {
            config: snapshot.config,
            dimension: snapshot.dimensions,
            nodes,
            entry_point: snapshot.entry_point,
            max_level: snapshot.max_level,
            id_bound,
        })
    }
}
