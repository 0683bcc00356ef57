//! LRU cache memoizing text embeddings.
//!
//! Keys combine 32-bit MurmurHash3 digests of the text (seed 0) and the
//! model identifier (seed 1) into one 64-bit key, the concatenation of
//! the two 8-hex-digit halves. Entries live in a slab with intrusive
//! prev/next index links, giving O(1) get/set/evict without pointer
//! cycles.

use crate::quantization::{f32_slice_from_base64, f32_slice_to_base64};
use crate::error::Result;
use std::collections::HashMap;

const NONE: usize = usize::MAX;

/// MurmurHash3 x86 32-bit.
pub(crate) fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;

    let mut h = seed;
    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
        h ^= k;
        h = h.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k = 0u32;
        for (i, &b) in tail.iter().enumerate() {
            k ^= (b as u32) << (8 * i);
        }
        k = k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
        h ^= k;
    }

    h ^= data.len() as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Builds the 64-bit cache key for a (text, model) pair.
pub fn cache_key(text: &str, model: &str) -> u64 {
    let text_hash = murmur3_32(text.as_bytes(), 0) as u64;
    let model_hash = murmur3_32(model.as_bytes(), 1) as u64;
    (text_hash << 32) | model_hash
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub hit_rate: f32,
}

#[derive(Debug)]
struct Slot {
    key: u64,
    vector: Vec<f32>,
    prev: usize,
    next: usize,
}

/// Fixed-capacity LRU mapping from a 64-bit key to an embedding.
#[derive(Debug)]
pub struct EmbeddingCache {
    map: HashMap<u64, usize>,
    slots: Vec<Slot>,
    free: Vec<usize>,
    /// Most recently used slot index, `NONE` when empty.
    head: usize,
    /// Least recently used slot index, `NONE` when empty.
    tail: usize,
    capacity: usize,
    track_stats: bool,
    hits: u64,
    misses: u64,
}

impl EmbeddingCache {
    /// Creates a cache holding up to `capacity` entries, stats disabled.
    pub fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity.min(4096)),
            slots: Vec::new(),
            free: Vec::new(),
            head: NONE,
            tail: NONE,
            capacity,
            track_stats: false,
            hits: 0,
            misses: 0,
        }
    }

    /// Creates a cache that additionally tracks hit/miss counters.
    pub fn with_stats(capacity: usize) -> Self {
        let mut cache = Self::new(capacity);
        cache.track_stats = true;
        cache
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` without affecting recency or counters.
    pub fn has(&self, key: u64) -> bool {
        self.map.contains_key(&key)
    }

    /// Looks up an embedding, promoting the entry to most-recently-used.
    pub fn get(&mut self, key: u64) -> Option<&[f32]> {
        match self.map.get(&key).copied() {
            Some(idx) => {
                if self.track_stats {
                    self.hits += 1;
                }
                self.unlink(idx);
                self.push_front(idx);
                Some(self.slots[idx].vector.as_slice())
            }
            None => {
                if self.track_stats {
                    self.misses += 1;
                }
                None
            }
        }
    }

    /// Inserts or replaces an embedding, evicting the LRU entry past capacity.
    pub fn set(&mut self, key: u64, vector: Vec<f32>) {
        if self.capacity == 0 {
            return;
        }
        if let Some(&idx) = self.map.get(&key) {
            self.slots[idx].vector = vector;
            self.unlink(idx);
            self.push_front(idx);
            return;
        }
        if self.map.len() >= self.capacity {
            self.evict_lru();
        }
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Slot {
                    key,
                    vector,
                    prev: NONE,
                    next: NONE,
                };
                idx
            }
            None => {
                self.slots.push(Slot {
                    key,
                    vector,
                    prev: NONE,
                    next: NONE,
                });
                self.slots.len() - 1
            }
        };
        self.map.insert(key, idx);
        self.push_front(idx);
    }

    /// Drops every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.map.clear();
        self.slots.clear();
        self.free.clear();
        self.head = NONE;
        self.tail = NONE;
    }

    /// Current counters. `hit_rate` is 0 before the first lookup.
    pub fn stats(&self) -> CacheStats {
        let total = self.hits + self.misses;
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            size: self.map.len(),
            hit_rate: if total == 0 {
                0.0
            } else {
                self.hits as f32 / total as f32
            },
        }
    }

    /// Serializes entries as (key, base64 f32 vector) pairs in LRU→MRU order.
    pub fn to_entries(&self) -> Vec<(u64, String)> {
        let mut out = Vec::with_capacity(self.map.len());
        let mut idx = self.head;
        while idx != NONE {
            let slot = &self.slots[idx];
            out.push((slot.key, f32_slice_to_base64(&slot.vector)));
            idx = slot.next;
        }
        out.reverse();
        out
    }

    /// Restores a cache from [`to_entries`](Self::to_entries) output,
    /// preserving recency order.
    pub fn from_entries(capacity: usize, entries: &[(u64, String)]) -> Result<Self> {
        let mut cache = Self::new(capacity);
        for (key, encoded) in entries {
            cache.set(*key, f32_slice_from_base64(encoded)?);
        }
        Ok(cache)
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        if prev != NONE {
            self.slots[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NONE {
            self.slots[next].prev = prev;
        } else {
            self.tail = prev;
        }
        self.slots[idx].prev = NONE;
        self.slots[idx].next = NONE;
    }

    fn push_front(&mut self, idx: usize) {
        self.slots[idx].prev = NONE;
        self.slots[idx].next = self.head;
        if self.head != NONE {
            self.slots[self.head].prev = idx;
        }
        self.head = idx;
        if self.tail == NONE {
            self.tail = idx;
        }
    }

    fn evict_lru(&mut self) {
        let idx = self.tail;
        if idx == NONE {
            return;
        }
        self.unlink(idx);
        self.map.remove(&self.slots[idx].key);
        self.slots[idx].vector = Vec::new();
        self.free.push(idx);
    }
}
