//! The Ketama consistent-hash placer (ring membership + lookup).

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

/// Number of virtual replicas placed on the ring per node when the caller
/// does not request a specific count, or requests a non-positive one.
pub const DEFAULT_REPLICAS: u32 = 10;

struct Inner {
    resources: HashSet<String>,
    /// slot -> virtual replica key ("<addr>-<i>")
    slots: HashMap<u32, String>,
    /// Ascending sort of `slots.keys()`, rebuilt after every mutation.
    sorted: Vec<u32>,
}

impl Inner {
    fn resort(&mut self) {
        self.sorted = self.slots.keys().copied().collect();
        self.sorted.sort_unstable();
    }
}

/// A Ketama-style consistent hash ring over a set of equally-weighted node
/// addresses.
///
/// Every public method takes `&self` and acquires a single internal lock;
/// the ring is safe to share behind an `Arc` across tasks.
pub struct Ketama {
    replicas: u32,
    inner: Mutex<Inner>,
}

impl Ketama {
    /// Creates an empty ring with `replicas` virtual nodes per address.
    /// A non-positive value is clamped to [`DEFAULT_REPLICAS`].
    pub fn new(replicas: i64) -> Self {
        let replicas = if replicas <= 0 {
            DEFAULT_REPLICAS
        } else {
            replicas as u32
        };

        Self {
            replicas,
            inner: Mutex::new(Inner {
                resources: HashSet::new(),
                slots: HashMap::new(),
                sorted: Vec::new(),
            }),
        }
    }

    /// The effective replica count this ring was constructed with.
    pub fn replicas(&self) -> u32 {
        self.replicas
    }

    /// Adds `node` to the ring, returning `false` without making any
    /// changes if it is already a member.
    pub fn add(&self, node: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.resources.contains(node) {
            return false;
        }

        for i in 0..self.replicas {
            let vkey = virtual_key(node, i);
            let slot = slot_for(&vkey);
            inner.slots.insert(slot, vkey);
        }
        inner.resources.insert(node.to_string());
        inner.resort();

        tracing::debug!(node, replicas = self.replicas, "added node to ring");
        true
    }

    /// Removes `node` from the ring. A no-op if it is not a member.
    pub fn delete(&self, node: &str) {
        let mut inner = self.inner.lock();
        if !inner.resources.remove(node) {
            return;
        }

        for i in 0..self.replicas {
            let vkey = virtual_key(node, i);
            let slot = slot_for(&vkey);
            inner.slots.remove(&slot);
        }
        inner.resort();

        tracing::debug!(node, "removed node from ring");
    }

    /// Returns the virtual replica key whose slot is the least one that is
    /// greater than or equal to `crc32(key)`, wrapping around to the first
    /// slot when `key` hashes past the end of the ring. Returns `None` if
    /// the ring has no members.
    pub fn get(&self, key: &str) -> Option<String> {
        let inner = self.inner.lock();
        if inner.sorted.is_empty() {
            return None;
        }

        let hash = slot_for(key);
        let idx = match inner.sorted.binary_search(&hash) {
            Ok(idx) => idx,
            Err(idx) => idx,
        };
        let idx = if idx == inner.sorted.len() { 0 } else { idx };

        inner.slots.get(&inner.sorted[idx]).cloned()
    }

    /// `true` if the ring currently has no members.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().sorted.is_empty()
    }

    /// Current membership size (not the virtual replica count).
    pub fn len(&self) -> usize {
        self.inner.lock().resources.len()
    }
}

fn virtual_key(node: &str, i: u32) -> String {
    format!("{node}-{i}")
}

fn slot_for(data: &str) -> u32 {
    crc32fast::hash(data.as_bytes())
}

/// Splits a virtual replica key (`"<addr>-<i>"`) back into its owning
/// node address by taking the substring before the first `'-'`.
///
/// Addresses that themselves contain a `-` are ambiguous under this
/// scheme (see the ring's design notes); the first-hyphen split is the
/// wire-level contract already agreed on by registered backends.
pub fn node_of(virtual_key: &str) -> &str {
    virtual_key.split('-').next().unwrap_or(virtual_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE1: &str = "10.38.87.38:8989";
    const NODE2: &str = "10.38.87.60:8989";
    const NODE3: &str = "10.38.87.38:8967";

    #[test]
    fn default_replicas_applied_when_non_positive() {
        let k = Ketama::new(0);
        assert_eq!(k.replicas(), DEFAULT_REPLICAS);
    }

    #[test]
    fn explicit_replicas_are_kept() {
        let k = Ketama::new(8);
        assert_eq!(k.replicas(), 8);
        assert!(k.is_empty());
    }

    #[test]
    fn empty_ring_get_returns_none() {
        let k = Ketama::new(2);
        assert_eq!(k.get("anything"), None);
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let k = Ketama::new(1);
        assert!(k.add("X"));
        assert!(!k.add("X"));
        assert_eq!(k.len(), 1);
    }

    #[test]
    fn add_then_delete_restores_empty_state() {
        let k = Ketama::new(4);
        k.add(NODE1);
        k.delete(NODE1);
        assert!(k.is_empty());
        assert_eq!(k.len(), 0);
    }

    #[test]
    fn add_places_expected_slot_count() {
        let k = Ketama::new(1);
        k.add(NODE1);
        // Golden vector from the original Go implementation: crc32(NODE1 + "-0").
        assert_eq!(slot_for(&virtual_key(NODE1, 0)), 2860987738);
    }

    #[test]
    fn golden_ketama_placement_vector() {
        // Pins the exact CRC32 + tie-break implementation against a
        // known-good placement.
        let k = Ketama::new(2);
        k.add(NODE1);
        k.add(NODE2);
        k.add(NODE3);

        let got = k.get("a").expect("ring is non-empty");
        assert_eq!(got, "10.38.87.60:8989-0");
    }

    #[test]
    fn node_of_splits_on_first_hyphen_only() {
        assert_eq!(node_of("host:9000-3"), "host:9000");
        assert_eq!(node_of("fe80--1:9000-0"), "fe80");
    }

    #[test]
    fn sorted_is_monotonic_after_mutations() {
        let k = Ketama::new(5);
        for n in ["a", "b", "c", "d"] {
            k.add(n);
            let inner = k.inner.lock();
            assert!(inner.sorted.windows(2).all(|w| w[0] <= w[1]));
        }
        k.delete("b");
        let inner = k.inner.lock();
        assert!(inner.sorted.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn ring_size_matches_nodes_times_replicas() {
        let k = Ketama::new(16);
        let nodes: Vec<String> = (0..20).map(|i| format!("10.0.0.{i}:9000")).collect();
        for n in &nodes {
            k.add(n);
        }
        let expected = nodes.len() as u32 * k.replicas();
        let inner = k.inner.lock();
        // Allow a small margin for CRC32 collisions across 320 slots.
        assert!(inner.sorted.len() as u32 >= expected - nodes.len() as u32);
    }

    #[test]
    fn determinism_is_independent_of_insertion_order() {
        let forward = Ketama::new(10);
        let backward = Ketama::new(10);
        let nodes: Vec<String> = (0..30).map(|i| format!("10.1.0.{i}:9000")).collect();

        for n in &nodes {
            forward.add(n);
        }
        for n in nodes.iter().rev() {
            backward.add(n);
        }

        for i in 0..500 {
            let key = format!("key-{i}");
            assert_eq!(forward.get(&key), backward.get(&key));
        }
    }

    #[test]
    fn low_churn_on_single_node_removal() {
        let k = Ketama::new(100);
        let nodes: Vec<String> = (0..20).map(|i| format!("10.2.0.{i}:9000")).collect();
        for n in &nodes {
            k.add(n);
        }

        let keys: Vec<String> = (0..5000).map(|i| format!("churn-key-{i}")).collect();
        let before: Vec<String> = keys.iter().map(|key| k.get(key).unwrap()).collect();

        k.delete(&nodes[0]);

        let moved = keys
            .iter()
            .zip(before.iter())
            .filter(|(key, prev)| {
                let now = k.get(key).unwrap();
                node_of(prev) != node_of(&now)
            })
            .count();

        // Expect close to 1/N of keys to move; allow generous tolerance.
        let expected = keys.len() as f64 / nodes.len() as f64;
        assert!(
            (moved as f64) < expected * 1.3,
            "moved {moved} keys, expected around {expected}"
        );
    }
}
