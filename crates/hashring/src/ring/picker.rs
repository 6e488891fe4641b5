//! The per-call connection picker.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::ketama::{node_of, Ketama};
use crate::error::PickError;

/// An immutable snapshot of ready connections plus the ring that routes
/// hash keys to them.
///
/// A `Picker` never changes after construction: when the ready set
/// changes, the balancer adaptor builds a brand new `Picker` and swaps it
/// in. The lock here only serializes the (cheap) lookup against
/// concurrent callers; it is not protecting mutable state.
pub struct Picker<T: Clone> {
    ready: HashMap<String, T>,
    ring: Arc<Ketama>,
    // Retained to satisfy the "serialize logging" requirement even though
    // `pick` itself never mutates anything.
    _pick_lock: Mutex<()>,
}

impl<T: Clone> Picker<T> {
    /// Builds a picker over a snapshot of ready connections and the ring
    /// that should be consulted for routing.
    pub fn new(ready: HashMap<String, T>, ring: Arc<Ketama>) -> Self {
        Self {
            ready,
            ring,
            _pick_lock: Mutex::new(()),
        }
    }

    /// Selects a connection for `hash_key`.
    ///
    /// Returns [`PickError::NoConnAvailable`] if no key was supplied, the
    /// ring has no entry for it, or the resolved address is not currently
    /// a ready connection (the ring and the ready set are refreshed
    /// independently, so this is an expected, non-exceptional outcome).
    pub fn pick(&self, hash_key: Option<&str>) -> Result<T, PickError> {
        let _guard = self._pick_lock.lock();

        let key = hash_key.ok_or(PickError::NoConnAvailable)?;
        let vkey = self.ring.get(key).ok_or(PickError::NoConnAvailable)?;
        let addr = node_of(&vkey);

        self.ready
            .get(addr)
            .cloned()
            .ok_or(PickError::NoConnAvailable)
    }

    /// Number of ready connections this picker was built over.
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_with(nodes: &[&str], replicas: i64) -> Arc<Ketama> {
        let ring = Ketama::new(replicas);
        for n in nodes {
            ring.add(n);
        }
        Arc::new(ring)
    }

    #[test]
    fn missing_hash_key_fails() {
        let ring = ring_with(&["a:1"], 4);
        let mut ready = HashMap::new();
        ready.insert("a:1".to_string(), 1u32);
        let picker = Picker::new(ready, ring);

        assert_eq!(picker.pick(None), Err(PickError::NoConnAvailable));
    }

    #[test]
    fn empty_ring_fails() {
        let ring = Arc::new(Ketama::new(4));
        let picker: Picker<u32> = Picker::new(HashMap::new(), ring);
        assert_eq!(picker.pick(Some("k")), Err(PickError::NoConnAvailable));
    }

    #[test]
    fn resolved_address_not_ready_fails() {
        // The ring knows about "a:1" but the ready set (post-refresh) no
        // longer contains it.
        let ring = ring_with(&["a:1"], 4);
        let picker: Picker<u32> = Picker::new(HashMap::new(), ring);
        assert_eq!(picker.pick(Some("any-key")), Err(PickError::NoConnAvailable));
    }

    #[test]
    fn picks_the_ready_connection_for_the_resolved_address() {
        let ring = ring_with(&["a:1", "b:2"], 10);
        let mut ready = HashMap::new();
        ready.insert("a:1".to_string(), "conn-a");
        ready.insert("b:2".to_string(), "conn-b");
        let picker = Picker::new(ready, ring);

        let got = picker.pick(Some("some-hash-key")).unwrap();
        assert!(got == "conn-a" || got == "conn-b");
    }
}
