//! Integration-level property tests for the Ketama ring.

use hashring::Ketama;
use proptest::prelude::*;
use std::collections::HashSet;

proptest! {
    #[test]
    fn add_is_idempotent(node in "[a-z]{1,8}:[0-9]{2,5}") {
        let ring = Ketama::new(8);
        let first = ring.add(&node);
        let second = ring.add(&node);
        prop_assert!(first);
        prop_assert!(!second);
        prop_assert_eq!(ring.len(), 1);
    }

    #[test]
    fn add_then_delete_is_identity(node in "[a-z]{1,8}:[0-9]{2,5}") {
        let ring = Ketama::new(8);
        prop_assert!(ring.is_empty());
        ring.add(&node);
        ring.delete(&node);
        prop_assert!(ring.is_empty());
    }

    #[test]
    fn get_always_resolves_to_a_member(
        nodes in prop::collection::hash_set("[a-z]{1,6}:[0-9]{2,5}", 1..20),
        key in "[a-zA-Z0-9]{1,16}",
    ) {
        let ring = Ketama::new(12);
        let members: HashSet<String> = nodes.into_iter().collect();
        for n in &members {
            ring.add(n);
        }

        let vkey = ring.get(&key).expect("non-empty ring always resolves");
        let addr = vkey.split('-').next().unwrap();
        prop_assert!(members.contains(addr));
    }
}

#[test]
fn determinism_across_many_random_keys() {
    let a = Ketama::new(16);
    let b = Ketama::new(16);
    let nodes = vec!["h1:1", "h2:2", "h3:3", "h4:4", "h5:5"];

    for n in &nodes {
        a.add(n);
    }
    for n in nodes.iter().rev() {
        b.add(n);
    }

    for i in 0..2000 {
        let key = format!("det-{i}");
        assert_eq!(a.get(&key), b.get(&key));
    }
}
