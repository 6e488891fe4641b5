//! Name resolution over an etcd key prefix.
//!
//! [`Resolver`] watches a prefix under the fixed scheme [`SCHEME`] and
//! emits the full, deduplicated address list every time membership
//! changes — a `Put` that adds a new address, or a `Delete` that removes
//! one. The consumer (the gateway's balancer adaptor) always receives a
//! complete snapshot rather than a delta, because it rebuilds its ring
//! from scratch on every update anyway.

mod error;
mod watch;

pub use error::Error;
pub use watch::{Resolver, ResolverHandle};

/// Fixed etcd scheme this gateway's coordination keys are rooted under.
/// Part of the wire contract with the registry agent; see
/// [`registry::SCHEME`].
pub const SCHEME: &str = "etcdxchain";

/// Builds the etcd key prefix watched for a given registration path.
pub fn watch_prefix(endpoint: &str) -> String {
    format!("/{SCHEME}/{endpoint}/")
}
