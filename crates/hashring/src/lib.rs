//! Ketama-style consistent hash ring and per-call connection picker.
//!
//! This crate implements the placement layer of the gateway: a CRC32-IEEE
//! ring of virtual replicas ([`Ketama`]) and an immutable snapshot over it
//! ([`Picker`]) that resolves a request's hash key to a live connection.
//! It knows nothing about etcd, gRPC, or the proxied service — those
//! concerns live in the `resolver`, `registry`, and `gateway` crates.

pub mod error;
pub mod ring;

pub use error::PickError;
pub use ring::{Ketama, Picker, DEFAULT_REPLICAS};

/// The balancer identifier this ring implements. Preserved verbatim
/// (misspelling included) because it is the wire-level name the original
/// client configuration resolves by.
pub const BALANCER_NAME: &str = "consistant_hash";

/// The gRPC request-extension marker under which a hash key is attached.
///
/// Wrapping the `String` in a newtype lets [`tonic::Request::extensions`]
/// look it up unambiguously, the idiomatic replacement for a stringly-typed
/// context key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashKey(pub String);

impl HashKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for HashKey {
    fn from(s: String) -> Self {
        HashKey(s)
    }
}
