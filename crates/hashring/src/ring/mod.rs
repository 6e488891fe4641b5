//! Ketama-style consistent hash ring.
//!
//! [`Ketama`] maps opaque request keys onto a set of equally-weighted node
//! addresses using CRC32-IEEE hashed virtual replicas, the same scheme
//! memcached clients use to spread keys over a pool of servers with low
//! churn on membership change.

mod ketama;
mod picker;

pub use ketama::{Ketama, DEFAULT_REPLICAS};
pub use picker::Picker;
