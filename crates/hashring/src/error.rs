//! Error types for the hash ring and picker.

use thiserror::Error;

/// Errors raised while selecting a backend connection for a call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PickError {
    /// No hash key was supplied, the ring had no entry for it, or the
    /// entry it resolved to is not currently a ready connection.
    #[error("no connection available for the supplied hash key")]
    NoConnAvailable,
}
