//! Error types for the etcd-backed resolver.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The resolver could not open a connection to etcd at construction.
    /// This is fatal: the gateway has no other way to learn about
    /// backends.
    #[error("failed to connect to etcd at {endpoints:?}: {source}")]
    Connect {
        endpoints: Vec<String>,
        #[source]
        source: etcd_client::Error,
    },

    /// The initial range read under the watch prefix failed. Non-fatal:
    /// the resolver starts with an empty address set and relies on the
    /// subsequent watch to populate it.
    #[error("initial range read under {prefix} failed: {source}")]
    InitialRead {
        prefix: String,
        #[source]
        source: etcd_client::Error,
    },

    /// Establishing the watch stream itself failed.
    #[error("failed to start watch under {prefix}: {source}")]
    WatchStart {
        prefix: String,
        #[source]
        source: etcd_client::Error,
    },
}
