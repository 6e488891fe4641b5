//! Error types for the registry agent.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No usable non-loopback IPv4 interface was found and no explicit
    /// advertise address was configured.
    #[error("no local IPv4 address available to advertise")]
    NoLocalAddress(#[from] local_ip_address::Error),

    /// The initial etcd connection could not be established. Fatal: the
    /// agent has no other way to announce itself.
    #[error("failed to connect to etcd at {endpoints:?}: {source}")]
    Connect {
        endpoints: Vec<String>,
        #[source]
        source: etcd_client::Error,
    },
}
