//! Self-registration of a gateway instance under an etcd key prefix.
//!
//! A [`Registry`] holds a lease-backed key of the form
//! `/{scheme}/{prefix}/{addr}` and refreshes it on a fixed interval so that
//! watchers (see the `resolver` crate) see the instance disappear shortly
//! after it stops refreshing, rather than lingering forever.

mod error;

use std::time::Duration;

use etcd_client::{Client, GetOptions, PutOptions};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

pub use error::Error;

/// Fixed etcd scheme this agent's coordination keys are rooted under.
/// Part of the wire contract with the resolver; see [`resolver::SCHEME`].
pub const SCHEME: &str = "etcdxchain";

/// How long [`Registry::unregister`] waits for the best-effort key
/// deletion to land before the caller is allowed to exit.
const UNREGISTER_GRACE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub etcd_endpoints: Vec<String>,
    pub prefix: String,
    /// Advertised address. `None` resolves the host's first non-loopback
    /// IPv4 interface at construction time.
    pub addr: Option<String>,
    pub ttl_seconds: u64,
}

pub struct Registry {
    client: Client,
    key: String,
    value: String,
    ttl_seconds: u64,
}

impl Registry {
    /// Opens the etcd connection and resolves the advertise address.
    /// Fails fast if etcd is unreachable or no local address can be
    /// determined.
    pub async fn new(config: RegistryConfig) -> Result<Self, Error> {
        let client = Client::connect(config.etcd_endpoints.clone(), None)
            .await
            .map_err(|source| Error::Connect {
                endpoints: config.etcd_endpoints,
                source,
            })?;

        let addr = match config.addr {
            Some(addr) => addr,
            None => local_ip_address::local_ip()?.to_string(),
        };

        let key = format!("/{SCHEME}/{}/{}", config.prefix, addr);

        Ok(Self {
            client,
            key,
            value: addr,
            ttl_seconds: config.ttl_seconds,
        })
    }

    /// Spawns the indefinite lease-refresh loop and returns its join
    /// handle alongside a [`ShutdownHandle`] that cancels it.
    pub fn register(mut self) -> (JoinHandle<()>, ShutdownHandle) {
        let token = CancellationToken::new();
        let child = token.child_token();

        let task = tokio::spawn(async move {
            put_once(&mut self.client, &self.key, &self.value, self.ttl_seconds).await;

            let mut ticker = interval(Duration::from_secs(self.ttl_seconds));
            ticker.tick().await; // first tick fires immediately

            loop {
                tokio::select! {
                    _ = child.cancelled() => {
                        if let Err(err) = self.client.delete(self.key.clone(), None).await {
                            tracing::error!(key = %self.key, error = %err, "failed to delete registration key on shutdown");
                        }
                        return;
                    }
                    _ = ticker.tick() => {
                        put_once(&mut self.client, &self.key, &self.value, self.ttl_seconds).await;
                    }
                }
            }
        });

        (task, ShutdownHandle { token })
    }
}

/// Grants a fresh lease of `ttl_seconds` and (re)binds `key -> value` to
/// it, whether or not the key already existed. Errors are logged, not
/// propagated — a failed refresh just means the key expires on its
/// previous lease and is retried on the next tick.
async fn put_once(client: &mut Client, key: &str, value: &str, ttl_seconds: u64) {
    let lease = match client.lease_grant(ttl_seconds as i64, None).await {
        Ok(resp) => resp.id(),
        Err(err) => {
            tracing::error!(%key, error = %err, "failed to grant lease for registration key");
            return;
        }
    };

    if let Err(err) = client.get(key, Some(GetOptions::new())).await {
        tracing::error!(%key, error = %err, "failed to read registration key before put");
    }

    if let Err(err) = client
        .put(key, value, Some(PutOptions::new().with_lease(lease)))
        .await
    {
        tracing::error!(%key, error = %err, "failed to put registration key");
    }
}

/// Cancels the refresh loop spawned by [`Registry::register`].
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    /// Requests shutdown and sleeps long enough to give the best-effort
    /// key deletion a chance to land before the caller exits the
    /// process. Cooperative, not a hard kill.
    pub async fn unregister(&self) {
        self.token.cancel();
        tokio::time::sleep(UNREGISTER_GRACE).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_key_has_expected_shape() {
        let prefix = "gateway/xchaingateway";
        let addr = "10.0.0.1:9000";
        let key = format!("/{SCHEME}/{prefix}/{addr}");
        assert_eq!(key, "/etcdxchain/gateway/xchaingateway/10.0.0.1:9000");
    }
}
