use std::collections::HashSet;

use etcd_client::{Client, EventType, GetOptions, WatchOptions};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;

use crate::error::Error;

/// Watches an etcd key prefix and republishes the live address set on
/// every membership change.
pub struct Resolver {
    client: Client,
}

impl Resolver {
    /// Opens a connection to etcd. Fails fast if the cluster is
    /// unreachable — there is no fallback coordination mechanism.
    pub async fn connect(endpoints: Vec<String>) -> Result<Self, Error> {
        let client =
            Client::connect(endpoints.clone(), None)
                .await
                .map_err(|source| Error::Connect { endpoints, source })?;

        Ok(Self { client })
    }

    /// Starts watching `/{scheme}/{endpoint}/` and returns a handle whose
    /// [`ResolverHandle::addresses`] always reflects the latest known
    /// address set.
    ///
    /// Performs the initial snapshot read inline so the very first
    /// address set is available as soon as this call returns; the
    /// continuous watch then runs on a background task until the handle
    /// is dropped.
    pub async fn watch(mut self, endpoint: &str) -> ResolverHandle {
        let prefix = crate::watch_prefix(endpoint);

        let initial = match initial_snapshot(&mut self.client, &prefix).await {
            Ok(addrs) => addrs,
            Err(err) => {
                tracing::warn!(%prefix, error = %err, "initial etcd range read failed, starting empty");
                Vec::new()
            }
        };

        let (tx, rx) = watch::channel(initial);
        let task = tokio::spawn(run_watch(self.client, prefix, tx));

        ResolverHandle { rx, task }
    }
}

async fn initial_snapshot(client: &mut Client, prefix: &str) -> Result<Vec<String>, Error> {
    let resp = client
        .get(prefix, Some(GetOptions::new().with_prefix()))
        .await
        .map_err(|source| Error::InitialRead {
            prefix: prefix.to_string(),
            source,
        })?;

    let mut seen = HashSet::new();
    let mut addrs = Vec::new();
    for kv in resp.kvs() {
        if let Ok(addr) = kv.value_str() {
            if seen.insert(addr.to_string()) {
                addrs.push(addr.to_string());
            }
        }
    }
    Ok(addrs)
}

async fn run_watch(mut client: Client, prefix: String, tx: watch::Sender<Vec<String>>) {
    let (_watcher, mut stream) = match client
        .watch(prefix.clone(), Some(WatchOptions::new().with_prefix()))
        .await
    {
        Ok(pair) => pair,
        Err(source) => {
            tracing::error!(
                %prefix,
                error = %Error::WatchStart { prefix: prefix.clone(), source },
                "failed to establish etcd watch; address set will not update"
            );
            return;
        }
    };

    let mut addrs = tx.borrow().clone();

    loop {
        let message = match stream.message().await {
            Ok(Some(resp)) => resp,
            Ok(None) => {
                tracing::info!(%prefix, "etcd watch stream closed");
                return;
            }
            Err(err) => {
                tracing::warn!(%prefix, error = %err, "etcd watch stream error");
                return;
            }
        };

        let mut changed = false;
        for event in message.events() {
            let Some(kv) = event.kv() else { continue };
            let Ok(addr) = kv.value_str() else { continue };
            changed |= apply_event(&mut addrs, event.event_type(), addr);
        }

        if changed && tx.send(addrs.clone()).is_err() {
            // No receivers left; the handle was dropped.
            return;
        }
    }
}

/// Applies a single `Put`/`Delete` event to the in-memory address list,
/// returning `true` if it actually changed the set.
///
/// `Put` of an already-present address and `Delete` of an absent one are
/// no-ops. `Delete` removes by swapping with the last element, matching
/// the original resolver's order-not-preserved contract.
fn apply_event(addrs: &mut Vec<String>, event_type: EventType, addr: &str) -> bool {
    match event_type {
        EventType::Put => {
            if addrs.iter().any(|a| a == addr) {
                false
            } else {
                addrs.push(addr.to_string());
                true
            }
        }
        EventType::Delete => {
            if let Some(idx) = addrs.iter().position(|a| a == addr) {
                addrs.swap_remove(idx);
                true
            } else {
                false
            }
        }
    }
}

/// A live handle onto a running [`Resolver`] watch.
///
/// Dropping the handle cancels the background watch task.
pub struct ResolverHandle {
    rx: watch::Receiver<Vec<String>>,
    task: JoinHandle<()>,
}

impl ResolverHandle {
    /// The current, deduplicated address list.
    pub fn addresses(&self) -> Vec<String> {
        self.rx.borrow().clone()
    }

    /// A stream that yields the address list once immediately and again
    /// on every subsequent change.
    pub fn changes(&self) -> impl tokio_stream::Stream<Item = Vec<String>> {
        WatchStream::new(self.rx.clone())
    }
}

impl Drop for ResolverHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_prefix_has_expected_shape() {
        assert_eq!(
            crate::watch_prefix("gateway/xchaingateway"),
            "/etcdxchain/gateway/xchaingateway/"
        );
    }

    #[test]
    fn put_of_new_address_grows_the_set() {
        let mut addrs = vec!["a1".to_string()];
        assert!(apply_event(&mut addrs, EventType::Put, "a2"));
        assert_eq!(addrs, vec!["a1", "a2"]);
    }

    #[test]
    fn put_of_existing_address_is_a_no_op() {
        let mut addrs = vec!["a1".to_string()];
        assert!(!apply_event(&mut addrs, EventType::Put, "a1"));
        assert_eq!(addrs, vec!["a1"]);
    }

    #[test]
    fn delete_of_absent_address_is_a_no_op() {
        let mut addrs = vec!["a1".to_string()];
        assert!(!apply_event(&mut addrs, EventType::Delete, "a2"));
        assert_eq!(addrs, vec!["a1"]);
    }

    #[test]
    fn delete_removes_the_matching_address() {
        let mut addrs = vec!["a1".to_string(), "a2".to_string()];
        assert!(apply_event(&mut addrs, EventType::Delete, "a1"));
        assert_eq!(addrs, vec!["a2"]);
    }

    #[test]
    fn resolver_tracks_put_then_put_then_delete() {
        let mut addrs: Vec<String> = Vec::new();
        assert!(addrs.is_empty());

        assert!(apply_event(&mut addrs, EventType::Put, "a1"));
        assert_eq!(addrs, vec!["a1"]);

        assert!(apply_event(&mut addrs, EventType::Put, "a2"));
        assert_eq!(addrs.len(), 2);
        assert!(addrs.contains(&"a1".to_string()) && addrs.contains(&"a2".to_string()));

        assert!(apply_event(&mut addrs, EventType::Delete, "a1"));
        assert_eq!(addrs, vec!["a2"]);
    }
}
