//! Bridges the resolver's live address set into a ready-to-use picker.
//!
//! Whenever the resolver reports a new address set, the adaptor dials
//! any newly seen addresses (lazily — no connection attempt happens
//! until the first call against it), drops channels for addresses that
//! disappeared, builds a fresh ring over the current membership, and
//! publishes the new picker snapshot via `ArcSwap` so in-flight callers
//! never observe a half-built ring.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use hashring::{Ketama, Picker};
use resolver::ResolverHandle;
use tokio_stream::StreamExt;
use tonic::transport::{Channel, Endpoint};

/// Owns the currently-published [`Picker`] and the background task that
/// rebuilds it as membership changes.
pub struct Balancer {
    current: Arc<ArcSwap<Picker<Channel>>>,
}

impl Balancer {
    /// Builds the initial picker from the resolver's current snapshot
    /// and spawns a background task that rebuilds it on every
    /// subsequent change. The task runs until `handle` is dropped.
    pub fn spawn(handle: ResolverHandle, replicas: i64) -> Self {
        let initial = build(handle.addresses(), &HashMap::new(), replicas);
        let current = Arc::new(ArcSwap::new(Arc::new(initial.picker)));

        let published = current.clone();
        tokio::spawn(async move {
            // `handle` is moved into this task and dropped only once the
            // stream ends, so the background etcd watch keeps running
            // for as long as updates are being applied.
            let mut channels = initial.channels;
            let mut changes = Box::pin(handle.changes());
            while let Some(addrs) = changes.next().await {
                let rebuilt = build(addrs, &channels, replicas);
                channels = rebuilt.channels;
                published.store(Arc::new(rebuilt.picker));
            }
            drop(handle);
        });

        Self { current }
    }

    /// The currently-published picker snapshot. Lock-free: this is an
    /// `ArcSwap` load, never a clone-under-mutex.
    pub fn picker(&self) -> Arc<Picker<Channel>> {
        self.current.load_full()
    }
}

struct Built {
    picker: Picker<Channel>,
    channels: HashMap<String, Channel>,
}

fn build(addrs: Vec<String>, existing: &HashMap<String, Channel>, replicas: i64) -> Built {
    let ring = Ketama::new(replicas);
    let mut channels = HashMap::with_capacity(addrs.len());

    for addr in &addrs {
        ring.add(addr);
        let channel = existing
            .get(addr)
            .cloned()
            .unwrap_or_else(|| dial(addr));
        channels.insert(addr.clone(), channel);
    }

    tracing::debug!(ready = channels.len(), "rebuilt picker");
    Built {
        picker: Picker::new(channels.clone(), Arc::new(ring)),
        channels,
    }
}

fn dial(addr: &str) -> Channel {
    Endpoint::from_shared(format!("http://{addr}"))
        .expect("backend address is a valid URI")
        .connect_lazy()
}
