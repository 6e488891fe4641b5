//! Gateway process entry point: loads configuration, starts the name
//! resolver and self-registration, wires the balancer and gRPC server,
//! and shuts down cleanly on signal.

use std::sync::Arc;

use clap::Parser;
use gateway::config::{self, Settings};
use gateway::{Balancer, GatewayService};
use registry::{Registry, RegistryConfig};
use resolver::Resolver;
use tonic::transport::Server;
use xchain_proto::xchain_server::XchainServer;

#[derive(Parser, Debug)]
#[command(name = "xchain-gateway", about = "Consistent-hash RPC gateway")]
struct Args {
    /// Gateway listen address, e.g. 0.0.0.0:50089. Overrides the
    /// configured value.
    #[arg(long = "gw-addr")]
    gw_addr: Option<String>,

    /// Path to the TOML configuration file (without extension).
    #[arg(long = "config", default_value = "config/gateway")]
    config: String,
}

fn log_dir() -> std::path::PathBuf {
    match std::env::var("XCHAIN_ROOT") {
        Ok(root) => std::path::PathBuf::from(root).join("logs"),
        Err(_) => std::env::current_dir().unwrap_or_default().join("logs"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    tracing::info!(log_dir = %log_dir().display(), "starting gateway");

    let settings = config::load(&args.config, args.gw_addr)?;

    run(settings).await
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    let resolver = Resolver::connect(settings.etcd.endpoints.clone()).await?;
    let resolver_handle = resolver.watch(&settings.prefix).await;

    let balancer = Arc::new(Balancer::spawn(resolver_handle, settings.replicas));
    let service = GatewayService::new(balancer);

    let gw_addr = normalize_listen_addr(&settings.gw_addr);
    let listen_addr: std::net::SocketAddr = gw_addr.parse()?;

    let registry = Registry::new(RegistryConfig {
        etcd_endpoints: settings.etcd.endpoints.clone(),
        prefix: format!("{}/gateways", settings.prefix),
        addr: Some(gw_addr.clone()),
        ttl_seconds: settings.ttl_seconds,
    })
    .await?;
    let (register_task, shutdown) = registry.register();

    tracing::info!(%listen_addr, "gateway listening");

    let server = Server::builder()
        .add_service(XchainServer::new(service))
        .serve_with_shutdown(listen_addr, shutdown_signal());

    server.await?;

    tracing::info!("shutting down, unregistering");
    shutdown.unregister().await;
    register_task.abort();

    Ok(())
}

/// `:PORT`-style addresses (the original default) bind all interfaces.
fn normalize_listen_addr(addr: &str) -> String {
    if let Some(port) = addr.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        addr.to_string()
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install ctrl-c handler");
}
