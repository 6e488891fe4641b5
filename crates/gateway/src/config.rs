//! Layered gateway configuration: a TOML file merged with `XCHAIN_GW_*`
//! environment overrides, plus the one CLI override (`--gw-addr`) named
//! by the caller at startup.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub etcd: EtcdSettings,
    #[serde(default = "default_gw_addr")]
    pub gw_addr: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_replicas")]
    pub replicas: i64,
}

#[derive(Debug, Deserialize)]
pub struct EtcdSettings {
    pub endpoints: Vec<String>,
}

fn default_gw_addr() -> String {
    ":50089".to_string()
}

fn default_prefix() -> String {
    "gateway/xchaingateway".to_string()
}

fn default_ttl_seconds() -> u64 {
    5
}

fn default_replicas() -> i64 {
    hashring::DEFAULT_REPLICAS as i64
}

/// Loads settings from `path`, overlaying `XCHAIN_GW_*` environment
/// variables (double-underscore separated, e.g. `XCHAIN_GW_ETCD__ENDPOINTS`),
/// then applies `gw_addr_override` if the caller passed `--gw-addr`.
pub fn load(path: &str, gw_addr_override: Option<String>) -> Result<Settings, config::ConfigError> {
    let built = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(
            config::Environment::with_prefix("XCHAIN_GW")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let mut settings: Settings = built.try_deserialize()?;
    if let Some(addr) = gw_addr_override {
        settings.gw_addr = addr;
    }
    Ok(settings)
}
