//! Presence daemon for beacon.
//!
//! Loads accounts from a TOML file and keeps one gateway session per
//! account, recording state, logs, and uptime for each.

mod config;
mod supervisor;

pub use config::{ConfigError, DaemonConfig, MAX_PROXIES};
pub use supervisor::{AccountStatus, Supervisor};

use beacon_client::{Engine, RestError};

/// Build the engine a configuration describes. `relay_override` wins over the file.
pub fn engine(config: &DaemonConfig, relay_override: Option<String>) -> Result<Engine, RestError> {
    Engine::builder()
        .settings(config.settings.clone())
        .relay_address(relay_override.or_else(|| config.relay_url.clone()))
        .build()
}

/// How an account reaches the gateway, for operator summaries.
pub fn route_summary(account: &beacon_core::SessionConfig, relay: Option<&str>) -> String {
    match (&account.proxy, relay) {
        (None, _) => "direct".to_string(),
        (Some(proxy), Some(relay)) => {
            format!("relay {relay} via proxy [{}]", proxy.display_name())
        }
        (Some(proxy), None) => format!(
            "proxy [{}] set but no relay configured, connects directly",
            proxy.display_name()
        ),
    }
}
