//! Proxy descriptors from the vault.

use crate::relay::ProxyParams;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Proxy transport type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProxyKind {
    #[default]
    #[serde(rename = "HTTP", alias = "http")]
    Http,
    #[serde(rename = "SOCKS5", alias = "socks5")]
    Socks5,
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyKind::Http => f.write_str("HTTP"),
            ProxyKind::Socks5 => f.write_str("SOCKS5"),
        }
    }
}

/// Result of the vault's liveness probe. Only read for log prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Connection parameters for one upstream proxy.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyDescriptor {
    pub id: String,
    #[serde(default)]
    pub alias: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: ProxyKind,
    #[serde(default)]
    pub probe: Option<ProbeResult>,
}

impl ProxyDescriptor {
    /// Proxy aliased by its id, with no credentials or probe result.
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        let id = id.into();
        Self {
            alias: id.clone(),
            id,
            host: host.into(),
            port,
            username: None,
            password: None,
            kind: ProxyKind::default(),
            probe: None,
        }
    }

    /// The network identity this proxy presents: the probed exit ip, or the host.
    pub fn network_label(&self) -> &str {
        self.probe
            .as_ref()
            .and_then(|p| p.ip.as_deref())
            .unwrap_or(&self.host)
    }

    /// Name shown to operators.
    pub fn display_name(&self) -> &str {
        if self.alias.is_empty() {
            &self.id
        } else {
            &self.alias
        }
    }

    /// Wire parameters for relay frames. Blank credentials are omitted.
    pub fn params(&self) -> ProxyParams {
        let non_blank = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        ProxyParams {
            host: self.host.clone(),
            port: self.port,
            username: non_blank(&self.username),
            password: non_blank(&self.password),
            kind: self.kind,
        }
    }
}

impl fmt::Debug for ProxyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyDescriptor")
            .field("id", &self.id)
            .field("alias", &self.alias)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("kind", &self.kind)
            .field("probe", &self.probe)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_label_prefers_probe_ip() {
        let mut proxy = ProxyDescriptor::new("p1", "proxy.local", 8080);
        assert_eq!(proxy.network_label(), "proxy.local");

        proxy.probe = Some(ProbeResult {
            ip: Some("45.12.33.102".into()),
            country: Some("Germany".into()),
        });
        assert_eq!(proxy.network_label(), "45.12.33.102");
    }

    #[test]
    fn params_drop_blank_credentials() {
        let mut proxy = ProxyDescriptor::new("p1", "proxy.local", 1080);
        proxy.username = Some(String::new());
        proxy.password = Some("hunter2".into());
        proxy.kind = ProxyKind::Socks5;

        let json = serde_json::to_value(proxy.params()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "host": "proxy.local",
                "port": 1080,
                "password": "hunter2",
                "type": "SOCKS5",
            })
        );
    }

    #[test]
    fn debug_hides_password() {
        let mut proxy = ProxyDescriptor::new("p1", "h", 1);
        proxy.password = Some("hunter2".into());
        assert!(!format!("{proxy:?}").contains("hunter2"));
    }
}
