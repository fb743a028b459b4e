//! Daemon configuration file.
//!
//! ```toml
//! [relay]
//! url = "ws://127.0.0.1:8787"
//!
//! [[proxies]]
//! id = "home"
//! host = "203.0.113.7"
//! port = 1080
//! type = "SOCKS5"
//!
//! [[accounts]]
//! label = "main"
//! token_env = "BEACON_MAIN_TOKEN"
//! status = "idle"
//! proxy = "home"
//!
//! [accounts.rotation]
//! statuses = ["reading", "writing"]
//! interval = 60
//! ```

use beacon_client::EngineSettings;
use beacon_core::{
    PresenceStatus, ProxyDescriptor, RotationConfig, SessionConfig, SessionKind, StaticPresence,
    Token,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Most proxies a vault may hold.
pub const MAX_PROXIES: usize = 5;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    relay: RelaySection,
    #[serde(default)]
    engine: EngineSection,
    #[serde(default)]
    proxies: Vec<ProxyDescriptor>,
    #[serde(default)]
    accounts: Vec<AccountSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RelaySection {
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EngineSection {
    gateway_url: Option<String>,
    api_base: Option<String>,
    reconnect_delay_secs: Option<u64>,
    rate_limit_cooldown_secs: Option<u64>,
    settle_delay_secs: Option<u64>,
    relay_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

impl EngineSection {
    fn apply(self, settings: &mut EngineSettings) {
        let secs = Duration::from_secs;
        if let Some(url) = self.gateway_url {
            settings.gateway_url = url;
        }
        if let Some(base) = self.api_base {
            settings.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(s) = self.reconnect_delay_secs {
            settings.reconnect_delay = secs(s);
        }
        if let Some(s) = self.rate_limit_cooldown_secs {
            settings.rate_limit_cooldown = secs(s);
        }
        if let Some(s) = self.settle_delay_secs {
            settings.settle_delay = secs(s);
        }
        if let Some(s) = self.relay_timeout_secs {
            settings.relay_timeout = secs(s);
        }
        if let Some(s) = self.request_timeout_secs {
            settings.request_timeout = secs(s);
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AccountSection {
    label: String,
    token: Option<String>,
    token_env: Option<String>,
    #[serde(default)]
    status: PresenceStatus,
    proxy: Option<String>,
    #[serde(rename = "static")]
    fixed: Option<StaticPresence>,
    rotation: Option<RotationConfig>,
}

/// A loaded and validated configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub relay_url: Option<String>,
    pub settings: EngineSettings,
    pub proxies: Vec<ProxyDescriptor>,
    pub accounts: Vec<SessionConfig>,
}

impl DaemonConfig {
    /// Load from `path`, resolving `token_env` against the process environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, |name| std::env::var(name).ok())
    }

    /// Parse `text`, looking environment variables up through `env`.
    pub fn parse(text: &str, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text)?;

        if raw.proxies.len() > MAX_PROXIES {
            return Err(ConfigError::TooManyProxies(raw.proxies.len()));
        }
        let mut proxy_ids = HashSet::new();
        for proxy in &raw.proxies {
            if !proxy_ids.insert(proxy.id.as_str()) {
                return Err(ConfigError::DuplicateProxy(proxy.id.clone()));
            }
        }

        let mut labels = HashSet::new();
        let mut accounts = Vec::with_capacity(raw.accounts.len());
        for section in raw.accounts {
            if !labels.insert(section.label.clone()) {
                return Err(ConfigError::DuplicateLabel(section.label));
            }
            accounts.push(resolve_account(section, &raw.proxies, &env)?);
        }

        let mut settings = EngineSettings::default();
        raw.engine.apply(&mut settings);

        Ok(Self {
            relay_url: raw.relay.url.filter(|u| !u.trim().is_empty()),
            settings,
            proxies: raw.proxies,
            accounts,
        })
    }

    /// Look up an account by label.
    pub fn account(&self, label: &str) -> Result<&SessionConfig, ConfigError> {
        self.accounts
            .iter()
            .find(|a| a.label == label)
            .ok_or_else(|| ConfigError::UnknownAccount(label.to_string()))
    }
}

fn resolve_account(
    section: AccountSection,
    proxies: &[ProxyDescriptor],
    env: &impl Fn(&str) -> Option<String>,
) -> Result<SessionConfig, ConfigError> {
    let label = section.label;

    let token = match (section.token, section.token_env) {
        (Some(token), None) => token,
        (None, Some(var)) => env(&var).ok_or(ConfigError::TokenEnv {
            account: label.clone(),
            var,
        })?,
        (Some(_), Some(_)) => return Err(ConfigError::ConflictingToken(label)),
        (None, None) => return Err(ConfigError::MissingToken(label)),
    };

    let kind = match (section.fixed, section.rotation) {
        (Some(fixed), None) => SessionKind::Static(fixed),
        (None, Some(rotation)) => SessionKind::Rotating(rotation),
        (Some(_), Some(_)) => return Err(ConfigError::ConflictingKind(label)),
        (None, None) => return Err(ConfigError::MissingKind(label)),
    };

    let mut config = SessionConfig::new(label, Token::new(token), kind).with_status(section.status);
    if let Some(id) = section.proxy {
        let proxy = proxies
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownProxy {
                account: config.label.clone(),
                proxy: id,
            })?;
        config = config.with_proxy(proxy);
    }

    config.validate()?;
    Ok(config)
}

/// Error loading the daemon configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{0} proxies configured, the limit is {limit}", limit = MAX_PROXIES)]
    TooManyProxies(usize),
    #[error("proxy id {0:?} is used more than once")]
    DuplicateProxy(String),
    #[error("account label {0:?} is used more than once")]
    DuplicateLabel(String),
    #[error("account {account:?} references unknown proxy {proxy:?}")]
    UnknownProxy { account: String, proxy: String },
    #[error("account {0:?} needs a token or token_env")]
    MissingToken(String),
    #[error("account {0:?} sets both token and token_env")]
    ConflictingToken(String),
    #[error("account {account:?}: environment variable {var} is not set")]
    TokenEnv { account: String, var: String },
    #[error("account {0:?} needs a static or rotation table")]
    MissingKind(String),
    #[error("account {0:?} sets both static and rotation")]
    ConflictingKind(String),
    #[error(transparent)]
    Session(#[from] beacon_core::ConfigError),
    #[error("no account labelled {0:?}")]
    UnknownAccount(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::ProxyKind;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    const SAMPLE: &str = r#"
[relay]
url = "ws://127.0.0.1:8787"

[engine]
reconnect_delay_secs = 7
api_base = "https://api.example/v10/"

[[proxies]]
id = "home"
alias = "Home line"
host = "203.0.113.7"
port = 1080
type = "SOCKS5"

[proxies.probe]
ip = "198.51.100.2"
country = "NL"

[[accounts]]
label = "main"
token = "abc"
status = "dnd"
proxy = "home"

[accounts.rotation]
statuses = ["one", "two"]
interval = 30

[[accounts]]
label = "alt"
token_env = "ALT_TOKEN"

[accounts.static]
status_text = "around"
emoji = "wave"
rich_presence = true

[accounts.static.activity]
name = "Chess"
type = 0
"#;

    #[test]
    fn sample_loads() {
        let config = DaemonConfig::parse(SAMPLE, |name| {
            (name == "ALT_TOKEN").then(|| "from-env".to_string())
        })
        .unwrap();

        assert_eq!(config.relay_url.as_deref(), Some("ws://127.0.0.1:8787"));
        assert_eq!(config.settings.reconnect_delay, Duration::from_secs(7));
        assert_eq!(config.settings.rate_limit_cooldown, Duration::from_secs(15));
        assert_eq!(config.settings.api_base, "https://api.example/v10");

        let main = config.account("main").unwrap();
        assert_eq!(main.status, PresenceStatus::Dnd);
        let proxy = main.proxy.as_ref().unwrap();
        assert_eq!(proxy.kind, ProxyKind::Socks5);
        assert_eq!(proxy.network_label(), "198.51.100.2");
        assert_eq!(main.rotation().unwrap().interval_secs, 30);

        let alt = config.account("alt").unwrap();
        assert_eq!(alt.token.expose(), "from-env");
        assert!(alt.proxy.is_none());
        match &alt.kind {
            SessionKind::Static(fixed) => {
                assert!(fixed.rich_presence);
                assert_eq!(fixed.activity.as_ref().unwrap().name, "Chess");
            }
            other => panic!("expected static, got {other:?}"),
        }

        assert!(matches!(
            config.account("ghost"),
            Err(ConfigError::UnknownAccount(_))
        ));
    }

    #[test]
    fn missing_env_token() {
        let err = DaemonConfig::parse(SAMPLE, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::TokenEnv { ref var, .. } if var == "ALT_TOKEN"));
    }

    #[test]
    fn unknown_proxy() {
        let text = r#"
[[accounts]]
label = "a"
token = "t"
proxy = "nowhere"
[accounts.static]
status_text = "x"
"#;
        assert!(matches!(
            DaemonConfig::parse(text, no_env),
            Err(ConfigError::UnknownProxy { .. })
        ));
    }

    #[test]
    fn duplicate_labels() {
        let text = r#"
[[accounts]]
label = "a"
token = "t"
[accounts.static]

[[accounts]]
label = "a"
token = "u"
[accounts.static]
"#;
        assert!(matches!(
            DaemonConfig::parse(text, no_env),
            Err(ConfigError::DuplicateLabel(_))
        ));
    }

    #[test]
    fn kind_is_exclusive() {
        let both = r#"
[[accounts]]
label = "a"
token = "t"
[accounts.static]
[accounts.rotation]
statuses = ["x"]
"#;
        assert!(matches!(
            DaemonConfig::parse(both, no_env),
            Err(ConfigError::ConflictingKind(_))
        ));

        let neither = r#"
[[accounts]]
label = "a"
token = "t"
"#;
        assert!(matches!(
            DaemonConfig::parse(neither, no_env),
            Err(ConfigError::MissingKind(_))
        ));
    }

    #[test]
    fn empty_rotation_and_blank_token() {
        let empty = r#"
[[accounts]]
label = "a"
token = "t"
[accounts.rotation]
statuses = []
"#;
        assert!(matches!(
            DaemonConfig::parse(empty, no_env),
            Err(ConfigError::Session(beacon_core::ConfigError::EmptyStatusList(_)))
        ));

        let blank = r#"
[[accounts]]
label = "a"
token = "   "
[accounts.static]
"#;
        assert!(matches!(
            DaemonConfig::parse(blank, no_env),
            Err(ConfigError::Session(beacon_core::ConfigError::EmptyToken(_)))
        ));
    }

    #[test]
    fn proxy_cap() {
        let mut text = String::new();
        for i in 0..=MAX_PROXIES {
            text.push_str(&format!(
                "[[proxies]]\nid = \"p{i}\"\nhost = \"10.0.0.{i}\"\nport = 8080\n\n"
            ));
        }
        assert!(matches!(
            DaemonConfig::parse(&text, no_env),
            Err(ConfigError::TooManyProxies(6))
        ));
    }
}
