//! Engine policy.

use beacon_core::DEFAULT_GATEWAY_URL;
use std::time::Duration;

/// Rotation never ticks faster than this, whatever the session asks for.
pub const ROTATION_FLOOR: Duration = Duration::from_secs(15);

/// A rotation tick closer than this to the previous presence update is dropped.
pub const RETICK_GUARD: Duration = Duration::from_secs(12);

/// Default REST API base for account mutations.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Process-wide engine settings. Read-only once the engine is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub gateway_url: String,
    pub api_base: String,
    /// Delay before reconnecting after an ordinary failure.
    pub reconnect_delay: Duration,
    /// Delay before reconnecting after the gateway rate-limited us.
    pub rate_limit_cooldown: Duration,
    /// Pause between Ready and arming rotation.
    pub settle_delay: Duration,
    /// Bound on one relay round-trip for forwarded requests.
    pub relay_timeout: Duration,
    /// Bound on one direct REST request.
    pub request_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            reconnect_delay: Duration::from_secs(5),
            rate_limit_cooldown: Duration::from_secs(15),
            settle_delay: Duration::from_secs(2),
            relay_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
        }
    }
}
