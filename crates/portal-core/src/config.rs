// ── Runtime configuration for portal sessions ──
//
// These types describe *how* to reach a device and how long workflows wait
// on it. They carry no serde derives; the config crate translates its TOML
// profiles into a `SessionConfig`.

use std::time::Duration;

use portal_api::ReconnectConfig;
use url::Url;

use crate::error::CoreError;

/// Everything needed to start a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebSocket endpoint, e.g. `ws://192.168.4.1:8810/`.
    pub endpoint: Url,
    pub reconnect: ReconnectConfig,
    pub timings: WorkflowTimings,
}

impl SessionConfig {
    /// Build a config for the portal served at `origin` with default timings.
    pub fn for_origin(origin: &str) -> Result<Self, CoreError> {
        Ok(Self {
            endpoint: portal_api::endpoint::endpoint_for_origin(origin)?,
            reconnect: ReconnectConfig::default(),
            timings: WorkflowTimings::default(),
        })
    }
}

/// Deadlines and display delays for the WiFi workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowTimings {
    pub scan_timeout: Duration,
    pub connect_timeout: Duration,
    pub wait_ip_timeout: Duration,
    pub check_eth_timeout: Duration,
    pub disconnect_timeout: Duration,
    /// How long a successful outcome stays on screen before returning to idle.
    pub settle_delay: Duration,
    /// How long an error outcome stays on screen before returning to idle.
    pub error_display: Duration,
}

impl Default for WorkflowTimings {
    fn default() -> Self {
        Self {
            scan_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(15),
            wait_ip_timeout: Duration::from_secs(15),
            check_eth_timeout: Duration::from_secs(10),
            disconnect_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_secs(1),
            error_display: Duration::from_secs(2),
        }
    }
}
