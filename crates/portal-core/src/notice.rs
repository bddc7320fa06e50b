// ── Presentation notices ──
//
// Modules never draw anything. They describe what the user should see as
// `Notice` values on a broadcast channel; a frontend (the CLI, a TUI, a
// test) subscribes and renders them however it likes.

use serde::Serialize;

use crate::context::ConnectionState;
use crate::module::FormConfig;
use crate::modules::wifi::{AccessPoint, LinkStatus};

/// Visual tone of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Tone {
    /// Something is in flight.
    Progress,
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// The channel changed state.
    Connection { state: ConnectionState },

    /// The reconnect budget is spent. The user has to reload.
    ConnectionLost,

    /// A module-scoped status line, e.g. the WiFi loader.
    Loader {
        module: &'static str,
        tone: Tone,
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        dismiss_after_ms: Option<u64>,
    },

    /// The shared settings status banner.
    SettingsStatus {
        tone: Tone,
        text: String,
        dismiss_after_ms: u64,
    },

    /// The shared save button started or stopped spinning.
    SaveButton { loading: bool },

    /// A workflow state machine moved.
    Workflow {
        workflow: &'static str,
        from: &'static str,
        to: &'static str,
    },

    ScanResults { networks: Vec<AccessPoint> },

    /// Station link changed. `None` means not connected.
    Link { status: Option<LinkStatus> },

    /// The device pushed stored form values for a module.
    FormLoaded {
        module: &'static str,
        fields: FormConfig,
    },

    /// A module's action controls were enabled or disabled.
    ControlsEnabled { module: &'static str, enabled: bool },

    /// Outcome of an MQTT broker test.
    MqttTest { ok: bool, text: String },
}

impl Notice {
    pub fn loader(module: &'static str, tone: Tone, text: impl Into<String>) -> Self {
        Self::Loader {
            module,
            tone,
            text: text.into(),
            dismiss_after_ms: None,
        }
    }

    /// A loader line the frontend should clear after `ms` milliseconds.
    pub fn transient(module: &'static str, tone: Tone, text: impl Into<String>, ms: u64) -> Self {
        Self::Loader {
            module,
            tone,
            text: text.into(),
            dismiss_after_ms: Some(ms),
        }
    }
}
