// ── Session command API ──
//
// Everything a frontend asks the session to do flows through `Command`.
// The session executes commands on its own loop, between frames, and
// answers on a oneshot channel.

use secrecy::SecretString;
use serde::Serialize;

use crate::context::ConnectionState;
use crate::error::CoreError;
use crate::module::FormConfig;

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

#[derive(Debug, Clone)]
pub enum Command {
    /// Set one form field on a module.
    SetField {
        module: String,
        field: String,
        value: String,
    },
    /// Validate a module's form and send it as `save_partial`.
    Save { module: String },
    /// Run a module action.
    Perform(ModuleAction),
    /// Report connection state and every module's fields.
    Snapshot,
}

/// User-initiated actions, each owned by exactly one module.
#[derive(Debug, Clone)]
pub enum ModuleAction {
    Wifi(WifiCommand),
    MqttTest,
    StartUpdate { code: String },
    Control(ControlAction),
}

impl std::fmt::Display for ModuleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wifi(cmd) => std::fmt::Display::fmt(cmd, f),
            Self::MqttTest => f.write_str("mqtt_test"),
            Self::StartUpdate { .. } => f.write_str("start_update"),
            Self::Control(action) => std::fmt::Display::fmt(action, f),
        }
    }
}

impl ModuleAction {
    /// Name of the module that performs this action.
    pub fn module(&self) -> &'static str {
        match self {
            Self::Wifi(_) => "wifi",
            Self::MqttTest => "mqtt",
            Self::StartUpdate { .. } => "update",
            Self::Control(_) => "control",
        }
    }
}

#[derive(Debug, Clone, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum WifiCommand {
    Scan,
    Connect {
        ssid: String,
        password: SecretString,
    },
    Disconnect,
    /// Ask the device for its current station status.
    RefreshStatus,
    SetStandalone(bool),
}

/// System actions handled by the control module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ControlAction {
    /// Factory reset. The device wipes its settings and restarts.
    Reset,
    Reboot,
    /// Stop the portal without restarting.
    Logout,
}

// ── Results ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum CommandResult {
    Ok,
    /// A `save_partial` was sent. `false` means the form was empty and
    /// nothing went out.
    Saved { sent: bool },
    Snapshot(SessionSnapshot),
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub connection: ConnectionState,
    pub modules: Vec<ModuleSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleSnapshot {
    pub name: &'static str,
    pub fields: FormConfig,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn actions_know_their_module() {
        assert_eq!(ModuleAction::Wifi(WifiCommand::Scan).module(), "wifi");
        assert_eq!(ModuleAction::MqttTest.module(), "mqtt");
        assert_eq!(ModuleAction::Control(ControlAction::Reboot).module(), "control");
    }

    #[test]
    fn actions_display_as_wire_verbs() {
        assert_eq!(ModuleAction::Wifi(WifiCommand::Scan).to_string(), "scan");
        assert_eq!(ModuleAction::MqttTest.to_string(), "mqtt_test");
        assert_eq!(
            ModuleAction::Control(ControlAction::Logout).to_string(),
            "logout"
        );
        assert_eq!("reset".parse::<ControlAction>().unwrap(), ControlAction::Reset);
    }
}
