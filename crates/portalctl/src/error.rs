//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use portal_config::ConfigError;
use portal_core::{CoreError, ValidationError};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the portal at {url}: {reason}")]
    #[diagnostic(
        code(portalctl::connection_failed),
        help(
            "Check that you are joined to the device's access point or the same LAN.\n\
             Try: portalctl --device http://192.168.4.1 watch"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Portal connection lost after {attempts} reconnect attempts")]
    #[diagnostic(
        code(portalctl::connection_lost),
        help("The device may be restarting or out of range. Run the command again once it is back.")
    )]
    ConnectionLost { attempts: u32 },

    #[error("The portal channel is not open; {what} was not sent")]
    #[diagnostic(code(portalctl::not_sent))]
    NotSent { what: String },

    #[error("Session closed unexpectedly")]
    #[diagnostic(code(portalctl::session_closed))]
    SessionClosed,

    // ── Device outcomes ──────────────────────────────────────────────
    #[error("{action} failed: {message}")]
    #[diagnostic(code(portalctl::device))]
    Device { action: String, message: String },

    #[error("WiFi is busy ({state}); cannot {action} now")]
    #[diagnostic(
        code(portalctl::busy),
        help("Wait for the current WiFi operation to finish and try again.")
    )]
    Busy { action: String, state: String },

    // ── Modules ──────────────────────────────────────────────────────
    #[error("Unknown module '{name}'")]
    #[diagnostic(
        code(portalctl::unknown_module),
        help("Modules with settings forms: device, ledstrip, network, apoint, mqtt")
    )]
    UnknownModule { name: String },

    #[error("Module {module} does not support {operation}")]
    #[diagnostic(code(portalctl::unsupported))]
    Unsupported { module: String, operation: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(portalctl::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(portalctl::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: portalctl config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(portalctl::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(portalctl::config))]
    Config(ConfigError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(portalctl::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Timed out after {seconds}s waiting for {what}")]
    #[diagnostic(
        code(portalctl::timeout),
        help("Increase the wait with --timeout or check that the device is responsive.")
    )]
    Timeout { seconds: u64, what: String },

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. }
            | Self::ConnectionLost { .. }
            | Self::NotSent { .. }
            | Self::SessionClosed => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Busy { .. } | Self::ConfigExists { .. } => exit_code::CONFLICT,
            Self::UnknownModule { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Unsupported { .. } => exit_code::UNSUPPORTED,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            Self::Config(ConfigError::Validation { .. }) => exit_code::USAGE,
            Self::Config(ConfigError::UnknownProfile { .. }) => exit_code::NOT_FOUND,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::Config(err)
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },

            CoreError::ConnectionLost { attempts } => CliError::ConnectionLost { attempts },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
                what: "the device to report ready".into(),
            },

            CoreError::NotSent { what } => CliError::NotSent { what },

            CoreError::SessionClosed => CliError::SessionClosed,

            CoreError::UnknownModule { name } => CliError::UnknownModule { name },

            CoreError::Unsupported { module, operation } => {
                CliError::Unsupported { module, operation }
            }

            CoreError::Validation(e) => validation(&e),

            CoreError::Busy { action, state, .. } => CliError::Busy { action, state },

            CoreError::InvalidEndpoint { message } => CliError::Validation {
                field: "device".into(),
                reason: message,
            },

            CoreError::Registration { reason } | CoreError::Internal(reason) => {
                CliError::Internal(reason)
            }
        }
    }
}

fn validation(err: &ValidationError) -> CliError {
    match err {
        ValidationError::Missing { fields } => CliError::Validation {
            field: fields.join(", "),
            reason: "required".into(),
        },
        ValidationError::Invalid { field, reason } => CliError::Validation {
            field: (*field).to_owned(),
            reason: reason.clone(),
        },
        ValidationError::UnknownField { module, field } => CliError::Validation {
            field: field.clone(),
            reason: format!("not a field of {module}"),
        },
        ValidationError::Rejected(reason) => CliError::Validation {
            field: "input".into(),
            reason: reason.clone(),
        },
    }
}
