// ── Core error types ──
//
// Errors surfaced by the session and its modules. Transport failures from
// portal-api are folded into connection variants; consumers never see raw
// WebSocket or JSON errors.

use thiserror::Error;

/// Unified error type for session operations.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to portal at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Portal connection lost after {attempts} reconnect attempts")]
    ConnectionLost { attempts: u32 },

    #[error("Portal did not become ready within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Channel is not open; {what} was not sent")]
    NotSent { what: String },

    #[error("Session has shut down")]
    SessionClosed,

    // ── Module errors ────────────────────────────────────────────────
    #[error("Unknown module: {name}")]
    UnknownModule { name: String },

    #[error("Module {module} does not support {operation}")]
    Unsupported { module: String, operation: String },

    #[error("Module registration rejected: {reason}")]
    Registration { reason: String },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    // ── Workflow errors ──────────────────────────────────────────────
    #[error("{workflow} is busy ({state}); cannot {action} now")]
    Busy {
        workflow: String,
        action: String,
        state: String,
    },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid portal address: {message}")]
    InvalidEndpoint { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<portal_api::Error> for CoreError {
    fn from(err: portal_api::Error) -> Self {
        match err {
            portal_api::Error::InvalidUrl(e) => CoreError::InvalidEndpoint {
                message: e.to_string(),
            },
            portal_api::Error::InvalidOrigin { origin, reason } => CoreError::InvalidEndpoint {
                message: format!("{origin}: {reason}"),
            },
            portal_api::Error::WebSocketConnect(reason) | portal_api::Error::WebSocketSend(reason) => {
                CoreError::ConnectionFailed {
                    url: String::new(),
                    reason,
                }
            }
            portal_api::Error::Codec(e) => CoreError::Internal(format!("codec: {e}")),
        }
    }
}

// ── Validation errors ────────────────────────────────────────────────

/// A settings form failed client-side checks. Nothing is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required fields: {}", fields.join(", "))]
    Missing { fields: Vec<&'static str> },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("module {module} has no field `{field}`")]
    UnknownField { module: &'static str, field: String },

    #[error("{0}")]
    Rejected(String),
}

impl ValidationError {
    pub fn missing(field: &'static str) -> Self {
        Self::Missing {
            fields: vec![field],
        }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

// ── Module handler errors ────────────────────────────────────────────

/// A module failed while handling a frame or call. The router logs these
/// and keeps delivering to other modules.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("malformed `{status}` payload: {reason}")]
    Payload { status: String, reason: String },

    #[error("{module} cannot handle {call}")]
    UnsupportedCall { module: &'static str, call: String },

    #[error("{0}")]
    Failed(String),
}

impl ModuleError {
    pub fn payload(status: &str, reason: impl Into<String>) -> Self {
        Self::Payload {
            status: status.to_owned(),
            reason: reason.into(),
        }
    }
}
