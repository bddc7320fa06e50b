use thiserror::Error;

/// Top-level error type for the `portal-api` crate.
///
/// Covers the wire codec, endpoint resolution, and the WebSocket transport.
/// `portal-core` maps these into session-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The origin could not be turned into a portal endpoint.
    #[error("Invalid portal origin `{origin}`: {reason}")]
    InvalidOrigin { origin: String, reason: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// Writing a frame to the socket failed.
    #[error("WebSocket send failed: {0}")]
    WebSocketSend(String),

    // ── Data ────────────────────────────────────────────────────────
    /// A frame was not a valid portal message.
    #[error("Malformed frame: {0}")]
    Codec(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if this error came from the socket rather than from
    /// the content of a frame.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::WebSocketConnect(_) | Self::WebSocketSend(_))
    }
}
