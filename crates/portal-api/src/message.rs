//! The portal message envelope.
//!
//! Every frame on the wire is a JSON object with a `type` discriminator and
//! a handful of optional routing fields. The device sends `response` and
//! `event` frames; the client only ever sends `request` frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Routing key and status the device uses to announce it is ready.
pub const SYSTEM_TARGET: &str = "system";
pub const READY_STATUS: &str = "ws_ready";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageKind {
    Request,
    Response,
    Event,
}

/// A single portal frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Module name this frame is addressed to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Command verb on requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Result or event name on frames coming from the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Explicit event name. Devices usually put it in `status` instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    /// Arbitrary JSON payload: an object, a plain string, or a number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Message {
    fn bare(kind: MessageKind, target: &str) -> Self {
        Self {
            kind,
            target: Some(target.to_owned()),
            action: None,
            status: None,
            event: None,
            data: None,
        }
    }

    /// Build a `request` frame addressed to `target`.
    pub fn request(target: &str, action: &str) -> Self {
        Self {
            action: Some(action.to_owned()),
            ..Self::bare(MessageKind::Request, target)
        }
    }

    pub fn response(target: &str, status: &str) -> Self {
        Self {
            status: Some(status.to_owned()),
            ..Self::bare(MessageKind::Response, target)
        }
    }

    pub fn event(target: &str, status: &str) -> Self {
        Self {
            status: Some(status.to_owned()),
            ..Self::bare(MessageKind::Event, target)
        }
    }

    /// Attach a payload.
    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Name of the event carried by an `event` frame.
    ///
    /// Prefers the explicit `event` field and falls back to `status`,
    /// which is where firmware actually places it.
    pub fn event_name(&self) -> Option<&str> {
        self.event.as_deref().or(self.status.as_deref())
    }

    /// `true` for the `{type: event, target: system, status: ws_ready}` frame.
    pub fn is_ready(&self) -> bool {
        self.kind == MessageKind::Event
            && self.target.as_deref() == Some(SYSTEM_TARGET)
            && self.event_name() == Some(READY_STATUS)
    }

    /// Look up a field of an object payload.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref()?.as_object()?.get(key)
    }

    /// Look up a string field of an object payload.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.field(key)?.as_str()
    }

    /// The payload as a bare string, used by error frames.
    pub fn text(&self) -> Option<&str> {
        self.data.as_ref()?.as_str()
    }
}
