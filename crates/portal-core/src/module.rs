// ── Settings module contract ──
//
// A module owns one settings area of the portal (device name, LED strip,
// WiFi, ...). Every handler has a default so a module only implements the
// parts it takes part in; `Capabilities` tells the router and the session
// which parts those are.

use std::collections::BTreeMap;

use portal_api::Message;

use crate::command::ModuleAction;
use crate::context::ModuleCall;
use crate::error::{CoreError, ModuleError, ValidationError};
use crate::timer::TimerFired;

/// Flat form payload: field name to value. Sent as the `data` of a
/// `save_partial` request and reported in snapshots.
pub type FormConfig = BTreeMap<String, String>;

/// Which optional handlers a module participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Contributes a form to `save`.
    pub save: bool,
    /// Receives `response` frames.
    pub responses: bool,
    /// Receives `event` frames.
    pub events: bool,
    /// Sends a request when the device announces it is ready.
    pub app_start: bool,
}

impl Capabilities {
    pub const NONE: Self = Self {
        save: false,
        responses: false,
        events: false,
        app_start: false,
    };

    pub const fn with_save(mut self) -> Self {
        self.save = true;
        self
    }

    pub const fn with_responses(mut self) -> Self {
        self.responses = true;
        self
    }

    pub const fn with_events(mut self) -> Self {
        self.events = true;
        self
    }

    pub const fn with_app_start(mut self) -> Self {
        self.app_start = true;
        self
    }
}

pub trait Module: Send {
    /// Unique module name. Also the `target` it sends requests to.
    fn name(&self) -> &'static str;

    /// Routing keys this module claims for inbound frames.
    fn routes(&self) -> &'static [&'static str];

    fn capabilities(&self) -> Capabilities;

    /// One-time setup after every module is registered.
    fn init(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Validate the form and return its payload, or `None` if there is
    /// nothing to save.
    fn save(&mut self) -> Result<Option<FormConfig>, ValidationError> {
        Ok(None)
    }

    /// Request to send once the device is ready.
    fn on_app_start(&self) -> Option<Message> {
        None
    }

    fn handle_response(&mut self, _message: &Message) -> Result<(), ModuleError> {
        Ok(())
    }

    fn handle_event(&mut self, _message: &Message) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Handle a call queued by another module.
    fn handle_call(&mut self, call: ModuleCall) -> Result<(), ModuleError> {
        Err(ModuleError::UnsupportedCall {
            module: self.name(),
            call: format!("{call:?}"),
        })
    }

    /// A deadline this module armed has passed.
    fn on_timer(&mut self, _fired: TimerFired) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Run a user-initiated action.
    fn perform(&mut self, action: ModuleAction) -> Result<(), CoreError> {
        Err(CoreError::Unsupported {
            module: self.name().to_owned(),
            operation: action.to_string(),
        })
    }

    /// Set one form field.
    fn set_field(&mut self, field: &str, _value: &str) -> Result<(), ValidationError> {
        Err(ValidationError::UnknownField {
            module: self.name(),
            field: field.to_owned(),
        })
    }

    /// Current form and status values, for display.
    fn fields(&self) -> FormConfig {
        FormConfig::new()
    }

    /// Release timers and anything else tied to the session.
    fn teardown(&mut self) {}
}

/// Copy string-like values out of a `load_partial` object payload.
///
/// Numbers and booleans are stringified the way a form input would hold
/// them. Nested values are skipped.
pub(crate) fn form_from_payload(
    message: &Message,
    status: &str,
) -> Result<FormConfig, ModuleError> {
    let object = message
        .data
        .as_ref()
        .and_then(serde_json::Value::as_object)
        .ok_or_else(|| ModuleError::payload(status, "expected an object"))?;

    Ok(object
        .iter()
        .filter_map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key.clone(), text))
        })
        .collect())
}

/// Convert a form into the JSON object sent on the wire.
pub(crate) fn form_to_value(form: &FormConfig) -> serde_json::Value {
    serde_json::Value::Object(
        form.iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn form_from_payload_stringifies_scalars() {
        let msg = Message::response("ledstrip", "load_partial").with_data(json!({
            "lednum": 60,
            "ledpin": "5",
            "enabled": true,
            "nested": { "x": 1 },
        }));
        let form = form_from_payload(&msg, "load_partial").unwrap();
        assert_eq!(form.get("lednum").map(String::as_str), Some("60"));
        assert_eq!(form.get("ledpin").map(String::as_str), Some("5"));
        assert_eq!(form.get("enabled").map(String::as_str), Some("true"));
        assert!(!form.contains_key("nested"));
    }

    #[test]
    fn form_from_payload_rejects_non_objects() {
        let msg = Message::response("ledstrip", "load_partial").with_data("oops");
        assert!(matches!(
            form_from_payload(&msg, "load_partial"),
            Err(ModuleError::Payload { .. })
        ));
    }
}
