//! Text-frame encoding for [`Message`].

use crate::error::Error;
use crate::message::Message;

/// Serialize a message into a JSON text frame.
pub fn encode(message: &Message) -> Result<String, Error> {
    Ok(serde_json::to_string(message)?)
}

/// Parse a JSON text frame.
///
/// Unknown `type` values and non-object frames are rejected; callers drop
/// them and keep reading.
pub fn decode(text: &str) -> Result<Message, Error> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::MessageKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn request_omits_absent_fields() {
        let msg = Message::request("wifi", "ap_scan_start");
        assert_eq!(
            encode(&msg).unwrap(),
            r#"{"type":"request","target":"wifi","action":"ap_scan_start"}"#
        );
    }

    #[test]
    fn request_carries_object_payload() {
        let msg = Message::request("wifi", "ap_connect")
            .with_data(json!({ "ssid": "Home", "password": "secret" }));
        let value: serde_json::Value = serde_json::from_str(&encode(&msg).unwrap()).unwrap();
        assert_eq!(value["data"]["ssid"], "Home");
        assert_eq!(value["type"], "request");
    }

    #[test]
    fn decodes_device_event() {
        let msg = decode(
            r#"{"type":"event","target":"wifi","status":"ap_disconnected_from_reason","data":{"reason":15}}"#,
        )
        .unwrap();
        assert_eq!(msg.kind, MessageKind::Event);
        assert_eq!(msg.event_name(), Some("ap_disconnected_from_reason"));
        assert_eq!(msg.field("reason").and_then(serde_json::Value::as_u64), Some(15));
    }

    #[test]
    fn rejects_unknown_type_and_garbage() {
        assert!(decode(r#"{"type":"broadcast","target":"wifi"}"#).is_err());
        assert!(decode("not json").is_err());
        assert!(decode(r#"["event"]"#).is_err());
    }
}
