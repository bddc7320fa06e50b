//! Wire payloads of the WiFi module: scan results, station link status,
//! disconnect reason codes, and device error strings.

use indexmap::IndexMap;
use portal_api::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Most networks kept from one scan.
pub const MAX_SCAN_RESULTS: usize = 20;

/// Reason code the firmware reports for a disconnect the user asked for.
pub const REASON_USER_INITIATED: u16 = 1;

/// Reason codes that mean the credentials were refused.
const AUTH_FAILURE_REASONS: [u16; 10] = [2, 3, 15, 17, 18, 19, 20, 24, 202, 210];

/// A network seen by the last scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPoint {
    pub ssid: String,
    pub rssi: i32,
    #[serde(default)]
    pub channel: Option<u8>,
    /// Firmware auth mode name, e.g. `OPEN` or `WPA2_PSK`.
    #[serde(default)]
    pub authmode: Option<String>,
}

impl AccessPoint {
    pub fn is_open(&self) -> bool {
        self.authmode.as_deref() == Some("OPEN")
    }
}

/// Station link as reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStatus {
    pub ssid: String,
    pub ip: String,
    pub gateway: String,
    pub netmask: String,
    /// The device can reach the internet through this link.
    #[serde(default)]
    pub ethernet: bool,
}

impl LinkStatus {
    /// A link with an SSID and a real address.
    pub fn is_connected(&self) -> bool {
        !self.ssid.is_empty() && !self.ip.is_empty() && self.ip != "0.0.0.0"
    }
}

/// Firmware versions piggybacked on `ap_status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Versions {
    #[serde(default)]
    pub application: Option<String>,
    #[serde(default)]
    pub bootloader: Option<String>,
}

#[derive(Deserialize)]
struct StatusPayload {
    #[serde(default)]
    connect: Option<LinkStatus>,
    #[serde(default)]
    version: Option<Versions>,
}

/// Parse an `ap_status` event. A missing or unaddressed `connect` object
/// yields `None` for the link.
pub fn parse_status(message: &Message) -> (Option<LinkStatus>, Versions) {
    let Some(data) = message.data.clone() else {
        return (None, Versions::default());
    };
    match serde_json::from_value::<StatusPayload>(data) {
        Ok(payload) => (
            payload.connect.filter(LinkStatus::is_connected),
            payload.version.unwrap_or_default(),
        ),
        Err(e) => {
            tracing::debug!(error = %e, "malformed ap_status payload");
            (None, Versions::default())
        }
    }
}

/// Parse an `ap_got_ip` event into a link without internet information.
pub fn parse_address(message: &Message) -> Option<LinkStatus> {
    let link = LinkStatus {
        ssid: message.field_str("ssid")?.to_owned(),
        ip: message.field_str("ip")?.to_owned(),
        gateway: message.field_str("gateway").unwrap_or_default().to_owned(),
        netmask: message.field_str("netmask").unwrap_or_default().to_owned(),
        ethernet: false,
    };
    Some(link)
}

/// Scan results: one entry per SSID (the last report wins), strongest
/// first, at most [`MAX_SCAN_RESULTS`]. Entries that do not parse or have
/// an empty SSID are skipped.
pub fn parse_networks(message: &Message) -> Vec<AccessPoint> {
    let Some(Value::Array(raw)) = message.field("networks") else {
        return Vec::new();
    };

    let mut unique: IndexMap<String, AccessPoint> = IndexMap::new();
    for entry in raw {
        match serde_json::from_value::<AccessPoint>(entry.clone()) {
            Ok(ap) if !ap.ssid.is_empty() => {
                unique.insert(ap.ssid.clone(), ap);
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "skipping malformed scan entry"),
        }
    }

    // Sort before capping, so the cap drops the weakest networks.
    let mut networks: Vec<AccessPoint> = unique.into_values().collect();
    networks.sort_by(|a, b| b.rssi.cmp(&a.rssi));
    networks.truncate(MAX_SCAN_RESULTS);
    networks
}

/// Reason code of an `ap_disconnected_from_reason` event.
pub fn parse_reason(message: &Message) -> Option<u16> {
    message
        .field("reason")?
        .as_u64()
        .and_then(|r| u16::try_from(r).ok())
}

/// User-facing text for a disconnect reason.
pub fn reason_text(reason: Option<u16>) -> &'static str {
    match reason {
        Some(code) if AUTH_FAILURE_REASONS.contains(&code) => "Wrong password",
        _ => "Could not connect",
    }
}

/// User-facing text for an error string the device put in `data`.
/// Anything not listed here gets `fallback`.
pub fn device_error_text(raw: Option<&str>, fallback: &'static str) -> &'static str {
    match raw {
        Some("standalone mode active") => "Standalone mode is on",
        Some("ssid is required") => "Network name is required",
        Some("ssid too long" | "string field too long (max 31 characters)") => {
            "Network name is too long"
        }
        Some("password too long") => "Password is too long",
        Some("invalid authmode") => "Unsupported security mode",
        Some("scan data unavailable") => "Scan results are not available",
        _ => fallback,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn scan_result(networks: Value) -> Message {
        Message::response("wifi", "ap_scan_result").with_data(json!({ "networks": networks }))
    }

    #[test]
    fn scan_results_are_deduplicated_and_sorted() {
        let msg = scan_result(json!([
            { "ssid": "home", "rssi": -70, "authmode": "WPA2_PSK" },
            { "ssid": "cafe", "rssi": -40, "authmode": "OPEN" },
            { "ssid": "home", "rssi": -50, "authmode": "WPA2_PSK" },
            { "ssid": "", "rssi": -10 },
            { "rssi": -20 },
        ]));
        let networks = parse_networks(&msg);
        let names: Vec<&str> = networks.iter().map(|n| n.ssid.as_str()).collect();
        assert_eq!(names, ["cafe", "home"]);
        assert_eq!(networks[1].rssi, -50);
        assert!(networks[0].is_open());
    }

    #[test]
    fn scan_results_are_capped() {
        let many: Vec<Value> = (0..30)
            .map(|i| json!({ "ssid": format!("net{i}"), "rssi": -i }))
            .collect();
        let networks = parse_networks(&scan_result(Value::Array(many)));
        assert_eq!(networks.len(), MAX_SCAN_RESULTS);
        assert_eq!(networks[0].ssid, "net0");
    }

    #[test]
    fn status_without_address_is_not_connected() {
        let msg = Message::event("wifi", "ap_status").with_data(json!({
            "connect": { "ssid": "home", "ip": "0.0.0.0", "gateway": "", "netmask": "", "ethernet": false },
            "version": { "application": "1.2.0", "bootloader": "v5.1" },
        }));
        let (link, versions) = parse_status(&msg);
        assert_eq!(link, None);
        assert_eq!(versions.application.as_deref(), Some("1.2.0"));
    }

    #[test]
    fn status_with_address_is_connected() {
        let msg = Message::event("wifi", "ap_status").with_data(json!({
            "connect": { "ssid": "home", "ip": "192.168.1.50", "gateway": "192.168.1.1", "netmask": "255.255.255.0", "ethernet": true },
        }));
        let (link, _) = parse_status(&msg);
        let link = link.unwrap();
        assert!(link.ethernet);
        assert_eq!(link.gateway, "192.168.1.1");
    }

    #[test]
    fn reason_codes_map_to_text() {
        assert_eq!(reason_text(Some(15)), "Wrong password");
        assert_eq!(reason_text(Some(202)), "Wrong password");
        assert_eq!(reason_text(Some(201)), "Could not connect");
        assert_eq!(reason_text(None), "Could not connect");

        let msg = Message::event("wifi", "ap_disconnected_from_reason")
            .with_data(json!({ "reason": 2, "reason_str": "AUTH_EXPIRE" }));
        assert_eq!(parse_reason(&msg), Some(2));
    }

    #[test]
    fn device_errors_never_leak_raw_text() {
        assert_eq!(
            device_error_text(Some("ssid too long"), "Could not connect"),
            "Network name is too long"
        );
        assert_eq!(
            device_error_text(Some("ESP_ERR_WIFI_NOT_STARTED"), "Scan failed"),
            "Scan failed"
        );
        assert_eq!(device_error_text(None, "Request failed"), "Request failed");
    }
}
