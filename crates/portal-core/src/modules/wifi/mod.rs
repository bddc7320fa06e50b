//! Station WiFi: scanning, joining and leaving networks, and the
//! standalone switch.
//!
//! Device frames are translated into moves of the workflow state machine.
//! A frame that does not fit the current state is logged and
//! dropped; the machine never moves outside its table.

mod link;
mod workflow;

use portal_api::Message;
use serde_json::json;
use strum::EnumString;
use tracing::{debug, warn};

use crate::command::{ModuleAction, WifiCommand};
use crate::context::Context;
use crate::error::{CoreError, ModuleError, ValidationError};
use crate::fsm::StateMachine;
use crate::module::{form_from_payload, Capabilities, FormConfig, Module};
use crate::notice::{Notice, Tone};
use crate::timer::TimerFired;

pub use link::{AccessPoint, LinkStatus, MAX_SCAN_RESULTS};
pub use workflow::WifiState;

use workflow::{Driver, Payload, MODULE};

const NOTICE_MS: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
enum WifiResponse {
    ApScanStarted,
    ApScanAlready,
    ApScanError,
    ApScanResult,
    ApConnectOk,
    ApConnectError,
    ApDisconnectSuccess,
    ApDisconnectError,
    SavedPartial,
    ErrorPartial,
    CommonError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
enum WifiEvent {
    ApScanSuccess,
    ApWaitIp,
    ApGotIp,
    ApDisconnectedFromReason,
    ApStatus,
    ApConfig,
}

pub struct WifiModule {
    machine: StateMachine<WifiState, Driver, Payload>,
    driver: Driver,
    ssid: String,
    password: String,
    authmode: String,
    standalone: bool,
}

impl WifiModule {
    pub fn new(ctx: Context) -> Self {
        Self {
            machine: workflow::machine(),
            driver: Driver::new(ctx),
            ssid: String::new(),
            password: String::new(),
            authmode: String::new(),
            standalone: false,
        }
    }

    pub fn state(&self) -> WifiState {
        self.machine.state()
    }

    pub fn networks(&self) -> &[AccessPoint] {
        &self.driver.networks
    }

    pub fn link(&self) -> Option<&LinkStatus> {
        self.driver.link.as_ref()
    }

    fn ctx(&self) -> &Context {
        &self.driver.ctx
    }

    fn go(&mut self, to: WifiState, payload: Payload) -> bool {
        self.machine.transition(to, payload, &mut self.driver)
    }

    /// Move only if the machine is in `from`; anything else is a late or
    /// duplicate frame.
    fn go_from(&mut self, from: WifiState, to: WifiState, payload: Payload, frame: &str) {
        if self.state() == from {
            self.go(to, payload);
        } else {
            debug!(state = self.state().as_str(), frame, "frame does not apply in this state");
        }
    }

    fn busy(&self, action: &str) -> CoreError {
        CoreError::Busy {
            workflow: MODULE.into(),
            action: action.into(),
            state: self.state().as_str().into(),
        }
    }

    fn refuse_in_standalone(&self) -> Result<(), CoreError> {
        if self.standalone {
            return Err(ValidationError::Rejected("standalone mode is on".into()).into());
        }
        Ok(())
    }

    // ── Commands ─────────────────────────────────────────────────────

    fn scan(&mut self) -> Result<(), CoreError> {
        self.refuse_in_standalone()?;
        if !self.machine.can_transition(WifiState::ApScan) {
            return Err(self.busy("scan"));
        }
        self.go(WifiState::ApScan, Payload::None);
        if self.state() == WifiState::ApScanError {
            return Err(CoreError::NotSent {
                what: "scan request".into(),
            });
        }
        Ok(())
    }

    fn connect(&mut self, ssid: String, password: secrecy::SecretString) -> Result<(), CoreError> {
        let ssid = ssid.trim().to_owned();
        if ssid.is_empty() {
            return Err(ValidationError::missing("ssid").into());
        }
        self.refuse_in_standalone()?;
        if !self.machine.can_transition(WifiState::ApConnect) {
            return Err(self.busy("connect"));
        }
        self.ssid.clone_from(&ssid);
        self.go(WifiState::ApConnect, Payload::Connect { ssid, password });
        if self.state() == WifiState::ApConnectError {
            return Err(CoreError::NotSent {
                what: "connect request".into(),
            });
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), CoreError> {
        if !self.machine.can_transition(WifiState::ApDisconnect) {
            return Err(self.busy("disconnect"));
        }
        self.go(WifiState::ApDisconnect, Payload::None);
        if self.state() == WifiState::ApDisconnectError {
            return Err(CoreError::NotSent {
                what: "disconnect request".into(),
            });
        }
        Ok(())
    }

    fn set_standalone(&mut self, standalone: bool) -> Result<(), CoreError> {
        let request = Message::request(MODULE, "save_partial")
            .with_data(json!({ "standalone": standalone.to_string() }));
        if !self.ctx().send(request) {
            return Err(CoreError::NotSent {
                what: "standalone setting".into(),
            });
        }
        self.standalone = standalone;
        self.ctx().notify(Notice::ControlsEnabled {
            module: MODULE,
            enabled: !standalone,
        });
        Ok(())
    }

    // ── Device frames ────────────────────────────────────────────────

    fn on_scan_results(&mut self, message: &Message) {
        let networks = link::parse_networks(message);
        self.driver.networks.clone_from(&networks);
        self.ctx().notify(Notice::ScanResults { networks });
        if self.state() == WifiState::ApScan {
            self.go(WifiState::Idle, Payload::None);
        }
    }

    fn on_scan_done(&mut self, message: &Message) {
        let count = message.field("count").and_then(serde_json::Value::as_u64);
        if self.state() != WifiState::ApScan {
            debug!(state = self.state().as_str(), "scan finished outside a scan");
            return;
        }
        match count {
            Some(n) if n > 0 => {
                if !self.ctx().send(Message::request(MODULE, "ap_scan_result")) {
                    self.go(
                        WifiState::ApScanError,
                        Payload::Error("Scan results not requested".into()),
                    );
                }
            }
            _ => {
                self.ctx()
                    .notify(Notice::transient(MODULE, Tone::Warning, "No networks found", NOTICE_MS));
                self.driver.networks.clear();
                self.ctx().notify(Notice::ScanResults {
                    networks: Vec::new(),
                });
                self.go(WifiState::Idle, Payload::None);
            }
        }
    }

    fn on_got_ip(&mut self, message: &Message) -> Result<(), ModuleError> {
        let Some(address) = link::parse_address(message) else {
            return Err(ModuleError::payload("ap_got_ip", "missing ssid or ip"));
        };
        if self.state() == WifiState::ApConnect {
            self.go(WifiState::ApWaitIp, Payload::None);
        }
        self.go_from(
            WifiState::ApWaitIp,
            WifiState::ApCheckEth,
            Payload::Address(address),
            "ap_got_ip",
        );
        Ok(())
    }

    fn on_disconnected(&mut self, reason: Option<u16>) {
        match self.state() {
            WifiState::Idle | WifiState::ApConnect => {
                self.go(
                    WifiState::ApDisconnected,
                    Payload::Disconnected {
                        reason,
                        requested: false,
                    },
                );
            }
            WifiState::ApWaitIp | WifiState::ApCheckEth => {
                self.go(
                    WifiState::ApConnectError,
                    Payload::Error(link::reason_text(reason).into()),
                );
            }
            WifiState::ApDisconnect => self.finish_disconnect(reason),
            other => {
                debug!(state = other.as_str(), ?reason, "link dropped during another step");
                self.driver.set_link(None);
            }
        }
    }

    /// The device confirmed a disconnect the user asked for.
    fn finish_disconnect(&mut self, reason: Option<u16>) {
        self.go(WifiState::Idle, Payload::None);
        self.go(
            WifiState::ApDisconnected,
            Payload::Disconnected {
                reason,
                requested: true,
            },
        );
    }

    fn on_status(&mut self, message: &Message) {
        let (link, versions) = link::parse_status(message);
        if versions.application.is_some() {
            debug!(application = ?versions.application, bootloader = ?versions.bootloader, "firmware");
        }
        if self.state() == WifiState::ApCheckEth {
            match link {
                Some(link) => {
                    self.go(WifiState::ApConnected, Payload::Status(link));
                }
                None => {
                    self.go(
                        WifiState::ApConnectError,
                        Payload::Error("Connected without an address".into()),
                    );
                }
            }
        } else {
            self.driver.set_link(link);
        }
    }

    fn on_config(&mut self, message: &Message) -> Result<(), ModuleError> {
        let mut form = form_from_payload(message, "ap_config")?;
        self.ssid = form.remove("ssid").unwrap_or_default();
        self.password = form.remove("password").unwrap_or_default();
        self.authmode = form.remove("authmode").unwrap_or_default();
        self.standalone = form
            .get("standalone")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
        self.ctx().notify(Notice::ControlsEnabled {
            module: MODULE,
            enabled: !self.standalone,
        });
        self.ctx().notify(Notice::FormLoaded {
            module: MODULE,
            fields: self.fields(),
        });
        Ok(())
    }

    /// User text for an error frame. The device's own wording stays in
    /// the log.
    fn error_text(message: &Message, fallback: &'static str) -> String {
        let raw = message.text();
        if let Some(raw) = raw {
            debug!(status = ?message.status, error = raw, "device error");
        }
        link::device_error_text(raw, fallback).to_owned()
    }
}

impl Module for WifiModule {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn routes(&self) -> &'static [&'static str] {
        &["wifi"]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
            .with_responses()
            .with_events()
            .with_app_start()
    }

    fn init(&mut self) -> Result<(), ModuleError> {
        self.machine.reset(WifiState::Idle);
        self.driver.timer.cancel();
        Ok(())
    }

    fn on_app_start(&self) -> Option<Message> {
        Some(Message::request(MODULE, "ap_config"))
    }

    fn handle_response(&mut self, message: &Message) -> Result<(), ModuleError> {
        let Some(status) = super::common::status_of::<WifiResponse>(MODULE, message) else {
            return Ok(());
        };
        match status {
            WifiResponse::ApScanStarted => {
                debug!("scan started");
            }
            WifiResponse::ApScanAlready => {
                self.ctx().notify(Notice::loader(
                    MODULE,
                    Tone::Progress,
                    "A scan is already running...",
                ));
            }
            WifiResponse::ApScanError => self.go_from(
                WifiState::ApScan,
                WifiState::ApScanError,
                Payload::Error(Self::error_text(message, "Scan failed")),
                "ap_scan_error",
            ),
            WifiResponse::ApScanResult => self.on_scan_results(message),
            WifiResponse::ApConnectOk => {
                self.ctx()
                    .notify(Notice::loader(MODULE, Tone::Progress, "Joining network..."));
            }
            WifiResponse::ApConnectError => self.go_from(
                WifiState::ApConnect,
                WifiState::ApConnectError,
                Payload::Error(Self::error_text(message, "Could not connect")),
                "ap_connect_error",
            ),
            WifiResponse::ApDisconnectSuccess => {
                if self.state() == WifiState::ApDisconnect {
                    self.finish_disconnect(None);
                }
            }
            WifiResponse::ApDisconnectError => self.go_from(
                WifiState::ApDisconnect,
                WifiState::ApDisconnectError,
                Payload::Error("Could not disconnect".into()),
                "ap_disconnect_error",
            ),
            WifiResponse::SavedPartial => {
                self.ctx().notify(Notice::transient(
                    MODULE,
                    Tone::Success,
                    "Standalone mode updated",
                    NOTICE_MS,
                ));
            }
            WifiResponse::ErrorPartial => {
                warn!("device refused the standalone setting");
                self.ctx().notify(Notice::transient(
                    MODULE,
                    Tone::Error,
                    "Standalone mode was not changed",
                    NOTICE_MS,
                ));
            }
            WifiResponse::CommonError => {
                warn!("device reported a request error");
                let text = Self::error_text(message, "Request failed");
                self.ctx()
                    .notify(Notice::transient(MODULE, Tone::Error, text, NOTICE_MS));
            }
        }
        Ok(())
    }

    fn handle_event(&mut self, message: &Message) -> Result<(), ModuleError> {
        let Some(event) = super::common::status_of::<WifiEvent>(MODULE, message) else {
            return Ok(());
        };
        match event {
            WifiEvent::ApScanSuccess => self.on_scan_done(message),
            WifiEvent::ApWaitIp => {
                self.go_from(WifiState::ApConnect, WifiState::ApWaitIp, Payload::None, "ap_wait_ip");
            }
            WifiEvent::ApGotIp => self.on_got_ip(message)?,
            WifiEvent::ApDisconnectedFromReason => {
                self.on_disconnected(link::parse_reason(message));
            }
            WifiEvent::ApStatus => self.on_status(message),
            WifiEvent::ApConfig => self.on_config(message)?,
        }
        Ok(())
    }

    fn on_timer(&mut self, fired: TimerFired) -> Result<(), ModuleError> {
        let Some(deadline) = self.driver.timer.claim(fired) else {
            return Ok(());
        };
        if deadline.armed_in != self.state() {
            debug!(
                armed_in = deadline.armed_in.as_str(),
                state = self.state().as_str(),
                "stale deadline ignored"
            );
            return Ok(());
        }
        debug!(
            state = self.state().as_str(),
            next = deadline.next.as_str(),
            "deadline passed"
        );
        self.go(deadline.next, deadline.payload());
        Ok(())
    }

    fn perform(&mut self, action: ModuleAction) -> Result<(), CoreError> {
        let ModuleAction::Wifi(command) = action else {
            return Err(CoreError::Unsupported {
                module: MODULE.into(),
                operation: action.to_string(),
            });
        };
        match command {
            WifiCommand::Scan => self.scan(),
            WifiCommand::Connect { ssid, password } => self.connect(ssid, password),
            WifiCommand::Disconnect => self.disconnect(),
            WifiCommand::RefreshStatus => {
                if self.ctx().send(Message::request(MODULE, "ap_status")) {
                    Ok(())
                } else {
                    Err(CoreError::NotSent {
                        what: "status request".into(),
                    })
                }
            }
            WifiCommand::SetStandalone(standalone) => self.set_standalone(standalone),
        }
    }

    fn fields(&self) -> FormConfig {
        let password = if self.password.is_empty() { "" } else { "********" };
        let mut fields = FormConfig::from([
            ("state".to_owned(), self.state().as_str().to_owned()),
            ("ssid".to_owned(), self.ssid.clone()),
            ("password".to_owned(), password.to_owned()),
            ("authmode".to_owned(), self.authmode.clone()),
            ("standalone".to_owned(), self.standalone.to_string()),
        ]);
        if let Some(link) = &self.driver.link {
            fields.insert("ip".to_owned(), link.ip.clone());
            fields.insert("gateway".to_owned(), link.gateway.clone());
            fields.insert("netmask".to_owned(), link.netmask.clone());
            fields.insert("internet".to_owned(), link.ethernet.to_string());
        }
        fields
    }

    fn teardown(&mut self) {
        self.driver.timer.cancel();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::context::ModuleCall;
    use crate::testing::Harness;
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;
    use std::time::Duration;

    fn connect(ssid: &str) -> ModuleAction {
        ModuleAction::Wifi(WifiCommand::Connect {
            ssid: ssid.into(),
            password: SecretString::from("hunter22".to_owned()),
        })
    }

    async fn fire_next(h: &mut Harness, wifi: &mut WifiModule) {
        let fired = h.wiring.timers.recv().await.unwrap();
        wifi.on_timer(fired).unwrap();
    }

    fn workflow_path(notices: &[Notice]) -> Vec<&'static str> {
        notices
            .iter()
            .filter_map(|n| match n {
                Notice::Workflow { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn scan_times_out_then_returns_to_idle() {
        let mut h = Harness::open();
        let mut wifi = WifiModule::new(h.ctx.clone());

        wifi.perform(ModuleAction::Wifi(WifiCommand::Scan)).unwrap();
        assert_eq!(h.sent_actions(), ["ap_scan_start"]);
        assert_eq!(wifi.state(), WifiState::ApScan);

        let started = tokio::time::Instant::now();
        fire_next(&mut h, &mut wifi).await;
        assert_eq!(wifi.state(), WifiState::ApScanError);
        assert!(started.elapsed() >= Duration::from_secs(10));

        fire_next(&mut h, &mut wifi).await;
        assert_eq!(wifi.state(), WifiState::Idle);
        assert_eq!(
            workflow_path(&h.notices()),
            ["ap_scan", "ap_scan_error", "idle"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn scan_results_complete_the_scan() {
        let mut h = Harness::open();
        let mut wifi = WifiModule::new(h.ctx.clone());
        wifi.perform(ModuleAction::Wifi(WifiCommand::Scan)).unwrap();
        h.sent();

        wifi.handle_event(&Message::event("wifi", "ap_scan_success").with_data(json!({ "count": 2 })))
            .unwrap();
        assert_eq!(h.sent_actions(), ["ap_scan_result"]);

        let result = Message::response("wifi", "ap_scan_result").with_data(json!({
            "networks": [
                { "ssid": "home", "rssi": -60, "authmode": "WPA2_PSK" },
                { "ssid": "office", "rssi": -45, "authmode": "WPA2_PSK" },
            ]
        }));
        wifi.handle_response(&result).unwrap();
        assert_eq!(wifi.state(), WifiState::Idle);
        assert_eq!(wifi.networks()[0].ssid, "office");
        assert!(!wifi.driver.timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_scan_returns_to_idle() {
        let mut h = Harness::open();
        let mut wifi = WifiModule::new(h.ctx.clone());
        wifi.perform(ModuleAction::Wifi(WifiCommand::Scan)).unwrap();
        wifi.handle_event(&Message::event("wifi", "ap_scan_success").with_data(json!({ "count": 0 })))
            .unwrap();
        assert_eq!(wifi.state(), WifiState::Idle);
        assert!(h.notices().contains(&Notice::transient(
            "wifi",
            Tone::Warning,
            "No networks found",
            NOTICE_MS
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn user_initiated_disconnect_during_connect_is_silent() {
        let mut h = Harness::open();
        let mut wifi = WifiModule::new(h.ctx.clone());
        wifi.perform(connect("home")).unwrap();
        h.notices();

        let event = Message::event("wifi", "ap_disconnected_from_reason")
            .with_data(json!({ "reason": 1, "reason_str": "UNSPECIFIED" }));
        wifi.handle_event(&event).unwrap();
        assert_eq!(wifi.state(), WifiState::ApDisconnected);

        fire_next(&mut h, &mut wifi).await;
        assert_eq!(wifi.state(), WifiState::Idle);

        let notices = h.notices();
        assert!(!notices.iter().any(|n| matches!(
            n,
            Notice::Loader { tone: Tone::Error, .. }
        )));
        assert_eq!(workflow_path(&notices), ["ap_disconnected", "idle"]);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_during_connect_shows_wrong_password() {
        let mut h = Harness::open();
        let mut wifi = WifiModule::new(h.ctx.clone());
        wifi.perform(connect("home")).unwrap();

        let event = Message::event("wifi", "ap_disconnected_from_reason")
            .with_data(json!({ "reason": 15, "reason_str": "4WAY_HANDSHAKE_TIMEOUT" }));
        wifi.handle_event(&event).unwrap();
        assert_eq!(wifi.state(), WifiState::ApDisconnected);
        assert!(h.notices().contains(&Notice::transient(
            "wifi",
            Tone::Error,
            "Wrong password",
            2000
        )));

        fire_next(&mut h, &mut wifi).await;
        assert_eq!(wifi.state(), WifiState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn full_connect_reaches_connected_then_idle() {
        let mut h = Harness::open();
        let mut wifi = WifiModule::new(h.ctx.clone());
        wifi.perform(connect("home")).unwrap();
        assert_eq!(h.sent_actions(), ["ap_connect"]);

        wifi.handle_response(&Message::response("wifi", "ap_connect_ok"))
            .unwrap();
        wifi.handle_event(&Message::event("wifi", "ap_got_ip").with_data(json!({
            "ssid": "home",
            "ip": "192.168.1.50",
            "gateway": "192.168.1.1",
            "netmask": "255.255.255.0",
        })))
        .unwrap();
        assert_eq!(wifi.state(), WifiState::ApCheckEth);
        assert_eq!(h.sent_actions(), ["ap_status"]);

        wifi.handle_event(&Message::event("wifi", "ap_status").with_data(json!({
            "connect": {
                "ssid": "home",
                "ip": "192.168.1.50",
                "gateway": "192.168.1.1",
                "netmask": "255.255.255.0",
                "ethernet": true,
            },
            "version": { "application": "1.0.0", "bootloader": "v5" },
        })))
        .unwrap();
        assert_eq!(wifi.state(), WifiState::ApConnected);
        assert_eq!(wifi.link().map(|l| l.ethernet), Some(true));

        let calls = h.calls();
        assert!(calls.contains(&ModuleCall::SetMqttTestEnabled(true)));
        assert!(calls.contains(&ModuleCall::SetUpdateEnabled(true)));
        assert!(calls.iter().any(|c| matches!(c, ModuleCall::SetNetworkValue { ip, .. } if ip == "192.168.1.50")));

        fire_next(&mut h, &mut wifi).await;
        assert_eq!(wifi.state(), WifiState::Idle);
        assert_eq!(
            workflow_path(&h.notices()),
            ["ap_connect", "ap_wait_ip", "ap_check_eth", "ap_connected", "idle"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn connect_is_refused_while_scanning_and_in_standalone() {
        let mut h = Harness::open();
        let mut wifi = WifiModule::new(h.ctx.clone());
        wifi.perform(ModuleAction::Wifi(WifiCommand::Scan)).unwrap();
        assert!(matches!(
            wifi.perform(connect("home")),
            Err(CoreError::Busy { .. })
        ));
        assert_eq!(wifi.state(), WifiState::ApScan);

        wifi.handle_response(&Message::response("wifi", "ap_scan_error").with_data("ESP_FAIL"))
            .unwrap();
        assert_eq!(wifi.state(), WifiState::ApScanError);
        assert!(h.notices().contains(&Notice::transient(MODULE, Tone::Error, "Scan failed", 2000)));
        fire_next(&mut h, &mut wifi).await;

        wifi.perform(ModuleAction::Wifi(WifiCommand::SetStandalone(true)))
            .unwrap();
        h.sent();
        assert!(matches!(
            wifi.perform(connect("home")),
            Err(CoreError::Validation(ValidationError::Rejected(_)))
        ));
        assert!(h.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn device_error_strings_are_replaced_with_user_text() {
        let mut h = Harness::open();
        let mut wifi = WifiModule::new(h.ctx.clone());
        wifi.perform(ModuleAction::Wifi(WifiCommand::Scan)).unwrap();
        wifi.handle_response(
            &Message::response("wifi", "ap_scan_error").with_data("ESP_ERR_WIFI_NOT_STARTED"),
        )
        .unwrap();
        wifi.handle_response(
            &Message::response("wifi", "common_error").with_data("missing or invalid 'action'"),
        )
        .unwrap();

        let texts: Vec<String> = h
            .notices()
            .into_iter()
            .filter_map(|n| match n {
                Notice::Loader {
                    tone: Tone::Error,
                    text,
                    ..
                } => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(texts, ["Scan failed", "Request failed"]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_ssid_is_rejected_before_anything_is_sent() {
        let mut h = Harness::open();
        let mut wifi = WifiModule::new(h.ctx.clone());
        assert!(matches!(
            wifi.perform(connect("  ")),
            Err(CoreError::Validation(ValidationError::Missing { .. }))
        ));
        assert!(h.sent().is_empty());
        assert_eq!(wifi.state(), WifiState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn requested_disconnect_is_confirmed_by_response() {
        let mut h = Harness::open();
        let mut wifi = WifiModule::new(h.ctx.clone());
        wifi.perform(ModuleAction::Wifi(WifiCommand::Disconnect))
            .unwrap();
        assert_eq!(h.sent_actions(), ["ap_disconnect"]);

        wifi.handle_response(&Message::response("wifi", "ap_disconnect_success"))
            .unwrap();
        assert_eq!(wifi.state(), WifiState::ApDisconnected);

        // The firmware's own disconnect event trails the response.
        wifi.handle_event(&Message::event("wifi", "ap_disconnected_from_reason")
            .with_data(json!({ "reason": 8 })))
            .unwrap();
        assert_eq!(wifi.state(), WifiState::ApDisconnected);

        fire_next(&mut h, &mut wifi).await;
        assert_eq!(wifi.state(), WifiState::Idle);
        assert!(!h.notices().iter().any(|n| matches!(
            n,
            Notice::Loader { tone: Tone::Error, .. }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn late_frames_do_not_move_the_machine() {
        let mut h = Harness::open();
        let mut wifi = WifiModule::new(h.ctx.clone());
        wifi.handle_response(&Message::response("wifi", "ap_connect_error"))
            .unwrap();
        wifi.handle_event(&Message::event("wifi", "ap_wait_ip"))
            .unwrap();
        assert_eq!(wifi.state(), WifiState::Idle);
        assert!(workflow_path(&h.notices()).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn scan_on_closed_channel_reports_not_sent() {
        let mut h = Harness::closed();
        let mut wifi = WifiModule::new(h.ctx.clone());
        assert!(matches!(
            wifi.perform(ModuleAction::Wifi(WifiCommand::Scan)),
            Err(CoreError::NotSent { .. })
        ));
        assert_eq!(wifi.state(), WifiState::ApScanError);
        fire_next(&mut h, &mut wifi).await;
        assert_eq!(wifi.state(), WifiState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn ap_config_loads_standalone_flag() {
        let h = Harness::open();
        let mut wifi = WifiModule::new(h.ctx.clone());
        wifi.handle_event(&Message::event("wifi", "ap_config").with_data(json!({
            "ssid": "home",
            "password": "pw",
            "standalone": "true",
            "authmode": "WPA2_PSK",
        })))
        .unwrap();
        let fields = wifi.fields();
        assert_eq!(fields["standalone"], "true");
        assert_eq!(fields["ssid"], "home");
        assert_eq!(fields["password"], "********");
    }
}
