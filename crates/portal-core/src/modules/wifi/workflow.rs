// ── WiFi workflow ──
//
// Scan, connect and disconnect as one state machine. Every step waits on
// a device round trip guarded by a deadline, and every outcome ends back
// in `Idle`. The driver is the machine's context: it owns the deadline
// slot and the link state the outcomes report.

use std::time::Duration;

use portal_api::Message;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use strum::IntoStaticStr;

use crate::config::WorkflowTimings;
use crate::context::{Context, ModuleCall};
use crate::fsm::StateMachine;
use crate::notice::{Notice, Tone};
use crate::timer::TimerSlot;

use super::link::{reason_text, AccessPoint, LinkStatus, REASON_USER_INITIATED};

pub(super) const MODULE: &str = "wifi";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum WifiState {
    Idle,
    ApScan,
    ApScanError,
    ApConnect,
    ApWaitIp,
    ApCheckEth,
    ApConnected,
    ApDisconnect,
    ApDisconnectError,
    ApDisconnected,
    ApConnectError,
}

impl WifiState {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Data carried into a state.
#[derive(Debug, Clone)]
pub enum Payload {
    None,
    Connect { ssid: String, password: SecretString },
    /// Address from `ap_got_ip`, before the link check.
    Address(LinkStatus),
    /// Verified link from `ap_status`.
    Status(LinkStatus),
    Disconnected {
        reason: Option<u16>,
        /// The user asked for this disconnect.
        requested: bool,
    },
    /// Text shown by an error state.
    Error(String),
}

/// What to do when the armed deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    /// State the deadline was armed in. Stale if the machine moved on.
    pub armed_in: WifiState,
    pub next: WifiState,
    /// Error text for `next`, if it is an error state.
    pub reason: Option<&'static str>,
}

impl Deadline {
    pub fn payload(self) -> Payload {
        match self.reason {
            Some(text) => Payload::Error(text.to_owned()),
            None => Payload::None,
        }
    }
}

// ── Driver ───────────────────────────────────────────────────────────

pub struct Driver {
    pub ctx: Context,
    pub timer: TimerSlot<Deadline>,
    pub timings: WorkflowTimings,
    pub link: Option<LinkStatus>,
    pub networks: Vec<AccessPoint>,
}

impl Driver {
    pub fn new(ctx: Context) -> Self {
        let timer = TimerSlot::new(MODULE, ctx.timers());
        let timings = ctx.timings().clone();
        Self {
            ctx,
            timer,
            timings,
            link: None,
            networks: Vec::new(),
        }
    }

    fn arm(&mut self, delay: Duration, armed_in: WifiState, next: WifiState, reason: Option<&'static str>) {
        self.timer.arm(
            delay,
            Deadline {
                armed_in,
                next,
                reason,
            },
        );
    }

    fn loader(&self, tone: Tone, text: impl Into<String>) {
        self.ctx.notify(Notice::loader(MODULE, tone, text));
    }

    fn flash(&self, tone: Tone, text: impl Into<String>, shown_for: Duration) {
        self.ctx.notify(Notice::transient(
            MODULE,
            tone,
            text,
            u64::try_from(shown_for.as_millis()).unwrap_or(u64::MAX),
        ));
    }

    /// Record the station link and tell the modules that depend on it.
    pub fn set_link(&mut self, link: Option<LinkStatus>) {
        let online = link.as_ref().is_some_and(|l| l.ethernet);
        if let Some(link) = &link {
            self.ctx.call(ModuleCall::SetNetworkValue {
                ip: link.ip.clone(),
                netmask: link.netmask.clone(),
                gateway: link.gateway.clone(),
            });
        }
        self.ctx.call(ModuleCall::SetMqttTestEnabled(online));
        self.ctx.call(ModuleCall::SetUpdateEnabled(online));
        self.link.clone_from(&link);
        self.ctx.notify(Notice::Link { status: link });
    }
}

// ── Entry callbacks ──────────────────────────────────────────────────

type Follow = Option<(WifiState, Payload)>;

fn enter_idle(d: &mut Driver, _: &Payload, _: WifiState, _: WifiState) -> Follow {
    d.timer.cancel();
    None
}

fn enter_scan(d: &mut Driver, _: &Payload, _: WifiState, to: WifiState) -> Follow {
    if !d.ctx.send(Message::request(MODULE, "ap_scan_start")) {
        return Some((WifiState::ApScanError, Payload::Error("Scan request not sent".into())));
    }
    d.loader(Tone::Progress, "Scanning for networks...");
    d.arm(d.timings.scan_timeout, to, WifiState::ApScanError, Some("Scan timed out"));
    None
}

fn enter_connect(d: &mut Driver, payload: &Payload, _: WifiState, to: WifiState) -> Follow {
    let Payload::Connect { ssid, password } = payload else {
        return Some((WifiState::ApConnectError, Payload::Error("No network selected".into())));
    };
    let request = Message::request(MODULE, "ap_connect").with_data(json!({
        "ssid": ssid,
        "password": password.expose_secret(),
    }));
    if !d.ctx.send(request) {
        return Some((
            WifiState::ApConnectError,
            Payload::Error("Connect request not sent".into()),
        ));
    }
    d.loader(Tone::Progress, format!("Connecting to {ssid}..."));
    d.arm(d.timings.connect_timeout, to, WifiState::ApConnectError, Some("Connection timed out"));
    None
}

fn enter_wait_ip(d: &mut Driver, _: &Payload, _: WifiState, to: WifiState) -> Follow {
    d.loader(Tone::Progress, "Waiting for an IP address...");
    d.arm(d.timings.wait_ip_timeout, to, WifiState::ApConnectError, Some("No IP address received"));
    None
}

fn enter_check_eth(d: &mut Driver, payload: &Payload, _: WifiState, to: WifiState) -> Follow {
    if let Payload::Address(link) = payload {
        d.ctx.call(ModuleCall::SetNetworkValue {
            ip: link.ip.clone(),
            netmask: link.netmask.clone(),
            gateway: link.gateway.clone(),
        });
    }
    if !d.ctx.send(Message::request(MODULE, "ap_status")) {
        return Some((
            WifiState::ApConnectError,
            Payload::Error("Status request not sent".into()),
        ));
    }
    d.loader(Tone::Progress, "Checking internet access...");
    d.arm(d.timings.check_eth_timeout, to, WifiState::ApConnectError, Some("Link check timed out"));
    None
}

fn enter_connected(d: &mut Driver, payload: &Payload, _: WifiState, to: WifiState) -> Follow {
    let link = match payload {
        Payload::Status(link) => Some(link.clone()),
        _ => d.link.clone(),
    };
    let text = if link.as_ref().is_some_and(|l| l.ethernet) {
        "Connected, internet available"
    } else {
        "Connected, no internet access"
    };
    d.set_link(link);
    d.flash(Tone::Success, text, d.timings.settle_delay);
    d.arm(d.timings.settle_delay, to, WifiState::Idle, None);
    None
}

fn enter_disconnect(d: &mut Driver, _: &Payload, _: WifiState, to: WifiState) -> Follow {
    if !d.ctx.send(Message::request(MODULE, "ap_disconnect")) {
        return Some((
            WifiState::ApDisconnectError,
            Payload::Error("Disconnect request not sent".into()),
        ));
    }
    d.loader(Tone::Progress, "Disconnecting...");
    d.arm(
        d.timings.disconnect_timeout,
        to,
        WifiState::ApDisconnectError,
        Some("Disconnect timed out"),
    );
    None
}

fn enter_disconnected(d: &mut Driver, payload: &Payload, _: WifiState, to: WifiState) -> Follow {
    let (reason, requested) = match payload {
        Payload::Disconnected { reason, requested } => (*reason, *requested),
        _ => (None, false),
    };
    d.set_link(None);

    let silent = requested || reason == Some(REASON_USER_INITIATED);
    if silent {
        d.flash(Tone::Info, "Disconnected", d.timings.settle_delay);
        d.arm(d.timings.settle_delay, to, WifiState::Idle, None);
    } else {
        d.flash(Tone::Error, reason_text(reason), d.timings.error_display);
        d.arm(d.timings.error_display, to, WifiState::Idle, None);
    }
    None
}

fn enter_error(d: &mut Driver, payload: &Payload, _: WifiState, to: WifiState) -> Follow {
    let text = match payload {
        Payload::Error(text) => text.as_str(),
        _ => match to {
            WifiState::ApScanError => "Scan failed",
            WifiState::ApDisconnectError => "Could not disconnect",
            _ => "Could not connect",
        },
    };
    d.flash(Tone::Error, text, d.timings.error_display);
    d.arm(d.timings.error_display, to, WifiState::Idle, None);
    None
}

fn announce(d: &mut Driver, from: WifiState, to: WifiState, _: &Payload) {
    d.ctx.notify(Notice::Workflow {
        workflow: MODULE,
        from: from.as_str(),
        to: to.as_str(),
    });
}

/// The WiFi machine, starting in `Idle`.
pub fn machine() -> StateMachine<WifiState, Driver, Payload> {
    use WifiState::{
        ApCheckEth, ApConnect, ApConnectError, ApConnected, ApDisconnect, ApDisconnectError,
        ApDisconnected, ApScan, ApScanError, ApWaitIp, Idle,
    };

    StateMachine::builder(MODULE, Idle)
        .allow(Idle, &[ApScan, ApConnect, ApDisconnect, ApDisconnected])
        .allow(ApScan, &[ApScanError, Idle])
        .allow(ApScanError, &[Idle])
        .allow(ApConnect, &[ApWaitIp, ApDisconnected, ApConnectError, Idle])
        .allow(ApDisconnect, &[ApDisconnectError, Idle])
        .allow(ApDisconnectError, &[Idle])
        .allow(ApWaitIp, &[ApCheckEth, ApConnectError, Idle])
        .allow(ApCheckEth, &[ApConnected, ApConnectError, Idle])
        .allow(ApConnected, &[Idle])
        .allow(ApDisconnected, &[Idle])
        .allow(ApConnectError, &[Idle])
        .on_enter(Idle, enter_idle)
        .on_enter(ApScan, enter_scan)
        .on_enter(ApConnect, enter_connect)
        .on_enter(ApWaitIp, enter_wait_ip)
        .on_enter(ApCheckEth, enter_check_eth)
        .on_enter(ApConnected, enter_connected)
        .on_enter(ApDisconnect, enter_disconnect)
        .on_enter(ApDisconnected, enter_disconnected)
        .on_enter(ApScanError, enter_error)
        .on_enter(ApConnectError, enter_error)
        .on_enter(ApDisconnectError, enter_error)
        .on_change(announce)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use pretty_assertions::assert_eq;

    fn connect(ssid: &str) -> Payload {
        Payload::Connect {
            ssid: ssid.into(),
            password: SecretString::from("secret".to_owned()),
        }
    }

    #[test]
    fn every_state_can_reach_idle() {
        let mut fsm = machine();
        assert_eq!(fsm.state(), WifiState::Idle);
        for state in [
            WifiState::ApScan,
            WifiState::ApScanError,
            WifiState::ApConnect,
            WifiState::ApWaitIp,
            WifiState::ApCheckEth,
            WifiState::ApConnected,
            WifiState::ApDisconnect,
            WifiState::ApDisconnectError,
            WifiState::ApDisconnected,
            WifiState::ApConnectError,
        ] {
            fsm.reset(state);
            assert!(fsm.can_transition(WifiState::Idle), "{state:?} cannot return to idle");
        }
    }

    #[tokio::test]
    async fn moves_outside_the_table_are_rejected() {
        let h = Harness::open();
        let mut driver = Driver::new(h.ctx.clone());
        let mut fsm = machine();
        assert!(!fsm.transition(WifiState::ApConnected, Payload::None, &mut driver));
        assert!(!fsm.transition(WifiState::ApWaitIp, Payload::None, &mut driver));
        assert_eq!(fsm.state(), WifiState::Idle);
        assert!(!driver.timer.is_armed());
    }

    #[tokio::test]
    async fn connect_sends_credentials_and_arms_deadline() {
        let mut h = Harness::open();
        let mut driver = Driver::new(h.ctx.clone());
        let mut fsm = machine();
        assert!(fsm.transition(WifiState::ApConnect, connect("home"), &mut driver));

        let sent = h.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].action.as_deref(), Some("ap_connect"));
        assert_eq!(sent[0].field_str("ssid"), Some("home"));
        assert_eq!(sent[0].field_str("password"), Some("secret"));
        assert!(driver.timer.is_armed());
        assert!(h.notices().contains(&Notice::Workflow {
            workflow: "wifi",
            from: "idle",
            to: "ap_connect",
        }));
    }

    #[tokio::test]
    async fn failed_send_falls_through_to_error_state() {
        let h = Harness::closed();
        let mut driver = Driver::new(h.ctx.clone());
        let mut fsm = machine();
        assert!(fsm.transition(WifiState::ApScan, Payload::None, &mut driver));
        assert_eq!(fsm.state(), WifiState::ApScanError);

        let armed = driver.timer.claim(crate::timer::TimerFired {
            owner: MODULE,
            generation: 1,
        });
        assert_eq!(
            armed.map(|d| d.next),
            Some(WifiState::Idle),
            "error state schedules the return to idle"
        );
    }

    #[tokio::test]
    async fn idle_cancels_the_pending_deadline() {
        let h = Harness::open();
        let mut driver = Driver::new(h.ctx.clone());
        let mut fsm = machine();
        fsm.transition(WifiState::ApScan, Payload::None, &mut driver);
        assert!(driver.timer.is_armed());
        fsm.transition(WifiState::Idle, Payload::None, &mut driver);
        assert!(!driver.timer.is_armed());
    }
}
