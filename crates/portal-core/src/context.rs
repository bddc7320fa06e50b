// ── Module context ──
//
// The handle every module holds. It is the only way a module can reach
// the device, schedule a deadline, tell the user something, or ask a
// sibling module to do something. Cloning is cheap; all clones talk to the
// same session.

use portal_api::Message;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::debug;

use crate::config::WorkflowTimings;
use crate::notice::{Notice, Tone};
use crate::timer::{TimerFired, TimerService};

const NOTICE_CHANNEL_SIZE: usize = 256;

// ── ConnectionState ──────────────────────────────────────────────────

/// Channel state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    /// Socket is open. `ready` turns true once the device announced itself
    /// and the startup requests went out.
    Open { ready: bool },
    Reconnecting { attempt: u32 },
    /// Reconnect budget spent.
    Lost,
    /// Session was shut down.
    Closed,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Open { ready: true })
    }
}

// ── ModuleCall ───────────────────────────────────────────────────────

/// A typed request from one module to another.
///
/// Calls are queued and delivered by the session after the current
/// handler returns, so a module never re-enters itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleCall {
    SetNetworkValue {
        ip: String,
        netmask: String,
        gateway: String,
    },
    SetMqttTestEnabled(bool),
    SetUpdateEnabled(bool),
    SetSaveButtonState { loading: bool },
    ShowSettingsStatus { tone: Tone, text: String },
}

impl ModuleCall {
    /// Name of the module that handles this call.
    pub fn target(&self) -> &'static str {
        match self {
            Self::SetNetworkValue { .. } => "network",
            Self::SetMqttTestEnabled(_) => "mqtt",
            Self::SetUpdateEnabled(_) => "update",
            Self::SetSaveButtonState { .. } | Self::ShowSettingsStatus { .. } => "control",
        }
    }
}

// ── Context ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Context {
    outbound: mpsc::UnboundedSender<Message>,
    state: watch::Receiver<ConnectionState>,
    timers: TimerService,
    notices: broadcast::Sender<Notice>,
    calls: mpsc::UnboundedSender<ModuleCall>,
    timings: WorkflowTimings,
}

/// Receiving ends of a freshly wired context.
pub struct Wiring {
    /// Frames modules asked to send, in order.
    pub outbound: mpsc::UnboundedReceiver<Message>,
    pub timers: mpsc::UnboundedReceiver<TimerFired>,
    pub calls: mpsc::UnboundedReceiver<ModuleCall>,
    /// Publishes the state `Context::send` checks.
    pub state: watch::Sender<ConnectionState>,
}

impl Context {
    /// Create a context and the queues behind it.
    pub fn wire(timings: WorkflowTimings) -> (Self, Wiring) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (notice_tx, _) = broadcast::channel(NOTICE_CHANNEL_SIZE);
        let (call_tx, call_rx) = mpsc::unbounded_channel();

        let context = Self {
            outbound: outbound_tx,
            state: state_rx,
            timers: TimerService::new(timer_tx),
            notices: notice_tx,
            calls: call_tx,
            timings,
        };
        let wiring = Wiring {
            outbound: outbound_rx,
            timers: timer_rx,
            calls: call_rx,
            state: state_tx,
        };
        (context, wiring)
    }

    /// Send a frame to the device.
    ///
    /// Returns `false` without queueing anything if the channel is not open.
    pub fn send(&self, message: Message) -> bool {
        if !self.state.borrow().is_open() {
            debug!(
                module = ?message.target,
                action = ?message.action,
                "channel not open, request not sent"
            );
            return false;
        }
        self.outbound.send(message).is_ok()
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().is_open()
    }

    /// Queue a call to another module.
    pub fn call(&self, call: ModuleCall) {
        if self.calls.send(call).is_err() {
            debug!("session gone, module call dropped");
        }
    }

    /// Publish a notice. Having no subscribers is fine.
    pub fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub(crate) fn notice_sender(&self) -> broadcast::Sender<Notice> {
        self.notices.clone()
    }

    pub fn timers(&self) -> TimerService {
        self.timers.clone()
    }

    pub fn timings(&self) -> &WorkflowTimings {
        &self.timings
    }
}
