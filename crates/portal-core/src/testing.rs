//! Test wiring for modules: a context whose queues the test can inspect.

use portal_api::Message;
use tokio::sync::broadcast;

use crate::config::WorkflowTimings;
use crate::context::{ConnectionState, Context, ModuleCall, Wiring};
use crate::notice::Notice;

pub(crate) struct Harness {
    pub ctx: Context,
    pub wiring: Wiring,
    notices: broadcast::Receiver<Notice>,
}

impl Harness {
    /// A context whose channel is open.
    pub fn open() -> Self {
        let harness = Self::closed();
        harness
            .wiring
            .state
            .send_replace(ConnectionState::Open { ready: true });
        harness
    }

    /// A context whose channel is down; every send is refused.
    pub fn closed() -> Self {
        let (ctx, wiring) = Context::wire(WorkflowTimings::default());
        let notices = ctx.subscribe();
        Self {
            ctx,
            wiring,
            notices,
        }
    }

    /// Frames sent since the last call.
    pub fn sent(&mut self) -> Vec<Message> {
        let mut out = Vec::new();
        while let Ok(msg) = self.wiring.outbound.try_recv() {
            out.push(msg);
        }
        out
    }

    /// Actions of the frames sent since the last call.
    pub fn sent_actions(&mut self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|m| m.action)
            .collect()
    }

    pub fn calls(&mut self) -> Vec<ModuleCall> {
        let mut out = Vec::new();
        while let Ok(call) = self.wiring.calls.try_recv() {
            out.push(call);
        }
        out
    }

    pub fn notices(&mut self) -> Vec<Notice> {
        let mut out = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            out.push(notice);
        }
        out
    }
}
