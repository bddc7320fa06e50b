// ── Portal session ──
//
// One session per device. The session owns the module registry and runs a
// single loop that serializes everything that can touch module state:
// channel events, fired deadlines, cross-module calls and user commands.
// Nothing else ever holds a `&mut` to a module.

use std::time::Duration;

use portal_api::websocket::{spawn_with_queue, ChannelEvent};
use portal_api::Message;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::{
    Command, CommandEnvelope, CommandResult, ModuleSnapshot, SessionSnapshot,
};
use crate::config::{SessionConfig, WorkflowTimings};
use crate::context::{ConnectionState, Context, ModuleCall};
use crate::error::CoreError;
use crate::module::{form_to_value, Module};
use crate::modules;
use crate::notice::Notice;
use crate::registry::ModuleRegistry;
use crate::router::Router;
use crate::timer::TimerFired;

const COMMAND_CHANNEL_SIZE: usize = 64;

/// Queues the session drains besides the channel and the command inbox.
pub struct Inbox {
    timers: mpsc::UnboundedReceiver<TimerFired>,
    calls: mpsc::UnboundedReceiver<ModuleCall>,
}

/// What woke the session loop.
enum Wake {
    Stop,
    Channel(ChannelEvent),
    Timer(TimerFired),
    Call(ModuleCall),
    Command(CommandEnvelope),
}

// ── Session ──────────────────────────────────────────────────────────

pub struct Session {
    router: Router,
    ctx: Context,
    state_tx: watch::Sender<ConnectionState>,
    /// Startup requests already went out on the current connection.
    startup_sent: bool,
}

impl Session {
    /// Build a session around the modules `build` returns.
    ///
    /// Also returns the session's queues and the receiving end of the
    /// outbound frame queue, which the channel task consumes.
    pub fn new<F>(
        timings: WorkflowTimings,
        build: F,
    ) -> Result<(Self, Inbox, mpsc::UnboundedReceiver<Message>), CoreError>
    where
        F: FnOnce(&Context) -> Vec<Box<dyn Module>>,
    {
        let (ctx, wiring) = Context::wire(timings);

        let mut registry = ModuleRegistry::new();
        for module in build(&ctx) {
            registry.register(module)?;
        }
        registry.init_all();
        debug!(modules = registry.len(), "modules registered");

        let session = Self {
            router: Router::new(registry),
            ctx,
            state_tx: wiring.state,
            startup_sent: false,
        };
        let inbox = Inbox {
            timers: wiring.timers,
            calls: wiring.calls,
        };
        Ok((session, inbox, wiring.outbound))
    }

    /// A session with every portal module.
    pub fn standard(
        timings: WorkflowTimings,
    ) -> Result<(Self, Inbox, mpsc::UnboundedReceiver<Message>), CoreError> {
        Self::new(timings, modules::standard)
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state.clone());
        self.ctx.notify(Notice::Connection { state });
    }

    // ── Channel events ───────────────────────────────────────────────

    pub fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Opened => {
                info!("portal channel open");
                self.startup_sent = false;
                self.set_state(ConnectionState::Open { ready: false });
            }
            ChannelEvent::Frame(message) if message.is_ready() => self.on_ready(),
            ChannelEvent::Frame(message) => {
                let delivery = self.router.dispatch(&message);
                debug!(?delivery, status = ?message.status, "frame dispatched");
            }
            ChannelEvent::Closed { attempt, retry_in } => {
                warn!(attempt, ?retry_in, "portal channel closed, reconnecting");
                self.set_state(ConnectionState::Reconnecting { attempt });
            }
            ChannelEvent::GaveUp { attempts } => {
                error!(attempts, "portal channel lost");
                self.set_state(ConnectionState::Lost);
                self.ctx.notify(Notice::ConnectionLost);
            }
        }
    }

    /// The device announced it is ready: every module with a startup
    /// request sends it, in registration order, once per connection.
    fn on_ready(&mut self) {
        if self.startup_sent {
            debug!("duplicate ready signal ignored");
            return;
        }
        self.startup_sent = true;

        let mut sent = 0_usize;
        for module in self.router.registry().iter() {
            if !module.capabilities().app_start {
                continue;
            }
            let Some(request) = module.on_app_start() else {
                continue;
            };
            if self.ctx.send(request) {
                sent += 1;
            } else {
                warn!(module = module.name(), "startup request not sent");
            }
        }
        info!(requests = sent, "device ready, startup requests sent");
        self.set_state(ConnectionState::Open { ready: true });
    }

    pub fn handle_timer(&mut self, fired: TimerFired) {
        self.router.deliver_timer(fired);
    }

    /// Deliver queued cross-module calls until none are left.
    pub fn pump(&mut self, inbox: &mut Inbox) {
        while let Ok(call) = inbox.calls.try_recv() {
            self.router.deliver_call(call);
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn execute(&mut self, command: Command) -> Result<CommandResult, CoreError> {
        match command {
            Command::SetField {
                module,
                field,
                value,
            } => {
                let target = self.module_mut(&module)?;
                target.set_field(&field, &value)?;
                Ok(CommandResult::Ok)
            }
            Command::Save { module } => self.save(&module),
            Command::Perform(action) => {
                let target = self.module_mut(action.module())?;
                target.perform(action)?;
                Ok(CommandResult::Ok)
            }
            Command::Snapshot => Ok(CommandResult::Snapshot(self.snapshot())),
        }
    }

    fn module_mut(&mut self, name: &str) -> Result<&mut (dyn Module + 'static), CoreError> {
        self.router
            .registry_mut()
            .by_name_mut(name)
            .ok_or_else(|| CoreError::UnknownModule {
                name: name.to_owned(),
            })
    }

    /// Validate a module's form and send it as `save_partial`.
    ///
    /// A validation failure sends nothing and resets the save button.
    fn save(&mut self, name: &str) -> Result<CommandResult, CoreError> {
        let form = match self.router.save(name) {
            Ok(Some(form)) if !form.is_empty() => form,
            Ok(_) => return Ok(CommandResult::Saved { sent: false }),
            Err(e @ CoreError::Validation(_)) => {
                debug!(module = name, error = %e, "save rejected");
                self.ctx.call(ModuleCall::SetSaveButtonState { loading: false });
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let request = Message::request(name, "save_partial").with_data(form_to_value(&form));
        if !self.ctx.send(request) {
            self.ctx.call(ModuleCall::SetSaveButtonState { loading: false });
            return Err(CoreError::NotSent {
                what: format!("{name} settings"),
            });
        }
        self.ctx.call(ModuleCall::SetSaveButtonState { loading: true });
        Ok(CommandResult::Saved { sent: true })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            connection: self.state(),
            modules: self
                .router
                .registry()
                .iter()
                .map(|module| ModuleSnapshot {
                    name: module.name(),
                    fields: module.fields(),
                })
                .collect(),
        }
    }

    // ── Loop ─────────────────────────────────────────────────────────

    /// Run until cancelled or every command sender is gone.
    pub(crate) async fn run(
        mut self,
        mut inbox: Inbox,
        mut events: mpsc::Receiver<ChannelEvent>,
        mut commands: mpsc::Receiver<CommandEnvelope>,
        cancel: CancellationToken,
    ) {
        loop {
            let wake = tokio::select! {
                biased;
                () = cancel.cancelled() => Wake::Stop,
                Some(event) = events.recv() => Wake::Channel(event),
                Some(call) = inbox.calls.recv() => Wake::Call(call),
                Some(fired) = inbox.timers.recv() => Wake::Timer(fired),
                envelope = commands.recv() => match envelope {
                    Some(envelope) => Wake::Command(envelope),
                    None => Wake::Stop,
                },
                else => Wake::Stop,
            };

            match wake {
                Wake::Stop => break,
                Wake::Channel(event) => self.handle_channel_event(event),
                Wake::Call(call) => self.router.deliver_call(call),
                Wake::Timer(fired) => self.handle_timer(fired),
                Wake::Command(envelope) => {
                    let result = self.execute(envelope.command);
                    // Caller gave up waiting; the command already ran.
                    let _ = envelope.response_tx.send(result);
                }
            }
            self.pump(&mut inbox);
        }

        self.teardown();
    }

    /// Cancel every module's timers and mark the session closed. Safe to
    /// call more than once.
    pub fn teardown(&mut self) {
        if *self.state_tx.borrow() == ConnectionState::Closed {
            return;
        }
        self.router.registry_mut().teardown();
        self.set_state(ConnectionState::Closed);
        debug!("session closed");
    }
}

// ── SessionHandle ────────────────────────────────────────────────────

/// A running session: the channel task plus the session loop.
///
/// Cheap to share by reference; every method takes `&self`.
pub struct SessionHandle {
    command_tx: mpsc::Sender<CommandEnvelope>,
    state: watch::Receiver<ConnectionState>,
    notices: broadcast::Sender<Notice>,
    max_attempts: u32,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    /// Connect to the portal and start the session loop.
    ///
    /// Returns immediately; watch [`connection_state`](Self::connection_state)
    /// or call [`wait_ready`](Self::wait_ready) to know when the device
    /// is usable.
    pub fn start(config: SessionConfig) -> Result<Self, CoreError> {
        Self::start_with(config, modules::standard)
    }

    /// Start a session with a custom module set.
    pub fn start_with<F>(config: SessionConfig, build: F) -> Result<Self, CoreError>
    where
        F: FnOnce(&Context) -> Vec<Box<dyn Module>>,
    {
        let (session, inbox, outbound) = Session::new(config.timings.clone(), build)?;
        let cancel = CancellationToken::new();

        info!(endpoint = %config.endpoint, "starting portal session");
        let events = spawn_with_queue(
            config.endpoint.clone(),
            config.reconnect.clone(),
            outbound,
            cancel.child_token(),
        );

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let state = session.state_tx.subscribe();
        let notices = session.ctx.notice_sender();
        let task = tokio::spawn(session.run(inbox, events, command_rx, cancel.clone()));

        Ok(Self {
            command_tx,
            state,
            notices,
            max_attempts: config.reconnect.max_attempts,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }

    /// Run a command on the session loop and wait for its result.
    pub async fn execute(&self, command: Command) -> Result<CommandResult, CoreError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.command_tx
            .send(CommandEnvelope {
                command,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::SessionClosed)?;

        rx.await.map_err(|_| CoreError::SessionClosed)?
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Wait until the device announced itself and startup requests went out.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), CoreError> {
        let mut state = self.state.clone();
        let max_attempts = self.max_attempts;

        let wait = async move {
            loop {
                {
                    let current = state.borrow_and_update();
                    match *current {
                        ConnectionState::Open { ready: true } => return Ok(()),
                        ConnectionState::Lost => {
                            return Err(CoreError::ConnectionLost {
                                attempts: max_attempts,
                            });
                        }
                        ConnectionState::Closed => return Err(CoreError::SessionClosed),
                        _ => {}
                    }
                }
                if state.changed().await.is_err() {
                    return Err(CoreError::SessionClosed);
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| CoreError::Timeout {
                timeout_secs: timeout.as_secs(),
            })?
    }

    /// Stop the session and close the channel. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "session task ended abnormally");
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Tests ────────────────────────────────────────────────────────────
