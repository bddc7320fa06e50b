// ── Message router ──
//
// Decides which module sees an inbound frame:
//   1. the module owning `target`,
//   2. else the module owning `action` (responses) or `event` (events),
//   3. else every module that handles that kind of frame.
// A handler failure is logged and never reaches the channel or the other
// modules.

use portal_api::{Message, MessageKind};
use tracing::{debug, warn};

use crate::context::ModuleCall;
use crate::error::CoreError;
use crate::module::{FormConfig, Module};
use crate::registry::ModuleRegistry;
use crate::timer::TimerFired;

/// How a frame was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Matched by `target`.
    Targeted(&'static str),
    /// Matched by `action` or `event`.
    Keyed(&'static str),
    /// Sent to every capable module.
    Broadcast { delivered: usize, failed: usize },
    /// Not something a client acts on.
    Dropped,
}

pub struct Router {
    registry: ModuleRegistry,
}

impl Router {
    pub fn new(registry: ModuleRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ModuleRegistry {
        &mut self.registry
    }

    pub fn dispatch(&mut self, message: &Message) -> Delivery {
        let key = match message.kind {
            MessageKind::Response => message.action.as_deref(),
            MessageKind::Event => message.event.as_deref(),
            MessageKind::Request => {
                debug!(module = ?message.target, "ignoring inbound request frame");
                return Delivery::Dropped;
            }
        };

        if let Some(index) = self.capable_route(message.target.as_deref(), message.kind) {
            let name = self.deliver(index, message);
            return Delivery::Targeted(name);
        }

        if let Some(index) = self.capable_route(key, message.kind) {
            let name = self.deliver(index, message);
            return Delivery::Keyed(name);
        }

        self.broadcast(message)
    }

    /// Collect a module's form for saving.
    ///
    /// Validation errors are returned to the caller; nothing is sent here.
    pub fn save(&mut self, name: &str) -> Result<Option<FormConfig>, CoreError> {
        let module = self
            .registry
            .by_name_mut(name)
            .ok_or_else(|| CoreError::UnknownModule {
                name: name.to_owned(),
            })?;
        if !module.capabilities().save {
            return Err(CoreError::Unsupported {
                module: name.to_owned(),
                operation: "save".into(),
            });
        }
        Ok(module.save()?)
    }

    /// Deliver a queued cross-module call.
    pub fn deliver_call(&mut self, call: ModuleCall) {
        let target = call.target();
        let Some(module) = self.registry.by_name_mut(target) else {
            warn!(module = target, ?call, "call to unregistered module dropped");
            return;
        };
        if let Err(e) = module.handle_call(call) {
            warn!(module = target, error = %e, "module call failed");
        }
    }

    /// Hand a fired deadline back to the module that armed it.
    pub fn deliver_timer(&mut self, fired: TimerFired) {
        let Some(module) = self.registry.by_name_mut(fired.owner) else {
            debug!(owner = fired.owner, "timer for unregistered module ignored");
            return;
        };
        if let Err(e) = module.on_timer(fired) {
            warn!(module = fired.owner, error = %e, "module timer handler failed");
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    fn capable_route(&self, key: Option<&str>, kind: MessageKind) -> Option<usize> {
        let index = self.registry.route(key?)?;
        let module = self.registry.get(index)?;
        handles(module, kind).then_some(index)
    }

    fn deliver(&mut self, index: usize, message: &Message) -> &'static str {
        let Some(module) = self.registry.get_mut(index) else {
            return "";
        };
        let name = module.name();
        if let Err(e) = invoke(module, message) {
            warn!(module = name, status = ?message.status, error = %e, "module handler failed");
        }
        name
    }

    fn broadcast(&mut self, message: &Message) -> Delivery {
        let mut delivered = 0;
        let mut failed = 0;
        for module in self.registry.iter_mut() {
            if !handles(module, message.kind) {
                continue;
            }
            match invoke(module, message) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    failed += 1;
                    warn!(
                        module = module.name(),
                        status = ?message.status,
                        error = %e,
                        "module handler failed during broadcast"
                    );
                }
            }
        }
        debug!(delivered, failed, status = ?message.status, "broadcast frame");
        Delivery::Broadcast { delivered, failed }
    }
}

fn handles(module: &dyn Module, kind: MessageKind) -> bool {
    let caps = module.capabilities();
    match kind {
        MessageKind::Response => caps.responses,
        MessageKind::Event => caps.events,
        MessageKind::Request => false,
    }
}

fn invoke(module: &mut dyn Module, message: &Message) -> Result<(), crate::error::ModuleError> {
    match message.kind {
        MessageKind::Response => module.handle_response(message),
        MessageKind::Event => module.handle_event(message),
        MessageKind::Request => Ok(()),
    }
}
