// portal-core: Session lifecycle, module routing, and workflow state machines
//
// The session owns one portal channel and a registry of settings modules.
// Inbound frames are routed to modules; modules talk back to the device and
// to each other through a cloneable `Context`. Multi-step device operations
// such as joining a WiFi network run on the generic `fsm` engine.

pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod fsm;
pub mod module;
pub mod modules;
pub mod notice;
pub mod registry;
pub mod router;
pub mod session;
pub mod timer;

#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{
    Command, CommandResult, ControlAction, ModuleAction, ModuleSnapshot, SessionSnapshot,
    WifiCommand,
};
pub use config::{SessionConfig, WorkflowTimings};
pub use context::{ConnectionState, Context, ModuleCall};
pub use error::{CoreError, ModuleError, ValidationError};
pub use fsm::StateMachine;
pub use module::{Capabilities, FormConfig, Module};
pub use modules::wifi::{AccessPoint, LinkStatus, WifiState};
pub use notice::{Notice, Tone};
pub use registry::ModuleRegistry;
pub use router::{Delivery, Router};
pub use session::{Inbox, Session, SessionHandle};
