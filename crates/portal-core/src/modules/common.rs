//! Behavior every form module shares.

use std::str::FromStr;

use portal_api::Message;
use tracing::debug;

use crate::context::{Context, ModuleCall};
use crate::module::FormConfig;
use crate::notice::{Notice, Tone};

pub(crate) const SAVED_TEXT: &str = "Settings saved";
pub(crate) const SAVE_FAILED_TEXT: &str = "Settings were not saved";

/// Parse the status (or event name) of a frame into a module's closed
/// vocabulary. Unknown names are logged and yield `None`.
pub(crate) fn status_of<T: FromStr>(module: &'static str, message: &Message) -> Option<T> {
    let name = message.event_name()?;
    let parsed = name.parse().ok();
    if parsed.is_none() {
        debug!(module, status = name, "ignoring unknown status");
    }
    parsed
}

pub(crate) fn load_request(module: &'static str) -> Message {
    Message::request(module, "load_partial")
}

/// The device stored a `save_partial`.
pub(crate) fn acknowledge_saved(ctx: &Context) {
    ctx.call(ModuleCall::SetSaveButtonState { loading: false });
    ctx.call(ModuleCall::ShowSettingsStatus {
        tone: Tone::Success,
        text: SAVED_TEXT.into(),
    });
}

/// The device refused a `save_partial`.
pub(crate) fn acknowledge_failed(ctx: &Context, text: impl Into<String>) {
    ctx.call(ModuleCall::SetSaveButtonState { loading: false });
    ctx.call(ModuleCall::ShowSettingsStatus {
        tone: Tone::Error,
        text: text.into(),
    });
}

pub(crate) fn announce_loaded(ctx: &Context, module: &'static str, fields: FormConfig) {
    ctx.notify(Notice::FormLoaded { module, fields });
}

/// A field from a loaded form, or empty.
pub(crate) fn take(form: &mut FormConfig, key: &str) -> String {
    form.remove(key).unwrap_or_default()
}
