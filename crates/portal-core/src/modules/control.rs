//! System actions (reset, reboot, logout) and the shared save controls.

use portal_api::Message;
use strum::EnumString;

use crate::command::{ControlAction, ModuleAction};
use crate::context::{Context, ModuleCall};
use crate::error::{CoreError, ModuleError};
use crate::module::{Capabilities, FormConfig, Module};
use crate::notice::{Notice, Tone};

/// How long the settings status banner stays up.
pub const SETTINGS_STATUS_MS: u64 = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
enum ControlStatus {
    Error,
}

pub struct ControlModule {
    ctx: Context,
    saving: bool,
}

impl ControlModule {
    pub fn new(ctx: Context) -> Self {
        Self { ctx, saving: false }
    }

    fn set_saving(&mut self, loading: bool) {
        self.saving = loading;
        self.ctx.notify(Notice::SaveButton { loading });
    }
}

fn progress_text(action: ControlAction) -> &'static str {
    match action {
        ControlAction::Reset => "Resetting system...",
        ControlAction::Reboot => "Rebooting...",
        ControlAction::Logout => "Signing out...",
    }
}

impl Module for ControlModule {
    fn name(&self) -> &'static str {
        "control"
    }

    fn routes(&self) -> &'static [&'static str] {
        &["control"]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.with_responses()
    }

    fn init(&mut self) -> Result<(), ModuleError> {
        self.set_saving(false);
        Ok(())
    }

    fn handle_response(&mut self, message: &Message) -> Result<(), ModuleError> {
        if let Some(ControlStatus::Error) = super::common::status_of(self.name(), message) {
            self.ctx.notify(Notice::transient(
                "control",
                Tone::Error,
                "The device rejected the request",
                SETTINGS_STATUS_MS,
            ));
        }
        Ok(())
    }

    fn handle_call(&mut self, call: ModuleCall) -> Result<(), ModuleError> {
        match call {
            ModuleCall::SetSaveButtonState { loading } => self.set_saving(loading),
            ModuleCall::ShowSettingsStatus { tone, text } => {
                self.ctx.notify(Notice::SettingsStatus {
                    tone,
                    text,
                    dismiss_after_ms: SETTINGS_STATUS_MS,
                });
            }
            other => {
                return Err(ModuleError::UnsupportedCall {
                    module: "control",
                    call: format!("{other:?}"),
                });
            }
        }
        Ok(())
    }

    fn perform(&mut self, action: ModuleAction) -> Result<(), CoreError> {
        let ModuleAction::Control(action) = action else {
            return Err(CoreError::Unsupported {
                module: "control".into(),
                operation: action.to_string(),
            });
        };

        let verb: &'static str = action.into();
        if !self.ctx.send(Message::request("control", verb)) {
            return Err(CoreError::NotSent {
                what: format!("{verb} request"),
            });
        }
        self.ctx
            .notify(Notice::loader("control", Tone::Progress, progress_text(action)));
        Ok(())
    }

    fn fields(&self) -> FormConfig {
        FormConfig::from([("saving".to_owned(), self.saving.to_string())])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::Harness;

    #[test]
    fn control_actions_are_sent_by_name() {
        let mut h = Harness::open();
        let mut control = ControlModule::new(h.ctx.clone());
        control
            .perform(ModuleAction::Control(ControlAction::Reboot))
            .unwrap();
        assert_eq!(h.sent_actions(), ["reboot"]);
        assert!(h.notices().contains(&Notice::loader(
            "control",
            Tone::Progress,
            "Rebooting..."
        )));
    }

    #[test]
    fn settings_status_is_auto_dismissed() {
        let mut h = Harness::open();
        let mut control = ControlModule::new(h.ctx.clone());
        control
            .handle_call(ModuleCall::ShowSettingsStatus {
                tone: Tone::Success,
                text: "Settings saved".into(),
            })
            .unwrap();
        assert_eq!(
            h.notices(),
            [Notice::SettingsStatus {
                tone: Tone::Success,
                text: "Settings saved".into(),
                dismiss_after_ms: SETTINGS_STATUS_MS,
            }]
        );
    }

    #[test]
    fn reset_needs_an_open_channel() {
        let h = Harness::closed();
        let mut control = ControlModule::new(h.ctx.clone());
        assert!(matches!(
            control.perform(ModuleAction::Control(ControlAction::Reset)),
            Err(CoreError::NotSent { .. })
        ));
    }
}
