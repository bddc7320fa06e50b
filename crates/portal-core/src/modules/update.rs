//! Firmware version display and update trigger.

use portal_api::Message;
use serde_json::json;
use strum::EnumString;

use crate::command::ModuleAction;
use crate::context::{Context, ModuleCall};
use crate::error::{CoreError, ModuleError, ValidationError};
use crate::module::{Capabilities, FormConfig, Module};
use crate::notice::{Notice, Tone};

use super::common;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
enum UpdateStatus {
    LoadPartial,
    ErrorUpdate,
}

pub struct UpdateModule {
    ctx: Context,
    application: Option<String>,
    bootloader: Option<String>,
    enabled: bool,
}

impl UpdateModule {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            application: None,
            bootloader: None,
            enabled: true,
        }
    }

    fn start(&self, code: &str) -> Result<(), CoreError> {
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Err(ValidationError::missing("code").into());
        }
        if !self.enabled {
            return Err(ValidationError::Rejected("updates need internet access".into()).into());
        }

        let request = Message::request("update", "start_update").with_data(json!({ "code": code }));
        if !self.ctx.send(request) {
            return Err(CoreError::NotSent {
                what: "update request".into(),
            });
        }
        self.ctx
            .notify(Notice::loader("update", Tone::Progress, "Starting update..."));
        Ok(())
    }
}

impl Module for UpdateModule {
    fn name(&self) -> &'static str {
        "update"
    }

    fn routes(&self) -> &'static [&'static str] {
        &["update"]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.with_responses().with_app_start()
    }

    fn on_app_start(&self) -> Option<Message> {
        Some(common::load_request(self.name()))
    }

    fn handle_response(&mut self, message: &Message) -> Result<(), ModuleError> {
        match common::status_of(self.name(), message) {
            Some(UpdateStatus::LoadPartial) => {
                self.application = message.field_str("application").map(str::to_owned);
                self.bootloader = message.field_str("bootloader").map(str::to_owned);
                common::announce_loaded(&self.ctx, self.name(), self.fields());
            }
            Some(UpdateStatus::ErrorUpdate) => {
                self.ctx
                    .notify(Notice::transient("update", Tone::Error, "Update could not start", 4000));
            }
            None => {}
        }
        Ok(())
    }

    fn handle_call(&mut self, call: ModuleCall) -> Result<(), ModuleError> {
        match call {
            ModuleCall::SetUpdateEnabled(enabled) => {
                self.enabled = enabled;
                self.ctx.notify(Notice::ControlsEnabled {
                    module: "update",
                    enabled,
                });
                Ok(())
            }
            other => Err(ModuleError::UnsupportedCall {
                module: "update",
                call: format!("{other:?}"),
            }),
        }
    }

    fn perform(&mut self, action: ModuleAction) -> Result<(), CoreError> {
        match action {
            ModuleAction::StartUpdate { code } => self.start(&code),
            other => Err(CoreError::Unsupported {
                module: "update".into(),
                operation: other.to_string(),
            }),
        }
    }

    fn fields(&self) -> FormConfig {
        FormConfig::from([
            (
                "application".to_owned(),
                self.application.clone().unwrap_or_default(),
            ),
            (
                "bootloader".to_owned(),
                self.bootloader.clone().unwrap_or_default(),
            ),
            ("enabled".to_owned(), self.enabled.to_string()),
        ])
    }
}
