//! Device identity: the hostname the device announces on the network.

use portal_api::Message;
use strum::EnumString;

use crate::context::{Context, ModuleCall};
use crate::error::{ModuleError, ValidationError};
use crate::module::{form_from_payload, Capabilities, FormConfig, Module};
use crate::notice::Tone;

use super::common;

pub const DEFAULT_HOSTNAME: &str = "esp32device";

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
enum DeviceStatus {
    SavedPartial,
    ErrorPartial,
    LoadPartial,
}

pub struct DeviceModule {
    ctx: Context,
    hostname: String,
}

impl DeviceModule {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            hostname: String::new(),
        }
    }
}

impl Module for DeviceModule {
    fn name(&self) -> &'static str {
        "device"
    }

    fn routes(&self) -> &'static [&'static str] {
        &["device"]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
            .with_save()
            .with_responses()
            .with_app_start()
    }

    fn save(&mut self) -> Result<Option<FormConfig>, ValidationError> {
        let mut hostname = self.hostname.trim().to_owned();
        if hostname.is_empty() {
            self.ctx.call(ModuleCall::ShowSettingsStatus {
                tone: Tone::Info,
                text: format!("Default hostname is {DEFAULT_HOSTNAME}"),
            });
            hostname = DEFAULT_HOSTNAME.to_owned();
        }
        Ok(Some(FormConfig::from([("hostname".to_owned(), hostname)])))
    }

    fn on_app_start(&self) -> Option<Message> {
        Some(common::load_request(self.name()))
    }

    fn handle_response(&mut self, message: &Message) -> Result<(), ModuleError> {
        let Some(status) = common::status_of(self.name(), message) else {
            return Ok(());
        };
        match status {
            DeviceStatus::SavedPartial => {
                common::acknowledge_saved(&self.ctx);
                let trimmed = self.hostname.trim();
                self.hostname = if trimmed.is_empty() {
                    DEFAULT_HOSTNAME.to_owned()
                } else {
                    trimmed.to_owned()
                };
            }
            DeviceStatus::ErrorPartial => {
                common::acknowledge_failed(&self.ctx, common::SAVE_FAILED_TEXT);
            }
            DeviceStatus::LoadPartial => {
                let mut form = form_from_payload(message, "load_partial")?;
                self.hostname = common::take(&mut form, "hostname");
                common::announce_loaded(&self.ctx, self.name(), self.fields());
            }
        }
        Ok(())
    }

    fn set_field(&mut self, field: &str, value: &str) -> Result<(), ValidationError> {
        match field {
            "hostname" => {
                self.hostname = value.to_owned();
                Ok(())
            }
            _ => Err(ValidationError::UnknownField {
                module: self.name(),
                field: field.to_owned(),
            }),
        }
    }

    fn fields(&self) -> FormConfig {
        FormConfig::from([("hostname".to_owned(), self.hostname.clone())])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use serde_json::json;

    #[test]
    fn empty_hostname_saves_the_default() {
        let mut h = Harness::open();
        let mut device = DeviceModule::new(h.ctx.clone());
        let form = device.save().unwrap().unwrap();
        assert_eq!(form["hostname"], DEFAULT_HOSTNAME);
        assert!(matches!(
            h.calls().as_slice(),
            [ModuleCall::ShowSettingsStatus { tone: Tone::Info, .. }]
        ));
    }

    #[test]
    fn hostname_is_trimmed() {
        let h = Harness::open();
        let mut device = DeviceModule::new(h.ctx.clone());
        device.set_field("hostname", "  kitchen  ").unwrap();
        assert_eq!(device.save().unwrap().unwrap()["hostname"], "kitchen");
    }

    #[test]
    fn load_partial_fills_the_form() {
        let mut h = Harness::open();
        let mut device = DeviceModule::new(h.ctx.clone());
        let msg = Message::response("device", "load_partial").with_data(json!({ "hostname": "strip-01" }));
        device.handle_response(&msg).unwrap();
        assert_eq!(device.fields()["hostname"], "strip-01");
        assert_eq!(h.notices().len(), 1);
    }

    #[test]
    fn saved_partial_resets_save_button() {
        let mut h = Harness::open();
        let mut device = DeviceModule::new(h.ctx.clone());
        device
            .handle_response(&Message::response("device", "saved_partial"))
            .unwrap();
        let calls = h.calls();
        assert_eq!(calls[0], ModuleCall::SetSaveButtonState { loading: false });
        assert!(matches!(
            &calls[1],
            ModuleCall::ShowSettingsStatus { tone: Tone::Success, .. }
        ));
        assert_eq!(device.fields()["hostname"], DEFAULT_HOSTNAME);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let h = Harness::open();
        let mut device = DeviceModule::new(h.ctx.clone());
        assert!(matches!(
            device.set_field("ledpin", "4"),
            Err(ValidationError::UnknownField { .. })
        ));
    }
}
