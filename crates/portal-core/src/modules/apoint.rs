//! The device's own access point: SSID and optional passphrase.

use portal_api::Message;
use strum::EnumString;

use crate::context::Context;
use crate::error::{ModuleError, ValidationError};
use crate::module::{form_from_payload, Capabilities, FormConfig, Module};

use super::common;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
enum AccessPointStatus {
    SavedPartial,
    ErrorPartial,
    LoadPartial,
}

pub struct AccessPointModule {
    ctx: Context,
    ssid: String,
    password: String,
}

impl AccessPointModule {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            ssid: String::new(),
            password: String::new(),
        }
    }
}

impl Module for AccessPointModule {
    fn name(&self) -> &'static str {
        "apoint"
    }

    fn routes(&self) -> &'static [&'static str] {
        &["apoint"]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
            .with_save()
            .with_responses()
            .with_app_start()
    }

    fn save(&mut self) -> Result<Option<FormConfig>, ValidationError> {
        let ssid = self.ssid.trim();
        if ssid.is_empty() {
            return Err(ValidationError::missing("ssid"));
        }
        let mut form = FormConfig::from([("ssid".to_owned(), ssid.to_owned())]);
        let password = self.password.trim();
        if !password.is_empty() {
            form.insert("password".to_owned(), password.to_owned());
        }
        Ok(Some(form))
    }

    fn on_app_start(&self) -> Option<Message> {
        Some(common::load_request(self.name()))
    }

    fn handle_response(&mut self, message: &Message) -> Result<(), ModuleError> {
        let Some(status) = common::status_of(self.name(), message) else {
            return Ok(());
        };
        match status {
            AccessPointStatus::SavedPartial => common::acknowledge_saved(&self.ctx),
            AccessPointStatus::ErrorPartial => {
                common::acknowledge_failed(&self.ctx, common::SAVE_FAILED_TEXT);
            }
            AccessPointStatus::LoadPartial => {
                let mut form = form_from_payload(message, "load_partial")?;
                self.ssid = common::take(&mut form, "ssid");
                self.password = common::take(&mut form, "password");
                common::announce_loaded(&self.ctx, self.name(), self.fields());
            }
        }
        Ok(())
    }

    fn set_field(&mut self, field: &str, value: &str) -> Result<(), ValidationError> {
        match field {
            "ssid" => value.clone_into(&mut self.ssid),
            "password" => value.clone_into(&mut self.password),
            _ => {
                return Err(ValidationError::UnknownField {
                    module: "apoint",
                    field: field.to_owned(),
                });
            }
        }
        Ok(())
    }

    fn fields(&self) -> FormConfig {
        let password = if self.password.is_empty() { "" } else { "********" };
        FormConfig::from([
            ("ssid".to_owned(), self.ssid.clone()),
            ("password".to_owned(), password.to_owned()),
        ])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::Harness;

    #[test]
    fn ssid_is_required() {
        let h = Harness::open();
        let mut ap = AccessPointModule::new(h.ctx.clone());
        ap.set_field("ssid", "   ").unwrap();
        assert_eq!(ap.save(), Err(ValidationError::missing("ssid")));
    }

    #[test]
    fn password_is_optional() {
        let h = Harness::open();
        let mut ap = AccessPointModule::new(h.ctx.clone());
        ap.set_field("ssid", "LedStrip-Setup").unwrap();
        let form = ap.save().unwrap().unwrap();
        assert!(!form.contains_key("password"));

        ap.set_field("password", "hunter22").unwrap();
        assert_eq!(ap.save().unwrap().unwrap()["password"], "hunter22");
        assert_eq!(ap.fields()["password"], "********");
    }
}
