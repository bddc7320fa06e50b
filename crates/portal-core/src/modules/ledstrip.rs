//! LED strip wiring: pixel count, data pin, and the hostname of the next
//! device in a chain.

use portal_api::Message;
use strum::EnumString;

use crate::context::Context;
use crate::error::{ModuleError, ValidationError};
use crate::module::{form_from_payload, Capabilities, FormConfig, Module};

use super::common;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
enum LedStripStatus {
    SavedPartial,
    ErrorPartial,
    LoadPartial,
}

pub struct LedStripModule {
    ctx: Context,
    lednum: String,
    ledpin: String,
    hostname: String,
}

impl LedStripModule {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            lednum: String::new(),
            ledpin: String::new(),
            hostname: String::new(),
        }
    }
}

/// Translate the device's rejection reasons into user text.
fn save_error_text(reason: Option<&str>) -> &'static str {
    match reason {
        Some("invalid ledpin provided") => "Invalid LED data pin",
        Some("invalid lednum provided (must be > 0)") => "Invalid LED count",
        _ => common::SAVE_FAILED_TEXT,
    }
}

impl Module for LedStripModule {
    fn name(&self) -> &'static str {
        "ledstrip"
    }

    fn routes(&self) -> &'static [&'static str] {
        &["ledstrip"]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
            .with_save()
            .with_responses()
            .with_app_start()
    }

    fn save(&mut self) -> Result<Option<FormConfig>, ValidationError> {
        let lednum = self.lednum.trim();
        let ledpin = self.ledpin.trim();
        if lednum.is_empty() {
            return Err(ValidationError::missing("lednum"));
        }
        if ledpin.is_empty() {
            return Err(ValidationError::missing("ledpin"));
        }

        let mut form = FormConfig::from([
            ("lednum".to_owned(), lednum.to_owned()),
            ("ledpin".to_owned(), ledpin.to_owned()),
        ]);
        let hostname = self.hostname.trim();
        if !hostname.is_empty() {
            form.insert("hostname".to_owned(), hostname.to_owned());
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
            LedStripStatus::SavedPartial => common::acknowledge_saved(&self.ctx),
            LedStripStatus::ErrorPartial => {
                common::acknowledge_failed(&self.ctx, save_error_text(message.text()));
            }
            LedStripStatus::LoadPartial => {
                let mut form = form_from_payload(message, "load_partial")?;
                self.lednum = common::take(&mut form, "lednum");
                self.ledpin = common::take(&mut form, "ledpin");
                self.hostname = common::take(&mut form, "hostname");
                common::announce_loaded(&self.ctx, self.name(), self.fields());
            }
        }
        Ok(())
    }

    fn set_field(&mut self, field: &str, value: &str) -> Result<(), ValidationError> {
        let slot = match field {
            "lednum" => &mut self.lednum,
            "ledpin" => &mut self.ledpin,
            "hostname" => &mut self.hostname,
            _ => {
                return Err(ValidationError::UnknownField {
                    module: "ledstrip",
                    field: field.to_owned(),
                });
            }
        };
        value.clone_into(slot);
        Ok(())
    }

    fn fields(&self) -> FormConfig {
        FormConfig::from([
            ("lednum".to_owned(), self.lednum.clone()),
            ("ledpin".to_owned(), self.ledpin.clone()),
            ("hostname".to_owned(), self.hostname.clone()),
        ])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::context::ModuleCall;
    use crate::notice::Tone;
    use crate::testing::Harness;

    #[test]
    fn count_and_pin_are_required() {
        let h = Harness::open();
        let mut strip = LedStripModule::new(h.ctx.clone());
        assert_eq!(strip.save(), Err(ValidationError::missing("lednum")));

        strip.set_field("lednum", "60").unwrap();
        assert_eq!(strip.save(), Err(ValidationError::missing("ledpin")));

        strip.set_field("ledpin", "5").unwrap();
        let form = strip.save().unwrap().unwrap();
        assert_eq!(form.len(), 2);
        assert!(!form.contains_key("hostname"));
    }

    #[test]
    fn hostname_is_sent_only_when_set() {
        let h = Harness::open();
        let mut strip = LedStripModule::new(h.ctx.clone());
        strip.set_field("lednum", "60").unwrap();
        strip.set_field("ledpin", "5").unwrap();
        strip.set_field("hostname", " next-strip ").unwrap();
        assert_eq!(strip.save().unwrap().unwrap()["hostname"], "next-strip");
    }

    #[test]
    fn device_rejection_is_translated() {
        let mut h = Harness::open();
        let mut strip = LedStripModule::new(h.ctx.clone());
        let msg = Message::response("ledstrip", "error_partial").with_data("invalid ledpin provided");
        strip.handle_response(&msg).unwrap();
        assert!(h.calls().contains(&ModuleCall::ShowSettingsStatus {
            tone: Tone::Error,
            text: "Invalid LED data pin".into(),
        }));
    }

    #[test]
    fn malformed_load_is_an_error() {
        let h = Harness::open();
        let mut strip = LedStripModule::new(h.ctx.clone());
        let msg = Message::response("ledstrip", "load_partial").with_data(42);
        assert!(strip.handle_response(&msg).is_err());
    }
}
