//! MQTT broker settings and the broker connection test.

use portal_api::Message;
use strum::EnumString;

use crate::command::ModuleAction;
use crate::context::{Context, ModuleCall};
use crate::error::{CoreError, ModuleError, ValidationError};
use crate::module::{form_from_payload, form_to_value, Capabilities, FormConfig, Module};
use crate::notice::{Notice, Tone};

use super::common;

/// How long a test outcome stays visible.
const TEST_RESULT_MS: u64 = 2500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
enum MqttStatus {
    SavedPartial,
    ErrorPartial,
    LoadPartial,
    ErrorMqtt,
    MqttTestOk,
    MqttTestError,
    MqttConnectionSuccess,
    MqttConnectionFailed,
}

pub struct MqttModule {
    ctx: Context,
    enable: bool,
    server: String,
    port: String,
    user: String,
    password: String,
    test_enabled: bool,
}

impl MqttModule {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            enable: false,
            server: String::new(),
            port: String::new(),
            user: String::new(),
            password: String::new(),
            test_enabled: true,
        }
    }

    /// Validated broker settings as sent by both save and test.
    fn partial(&self) -> Result<FormConfig, ValidationError> {
        let server = self.server.trim();
        let port = self.port.trim();
        let user = self.user.trim();
        let password = self.password.trim();

        let missing: Vec<&'static str> = [
            ("server", server),
            ("port", port),
            ("user", user),
            ("password", password),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(field, _)| field)
        .collect();
        if !missing.is_empty() {
            return Err(ValidationError::Missing { fields: missing });
        }

        // The whole value must be digits; `8080abc` is rejected, not truncated.
        let port: u16 = port
            .parse()
            .map_err(|_| ValidationError::invalid("port", "must be a number from 0 to 65535"))?;

        Ok(FormConfig::from([
            ("enable".to_owned(), self.enable.to_string()),
            ("server".to_owned(), server.to_owned()),
            ("port".to_owned(), port.to_string()),
            ("user".to_owned(), user.to_owned()),
            ("password".to_owned(), password.to_owned()),
        ]))
    }

    fn test_outcome(&self, ok: bool) {
        let text = if ok {
            "Connection established"
        } else {
            "Connection failed"
        };
        self.ctx.notify(Notice::MqttTest {
            ok,
            text: text.into(),
        });
        let tone = if ok { Tone::Success } else { Tone::Warning };
        self.ctx
            .notify(Notice::transient("mqtt", tone, text, TEST_RESULT_MS));
    }
}

fn parse_bool(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("true")
}

impl Module for MqttModule {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    fn routes(&self) -> &'static [&'static str] {
        &["mqtt"]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
            .with_save()
            .with_responses()
            .with_events()
            .with_app_start()
    }

    fn init(&mut self) -> Result<(), ModuleError> {
        self.enable = false;
        Ok(())
    }

    fn save(&mut self) -> Result<Option<FormConfig>, ValidationError> {
        self.partial().map(Some)
    }

    fn on_app_start(&self) -> Option<Message> {
        Some(common::load_request(self.name()))
    }

    fn handle_response(&mut self, message: &Message) -> Result<(), ModuleError> {
        let Some(status) = common::status_of(self.name(), message) else {
            return Ok(());
        };
        match status {
            MqttStatus::SavedPartial => common::acknowledge_saved(&self.ctx),
            MqttStatus::ErrorPartial => {
                common::acknowledge_failed(&self.ctx, common::SAVE_FAILED_TEXT);
            }
            MqttStatus::LoadPartial => {
                let mut form = form_from_payload(message, "load_partial")?;
                self.enable = form.get("enable").is_some_and(|v| parse_bool(v));
                if self.enable {
                    self.server = common::take(&mut form, "server");
                    self.port = common::take(&mut form, "port");
                    self.user = common::take(&mut form, "user");
                    self.password = common::take(&mut form, "password");
                }
                common::announce_loaded(&self.ctx, self.name(), self.fields());
            }
            MqttStatus::ErrorMqtt => {
                self.ctx
                    .notify(Notice::transient("mqtt", Tone::Error, "MQTT request failed", TEST_RESULT_MS));
            }
            MqttStatus::MqttTestOk => {
                self.ctx
                    .notify(Notice::loader("mqtt", Tone::Progress, "Connecting to broker..."));
            }
            MqttStatus::MqttTestError => self.test_outcome(false),
            MqttStatus::MqttConnectionSuccess | MqttStatus::MqttConnectionFailed => {
                return Err(ModuleError::payload(
                    message.event_name().unwrap_or_default(),
                    "expected as an event, got a response",
                ));
            }
        }
        Ok(())
    }

    fn handle_event(&mut self, message: &Message) -> Result<(), ModuleError> {
        match common::status_of(self.name(), message) {
            Some(MqttStatus::MqttConnectionSuccess) => self.test_outcome(true),
            Some(MqttStatus::MqttConnectionFailed) => self.test_outcome(false),
            _ => {}
        }
        Ok(())
    }

    fn handle_call(&mut self, call: ModuleCall) -> Result<(), ModuleError> {
        match call {
            ModuleCall::SetMqttTestEnabled(enabled) => {
                self.test_enabled = enabled;
                self.ctx.notify(Notice::ControlsEnabled {
                    module: "mqtt",
                    enabled,
                });
                Ok(())
            }
            other => Err(ModuleError::UnsupportedCall {
                module: "mqtt",
                call: format!("{other:?}"),
            }),
        }
    }

    fn perform(&mut self, action: ModuleAction) -> Result<(), CoreError> {
        if !matches!(action, ModuleAction::MqttTest) {
            return Err(CoreError::Unsupported {
                module: "mqtt".into(),
                operation: action.to_string(),
            });
        }
        if !self.test_enabled {
            return Err(ValidationError::Rejected(
                "the broker test needs internet access".into(),
            )
            .into());
        }

        let partial = self.partial()?;
        let request = Message::request("mqtt", "test_connection").with_data(form_to_value(&partial));
        if !self.ctx.send(request) {
            return Err(CoreError::NotSent {
                what: "MQTT test".into(),
            });
        }
        self.ctx
            .notify(Notice::loader("mqtt", Tone::Progress, "Connecting to broker..."));
        Ok(())
    }

    fn set_field(&mut self, field: &str, value: &str) -> Result<(), ValidationError> {
        match field {
            "enable" => self.enable = parse_bool(value),
            "server" => value.clone_into(&mut self.server),
            "port" => value.clone_into(&mut self.port),
            "user" => value.clone_into(&mut self.user),
            "password" => value.clone_into(&mut self.password),
            _ => {
                return Err(ValidationError::UnknownField {
                    module: "mqtt",
                    field: field.to_owned(),
                });
            }
        }
        Ok(())
    }

    fn fields(&self) -> FormConfig {
        let password = if self.password.is_empty() { "" } else { "********" };
        FormConfig::from([
            ("enable".to_owned(), self.enable.to_string()),
            ("server".to_owned(), self.server.clone()),
            ("port".to_owned(), self.port.clone()),
            ("user".to_owned(), self.user.clone()),
            ("password".to_owned(), password.to_owned()),
            ("test_enabled".to_owned(), self.test_enabled.to_string()),
        ])
    }
}
