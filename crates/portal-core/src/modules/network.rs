//! Station addressing: DHCP or a static IPv4 configuration.

use portal_api::Message;
use strum::{EnumString, IntoStaticStr};

use crate::context::{Context, ModuleCall};
use crate::error::{ModuleError, ValidationError};
use crate::module::{form_from_payload, Capabilities, FormConfig, Module};

use super::common;

const DEFAULT_IP: &str = "192.168.0.1";
const DEFAULT_NETMASK: &str = "255.255.255.0";
const DEFAULT_GATEWAY: &str = "192.168.1.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum AddressMode {
    #[default]
    Dhcp,
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
enum NetworkStatus {
    SavedPartial,
    ErrorPartial,
    LoadPartial,
}

pub struct NetworkModule {
    ctx: Context,
    mode: AddressMode,
    ip: String,
    netmask: String,
    gateway: String,
}

impl NetworkModule {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            mode: AddressMode::Dhcp,
            ip: String::new(),
            netmask: String::new(),
            gateway: String::new(),
        }
    }

    pub fn mode(&self) -> AddressMode {
        self.mode
    }
}

/// Dotted-quad IPv4: four decimal octets 0-255 without leading zeros.
pub fn is_valid_ipv4(text: &str) -> bool {
    let parts: Vec<&str> = text.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|part| {
            !part.is_empty()
                && part.bytes().all(|b| b.is_ascii_digit())
                && part
                    .parse::<u8>()
                    .is_ok_and(|octet| octet.to_string() == *part)
        })
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    let value = value.trim();
    if value.is_empty() { default } else { value }
}

impl Module for NetworkModule {
    fn name(&self) -> &'static str {
        "network"
    }

    fn routes(&self) -> &'static [&'static str] {
        &["network", "device_network"]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
            .with_save()
            .with_responses()
            .with_app_start()
    }

    fn init(&mut self) -> Result<(), ModuleError> {
        self.mode = AddressMode::Dhcp;
        Ok(())
    }

    fn save(&mut self) -> Result<Option<FormConfig>, ValidationError> {
        if self.mode == AddressMode::Static {
            for (field, value) in [
                ("ip", &self.ip),
                ("netmask", &self.netmask),
                ("gateway", &self.gateway),
            ] {
                if !is_valid_ipv4(value.trim()) {
                    return Err(ValidationError::invalid(field, "expected a dotted IPv4 address"));
                }
            }
        }

        let mode: &'static str = self.mode.into();
        Ok(Some(FormConfig::from([
            ("mode".to_owned(), mode.to_owned()),
            ("ip".to_owned(), or_default(&self.ip, DEFAULT_IP).to_owned()),
            (
                "netmask".to_owned(),
                or_default(&self.netmask, DEFAULT_NETMASK).to_owned(),
            ),
            (
                "gateway".to_owned(),
                or_default(&self.gateway, DEFAULT_GATEWAY).to_owned(),
            ),
        ])))
    }

    fn on_app_start(&self) -> Option<Message> {
        Some(common::load_request(self.name()))
    }

    fn handle_response(&mut self, message: &Message) -> Result<(), ModuleError> {
        let Some(status) = common::status_of(self.name(), message) else {
            return Ok(());
        };
        match status {
            NetworkStatus::SavedPartial => common::acknowledge_saved(&self.ctx),
            NetworkStatus::ErrorPartial => {
                common::acknowledge_failed(&self.ctx, common::SAVE_FAILED_TEXT);
            }
            NetworkStatus::LoadPartial => {
                let mut form = form_from_payload(message, "load_partial")?;
                self.mode = form
                    .get("mode")
                    .and_then(|m| m.parse().ok())
                    .unwrap_or_default();
                if self.mode == AddressMode::Static {
                    self.ip = common::take(&mut form, "ip");
                    self.netmask = common::take(&mut form, "netmask");
                    self.gateway = common::take(&mut form, "gateway");
                }
                common::announce_loaded(&self.ctx, self.name(), self.fields());
            }
        }
        Ok(())
    }

    fn handle_call(&mut self, call: ModuleCall) -> Result<(), ModuleError> {
        match call {
            ModuleCall::SetNetworkValue {
                ip,
                netmask,
                gateway,
            } => {
                self.ip = ip;
                self.netmask = netmask;
                self.gateway = gateway;
                Ok(())
            }
            other => Err(ModuleError::UnsupportedCall {
                module: "network",
                call: format!("{other:?}"),
            }),
        }
    }

    fn set_field(&mut self, field: &str, value: &str) -> Result<(), ValidationError> {
        match field {
            "mode" => {
                self.mode = value
                    .trim()
                    .parse()
                    .map_err(|_| ValidationError::invalid("mode", "expected dhcp or static"))?;
            }
            "ip" => value.clone_into(&mut self.ip),
            "netmask" => value.clone_into(&mut self.netmask),
            "gateway" => value.clone_into(&mut self.gateway),
            _ => {
                return Err(ValidationError::UnknownField {
                    module: "network",
                    field: field.to_owned(),
                });
            }
        }
        Ok(())
    }

    fn fields(&self) -> FormConfig {
        let mode: &'static str = self.mode.into();
        FormConfig::from([
            ("mode".to_owned(), mode.to_owned()),
            ("ip".to_owned(), self.ip.clone()),
            ("netmask".to_owned(), self.netmask.clone()),
            ("gateway".to_owned(), self.gateway.clone()),
        ])
    }
}
