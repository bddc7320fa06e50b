//! MQTT command handlers.

use portal_core::{Command as CoreCommand, ModuleAction, Notice};

use crate::cli::{GlobalOpts, MqttArgs, MqttCommand};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(args: MqttArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let MqttCommand::Test { set } = args.command;

    let mut device = util::connect(global).await?;
    device.wait_loaded("mqtt").await;

    let result = async {
        device.set_fields("mqtt", &set).await?;
        device
            .execute(CoreCommand::Perform(ModuleAction::MqttTest))
            .await?;
        let budget = device.timeout;
        device
            .wait_for(budget, "the broker test", |n| match n {
                Notice::MqttTest { ok, text } => Some((*ok, text.clone())),
                _ => None,
            })
            .await
    }
    .await;
    device.close().await;

    let (ok, text) = result?;
    if !ok {
        return Err(CliError::Device {
            action: "MQTT test".into(),
            message: text,
        });
    }
    output::print_status(&text, global.quiet);
    Ok(())
}
