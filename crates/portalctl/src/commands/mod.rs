//! Command dispatch: bridges CLI args -> session commands -> output formatting.

pub mod config_cmd;
pub mod control;
pub mod mqtt;
pub mod save;
pub mod update;
pub mod util;
pub mod watch;
pub mod wifi;

use portal_core::{Notice, Tone};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output;

use self::util::Device;

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Watch => watch::handle(global).await,
        Command::Wifi(args) => wifi::handle(args, global).await,
        Command::Save(args) => save::handle(args, global).await,
        Command::Control(args) => control::handle(args, global).await,
        Command::Mqtt(args) => mqtt::handle(args, global).await,
        Command::Update(args) => update::handle(args, global).await,
        Command::Config(args) => config_cmd::handle(args, global),
        Command::Completions(_) => Err(CliError::Internal(
            "completions are generated before dispatch".into(),
        )),
    }
}

/// Wait for the device to acknowledge a `save_partial` through the shared
/// settings banner. Informational banners are skipped.
async fn await_settings_status(
    device: &mut Device,
    action: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let budget = device.timeout;
    let (tone, text) = device
        .wait_for(budget, "the device to confirm", |n| match n {
            Notice::SettingsStatus { tone, text, .. } if *tone != Tone::Info => {
                Some((*tone, text.clone()))
            }
            _ => None,
        })
        .await?;

    if tone == Tone::Error {
        return Err(CliError::Device {
            action: action.to_owned(),
            message: text,
        });
    }
    output::print_status(&text, global.quiet);
    Ok(())
}
