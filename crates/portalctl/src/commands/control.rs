//! System control handlers.

use portal_core::{Command as CoreCommand, ControlAction, ModuleAction};

use crate::cli::{ControlArgs, ControlCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(args: ControlArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let prompt = match args.command {
        ControlCommand::Reset => Some("Factory reset the device? Every setting will be erased."),
        ControlCommand::Reboot => Some("Reboot the device?"),
        ControlCommand::Logout => None,
    };
    let action = ControlAction::from(args.command);
    if let Some(prompt) = prompt {
        if !util::confirm(prompt, &action.to_string(), global.yes)? {
            return Ok(());
        }
    }

    let device = util::connect(global).await?;
    let result = device
        .execute(CoreCommand::Perform(ModuleAction::Control(action)))
        .await;
    device.close().await;
    result?;

    let done = match action {
        ControlAction::Reset => "Factory reset requested",
        ControlAction::Reboot => "Reboot requested",
        ControlAction::Logout => "Signed out",
    };
    output::print_status(done, global.quiet);
    Ok(())
}
