//! Firmware update handler.

use portal_core::{Command as CoreCommand, ModuleAction};

use crate::cli::{GlobalOpts, UpdateArgs, UpdateCommand};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(args: UpdateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let UpdateCommand::Start { code } = args.command;

    let device = util::connect(global).await?;
    let result = device
        .execute(CoreCommand::Perform(ModuleAction::StartUpdate { code }))
        .await;
    device.close().await;
    result?;

    output::print_status("Update started; the device restarts when it finishes", global.quiet);
    Ok(())
}
