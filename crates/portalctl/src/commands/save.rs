//! Settings form handler.

use portal_core::{Command as CoreCommand, CommandResult};

use crate::cli::{GlobalOpts, SaveArgs};
use crate::error::CliError;
use crate::output;

use super::util::{self, Device};

pub async fn handle(args: SaveArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut device = util::connect(global).await?;
    let result = run(&mut device, args, global).await;
    device.close().await;
    result
}

async fn run(device: &mut Device, args: SaveArgs, global: &GlobalOpts) -> Result<(), CliError> {
    // Fields not given on the command line keep the values stored on the
    // device, so wait for those before overwriting anything.
    if !device.wait_loaded(&args.module).await {
        tracing::info!(module = %args.module, "saving without stored settings");
    }
    device.set_fields(&args.module, &args.set).await?;

    let result = device
        .execute(CoreCommand::Save {
            module: args.module.clone(),
        })
        .await?;

    match result {
        CommandResult::Saved { sent: false } => {
            output::print_status("Nothing to save", global.quiet);
            Ok(())
        }
        _ => super::await_settings_status(device, &format!("Saving {}", args.module), global).await,
    }
}
