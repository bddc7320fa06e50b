//! Live notice stream.

use portal_core::Notice;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let mut device = util::connect(global).await?;
    let color = output::should_color(global.color);
    output::print_status(
        &format!("Connected to {} (Ctrl-C to stop)", device.endpoint),
        global.quiet,
    );

    let result = loop {
        let notice = tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            notice = device.recv() => notice,
        };
        let notice = match notice {
            Ok(notice) => notice,
            Err(e) => break Err(e),
        };

        if let Some(line) = output::render_notice(global.output, &notice, color) {
            output::print_output(&line, global.quiet);
        }
        if notice == Notice::ConnectionLost {
            break Err(CliError::ConnectionLost {
                attempts: device.max_attempts(),
            });
        }
    };

    device.close().await;
    result
}
