//! Config subcommand handlers.

use std::io::IsTerminal;

use dialoguer::Input;
use portal_api::endpoint::FALLBACK_HOST;
use portal_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init ────────────────────────────────────────────────────
        ConfigCommand::Init { force } => {
            let path = portal_config::config_path();
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }

            // --device skips the prompt; so does a non-interactive stdin.
            let device = match &global.device {
                Some(device) => device.clone(),
                None if std::io::stdin().is_terminal() => Input::new()
                    .with_prompt("Portal address")
                    .default(format!("http://{FALLBACK_HOST}"))
                    .interact_text()
                    .map_err(prompt_err)?,
                None => format!("http://{FALLBACK_HOST}"),
            };

            let cfg = Config::for_device(&device);
            // Fail now rather than on first use.
            let (name, profile) = cfg.resolve_profile(None)?;
            portal_config::profile_to_session_config(&profile, &name)?;

            let path = portal_config::save_config(&cfg)?;
            output::print_status(
                &format!("Configuration written to {}", path.display()),
                global.quiet,
            );
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = portal_config::load_config()?;
            let out = output::render_single(
                global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("{c:#?}\n# {e}")),
                |c| c.profiles.keys().cloned().collect::<Vec<_>>().join("\n"),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            output::print_output(
                &portal_config::config_path().display().to_string(),
                global.quiet,
            );
            Ok(())
        }
    }
}
