//! Shared helpers for command handlers: opening a session on the selected
//! device, waiting on notices, and confirmation prompts.

use std::io::IsTerminal;
use std::time::Duration;

use portal_config::ConfigError;
use portal_core::{Command as CoreCommand, CommandResult, Notice, SessionHandle, WorkflowTimings};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Extra time on top of a device-side deadline before the CLI gives up.
const SLACK: Duration = Duration::from_secs(3);

/// How long to wait for stored settings after the device is ready.
const LOAD_WAIT: Duration = Duration::from_secs(3);

/// An open, ready session on one device.
pub struct Device {
    session: SessionHandle,
    notices: broadcast::Receiver<Notice>,
    pub endpoint: String,
    pub timings: WorkflowTimings,
    pub timeout: Duration,
    max_attempts: u32,
}

/// Resolve the profile, apply flag overrides, connect, and wait until the
/// device reports ready.
pub async fn connect(global: &GlobalOpts) -> Result<Device, CliError> {
    let cfg = portal_config::load_config()?;
    let (name, mut profile) = cfg
        .resolve_profile(global.profile.as_deref())
        .map_err(|e| match e {
            ConfigError::UnknownProfile { name } => {
                let available: Vec<_> = cfg.profiles.keys().cloned().collect();
                CliError::ProfileNotFound {
                    name,
                    available: if available.is_empty() {
                        "(none)".into()
                    } else {
                        available.join(", ")
                    },
                }
            }
            other => other.into(),
        })?;

    // --device replaces the whole address, including any explicit endpoint.
    if let Some(device) = &global.device {
        profile.device.clone_from(device);
        profile.endpoint = None;
    }

    let config = portal_config::profile_to_session_config(&profile, &name)?;
    let timeout = global
        .timeout
        .map_or_else(|| profile.ready_timeout(&cfg.defaults), Duration::from_secs);
    let endpoint = config.endpoint.to_string();
    let timings = config.timings.clone();
    let max_attempts = config.reconnect.max_attempts;

    tracing::info!(profile = %name, %endpoint, "connecting to portal");
    let session = SessionHandle::start(config)?;
    let notices = session.notices();

    if let Err(err) = session.wait_ready(timeout).await {
        session.shutdown().await;
        return Err(match err {
            portal_core::CoreError::ConnectionLost { attempts } => CliError::ConnectionFailed {
                url: endpoint,
                reason: format!("no answer after {attempts} attempts"),
            },
            other => other.into(),
        });
    }

    Ok(Device {
        session,
        notices,
        endpoint,
        timings,
        timeout,
        max_attempts,
    })
}

impl Device {
    pub async fn execute(&self, command: CoreCommand) -> Result<CommandResult, CliError> {
        Ok(self.session.execute(command).await?)
    }

    /// Set form fields one by one. The first rejected value stops.
    pub async fn set_fields(&self, module: &str, fields: &[(String, String)]) -> Result<(), CliError> {
        for (field, value) in fields {
            self.execute(CoreCommand::SetField {
                module: module.to_owned(),
                field: field.clone(),
                value: value.clone(),
            })
            .await?;
        }
        Ok(())
    }

    /// Read notices until `pick` returns a value or `budget` runs out.
    ///
    /// A terminal connection loss ends the wait with an error.
    pub async fn wait_for<T>(
        &mut self,
        budget: Duration,
        what: &str,
        mut pick: impl FnMut(&Notice) -> Option<T>,
    ) -> Result<T, CliError> {
        let deadline = Instant::now() + budget;
        loop {
            let notice = match tokio::time::timeout_at(deadline, self.notices.recv()).await {
                Err(_) => {
                    return Err(CliError::Timeout {
                        seconds: budget.as_secs(),
                        what: what.to_owned(),
                    });
                }
                Ok(Err(RecvError::Lagged(skipped))) => {
                    tracing::warn!(skipped, "notice stream lagged");
                    continue;
                }
                Ok(Err(RecvError::Closed)) => return Err(CliError::SessionClosed),
                Ok(Ok(notice)) => notice,
            };

            tracing::debug!(?notice, "notice");
            if notice == Notice::ConnectionLost {
                return Err(CliError::ConnectionLost {
                    attempts: self.max_attempts,
                });
            }
            if let Some(found) = pick(&notice) {
                return Ok(found);
            }
        }
    }

    /// Next notice, however long it takes.
    pub async fn recv(&mut self) -> Result<Notice, CliError> {
        loop {
            match self.notices.recv().await {
                Ok(notice) => return Ok(notice),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notice stream lagged");
                }
                Err(RecvError::Closed) => return Err(CliError::SessionClosed),
            }
        }
    }

    /// Wait briefly for the device to push a module's stored settings.
    /// Returns `false` if they did not arrive in time.
    pub async fn wait_loaded(&mut self, module: &str) -> bool {
        let loaded = self
            .wait_for(LOAD_WAIT, "stored settings", |n| {
                matches!(n, Notice::FormLoaded { module: m, .. } if *m == module).then_some(())
            })
            .await;
        if loaded.is_err() {
            tracing::debug!(module, "stored settings did not arrive");
        }
        loaded.is_ok()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `deadline` plus the CLI's grace period.
    pub fn budget(&self, deadline: Duration) -> Duration {
        deadline + SLACK
    }

    pub async fn close(self) {
        self.session.shutdown().await;
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.to_owned(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e.to_string())))?;
    Ok(confirmed)
}
