//! WiFi command handlers.

use std::io::IsTerminal;

use portal_core::{
    AccessPoint, Command as CoreCommand, CommandResult, ModuleAction, Notice, Tone,
    WifiCommand as CoreWifi,
};
use secrecy::SecretString;
use tabled::Tabled;

use crate::cli::{GlobalOpts, WifiArgs, WifiCommand};
use crate::error::CliError;
use crate::output;

use super::util::{self, Device};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct NetworkRow {
    #[tabled(rename = "SSID")]
    ssid: String,
    #[tabled(rename = "Signal")]
    signal: String,
    #[tabled(rename = "Channel")]
    channel: String,
    #[tabled(rename = "Security")]
    security: String,
}

impl From<&AccessPoint> for NetworkRow {
    fn from(ap: &AccessPoint) -> Self {
        Self {
            ssid: ap.ssid.clone(),
            signal: format!("{} dBm", ap.rssi),
            channel: ap.channel.map_or_else(|| "-".into(), |c| c.to_string()),
            security: if ap.is_open() {
                "open".into()
            } else {
                ap.authmode.clone().unwrap_or_else(|| "-".into())
            },
        }
    }
}

fn perform(cmd: CoreWifi) -> CoreCommand {
    CoreCommand::Perform(ModuleAction::Wifi(cmd))
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: WifiArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut device = util::connect(global).await?;
    let result = run(&mut device, args.command, global).await;
    device.close().await;
    result
}

async fn run(device: &mut Device, cmd: WifiCommand, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        WifiCommand::Scan => {
            device.execute(perform(CoreWifi::Scan)).await?;
            let budget = device.budget(device.timings.scan_timeout);
            let networks = device
                .wait_for(budget, "scan results", |n| match n {
                    Notice::ScanResults { networks } => Some(Ok(networks.clone())),
                    // An empty scan goes straight back to idle.
                    Notice::Workflow {
                        from: "ap_scan",
                        to: "idle",
                        ..
                    } => Some(Ok(Vec::new())),
                    Notice::Workflow {
                        to: "ap_scan_error",
                        ..
                    } => Some(Err(())),
                    _ => None,
                })
                .await?
                .map_err(|()| CliError::Device {
                    action: "WiFi scan".into(),
                    message: "the device did not finish scanning".into(),
                })?;

            if networks.is_empty() {
                output::print_status("No networks found", global.quiet);
            }
            let out = output::render_list(
                global.output,
                &networks,
                |n| NetworkRow::from(n),
                |n| n.ssid.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        WifiCommand::Connect { ssid, password } => {
            let password = match password {
                Some(p) => p,
                None if std::io::stdin().is_terminal() => dialoguer::Password::new()
                    .with_prompt(format!("Password for {ssid}"))
                    .allow_empty_password(true)
                    .interact()
                    .map_err(|e| CliError::Io(std::io::Error::other(e.to_string())))?,
                None => String::new(),
            };

            device
                .execute(perform(CoreWifi::Connect {
                    ssid: ssid.clone(),
                    password: SecretString::from(password),
                }))
                .await?;
            output::print_status(&format!("Connecting to {ssid}..."), global.quiet);

            let t = &device.timings;
            let budget = device.budget(t.connect_timeout + t.wait_ip_timeout + t.check_eth_timeout);
            let mut reason: Option<String> = None;
            let outcome = device
                .wait_for(budget, "the WiFi connection", |n| match n {
                    Notice::Loader {
                        module: "wifi",
                        tone: Tone::Error,
                        text,
                        ..
                    } => {
                        reason = Some(text.clone());
                        None
                    }
                    Notice::Link { status: Some(link) } => Some(Ok(link.clone())),
                    Notice::Workflow {
                        to: "ap_connect_error" | "ap_disconnected",
                        ..
                    } => Some(Err(())),
                    _ => None,
                })
                .await?;

            let link = outcome.map_err(|()| CliError::Device {
                action: format!("Joining {ssid}"),
                message: reason.unwrap_or_else(|| "Could not connect".into()),
            })?;
            let out = output::render_single(
                global.output,
                &link,
                |l| {
                    format!(
                        "Connected to {}\nIP:       {}\nGateway:  {}\nNetmask:  {}\nInternet: {}",
                        l.ssid,
                        l.ip,
                        l.gateway,
                        l.netmask,
                        if l.ethernet { "yes" } else { "no" }
                    )
                },
                |l| l.ip.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        WifiCommand::Disconnect => {
            device.execute(perform(CoreWifi::Disconnect)).await?;
            let budget = device.budget(device.timings.disconnect_timeout);
            let done = device
                .wait_for(budget, "the disconnect", |n| match n {
                    Notice::Workflow {
                        to: "ap_disconnected",
                        ..
                    } => Some(true),
                    Notice::Workflow {
                        to: "ap_disconnect_error",
                        ..
                    } => Some(false),
                    _ => None,
                })
                .await?;
            if !done {
                return Err(CliError::Device {
                    action: "WiFi disconnect".into(),
                    message: "the device did not confirm".into(),
                });
            }
            output::print_status("Disconnected", global.quiet);
            Ok(())
        }

        WifiCommand::Status => {
            device.wait_loaded("wifi").await;
            device.execute(perform(CoreWifi::RefreshStatus)).await?;
            let budget = device.budget(device.timings.check_eth_timeout);
            if device
                .wait_for(budget, "the link status", |n| {
                    matches!(n, Notice::Link { .. }).then_some(())
                })
                .await
                .is_err()
            {
                tracing::warn!("device did not report its link status");
            }

            let CommandResult::Snapshot(snapshot) = device.execute(CoreCommand::Snapshot).await? else {
                return Err(CliError::Internal("snapshot returned no data".into()));
            };
            let fields = snapshot
                .modules
                .into_iter()
                .find(|m| m.name == "wifi")
                .map(|m| m.fields)
                .unwrap_or_default();

            let out = output::render_single(
                global.output,
                &fields,
                |f| {
                    f.iter()
                        .map(|(k, v)| format!("{:<10} {v}", format!("{k}:")))
                        .collect::<Vec<_>>()
                        .join("\n")
                },
                |f| f.get("state").cloned().unwrap_or_default(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        WifiCommand::Standalone { mode } => {
            device
                .execute(perform(CoreWifi::SetStandalone(mode.enabled())))
                .await?;
            // The wifi module acknowledges on its own loader line.
            let budget = device.timeout;
            let (tone, text) = device
                .wait_for(budget, "the device to confirm", |n| match n {
                    Notice::Loader {
                        module: "wifi",
                        tone: tone @ (Tone::Success | Tone::Error),
                        text,
                        dismiss_after_ms: Some(_),
                    } => Some((*tone, text.clone())),
                    _ => None,
                })
                .await?;
            if tone == Tone::Error {
                return Err(CliError::Device {
                    action: "Standalone mode".into(),
                    message: text,
                });
            }
            output::print_status(&text, global.quiet);
            Ok(())
        }
    }
}
