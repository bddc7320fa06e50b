//! Clap derive structures for the `portalctl` CLI.
//!
//! Defines the command tree, global flags, and shared value types.

use clap::{Args, Parser, Subcommand, ValueEnum};
use portal_core::ControlAction;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// portalctl -- drive a device configuration portal from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "portalctl",
    version,
    about = "Configure portal devices from the command line",
    long_about = "Talks to the configuration portal of an embedded device over its\n\
        WebSocket channel: join WiFi networks, save settings, run maintenance\n\
        actions, and watch what the device reports.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Device profile to use
    #[arg(long, short = 'p', env = "PORTAL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Portal address, e.g. http://192.168.4.1 (overrides profile)
    #[arg(long, short = 'd', env = "PORTAL_DEVICE", global = true)]
    pub device: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "PORTAL_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Seconds to wait for the device (overrides profile)
    #[arg(long, env = "PORTAL_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stay connected and print everything the device reports
    Watch,

    /// Scan for and join WiFi networks
    #[command(alias = "w")]
    Wifi(WifiArgs),

    /// Validate and save a settings form
    Save(SaveArgs),

    /// Reset, reboot, or sign out of the device
    Control(ControlArgs),

    /// MQTT broker tools
    Mqtt(MqttArgs),

    /// Firmware updates
    Update(UpdateArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── WiFi ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WifiArgs {
    #[command(subcommand)]
    pub command: WifiCommand,
}

#[derive(Debug, Subcommand)]
pub enum WifiCommand {
    /// List nearby networks, strongest first
    Scan,

    /// Join a network
    Connect {
        /// Network name
        ssid: String,

        /// Network password (prompted when omitted on a terminal)
        #[arg(long, env = "PORTAL_WIFI_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Leave the current network
    Disconnect,

    /// Show the station link and stored WiFi settings
    Status,

    /// Turn standalone mode on or off
    Standalone {
        #[arg(value_enum)]
        mode: Toggle,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        self == Self::On
    }
}

// ── Save ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SaveArgs {
    /// Module whose form is saved (device, ledstrip, network, apoint, mqtt)
    pub module: String,

    /// Field assignments applied before saving
    #[arg(long = "set", short = 's', value_name = "KEY=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(String, String)>,
}

/// Parse a `key=value` pair. The value may be empty.
pub fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_owned(), value.to_owned()))
}

// ── Control ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ControlArgs {
    #[command(subcommand)]
    pub command: ControlCommand,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ControlCommand {
    /// Factory reset: wipe every setting and restart
    Reset,
    /// Restart the device
    Reboot,
    /// Stop the portal
    Logout,
}

impl From<ControlCommand> for ControlAction {
    fn from(cmd: ControlCommand) -> Self {
        match cmd {
            ControlCommand::Reset => Self::Reset,
            ControlCommand::Reboot => Self::Reboot,
            ControlCommand::Logout => Self::Logout,
        }
    }
}

// ── MQTT ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct MqttArgs {
    #[command(subcommand)]
    pub command: MqttCommand,
}

#[derive(Debug, Subcommand)]
pub enum MqttCommand {
    /// Ask the device to connect to the broker with the current settings
    Test {
        /// Override stored settings for this test
        #[arg(long = "set", short = 's', value_name = "KEY=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
    },
}

// ── Update ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct UpdateArgs {
    #[command(subcommand)]
    pub command: UpdateCommand,
}

#[derive(Debug, Subcommand)]
pub enum UpdateCommand {
    /// Start a firmware update
    Start {
        /// Update code from the release notes
        code: String,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create the config file with a default profile
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display current resolved configuration
    Show,

    /// Print the config file location
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
