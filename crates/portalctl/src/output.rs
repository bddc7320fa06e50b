//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.
//! Notices streamed by `watch` get a single colored line each.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use portal_core::{Notice, Tone};
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

fn paint(tone: Tone, text: &str, color: bool) -> String {
    if !color {
        return text.to_owned();
    }
    match tone {
        Tone::Progress => text.cyan().to_string(),
        Tone::Info => text.blue().to_string(),
        Tone::Success => text.green().to_string(),
        Tone::Warning => text.yellow().to_string(),
        Tone::Error => text.red().bold().to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses a custom `detail_fn` that returns a pre-formatted
/// string, since single-item detail views don't use `Tabled` derive.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => id_fn(data),
    }
}

/// One line per notice. Structured formats emit compact JSON lines so the
/// stream stays parseable.
pub fn render_notice(format: OutputFormat, notice: &Notice, color: bool) -> Option<String> {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => {
            Some(render_json(notice, true))
        }
        OutputFormat::Table | OutputFormat::Plain => describe_notice(notice, color),
    }
}

fn describe_notice(notice: &Notice, color: bool) -> Option<String> {
    let line = match notice {
        Notice::Connection { state } => format!(
            "connection: {}",
            serde_json::to_value(state)
                .ok()
                .and_then(|v| v.get("state").and_then(|s| s.as_str()).map(str::to_owned))
                .unwrap_or_default()
        ),
        Notice::ConnectionLost => paint(Tone::Error, "connection lost; reload required", color),
        Notice::Loader {
            module, tone, text, ..
        } => format!("{module}: {}", paint(*tone, text, color)),
        Notice::SettingsStatus { tone, text, .. } => format!("settings: {}", paint(*tone, text, color)),
        // Spinner state is noise on a terminal stream.
        Notice::SaveButton { .. } | Notice::ControlsEnabled { .. } => return None,
        Notice::Workflow { workflow, from, to } => format!("{workflow}: {from} -> {to}"),
        Notice::ScanResults { networks } => {
            let names: Vec<&str> = networks.iter().map(|n| n.ssid.as_str()).collect();
            format!("wifi: {} networks ({})", networks.len(), names.join(", "))
        }
        Notice::Link { status: Some(link) } => format!(
            "wifi: linked to {} as {} (internet: {})",
            link.ssid,
            link.ip,
            if link.ethernet { "yes" } else { "no" }
        ),
        Notice::Link { status: None } => "wifi: not linked".into(),
        Notice::FormLoaded { module, fields } => {
            let pairs: Vec<String> = fields.iter().map(|(k, v)| format!("{k}={v}")).collect();
            format!("{module}: loaded {}", pairs.join(" "))
        }
        Notice::MqttTest { ok, text } => {
            let tone = if *ok { Tone::Success } else { Tone::Error };
            format!("mqtt: {}", paint(tone, text, color))
        }
    };
    Some(line)
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

/// Print a status line to stderr, respecting quiet mode.
pub fn print_status(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{message}");
    }
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| format!("error: {e}"))
}
