//! Visual styling utilities for the CLI.
//!
//! Spinners for the phases of a transaction and colored status lines on
//! stderr.

use std::time::Duration;

use btcmd_core::SessionStateKind;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

/// Standard spinner tick characters (Braille dots animation)
const SPINNER_TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Standard spinner tick interval
const SPINNER_TICK_MS: u64 = 80;

/// Get the standard spinner style.
fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(SPINNER_TICK_CHARS)
}

/// Create a spinner for a running transaction.
pub fn transaction_spinner(scan_secs: u64) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.set_message(format!("Waiting for the Bluetooth radio... ({}s scan)", scan_secs));
    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
    pb
}

/// Spinner message for a session phase.
pub fn phase_message(state: SessionStateKind) -> Option<&'static str> {
    match state {
        SessionStateKind::Idle => None,
        SessionStateKind::Scanning => Some("Scanning for provisioning peripherals..."),
        SessionStateKind::Connecting => Some("Connecting..."),
        SessionStateKind::DiscoveringServices => Some("Discovering services..."),
        SessionStateKind::DiscoveringCharacteristics => Some("Discovering characteristics..."),
        SessionStateKind::Writing => Some("Writing command..."),
        SessionStateKind::AwaitingResponses => Some("Reading response..."),
        SessionStateKind::Disconnecting => Some("Disconnecting..."),
    }
}

/// Print a message while suspending a spinner to prevent visual glitches.
/// If no spinner is provided, just prints normally.
pub fn print_suspended(spinner: Option<&ProgressBar>, message: &str) {
    if let Some(pb) = spinner {
        pb.suspend(|| {
            eprintln!("{}", message);
        });
    } else {
        eprintln!("{}", message);
    }
}

/// Format an informational status line.
pub fn info(message: &str, no_color: bool) -> String {
    if no_color {
        message.to_string()
    } else {
        message.dimmed().to_string()
    }
}

/// Format a success status line.
pub fn success(message: &str, no_color: bool) -> String {
    if no_color {
        message.to_string()
    } else {
        message.green().to_string()
    }
}

/// Format a warning line.
pub fn warning(message: &str, no_color: bool) -> String {
    if no_color {
        format!("Warning: {}", message)
    } else {
        format!("{} {}", "Warning:".yellow().bold(), message)
    }
}
