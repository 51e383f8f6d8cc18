//! Output formatting for text and JSON.

use anyhow::Result;
use btcmd_core::{
    FinishedOutcome, Response, ServiceDescriptor, SessionEvent, TransactionError,
    TransactionReport,
};
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::cli::OutputFormat;

/// Formatting options for output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    /// Use compact JSON output (no pretty-printing).
    pub compact: bool,
}

impl FormatOptions {
    pub fn new(no_color: bool) -> Self {
        Self {
            no_color,
            compact: false,
        }
    }

    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    /// Serialize a value as JSON, honoring the compact option.
    pub fn as_json<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.compact {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        Ok(json + "\n")
    }
}

/// Display label for a characteristic under the descriptor in use.
fn characteristic_label(descriptor: &ServiceDescriptor, response: &Response) -> String {
    let name = descriptor.name_of(&response.characteristic);
    if name == "unknown" {
        response.characteristic.to_string()
    } else {
        name.to_string()
    }
}

/// Printable form of a response; falls back to hex for binary payloads.
pub fn format_response_value(response: &Response) -> String {
    let bytes = response.payload.as_bytes();
    match std::str::from_utf8(bytes) {
        Ok(text) if !text.chars().any(|c| c.is_control() && c != '\n' && c != '\t') => {
            format!("{:?}", text)
        }
        _ => format!("0x{}", response.payload.to_hex()),
    }
}

pub fn format_report_text(
    report: &TransactionReport,
    descriptor: &ServiceDescriptor,
    opts: &FormatOptions,
) -> String {
    let mut out = String::new();
    let peripheral = report.peripheral.as_deref().unwrap_or("unknown peripheral");
    let header = format!("Transaction {} completed via {}", report.transaction, peripheral);
    if opts.no_color {
        out.push_str(&header);
    } else {
        out.push_str(&header.green().to_string());
    }
    out.push('\n');

    if report.responses.is_empty() {
        out.push_str("  (no response characteristic)\n");
    }
    for response in &report.responses {
        let label = characteristic_label(descriptor, response);
        let label = if opts.no_color {
            label
        } else {
            label.cyan().to_string()
        };
        out.push_str(&format!(
            "  {}: {} ({} bytes)\n",
            label,
            format_response_value(response),
            response.payload.len()
        ));
    }
    out
}

pub fn format_report_json(report: &TransactionReport, opts: &FormatOptions) -> Result<String> {
    opts.as_json(&FinishedOutcome::Completed {
        report: report.clone(),
    })
}

pub fn format_error_text(error: &TransactionError, opts: &FormatOptions) -> String {
    let message = format!("Transaction failed: {}", error);
    let hint = match error {
        TransactionError::ScanTimeout { .. } => {
            Some("Make sure the peripheral is powered on, in range and advertising.")
        }
        TransactionError::RadioUnavailable { .. } => {
            Some("Turn Bluetooth on and grant this program Bluetooth access.")
        }
        TransactionError::CharacteristicDiscoveryFailed { .. } => {
            Some("The peripheral does not expose the command characteristic.")
        }
        _ => None,
    };

    let mut out = if opts.no_color {
        message
    } else {
        message.red().to_string()
    };
    out.push('\n');
    if let Some(hint) = hint {
        out.push_str(&format!("  {}\n", hint));
    }
    out
}

pub fn format_error_json(error: &TransactionError, opts: &FormatOptions) -> Result<String> {
    opts.as_json(&FinishedOutcome::Failed {
        error: error.clone(),
    })
}

/// One-line text rendering of a session event, or `None` for events that
/// only matter to machine consumers.
pub fn format_event_text(
    event: &SessionEvent,
    descriptor: &ServiceDescriptor,
    opts: &FormatOptions,
) -> Option<String> {
    let line = match event {
        SessionEvent::RadioStateChanged { state } => format!("Radio: {}", state),
        SessionEvent::CommandRejected { error } => format!("Command ignored: {}", error),
        SessionEvent::PeripheralDiscovered {
            transaction,
            peripheral,
        } => format!("{} found {}", transaction, peripheral),
        SessionEvent::ResponseReceived {
            transaction,
            response,
        } => format!(
            "{} {} = {}",
            transaction,
            characteristic_label(descriptor, response),
            format_response_value(response)
        ),
        SessionEvent::TransactionFinished {
            transaction,
            outcome,
            ..
        } => {
            let line = match outcome {
                FinishedOutcome::Completed { report } => format!(
                    "{} completed with {} response(s)",
                    transaction,
                    report.responses.len()
                ),
                FinishedOutcome::Failed { error } => format!("{} failed: {}", transaction, error),
            };
            if opts.no_color {
                line
            } else if outcome.is_completed() {
                line.green().to_string()
            } else {
                line.red().to_string()
            }
        }
        _ => return None,
    };
    Some(line + "\n")
}

/// JSON for a session event; compact options give one event per line.
pub fn format_event_json(event: &SessionEvent, opts: &FormatOptions) -> Result<String> {
    opts.as_json(event)
}

#[derive(Serialize)]
struct UuidEntry {
    role: &'static str,
    uuid: String,
}

fn uuid_entries(descriptor: &ServiceDescriptor) -> [UuidEntry; 3] {
    [descriptor.service, descriptor.command, descriptor.response].map(|uuid| UuidEntry {
        role: descriptor.name_of(&uuid),
        uuid: uuid.hyphenated().to_string().to_uppercase(),
    })
}

pub fn format_uuids(
    descriptor: &ServiceDescriptor,
    format: OutputFormat,
    opts: &FormatOptions,
) -> Result<String> {
    let entries = uuid_entries(descriptor);
    match format {
        OutputFormat::Json => opts.as_json(&entries),
        OutputFormat::Text => {
            let mut out = String::new();
            for entry in &entries {
                let role = if opts.no_color {
                    entry.role.to_string()
                } else {
                    entry.role.bold().to_string()
                };
                out.push_str(&format!("{:<24} {}\n", role, entry.uuid));
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btcmd_core::{RadioState, ResponsePayload, TransactionId};
    use btcmd_core::uuids::{PROVISIONING_SERVICE, RESPONSE_CHARACTERISTIC};
    use std::time::Duration;

    fn plain() -> FormatOptions {
        FormatOptions::new(true)
    }

    fn report() -> TransactionReport {
        TransactionReport {
            transaction: serde_json::from_str::<TransactionId>("3").unwrap(),
            peripheral: Some("Provisioner (MOCK-0001)".to_string()),
            responses: vec![Response {
                characteristic: RESPONSE_CHARACTERISTIC,
                payload: ResponsePayload::from(b"OK".to_vec()),
            }],
        }
    }

    #[test]
    fn test_report_text() {
        let text = format_report_text(&report(), &ServiceDescriptor::PROVISIONING, &plain());
        assert!(text.starts_with("Transaction #3 completed via Provisioner (MOCK-0001)"));
        assert!(text.contains("responseCharacteristic: \"OK\" (2 bytes)"));
    }

    #[test]
    fn test_report_text_without_responses() {
        let mut report = report();
        report.responses.clear();
        let text = format_report_text(&report, &ServiceDescriptor::PROVISIONING, &plain());
        assert!(text.contains("no response characteristic"));
    }

    #[test]
    fn test_report_json_is_tagged() {
        let json = format_report_json(&report(), &plain().with_compact(true)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["report"]["transaction"], 3);
    }

    #[test]
    fn test_binary_response_shown_as_hex() {
        let response = Response {
            characteristic: RESPONSE_CHARACTERISTIC,
            payload: ResponsePayload::from(vec![0x00, 0xff]),
        };
        assert_eq!(format_response_value(&response), "0x00ff");
    }

    #[test]
    fn test_error_text_has_hint() {
        let error = TransactionError::ScanTimeout {
            timeout: Duration::from_secs(5),
        };
        let text = format_error_text(&error, &plain());
        assert!(text.starts_with("Transaction failed: No peripheral found"));
        assert!(text.contains("advertising"));
    }

    #[test]
    fn test_error_json() {
        let json = format_error_json(&TransactionError::Busy, &plain()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"]["kind"], "busy");
    }

    #[test]
    fn test_event_text_skips_state_changes() {
        let event = SessionEvent::StateChanged {
            from: btcmd_core::SessionStateKind::Idle,
            to: btcmd_core::SessionStateKind::Scanning,
        };
        assert!(format_event_text(&event, &ServiceDescriptor::PROVISIONING, &plain()).is_none());

        let event = SessionEvent::RadioStateChanged {
            state: RadioState::PoweredOn,
        };
        assert_eq!(
            format_event_text(&event, &ServiceDescriptor::PROVISIONING, &plain()).as_deref(),
            Some("Radio: PoweredOn\n")
        );
    }

    #[test]
    fn test_event_json_line() {
        let event = SessionEvent::CommandRejected {
            error: TransactionError::Busy,
        };
        let line = format_event_json(&event, &plain().with_compact(true)).unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.lines().count(), 1);
        assert!(line.contains("\"type\":\"command_rejected\""));
    }

    #[test]
    fn test_uuids_text_and_json() {
        let text =
            format_uuids(&ServiceDescriptor::PROVISIONING, OutputFormat::Text, &plain()).unwrap();
        assert!(text.contains("193DB24F-E42E-49D2-9A70-6A5616863A9D"));
        assert_eq!(text.lines().count(), 3);

        let json =
            format_uuids(&ServiceDescriptor::PROVISIONING, OutputFormat::Json, &plain()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["role"], "provisioningService");
        assert_eq!(
            value[0]["uuid"],
            PROVISIONING_SERVICE.hyphenated().to_string().to_uppercase()
        );
    }
}
