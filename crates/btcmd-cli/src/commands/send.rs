//! Send command implementation.

use std::path::PathBuf;

use anyhow::Result;
use btcmd_core::{SessionEvent, TransactionOutcome};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::cli::{OutputFormat, SessionArgs};
use crate::config::Config;
use crate::format::{
    FormatOptions, format_error_json, format_error_text, format_report_json, format_report_text,
};
use crate::style;
use crate::util::{start_session, write_output};

/// Run one transaction and print its outcome.
///
/// Returns whether the transaction completed.
pub async fn cmd_send(
    args: &SessionArgs,
    format: OutputFormat,
    output: Option<&PathBuf>,
    quiet: bool,
    opts: &FormatOptions,
    config: &Config,
) -> Result<bool> {
    let session_config = config.session_config(args)?.auto_start_on_ready(false);
    let descriptor = session_config.descriptor;
    let scan_secs = session_config.scan_timeout.as_secs();
    debug!(
        "Sending {} byte command (scan {}s)",
        session_config.payload.len(),
        scan_secs
    );

    let handle = start_session(session_config).await?;

    // Show spinner for text output (unless quiet)
    let spinner = if !quiet && matches!(format, OutputFormat::Text) {
        Some(style::transaction_spinner(scan_secs))
    } else {
        None
    };

    let mut events = handle.subscribe();
    let mut events_open = true;

    let outcome: TransactionOutcome = {
        let transaction = handle.transact();
        tokio::pin!(transaction);
        loop {
            tokio::select! {
                outcome = &mut transaction => break outcome,
                event = events.recv(), if events_open => match event {
                    Ok(SessionEvent::StateChanged { to, .. }) => {
                        if let (Some(pb), Some(message)) = (&spinner, style::phase_message(to)) {
                            pb.set_message(message);
                        }
                    }
                    Ok(SessionEvent::PeripheralDiscovered { peripheral, .. }) => {
                        if !quiet {
                            style::print_suspended(
                                spinner.as_ref(),
                                &style::info(&format!("Found {}", peripheral), opts.no_color),
                            );
                        }
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => events_open = false,
                },
            }
        }
    };

    // Clear spinner before output
    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }
    handle.shutdown().await;

    match outcome {
        Ok(report) => {
            let content = match format {
                OutputFormat::Json => format_report_json(&report, opts)?,
                OutputFormat::Text => format_report_text(&report, &descriptor, opts),
            };
            write_output(output, &content)?;
            Ok(true)
        }
        Err(error) => {
            match format {
                OutputFormat::Json => write_output(output, &format_error_json(&error, opts)?)?,
                OutputFormat::Text => eprint!("{}", format_error_text(&error, opts)),
            }
            Ok(false)
        }
    }
}
