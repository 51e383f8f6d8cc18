//! Listen command implementation.
//!
//! Keeps one session open. Every line on stdin triggers a command; events
//! are printed as they happen until Ctrl-C or end of input.

use std::path::PathBuf;

use anyhow::{Context, Result};
use btcmd_core::{SessionEvent, SessionHandle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::cli::{OutputFormat, SessionArgs};
use crate::config::Config;
use crate::format::{FormatOptions, format_event_json, format_event_text};
use crate::style;
use crate::util::{append_output, start_session};

/// Arguments for the listen command.
pub struct ListenArgs<'a> {
    pub session: &'a SessionArgs,
    pub no_auto_start: bool,
    pub format: OutputFormat,
    pub output: Option<&'a PathBuf>,
    pub quiet: bool,
}

pub async fn cmd_listen(args: ListenArgs<'_>, opts: &FormatOptions, config: &Config) -> Result<()> {
    let session_config = config
        .session_config(args.session)?
        .auto_start_on_ready(!args.no_auto_start);
    let descriptor = session_config.descriptor;

    let handle = start_session(session_config).await?;
    let mut events = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    if !args.quiet {
        eprintln!(
            "{}",
            style::info(
                "Press Enter to send the command, Ctrl-C to quit.",
                opts.no_color
            )
        );
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, shutting down");
                break;
            }
            line = lines.next_line(), if stdin_open => match line.context("Failed to read stdin")? {
                Some(_) => trigger(&handle)?,
                None => {
                    stdin_open = false;
                    if !handle.is_busy() {
                        break;
                    }
                }
            },
            event = events.recv() => match event {
                Ok(event) => {
                    let finished = matches!(event, SessionEvent::TransactionFinished { .. });
                    let content = match args.format {
                        OutputFormat::Json => Some(format_event_json(&event, opts)?),
                        OutputFormat::Text => format_event_text(&event, &descriptor, opts),
                    };
                    if let Some(content) = content {
                        append_output(args.output, &content)?;
                    }
                    if finished && !stdin_open {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    if !args.quiet {
                        eprintln!(
                            "{}",
                            style::warning(&format!("{} event(s) dropped", missed), opts.no_color)
                        );
                    }
                }
                Err(RecvError::Closed) => {
                    warn!("Session ended unexpectedly");
                    break;
                }
            },
        }
    }

    handle.shutdown().await;
    Ok(())
}

fn trigger(handle: &SessionHandle) -> Result<()> {
    // Rejections arrive as events; an error here means the runner is gone.
    handle
        .send_command()
        .context("Session is no longer running")
}
