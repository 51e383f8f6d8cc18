//! Utility functions for CLI operations.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use btcmd_core::{BleTransport, SessionConfig, SessionHandle, SessionRunner};

/// Write output to file or stdout.
pub fn write_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }
        None => {
            print!("{}", content);
            io::stdout().flush()?;
        }
    }
    Ok(())
}

/// Append output to a file, or print it to stdout.
///
/// Used for line-oriented output where each line should land as it happens.
pub fn append_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            file.write_all(content.as_bytes())
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }
        None => {
            print!("{}", content);
            io::stdout().flush()?;
        }
    }
    Ok(())
}

/// Open the system Bluetooth adapter and start a session on it.
pub async fn start_session(config: SessionConfig) -> Result<SessionHandle> {
    let transport = BleTransport::new()
        .await
        .context("Failed to open the Bluetooth adapter")?;
    let handle = SessionRunner::spawn(Arc::new(transport), config)
        .context("Failed to start the session")?;
    Ok(handle)
}
