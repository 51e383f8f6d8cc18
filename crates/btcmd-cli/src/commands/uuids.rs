//! Uuids command implementation.

use std::path::PathBuf;

use anyhow::Result;
use btcmd_core::ServiceDescriptor;

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_uuids};
use crate::util::write_output;

pub fn cmd_uuids(format: OutputFormat, output: Option<&PathBuf>, opts: &FormatOptions) -> Result<()> {
    let content = format_uuids(&ServiceDescriptor::PROVISIONING, format, opts)?;
    write_output(output, &content)
}
