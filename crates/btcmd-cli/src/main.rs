mod cli;
mod commands;
mod config;
mod format;
mod style;
mod util;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::{ListenArgs, cmd_config, cmd_listen, cmd_send, cmd_uuids};
use config::Config;
use format::FormatOptions;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Handle completions command early (before tracing init)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "btcmd", &mut io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = Config::load();
    let no_color = cli.no_color || config.no_color;
    let opts = FormatOptions::new(no_color);
    let output = cli.output.as_ref();

    if let Some(path) = output {
        tracing::debug!("Output will be written to: {}", path.display());
    }

    match cli.command {
        Commands::Send { session, output: fmt } => {
            let format = config.resolve_format(fmt.format);
            let completed = cmd_send(&session, format, output, cli.quiet, &opts, &config).await?;
            if !completed {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Listen {
            session,
            output: fmt,
            no_auto_start,
        } => {
            let format = config.resolve_format(fmt.format);
            // JSON lines stay one object per line
            let opts = opts.with_compact(true);
            let args = ListenArgs {
                session: &session,
                no_auto_start,
                format,
                output,
                quiet: cli.quiet,
            };
            cmd_listen(args, &opts, &config).await?;
        }
        Commands::Uuids { output: fmt } => {
            cmd_uuids(config.resolve_format(fmt.format), output, &opts)?;
        }
        Commands::Config { action } => cmd_config(action, no_color)?,
        Commands::Completions { .. } => {}
    }

    Ok(ExitCode::SUCCESS)
}
