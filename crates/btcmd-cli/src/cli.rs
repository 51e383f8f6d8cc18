//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    /// Parse a format name from the config file.
    pub fn from_config(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name, true).ok()
    }
}

/// Command payload and session timing arguments
#[derive(Debug, Clone, Args)]
pub struct SessionArgs {
    /// Command text to write (defaults to "Hello, World!")
    #[arg(short, long, env = "BTCMD_PAYLOAD")]
    pub payload: Option<String>,

    /// Interpret the payload as hex bytes (e.g. "01 ff 2a"); the config file
    /// `hex` setting only applies to the config file payload
    #[arg(long)]
    pub hex: bool,

    /// Scan window in seconds
    #[arg(short = 't', long)]
    pub scan_timeout: Option<u64>,

    /// Connect timeout in seconds
    #[arg(long)]
    pub connect_timeout: Option<u64>,

    /// Timeout for each discovery, write and read in seconds
    #[arg(long)]
    pub operation_timeout: Option<u64>,
}

/// Reusable output format arguments
#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// Output format (defaults to the config file, then text)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[derive(Parser)]
#[command(name = "btcmd")]
#[command(
    author,
    version,
    about = "Send one command to a BLE provisioning peripheral",
    long_about = None
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    /// Write output to file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find a peripheral, write the command and print the responses
    Send {
        #[command(flatten)]
        session: SessionArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Keep a session open; press Enter to send the command again
    Listen {
        #[command(flatten)]
        session: SessionArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Do not send automatically when the radio powers on
        #[arg(long)]
        no_auto_start: bool,
    },

    /// Print the service and characteristic UUIDs
    Uuids {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Manage CLI configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Configuration keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigKey {
    /// Default command text
    Payload,
    /// Treat the payload as hex
    Hex,
    /// Scan window in seconds
    ScanTimeout,
    /// Connect timeout in seconds
    ConnectTimeout,
    /// Per-operation timeout in seconds
    OperationTimeout,
    /// Default output format
    Format,
    /// Disable colored output
    NoColor,
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Get a configuration value
    Get {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
        /// Configuration value
        value: String,
    },

    /// Unset (remove) a configuration value
    Unset {
        /// Configuration key to remove
        #[arg(value_enum)]
        key: ConfigKey,
    },

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_send_arguments() {
        let cli = Cli::try_parse_from([
            "btcmd",
            "send",
            "--payload",
            "01ff",
            "--hex",
            "-t",
            "8",
            "--format",
            "json",
        ])
        .unwrap();
        let Commands::Send { session, output } = cli.command else {
            panic!("expected send");
        };
        assert_eq!(session.payload.as_deref(), Some("01ff"));
        assert!(session.hex);
        assert_eq!(session.scan_timeout, Some(8));
        assert_eq!(output.format, Some(OutputFormat::Json));
    }

    #[test]
    fn test_config_key_names() {
        let cli = Cli::try_parse_from(["btcmd", "config", "set", "scan-timeout", "12"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Set {
                    key: ConfigKey::ScanTimeout,
                    ..
                }
            }
        ));
    }

    #[test]
    fn test_no_color_flag() {
        let cli = Cli::try_parse_from(["btcmd", "--no-color", "uuids"]).unwrap();
        assert!(cli.no_color);
    }

    #[test]
    fn test_format_from_config() {
        assert_eq!(OutputFormat::from_config("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_config("csv"), None);
    }
}
