//! Command-line client for BLE provisioning peripherals.
//!
//! `btcmd` finds a peripheral advertising the provisioning service, writes a
//! single command to its command characteristic, reads the response
//! characteristic and disconnects.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `send` | Run one transaction and print the response |
//! | `listen` | Keep a session open and send on every Enter |
//! | `uuids` | Print the service and characteristic UUIDs |
//! | `config` | Manage CLI configuration |
//! | `completions` | Generate shell completions |
//!
//! # Output Formats
//!
//! - **Text** (default): Human-readable colored output
//! - **JSON**: Machine-readable output; `listen` prints one event per line
//!
//! # Configuration
//!
//! The CLI stores configuration in `~/.config/btcmd/config.toml` (or platform equivalent).
//! Configuration options include:
//!
//! - `payload`: Default command text
//! - `hex`: Interpret the payload as hex bytes
//! - `scan_timeout`, `connect_timeout`, `operation_timeout`: Timeouts in seconds
//! - `format`: Default output format
//! - `no_color`: Disable colored output
//!
//! # Environment Variables
//!
//! - `BTCMD_PAYLOAD`: Command text (overridden by `--payload` flag)
//! - `NO_COLOR`: Disable colored output when set
//! - `RUST_LOG`: Log filter when neither `--verbose` nor `--quiet` is given
//!
//! # Examples
//!
//! Send the default command:
//! ```bash
//! btcmd send
//! ```
//!
//! Send raw bytes and print JSON:
//! ```bash
//! btcmd send --payload "01 ff" --hex --format json
//! ```
//!
//! Stream events while sending on demand:
//! ```bash
//! btcmd listen --no-auto-start --format json --output events.jsonl
//! ```

// This crate is primarily a binary CLI application.
// The entry point and command implementations are in main.rs.

// Re-export core dependencies for convenience
pub use btcmd_core;
pub use btcmd_types;
