//! Command implementations for the CLI.

mod config;
mod listen;
mod send;
mod uuids;

pub use config::cmd_config;
pub use listen::{ListenArgs, cmd_listen};
pub use send::cmd_send;
pub use uuids::cmd_uuids;
