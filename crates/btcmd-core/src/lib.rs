//! Session core for the btcmd BLE command client.
//!
//! This crate finds a peripheral advertising the provisioning service,
//! connects, writes one command, reads back the responses and disconnects.
//! One transaction runs at a time; a trigger while busy is dropped.
//!
//! # Architecture
//!
//! - [`Session`] is a pure state machine. It consumes [`SessionInput`]s and
//!   returns [`Effect`]s, so every transition can be tested synchronously.
//! - [`Transport`] abstracts the radio. [`BleTransport`] drives btleplug,
//!   [`MockTransport`] runs in memory.
//! - [`SessionRunner`] owns a session on a tokio task, executes effects with
//!   per-phase timeouts and hands out a [`SessionHandle`].
//! - [`SessionEvent`]s are broadcast for front ends and logs.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use btcmd_core::{BleTransport, SessionConfig, SessionRunner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Arc::new(BleTransport::new().await?);
//!     let config = SessionConfig::default().auto_start_on_ready(false);
//!     let handle = SessionRunner::spawn(transport, config)?;
//!
//!     let report = handle.transact().await?;
//!     for response in &report.responses {
//!         println!("{}", response.payload.to_text_lossy());
//!     }
//!
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod ble;
pub mod config;
pub mod error;
pub mod events;
pub mod mock;
pub mod runner;
pub mod session;
pub mod transport;
pub mod util;

// Re-export types
pub use btcmd_types::types;
pub use btcmd_types::uuid;

// Core exports
pub use ble::{BleTransport, get_adapter};
pub use config::SessionConfig;
pub use error::{Error, Result, TransactionError};
pub use events::{EventDispatcher, EventReceiver, FinishedOutcome, SessionEvent};
pub use mock::{MockOperation, MockPeripheral, MockTransport, MockTransportBuilder};
pub use runner::{SessionHandle, SessionRunner};
pub use session::{
    Effect, Response, Session, SessionInput, SessionSnapshot, TransactionId, TransactionOutcome,
    TransactionReport,
};
pub use transport::{CharacteristicHandle, CharacteristicProperties, ServiceHandle, Transport};
pub use util::format_peripheral_id;

// Re-export from btcmd-types
pub use btcmd_types::uuid as uuids;
pub use btcmd_types::{
    CharacteristicRole, CommandPayload, RadioState, ResponsePayload, ServiceDescriptor,
    SessionStateKind,
};
