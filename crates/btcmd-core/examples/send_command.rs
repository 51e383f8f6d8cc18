//! Example: Sending One Command
//!
//! This example waits for the Bluetooth radio, finds a peripheral
//! advertising the provisioning service, writes a command and prints
//! every response before disconnecting.
//!
//! Run with: `cargo run --example send_command -- [COMMAND_TEXT]`

use std::env;
use std::sync::Arc;

use btcmd_core::{BleTransport, CommandPayload, SessionConfig, SessionEvent, SessionRunner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let payload = env::args()
        .nth(1)
        .map(|text| CommandPayload::from_text(&text))
        .unwrap_or_default();
    println!("Sending {} byte(s)...", payload.len());

    let transport = Arc::new(BleTransport::new().await?);
    let handle = SessionRunner::spawn(transport, SessionConfig::default().payload(payload))?;
    let mut events = handle.subscribe();

    // The first transaction starts by itself once the radio is powered on
    loop {
        match events.recv().await? {
            SessionEvent::RadioStateChanged { state } => println!("Radio: {}", state),
            SessionEvent::PeripheralDiscovered { peripheral, .. } => {
                println!("Found {}", peripheral);
            }
            SessionEvent::ResponseReceived { response, .. } => {
                println!("Response: {}", response.payload.to_text_lossy());
            }
            SessionEvent::TransactionFinished { outcome, .. } => {
                println!();
                println!("Finished: {:?}", outcome);
                break;
            }
            _ => {}
        }
    }

    handle.shutdown().await;
    Ok(())
}
