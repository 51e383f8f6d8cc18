//! Platform-agnostic types for the btcmd provisioning command client.
//!
//! This crate holds the parts of the protocol that do not depend on a
//! Bluetooth stack, so they can be shared by the session core, the CLI and
//! any test harness.
//!
//! # Features
//!
//! - UUID constants for the provisioning service and its characteristics
//! - Role/name lookup for diagnostic labelling
//! - Radio state, payload and session-state value types
//! - Error types for parsing payloads and states from text
//!
//! # Example
//!
//! ```
//! use btcmd_types::{CommandPayload, uuid::{name_from_uuid, PROVISIONING_SERVICE}};
//!
//! assert_eq!(name_from_uuid(&PROVISIONING_SERVICE), "provisioningService");
//! assert_eq!(CommandPayload::default().as_bytes(), b"Hello, World!");
//! ```

pub mod error;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use types::{
    CommandPayload, DEFAULT_COMMAND_TEXT, RadioState, ResponsePayload, SessionStateKind,
};
pub use uuid::{CharacteristicRole, ServiceDescriptor, name_from_uuid};
pub use uuid as uuids;


/// Property-based tests for hex payload parsing.
///
/// Run with: `cargo test -p btcmd-types proptests`
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn from_hex_never_panics(input in ".{0,64}") {
            let _ = CommandPayload::from_hex(&input);
        }

        #[test]
        fn response_hex_is_twice_the_length(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let response = ResponsePayload::from(bytes.clone());
            prop_assert_eq!(response.to_hex().len(), bytes.len() * 2);
        }
    }
}
