//! Utility functions for btcmd-core.

use btleplug::platform::PeripheralId;

/// Format a peripheral ID as a string.
///
/// On macOS, peripheral IDs are UUIDs. On other platforms, they may be
/// MAC addresses or other formats. This function extracts the useful
/// identifier string.
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    strip_id_wrapper(&format!("{:?}", id)).to_string()
}

/// Pick the identifier to show for a peripheral.
///
/// On macOS the address reads 00:00:00:00:00:00, so the peripheral ID is
/// used instead. Elsewhere the Bluetooth address is used.
pub fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    if is_unset_address(address) {
        format_peripheral_id(peripheral_id)
    } else {
        address.to_string()
    }
}

fn strip_id_wrapper(debug: &str) -> &str {
    debug
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
}

fn is_unset_address(address: &str) -> bool {
    address == "00:00:00:00:00:00"
}
