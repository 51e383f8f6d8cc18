//! Value types shared by the session core and its front ends.

use core::fmt;
use core::str::FromStr;

use bytes::Bytes;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};

/// Literal command sent by the trigger when no payload is configured.
pub const DEFAULT_COMMAND_TEXT: &str = "Hello, World!";

/// Power/availability state of the local Bluetooth radio.
///
/// A transaction may be attempted in any state that is not
/// [unavailable](RadioState::is_unavailable). `Unknown` and `Resetting` are
/// transient and still allow an attempt; `PoweredOff`, `Unsupported` and
/// `Unauthorized` mean the radio cannot be used until the platform reports a
/// change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RadioState {
    /// State has not been reported yet.
    #[default]
    Unknown,
    /// The radio stack is restarting.
    Resetting,
    /// The host has no BLE central support.
    Unsupported,
    /// The process is not allowed to use Bluetooth.
    Unauthorized,
    /// Bluetooth is switched off.
    PoweredOff,
    /// Ready for use.
    PoweredOn,
}

impl RadioState {
    /// All states, in declaration order.
    pub const ALL: [RadioState; 6] = [
        RadioState::Unknown,
        RadioState::Resetting,
        RadioState::Unsupported,
        RadioState::Unauthorized,
        RadioState::PoweredOff,
        RadioState::PoweredOn,
    ];

    /// Whether the radio is ready for scanning and connections.
    pub fn is_powered_on(&self) -> bool {
        matches!(self, RadioState::PoweredOn)
    }

    /// Whether the radio is definitely unusable (as opposed to transient).
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            RadioState::Unsupported | RadioState::Unauthorized | RadioState::PoweredOff
        )
    }

    /// Name of the state as reported by the platform.
    pub fn as_str(&self) -> &'static str {
        match self {
            RadioState::Unknown => "Unknown",
            RadioState::Resetting => "Resetting",
            RadioState::Unsupported => "Unsupported",
            RadioState::Unauthorized => "Unauthorized",
            RadioState::PoweredOff => "PoweredOff",
            RadioState::PoweredOn => "PoweredOn",
        }
    }
}

impl fmt::Display for RadioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RadioState {
    type Err = ParseError;

    fn from_str(s: &str) -> ParseResult<Self> {
        let wanted = s.trim().replace(['-', '_', ' '], "");
        RadioState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| ParseError::UnknownRadioState(s.to_string()))
    }
}

/// Outbound command bytes, opaque to the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct CommandPayload(Bytes);

impl CommandPayload {
    /// Wrap raw bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// UTF-8 bytes of a text command.
    pub fn from_text(text: &str) -> Self {
        Self(Bytes::copy_from_slice(text.as_bytes()))
    }

    /// Parse a hex string such as `"0x48 65 6c"` or `"48656c"`.
    ///
    /// ```
    /// use btcmd_types::CommandPayload;
    ///
    /// let payload = CommandPayload::from_hex("0x41 43 4b").unwrap();
    /// assert_eq!(payload.as_bytes(), b"ACK");
    /// ```
    pub fn from_hex(input: &str) -> ParseResult<Self> {
        decode_hex(input).map(|bytes| Self(Bytes::from(bytes)))
    }

    /// Borrow the payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for CommandPayload {
    fn default() -> Self {
        Self::from_text(DEFAULT_COMMAND_TEXT)
    }
}

impl From<Vec<u8>> for CommandPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for CommandPayload {
    fn from(bytes: &'static [u8]) -> Self {
        Self(Bytes::from_static(bytes))
    }
}

/// Bytes read back from a response characteristic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ResponsePayload(Bytes);

impl ResponsePayload {
    /// Wrap raw bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Borrow the payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode as UTF-8, replacing invalid sequences.
    pub fn to_text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    /// Lower-case hex rendering without separators.
    pub fn to_hex(&self) -> String {
        encode_hex(&self.0)
    }
}

impl From<Vec<u8>> for ResponsePayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for ResponsePayload {
    fn from(bytes: &'static [u8]) -> Self {
        Self(Bytes::from_static(bytes))
    }
}

/// Externally visible phase of a session.
///
/// `Disconnecting` is transient: the session passes through it on the way
/// back to `Idle` and never rests there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SessionStateKind {
    /// No transaction in flight.
    #[default]
    Idle,
    /// Waiting for a peripheral advertising the service.
    Scanning,
    /// Connecting to the discovered peripheral.
    Connecting,
    /// Discovering the provisioning service.
    DiscoveringServices,
    /// Discovering characteristics of the discovered services.
    DiscoveringCharacteristics,
    /// Waiting for the command write to be acknowledged.
    Writing,
    /// Reading responses.
    AwaitingResponses,
    /// Tearing the connection down.
    Disconnecting,
}

impl SessionStateKind {
    /// Whether a peripheral handle may be held in this state.
    pub fn holds_peripheral(&self) -> bool {
        !matches!(self, SessionStateKind::Idle | SessionStateKind::Scanning)
    }
}

impl fmt::Display for SessionStateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStateKind::Idle => "Idle",
            SessionStateKind::Scanning => "Scanning",
            SessionStateKind::Connecting => "Connecting",
            SessionStateKind::DiscoveringServices => "DiscoveringServices",
            SessionStateKind::DiscoveringCharacteristics => "DiscoveringCharacteristics",
            SessionStateKind::Writing => "Writing",
            SessionStateKind::AwaitingResponses => "AwaitingResponses",
            SessionStateKind::Disconnecting => "Disconnecting",
        };
        f.write_str(name)
    }
}

fn decode_hex(input: &str) -> ParseResult<Vec<u8>> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<char> = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();

    if digits.len() % 2 != 0 {
        return Err(ParseError::OddHexLength(digits.len()));
    }

    let mut out = Vec::with_capacity(digits.len() / 2);
    for (index, pair) in digits.chunks(2).enumerate() {
        let mut byte = 0u8;
        for (offset, c) in pair.iter().enumerate() {
            let nibble = c.to_digit(16).ok_or(ParseError::InvalidHexDigit {
                character: *c,
                offset: index * 2 + offset,
            })?;
            byte = (byte << 4) | nibble as u8;
        }
        out.push(byte);
    }
    Ok(out)
}

fn encode_hex(bytes: &[u8]) -> String {
    use fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}
