//! Bluetooth UUIDs for the provisioning command protocol.
//!
//! These identifiers are shared with existing peripheral firmware and must
//! stay bit-exact.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uuid::{Uuid, uuid};

// --- Provisioning Service ---

/// Provisioning service advertised by eligible peripherals.
pub const PROVISIONING_SERVICE: Uuid = uuid!("193DB24F-E42E-49D2-9A70-6A5616863A9D");

// --- Provisioning Characteristics ---

/// Command characteristic; the write target for the outbound payload.
pub const COMMAND_CHARACTERISTIC: Uuid = uuid!("43CDD5AB-3EF6-496A-A4CC-9933F5ADAF68");

/// Response characteristic; read after the command write is acknowledged.
pub const RESPONSE_CHARACTERISTIC: Uuid = uuid!("F1A9A759-C922-4219-B62C-1A14F62DE0A4");

/// Role a UUID plays in the provisioning protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum CharacteristicRole {
    /// The provisioning service itself.
    ProvisioningService,
    /// The command (write) characteristic.
    CommandCharacteristic,
    /// The response (read) characteristic.
    ResponseCharacteristic,
    /// Anything else.
    Unknown,
}

impl CharacteristicRole {
    /// Diagnostic name for the role.
    pub fn name(&self) -> &'static str {
        match self {
            CharacteristicRole::ProvisioningService => "provisioningService",
            CharacteristicRole::CommandCharacteristic => "commandCharacteristic",
            CharacteristicRole::ResponseCharacteristic => "responseCharacteristic",
            CharacteristicRole::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CharacteristicRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The identifiers that make up one command/response service.
///
/// [`ServiceDescriptor::PROVISIONING`] is the protocol's constant instance;
/// other descriptors exist mainly so tests and tools can point the session
/// at a different service layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ServiceDescriptor {
    /// Service UUID used for scanning and service discovery.
    pub service: Uuid,
    /// Characteristic receiving the command write.
    pub command: Uuid,
    /// Characteristic read for the response.
    pub response: Uuid,
}

impl ServiceDescriptor {
    /// The provisioning service descriptor.
    pub const PROVISIONING: ServiceDescriptor = ServiceDescriptor {
        service: PROVISIONING_SERVICE,
        command: COMMAND_CHARACTERISTIC,
        response: RESPONSE_CHARACTERISTIC,
    };

    /// Classify a UUID against this descriptor.
    pub fn role_of(&self, uuid: &Uuid) -> CharacteristicRole {
        if *uuid == self.service {
            CharacteristicRole::ProvisioningService
        } else if *uuid == self.command {
            CharacteristicRole::CommandCharacteristic
        } else if *uuid == self.response {
            CharacteristicRole::ResponseCharacteristic
        } else {
            CharacteristicRole::Unknown
        }
    }

    /// Diagnostic name of a UUID under this descriptor.
    pub fn name_of(&self, uuid: &Uuid) -> &'static str {
        self.role_of(uuid).name()
    }
}

impl Default for ServiceDescriptor {
    fn default() -> Self {
        Self::PROVISIONING
    }
}

/// Classify a UUID against the provisioning protocol constants.
pub fn role_for(uuid: &Uuid) -> CharacteristicRole {
    ServiceDescriptor::PROVISIONING.role_of(uuid)
}

/// Map a UUID to its diagnostic role name.
///
/// ```
/// use btcmd_types::uuid::{name_from_uuid, COMMAND_CHARACTERISTIC};
///
/// assert_eq!(name_from_uuid(&COMMAND_CHARACTERISTIC), "commandCharacteristic");
/// assert_eq!(name_from_uuid(&uuid::Uuid::nil()), "unknown");
/// ```
pub fn name_from_uuid(uuid: &Uuid) -> &'static str {
    role_for(uuid).name()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_are_bit_exact() {
        assert_eq!(
            PROVISIONING_SERVICE.to_string().to_uppercase(),
            "193DB24F-E42E-49D2-9A70-6A5616863A9D"
        );
        assert_eq!(
            COMMAND_CHARACTERISTIC.to_string().to_uppercase(),
            "43CDD5AB-3EF6-496A-A4CC-9933F5ADAF68"
        );
        assert_eq!(
            RESPONSE_CHARACTERISTIC.to_string().to_uppercase(),
            "F1A9A759-C922-4219-B62C-1A14F62DE0A4"
        );
    }

    #[test]
    fn test_name_from_uuid() {
        assert_eq!(name_from_uuid(&PROVISIONING_SERVICE), "provisioningService");
        assert_eq!(name_from_uuid(&COMMAND_CHARACTERISTIC), "commandCharacteristic");
        assert_eq!(name_from_uuid(&RESPONSE_CHARACTERISTIC), "responseCharacteristic");
        assert_eq!(
            name_from_uuid(&uuid!("00002a19-0000-1000-8000-00805f9b34fb")),
            "unknown"
        );
    }

    #[test]
    fn test_custom_descriptor_roles() {
        let descriptor = ServiceDescriptor {
            service: Uuid::from_u128(1),
            command: Uuid::from_u128(2),
            response: Uuid::from_u128(3),
        };
        assert_eq!(
            descriptor.role_of(&Uuid::from_u128(2)),
            CharacteristicRole::CommandCharacteristic
        );
        // The protocol constants mean nothing to a custom descriptor
        assert_eq!(descriptor.role_of(&COMMAND_CHARACTERISTIC), CharacteristicRole::Unknown);
    }

    #[test]
    fn test_default_descriptor_is_provisioning() {
        assert_eq!(ServiceDescriptor::default(), ServiceDescriptor::PROVISIONING);
    }
}
