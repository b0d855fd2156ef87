use std::time::Duration;

use strum::{Display, FromRepr};

use crate::error::FetchError;

/// Largest buffer handed to a single control transfer. Reads are clamped here, never
/// grown past it, regardless of what a device declares.
pub const MAX_DESCRIPTOR_SIZE: usize = 4096;

/// A device descriptor is always exactly 18 bytes on the wire.
pub const DEVICE_DESCRIPTOR_LENGTH: u16 = 18;

/// The fixed header of a configuration descriptor; wTotalLength sits at offset 2.
pub const CONFIG_HEADER_LENGTH: u16 = 9;

/// Upper bound on the interfaces claimed for one retrieval pass.
pub const MAX_CLAIMED_INTERFACES: u8 = 8;

/// String indices probed on every device: 0 = supported languages, 1 = manufacturer,
/// 2 = product, 3 = serial number. A common convention, not a protocol guarantee, so
/// absent entries simply fail and get skipped.
pub const PROBED_STRING_INDICES: [u8; 4] = [0, 1, 2, 3];

/// Per-request timeout. One transfer is outstanding at a time.
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(1000);

/// Standard descriptor type codes (USB 3.2 table 9-6).
#[derive(Copy, Clone, Debug, Display, FromRepr, PartialEq, Eq)]
#[repr(u8)]
pub enum DescriptorKind {
    Device = 0x01,
    Configuration = 0x02,
    String = 0x03,
    Interface = 0x04,
    Endpoint = 0x05,
    #[strum(serialize = "Device Qualifier")]
    DeviceQualifier = 0x06,
    #[strum(serialize = "Other Speed Config")]
    OtherSpeedConfiguration = 0x07,
    #[strum(serialize = "Interface Power")]
    InterfacePower = 0x08,
    #[strum(serialize = "OTG")]
    Otg = 0x09,
    Debug = 0x0a,
    #[strum(serialize = "Interface Association")]
    InterfaceAssociation = 0x0b,
    Security = 0x0c,
    Key = 0x0d,
    #[strum(serialize = "Encryption Type")]
    EncryptionType = 0x0e,
    #[strum(serialize = "BOS")]
    Bos = 0x0f,
    #[strum(serialize = "Device Capability")]
    DeviceCapability = 0x10,
    #[strum(serialize = "Wireless Endpoint Companion")]
    WirelessEndpointCompanion = 0x11,
    #[strum(serialize = "SuperSpeed USB Endpoint Companion")]
    SuperSpeedEndpointCompanion = 0x30,
    #[strum(serialize = "SuperSpeed ISO Endpoint Companion")]
    SuperSpeedIsoEndpointCompanion = 0x31,
}

impl DescriptorKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::from_repr(code)
    }
}

/// What to ask a device for: not yet a byte buffer, just the wire parameters of one
/// GET_DESCRIPTOR request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DescriptorRequest {
    pub kind: DescriptorKind,
    pub index: u8,
    pub length: u16,
}

impl DescriptorRequest {
    /// A request sized to the full buffer cap, for descriptor classes whose length is
    /// unknown up front.
    pub fn max_sized(kind: DescriptorKind, index: u8) -> Self {
        Self {
            kind,
            index,
            length: MAX_DESCRIPTOR_SIZE as u16,
        }
    }
}

/// One step of the retrieval sequence. A failed step keeps its position in the
/// sequence so sinks can render exactly what was retrieved, in order.
#[derive(Clone, Debug, PartialEq)]
pub struct DescriptorResult {
    pub kind: DescriptorKind,
    pub index: u8,
    pub payload: Result<Vec<u8>, FetchError>,
}

impl DescriptorResult {
    pub fn bytes(&self) -> Option<&[u8]> {
        self.payload.as_deref().ok()
    }
}

/// The static device descriptor fields the rest of the program needs: identity for
/// the selection list, the configuration count for the retrieval plan, and the
/// device's own string indices (which the probe deliberately ignores, but which are
/// kept so callers can see when the 0-3 convention diverges).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub num_configurations: u8,
    pub manufacturer_index: Option<u8>,
    pub product_index: Option<u8>,
    pub serial_index: Option<u8>,
}

impl From<&rusb::DeviceDescriptor> for DeviceInfo {
    fn from(descriptor: &rusb::DeviceDescriptor) -> Self {
        Self {
            vendor_id: descriptor.vendor_id(),
            product_id: descriptor.product_id(),
            num_configurations: descriptor.num_configurations(),
            manufacturer_index: descriptor.manufacturer_string_index(),
            product_index: descriptor.product_string_index(),
            serial_index: descriptor.serial_number_string_index(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_round_trip() {
        assert_eq!(DescriptorKind::Device.code(), 0x01);
        assert_eq!(DescriptorKind::Bos.code(), 0x0f);
        assert_eq!(DescriptorKind::from_code(0x07), Some(DescriptorKind::OtherSpeedConfiguration));
        assert_eq!(DescriptorKind::from_code(0x30), Some(DescriptorKind::SuperSpeedEndpointCompanion));
        assert_eq!(DescriptorKind::from_code(0x42), None);
    }

    #[test]
    fn kind_names_match_the_usb_tables() {
        assert_eq!(DescriptorKind::DeviceQualifier.to_string(), "Device Qualifier");
        assert_eq!(DescriptorKind::Bos.to_string(), "BOS");
        assert_eq!(DescriptorKind::Device.to_string(), "Device");
    }

    #[test]
    fn max_sized_requests_use_the_buffer_cap() {
        let request = DescriptorRequest::max_sized(DescriptorKind::Bos, 0);
        assert_eq!(request.length as usize, MAX_DESCRIPTOR_SIZE);
    }
}
