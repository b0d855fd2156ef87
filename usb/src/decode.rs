//! Decodes a persisted hex dump back into named descriptor fields.
//!
//! The dump is a flat byte stream: every descriptor the device yielded, one after
//! another, children included. Descriptors are self-delimiting through bLength, so
//! the stream splits without outside knowledge of what was fetched.

use byteorder::{ByteOrder, LittleEndian};

use crate::descriptor::DescriptorKind;
use crate::error::DecodeError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DecodedDescriptor {
    /// None for type codes outside the standard table; the raw bytes are still kept.
    pub kind: Option<DescriptorKind>,
    pub type_code: u8,
    pub bytes: Vec<u8>,
    pub fields: Vec<Field>,
}

/// Parses whitespace-separated hex byte tokens, with or without a `0x` prefix.
pub fn parse_hex_tokens(input: &str) -> Result<Vec<u8>, DecodeError> {
    input
        .split_whitespace()
        .map(|token| {
            let digits = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token);
            u8::from_str_radix(digits, 16).map_err(|_| DecodeError::BadToken(token.to_owned()))
        })
        .collect()
}

/// Walks the stream by bLength. Stops at a zero bLength or a block that overruns the
/// remaining bytes; everything before the stop still decodes.
pub fn split_descriptors(bytes: &[u8]) -> Vec<&[u8]> {
    let mut blocks = Vec::new();
    let mut index = 0;

    while index < bytes.len() {
        let length = bytes[index] as usize;
        if length == 0 || index + 1 >= bytes.len() || index + length > bytes.len() {
            break;
        }
        blocks.push(&bytes[index..index + length]);
        index += length;
    }

    blocks
}

pub fn decode_all(bytes: &[u8]) -> Vec<DecodedDescriptor> {
    split_descriptors(bytes).into_iter().map(decode_block).collect()
}

fn decode_block(block: &[u8]) -> DecodedDescriptor {
    let type_code = block.get(1).copied().unwrap_or(0);
    let kind = DescriptorKind::from_code(type_code);

    let fields = match kind {
        Some(DescriptorKind::Device) => device_fields(block),
        Some(DescriptorKind::Configuration) | Some(DescriptorKind::OtherSpeedConfiguration) => {
            configuration_fields(block)
        }
        Some(DescriptorKind::Interface) => interface_fields(block),
        Some(DescriptorKind::Endpoint) => endpoint_fields(block),
        Some(DescriptorKind::InterfaceAssociation) => interface_association_fields(block),
        Some(DescriptorKind::String) => string_fields(block),
        Some(DescriptorKind::DeviceQualifier) => qualifier_fields(block),
        Some(DescriptorKind::Bos) => bos_fields(block),
        Some(DescriptorKind::DeviceCapability) => capability_fields(block),
        _ => Vec::new(),
    };

    DecodedDescriptor {
        kind,
        type_code,
        bytes: block.to_vec(),
        fields,
    }
}

/// Renders a two-byte BCD field digit by digit, so 0x0210 becomes "02.10".
pub fn bcd_to_string(value: u16) -> String {
    format!(
        "{}{}.{}{}",
        (value >> 12) & 0xf,
        (value >> 8) & 0xf,
        (value >> 4) & 0xf,
        value & 0xf
    )
}

fn field(name: &'static str, value: impl Into<String>) -> Field {
    Field {
        name,
        value: value.into(),
    }
}

fn device_fields(block: &[u8]) -> Vec<Field> {
    if block.len() < 18 {
        return Vec::new();
    }
    vec![
        field("bcdUSB", bcd_to_string(LittleEndian::read_u16(&block[2..4]))),
        field("bDeviceClass", format!("0x{:02x}", block[4])),
        field("bDeviceSubClass", format!("0x{:02x}", block[5])),
        field("bDeviceProtocol", format!("0x{:02x}", block[6])),
        field("bMaxPacketSize0", block[7].to_string()),
        field("idVendor", format!("0x{:04x}", LittleEndian::read_u16(&block[8..10]))),
        field("idProduct", format!("0x{:04x}", LittleEndian::read_u16(&block[10..12]))),
        field("bcdDevice", bcd_to_string(LittleEndian::read_u16(&block[12..14]))),
        field("iManufacturer", block[14].to_string()),
        field("iProduct", block[15].to_string()),
        field("iSerialNumber", block[16].to_string()),
        field("bNumConfigurations", block[17].to_string()),
    ]
}

fn configuration_fields(block: &[u8]) -> Vec<Field> {
    if block.len() < 9 {
        return Vec::new();
    }
    vec![
        field("wTotalLength", LittleEndian::read_u16(&block[2..4]).to_string()),
        field("bNumInterfaces", block[4].to_string()),
        field("bConfigurationValue", block[5].to_string()),
        field("iConfiguration", block[6].to_string()),
        field("bmAttributes", format!("0x{:02x}", block[7])),
        field("bMaxPower", format!("{} mA", u16::from(block[8]) * 2)),
    ]
}

fn interface_fields(block: &[u8]) -> Vec<Field> {
    if block.len() < 9 {
        return Vec::new();
    }
    vec![
        field("bInterfaceNumber", block[2].to_string()),
        field("bAlternateSetting", block[3].to_string()),
        field("bNumEndpoints", block[4].to_string()),
        field("bInterfaceClass", format!("0x{:02x}", block[5])),
        field("bInterfaceSubClass", format!("0x{:02x}", block[6])),
        field("bInterfaceProtocol", format!("0x{:02x}", block[7])),
        field("iInterface", block[8].to_string()),
    ]
}

fn endpoint_fields(block: &[u8]) -> Vec<Field> {
    if block.len() < 7 {
        return Vec::new();
    }
    let address = block[2];
    let direction = if address & 0x80 != 0 { "IN" } else { "OUT" };
    let transfer = match block[3] & 0x03 {
        0 => "Control",
        1 => "Isochronous",
        2 => "Bulk",
        _ => "Interrupt",
    };
    vec![
        field(
            "bEndpointAddress",
            format!("0x{:02x} ({} endpoint {})", address, direction, address & 0x0f),
        ),
        field("bmAttributes", format!("0x{:02x} ({})", block[3], transfer)),
        field("wMaxPacketSize", LittleEndian::read_u16(&block[4..6]).to_string()),
        field("bInterval", block[6].to_string()),
    ]
}

fn interface_association_fields(block: &[u8]) -> Vec<Field> {
    if block.len() < 8 {
        return Vec::new();
    }
    vec![
        field("bFirstInterface", block[2].to_string()),
        field("bInterfaceCount", block[3].to_string()),
        field("bFunctionClass", format!("0x{:02x}", block[4])),
        field("bFunctionSubClass", format!("0x{:02x}", block[5])),
        field("bFunctionProtocol", format!("0x{:02x}", block[6])),
        field("iFunction", block[7].to_string()),
    ]
}

/// Index 0 is the LANGID table; every other string descriptor is UTF-16LE text.
/// The dump does not record which index a string came from, so follow the wire
/// shape: a descriptor no longer than 4 bytes is treated as the LANGID table.
fn string_fields(block: &[u8]) -> Vec<Field> {
    if block.len() <= 4 {
        return block[2..]
            .chunks_exact(2)
            .map(|pair| field("wLANGID", format!("0x{:04x}", LittleEndian::read_u16(pair))))
            .collect();
    }
    let units: Vec<u16> = block[2..].chunks_exact(2).map(LittleEndian::read_u16).collect();
    vec![field("String", String::from_utf16_lossy(&units))]
}

fn qualifier_fields(block: &[u8]) -> Vec<Field> {
    if block.len() < 9 {
        return Vec::new();
    }
    vec![
        field("bcdUSB", bcd_to_string(LittleEndian::read_u16(&block[2..4]))),
        field("bDeviceClass", format!("0x{:02x}", block[4])),
        field("bDeviceSubClass", format!("0x{:02x}", block[5])),
        field("bDeviceProtocol", format!("0x{:02x}", block[6])),
        field("bMaxPacketSize0", block[7].to_string()),
        field("bNumConfigurations", block[8].to_string()),
    ]
}

fn bos_fields(block: &[u8]) -> Vec<Field> {
    if block.len() < 5 {
        return Vec::new();
    }
    vec![
        field("wTotalLength", LittleEndian::read_u16(&block[2..4]).to_string()),
        field("bNumDeviceCaps", block[4].to_string()),
    ]
}

fn capability_fields(block: &[u8]) -> Vec<Field> {
    if block.len() < 3 {
        return Vec::new();
    }
    let mut fields = vec![field(
        "bDevCapabilityType",
        format!("0x{:02x} ({})", block[2], capability_name(block[2])),
    )];
    if block.len() > 3 {
        let payload: Vec<String> = block[3..].iter().map(|byte| format!("0x{:02x}", byte)).collect();
        fields.push(field("Data", payload.join(" ")));
    }
    fields
}

/// Device capability type codes, USB 3.2 table 9-14.
fn capability_name(code: u8) -> &'static str {
    match code {
        0x01 => "Wireless USB",
        0x02 => "USB 2.0 Extension",
        0x03 => "SuperSpeed USB",
        0x04 => "Container ID",
        0x05 => "Platform",
        0x06 => "Power Delivery Capability",
        0x07 => "Battery Info Capability",
        0x08 => "PD Consumer Port Capability",
        0x09 => "PD Provider Port Capability",
        0x0a => "SuperSpeed Plus",
        0x0b => "Precision Time Measurement",
        0x0c => "Wireless USB Ext",
        0x0d => "Billboard",
        0x0e => "Authentication",
        0x0f => "Billboard Ex",
        0x10 => "Configuration Summary",
        _ => "Reserved",
    }
}
