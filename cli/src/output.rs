use std::io::{self, Write};

use usbdump_usb::decode::DecodedDescriptor;
use usbdump_usb::descriptor::{DescriptorKind, DescriptorResult};

/// Default dump location, overwritten on every run.
pub const DUMP_FILE: &str = "usb_descriptors_dump.txt";

const BYTES_PER_ROW: usize = 16;

/// Persisted form: every retrieved byte as a `0xHH ` token, in retrieval order, with
/// nothing marking descriptor boundaries. Failed steps contribute nothing at all, so
/// the file is exactly the bytes that were retrieved.
pub fn write_hex_dump<W: Write>(out: &mut W, results: &[DescriptorResult]) -> io::Result<()> {
    for result in results {
        if let Some(bytes) = result.bytes() {
            for byte in bytes {
                write!(out, "0x{:02x} ", byte)?;
            }
        }
    }
    Ok(())
}

/// Interactive form: a label and byte count per retrieved descriptor, then the bytes
/// as a 16-per-row table with a running hex offset. Failed steps are omitted, not
/// reported as blanks.
pub fn print_hex_table<W: Write>(out: &mut W, results: &[DescriptorResult]) -> io::Result<()> {
    for result in results {
        let Some(bytes) = result.bytes() else {
            continue;
        };

        writeln!(out)?;
        write!(out, "{} ({} bytes):", label(result), bytes.len())?;
        for (offset, byte) in bytes.iter().enumerate() {
            if offset % BYTES_PER_ROW == 0 {
                write!(out, "\n{:04x}: ", offset)?;
            }
            write!(out, "0x{:02x} ", byte)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Decoded form for `usbdump-decode`: a heading per descriptor, fields indented
/// beneath it.
pub fn print_decoded<W: Write>(out: &mut W, descriptors: &[DecodedDescriptor]) -> io::Result<()> {
    for descriptor in descriptors {
        let heading = match descriptor.kind {
            Some(kind) => format!("{} Descriptor", kind),
            None => format!("Unknown Descriptor (type 0x{:02x})", descriptor.type_code),
        };
        writeln!(out, "\n{} ({} bytes)", heading, descriptor.bytes.len())?;
        for field in &descriptor.fields {
            writeln!(out, "    {}: {}", field.name, field.value)?;
        }
    }
    Ok(())
}

/// Strings and the two configuration classes come in several instances per device,
/// so their labels carry the index; the singleton classes do not.
fn label(result: &DescriptorResult) -> String {
    match result.kind {
        DescriptorKind::String
        | DescriptorKind::Configuration
        | DescriptorKind::OtherSpeedConfiguration => {
            format!("{} Descriptor {}", result.kind, result.index)
        }
        kind => format!("{} Descriptor", kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usbdump_usb::error::FetchError;

    fn result(kind: DescriptorKind, index: u8, payload: Result<Vec<u8>, FetchError>) -> DescriptorResult {
        DescriptorResult { kind, index, payload }
    }

    #[test]
    fn persisted_form_is_the_literal_token_sequence() {
        let results = vec![result(
            DescriptorKind::Device,
            0,
            Ok(vec![
                0x12, 0x01, 0x10, 0x02, 0x00, 0x00, 0x00, 0x40, 0x6b, 0x1d, 0x04, 0x01, 0x00,
                0x01, 0x01, 0x02, 0x03, 0x01,
            ]),
        )];

        let mut out = Vec::new();
        write_hex_dump(&mut out, &results).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "0x12 0x01 0x10 0x02 0x00 0x00 0x00 0x40 0x6b 0x1d 0x04 0x01 0x00 0x01 0x01 0x02 0x03 0x01 "
        );
    }

    #[test]
    fn persisted_form_has_no_boundary_separators() {
        let results = vec![
            result(DescriptorKind::Device, 0, Ok(vec![0x12, 0x01])),
            result(DescriptorKind::String, 0, Ok(vec![0x04, 0x03])),
        ];

        let mut out = Vec::new();
        write_hex_dump(&mut out, &results).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "0x12 0x01 0x04 0x03 ");
    }

    #[test]
    fn failed_steps_are_silently_omitted() {
        let results = vec![
            result(DescriptorKind::Device, 0, Ok(vec![0x12])),
            result(DescriptorKind::Bos, 0, Err(FetchError::Empty)),
            result(DescriptorKind::String, 1, Ok(vec![0x04])),
        ];

        let mut dump = Vec::new();
        write_hex_dump(&mut dump, &results).unwrap();
        assert_eq!(String::from_utf8(dump).unwrap(), "0x12 0x04 ");

        let mut table = Vec::new();
        print_hex_table(&mut table, &results).unwrap();
        let rendered = String::from_utf8(table).unwrap();
        assert!(!rendered.contains("BOS"));
    }

    #[test]
    fn table_rows_break_at_sixteen_bytes_with_offsets() {
        let results = vec![result(DescriptorKind::Device, 0, Ok((0..20).collect()))];

        let mut out = Vec::new();
        print_hex_table(&mut out, &results).unwrap();
        let rendered = String::from_utf8(out).unwrap();

        assert!(rendered.contains("Device Descriptor (20 bytes):"));
        assert!(rendered.contains("\n0000: 0x00 "));
        assert!(rendered.contains("\n0010: 0x10 0x11 0x12 0x13 "));
    }

    #[test]
    fn indexed_kinds_carry_their_index_in_the_label() {
        let results = vec![
            result(DescriptorKind::String, 2, Ok(vec![0x04, 0x03])),
            result(DescriptorKind::Configuration, 0, Ok(vec![0x09, 0x02])),
            result(DescriptorKind::Bos, 0, Ok(vec![0x05, 0x0f])),
        ];

        let mut out = Vec::new();
        print_hex_table(&mut out, &results).unwrap();
        let rendered = String::from_utf8(out).unwrap();

        assert!(rendered.contains("String Descriptor 2 (2 bytes):"));
        assert!(rendered.contains("Configuration Descriptor 0 (2 bytes):"));
        assert!(rendered.contains("BOS Descriptor (2 bytes):"));
    }
}
