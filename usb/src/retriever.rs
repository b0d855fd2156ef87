use std::time::Duration;

use byteorder::{ByteOrder, LittleEndian};
use log::debug;

use crate::descriptor::{
    DescriptorKind, DescriptorRequest, DescriptorResult, DeviceInfo, CONFIG_HEADER_LENGTH,
    DEVICE_DESCRIPTOR_LENGTH, MAX_DESCRIPTOR_SIZE, PROBED_STRING_INDICES, REQUEST_TIMEOUT,
};
use crate::error::FetchError;
use crate::transport::{get_descriptor, ControlTransport};

/// Pulls the standard descriptor set out of one device, in a fixed order, one control
/// request per step (two for configurations).
///
/// Retrieval is best-effort throughout: a failed step becomes a `Failed` entry in the
/// result sequence and the next step runs regardless. Devices routinely answer BOS,
/// qualifier and other-speed requests with errors or nothing at all, and that absence
/// is information the caller wants, not a reason to stop.
pub struct DescriptorRetriever<'h, H: ControlTransport> {
    handle: &'h mut H,
    timeout: Duration,
}

impl<'h, H: ControlTransport> DescriptorRetriever<'h, H> {
    pub fn new(handle: &'h mut H) -> Self {
        Self {
            handle,
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// The fixed retrieval sequence. The order and sizing here are load-bearing for
    /// device compatibility and must stay as they are:
    ///
    /// 1. Device descriptor, exactly 18 bytes.
    /// 2. BOS descriptor (USB 3.0+ devices only).
    /// 3. Device qualifier (high-speed capable devices only).
    /// 4. String descriptors 0 through 3.
    /// 5. One configuration per bNumConfigurations, length-prefetched.
    /// 6. One other-speed configuration per bNumConfigurations.
    pub fn run(&mut self, device: &DeviceInfo) -> Vec<DescriptorResult> {
        let mut results = Vec::new();

        results.push(self.fetch(DescriptorRequest {
            kind: DescriptorKind::Device,
            index: 0,
            length: DEVICE_DESCRIPTOR_LENGTH,
        }));

        results.push(self.fetch(DescriptorRequest::max_sized(DescriptorKind::Bos, 0)));

        results.push(self.fetch(DescriptorRequest::max_sized(DescriptorKind::DeviceQualifier, 0)));

        // Fixed probe of indices 0-3, deliberately independent of the indices the
        // device descriptor itself declares.
        for index in PROBED_STRING_INDICES {
            results.push(self.fetch(DescriptorRequest::max_sized(DescriptorKind::String, index)));
        }

        for index in 0..device.num_configurations {
            results.push(self.fetch_configuration(index));
        }

        for index in 0..device.num_configurations {
            results.push(self.fetch(DescriptorRequest::max_sized(
                DescriptorKind::OtherSpeedConfiguration,
                index,
            )));
        }

        results
    }

    fn fetch(&mut self, request: DescriptorRequest) -> DescriptorResult {
        DescriptorResult {
            kind: request.kind,
            index: request.index,
            payload: self.transfer(request),
        }
    }

    /// One owned buffer per request, sized to the request and dropped with the step.
    fn transfer(&mut self, request: DescriptorRequest) -> Result<Vec<u8>, FetchError> {
        let length = (request.length as usize).min(MAX_DESCRIPTOR_SIZE);
        let mut buf = vec![0u8; length];
        let received = get_descriptor(self.handle, request.kind, request.index, &mut buf, self.timeout)?;
        if received == 0 {
            debug!("{} descriptor {} is not present", request.kind, request.index);
            return Err(FetchError::Empty);
        }
        buf.truncate(received);
        Ok(buf)
    }

    /// Configuration descriptors are variable length: the full descriptor embeds every
    /// interface, endpoint and class-specific descriptor below it, and an undersized
    /// read truncates the children silently. So: fetch the 9-byte header, read the
    /// declared wTotalLength, then re-fetch sized exactly to it.
    fn fetch_configuration(&mut self, index: u8) -> DescriptorResult {
        let payload = self
            .transfer(DescriptorRequest {
                kind: DescriptorKind::Configuration,
                index,
                length: CONFIG_HEADER_LENGTH,
            })
            .and_then(|header| {
                if header.len() < 4 {
                    return Err(FetchError::TruncatedHeader);
                }
                let total_length = LittleEndian::read_u16(&header[2..4]);
                self.transfer(DescriptorRequest {
                    kind: DescriptorKind::Configuration,
                    index,
                    length: total_length,
                })
            });

        DescriptorResult {
            kind: DescriptorKind::Configuration,
            index,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusb::constants::LIBUSB_REQUEST_GET_DESCRIPTOR;

    const TEST_DEVICE: DeviceInfo = DeviceInfo {
        vendor_id: 0x1d6b,
        product_id: 0x0104,
        num_configurations: 1,
        manufacturer_index: Some(1),
        product_index: Some(2),
        serial_index: Some(3),
    };

    fn device_bytes() -> Vec<u8> {
        vec![
            0x12, 0x01, 0x10, 0x02, 0x00, 0x00, 0x00, 0x40, 0x6b, 0x1d, 0x04, 0x01, 0x00, 0x01,
            0x01, 0x02, 0x03, 0x01,
        ]
    }

    /// A 32-byte configuration: 9-byte header (wTotalLength = 32), one interface,
    /// two endpoints.
    fn config_bytes() -> Vec<u8> {
        let mut bytes = vec![0x09, 0x02, 0x20, 0x00, 0x01, 0x01, 0x00, 0x80, 0x32];
        bytes.extend([0x09, 0x04, 0x00, 0x00, 0x02, 0xff, 0x00, 0x00, 0x00]);
        bytes.extend([0x07, 0x05, 0x81, 0x02, 0x00, 0x02, 0x00]);
        bytes.extend([0x07, 0x05, 0x01, 0x02, 0x00, 0x02, 0x00]);
        assert_eq!(bytes.len(), 32);
        bytes
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Request {
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf_len: usize,
    }

    /// A scripted device: answers GET_DESCRIPTOR per kind/index, records every
    /// request it sees. Unscripted descriptors fail like a stalled control pipe.
    struct FakeDevice {
        requests: Vec<Request>,
        device: Vec<u8>,
        config: Vec<u8>,
        bos: Option<Vec<u8>>,
        qualifier: Option<Vec<u8>>,
        strings: [Option<Vec<u8>>; 4],
    }

    impl FakeDevice {
        fn new() -> Self {
            Self {
                requests: Vec::new(),
                device: device_bytes(),
                config: config_bytes(),
                bos: Some(vec![0x05, 0x0f, 0x0c, 0x00, 0x01, 0x07, 0x10, 0x02, 0x02, 0x00, 0x00, 0x00]),
                qualifier: Some(vec![0x0a, 0x06, 0x00, 0x02, 0x00, 0x00, 0x00, 0x40, 0x01, 0x00]),
                strings: [
                    Some(vec![0x04, 0x03, 0x09, 0x04]),
                    Some(vec![0x0a, 0x03, b'A', 0x00, b'c', 0x00, b'm', 0x00, b'e', 0x00]),
                    Some(vec![0x08, 0x03, b'H', 0x00, b'u', 0x00, b'b', 0x00]),
                    None,
                ],
            }
        }

        fn scripted(&self, kind: u8, index: u8) -> Option<&[u8]> {
            match DescriptorKind::from_code(kind) {
                Some(DescriptorKind::Device) => Some(&self.device),
                Some(DescriptorKind::Configuration) if index == 0 => Some(&self.config),
                Some(DescriptorKind::Bos) => self.bos.as_deref(),
                Some(DescriptorKind::DeviceQualifier) => self.qualifier.as_deref(),
                Some(DescriptorKind::String) => {
                    self.strings.get(index as usize).and_then(|s| s.as_deref())
                }
                _ => None,
            }
        }
    }

    impl ControlTransport for FakeDevice {
        fn control_read(
            &mut self,
            request_type: u8,
            request: u8,
            value: u16,
            index: u16,
            buf: &mut [u8],
            _timeout: Duration,
        ) -> Result<usize, rusb::Error> {
            self.requests.push(Request {
                request_type,
                request,
                value,
                index,
                buf_len: buf.len(),
            });

            let kind = (value >> 8) as u8;
            let descriptor_index = (value & 0xff) as u8;
            match self.scripted(kind, descriptor_index) {
                Some(data) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(len)
                }
                None => Err(rusb::Error::Pipe),
            }
        }
    }

    fn run(device: &mut FakeDevice) -> Vec<DescriptorResult> {
        DescriptorRetriever::new(device).run(&TEST_DEVICE)
    }

    #[test]
    fn device_descriptor_requests_exactly_18_bytes() {
        let mut device = FakeDevice::new();
        run(&mut device);

        let first = &device.requests[0];
        assert_eq!(first.request_type, 0x80);
        assert_eq!(first.request, LIBUSB_REQUEST_GET_DESCRIPTOR);
        assert_eq!(first.value, 0x0100);
        assert_eq!(first.index, 0);
        assert_eq!(first.buf_len, 18);
    }

    #[test]
    fn configuration_fetch_is_header_then_total_length() {
        let mut device = FakeDevice::new();
        let results = run(&mut device);

        let config_requests: Vec<&Request> = device
            .requests
            .iter()
            .filter(|request| request.value == 0x0200)
            .collect();
        assert_eq!(config_requests.len(), 2);
        assert_eq!(config_requests[0].buf_len, 9);
        assert_eq!(config_requests[1].buf_len, 32);

        let config = results
            .iter()
            .find(|result| result.kind == DescriptorKind::Configuration)
            .unwrap();
        assert_eq!(config.bytes(), Some(config_bytes().as_slice()));
    }

    #[test]
    fn string_probe_covers_indices_zero_through_three() {
        let mut device = FakeDevice::new();
        let results = run(&mut device);

        let probed: Vec<u16> = device
            .requests
            .iter()
            .filter(|request| request.value >> 8 == 0x03)
            .map(|request| request.value & 0xff)
            .collect();
        assert_eq!(probed, vec![0, 1, 2, 3]);

        // Index 3 is unscripted: present in the sequence, marked failed.
        let serial = results
            .iter()
            .find(|result| result.kind == DescriptorKind::String && result.index == 3)
            .unwrap();
        assert_eq!(serial.payload, Err(FetchError::Usb(rusb::Error::Pipe)));
    }

    #[test]
    fn missing_bos_and_qualifier_do_not_stop_the_sequence() {
        let mut device = FakeDevice::new();
        device.bos = None;
        device.qualifier = None;
        let results = run(&mut device);

        // 1 device + 1 bos + 1 qualifier + 4 strings + 1 config + 1 other speed.
        assert_eq!(results.len(), 9);
        assert!(results[1].payload.is_err());
        assert!(results[2].payload.is_err());
        assert_eq!(results[0].bytes(), Some(device_bytes().as_slice()));
        assert!(results
            .iter()
            .any(|result| result.kind == DescriptorKind::Configuration && result.bytes().is_some()));
    }

    #[test]
    fn empty_transfers_are_recorded_as_failed() {
        let mut device = FakeDevice::new();
        device.strings[0] = Some(Vec::new());
        let results = run(&mut device);

        let languages = results
            .iter()
            .find(|result| result.kind == DescriptorKind::String && result.index == 0)
            .unwrap();
        assert_eq!(languages.payload, Err(FetchError::Empty));
    }

    #[test]
    fn repeated_runs_are_identical() {
        let mut device = FakeDevice::new();
        let first = run(&mut device);
        let second = run(&mut device);
        assert_eq!(first, second);
    }
}
