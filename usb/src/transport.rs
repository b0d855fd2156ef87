use std::time::Duration;

use rusb::constants::LIBUSB_REQUEST_GET_DESCRIPTOR;
use rusb::{Direction, Recipient, RequestType, UsbContext};

use crate::descriptor::DescriptorKind;

/// The synchronous control-IN boundary: one request, one buffer, one timeout.
/// Implemented by rusb device handles and by the test doubles the retriever tests use.
pub trait ControlTransport {
    fn control_read(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, rusb::Error>;
}

impl<T: UsbContext> ControlTransport for rusb::DeviceHandle<T> {
    fn control_read(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, rusb::Error> {
        self.read_control(request_type, request, value, index, buf, timeout)
    }
}

/// Issues one standard GET_DESCRIPTOR request. wValue carries the descriptor type in
/// its high byte and the descriptor index in its low byte; wIndex stays 0 (the
/// language id, unused for everything fetched here).
pub fn get_descriptor<H: ControlTransport>(
    handle: &mut H,
    kind: DescriptorKind,
    index: u8,
    buf: &mut [u8],
    timeout: Duration,
) -> Result<usize, rusb::Error> {
    let request_type = rusb::request_type(Direction::In, RequestType::Standard, Recipient::Device);
    let value = (u16::from(kind.code()) << 8) | u16::from(index);
    handle.control_read(
        request_type,
        LIBUSB_REQUEST_GET_DESCRIPTOR,
        value,
        0,
        buf,
        timeout,
    )
}
