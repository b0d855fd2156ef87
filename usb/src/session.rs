use log::debug;
use rusb::{Device, DeviceHandle, UsbContext};

use crate::descriptor::{DescriptorResult, DeviceInfo, MAX_CLAIMED_INTERFACES};
use crate::interfaces::InterfaceClaims;
use crate::retriever::DescriptorRetriever;

/// One retrieval pass against one open device.
///
/// The session owns the handle for its whole lifetime and pins the ordering the
/// hardware needs: interfaces are claimed before the first request, released after
/// the last, and the handle closes (once, on drop) only after release.
pub struct RetrievalSession<T: UsbContext> {
    handle: DeviceHandle<T>,
    info: DeviceInfo,
    interface_count: u8,
}

impl<T: UsbContext> RetrievalSession<T> {
    /// Opens the device and reads its static descriptor.
    pub fn open(device: &Device<T>) -> Result<Self, rusb::Error> {
        let descriptor = device.device_descriptor()?;
        let interface_count = planned_interface_count(device);
        let handle = device.open()?;

        Ok(Self {
            handle,
            info: DeviceInfo::from(&descriptor),
            interface_count,
        })
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn interface_count(&self) -> u8 {
        self.interface_count
    }

    /// Claim, retrieve, release. Consumes the session; dropping the handle at the end
    /// of this function is what closes the device.
    pub fn run(mut self) -> Vec<DescriptorResult> {
        let mut claims = InterfaceClaims::acquire(&mut self.handle, self.interface_count);
        let results = DescriptorRetriever::new(&mut self.handle).run(&self.info);
        claims.release(&mut self.handle);
        results
    }
}

/// Interface count for the claim walk: the first configuration's bNumInterfaces,
/// capped at [`MAX_CLAIMED_INTERFACES`], falling back to 1 when the configuration
/// cannot be read or reports none.
fn planned_interface_count<T: UsbContext>(device: &Device<T>) -> u8 {
    match device.config_descriptor(0) {
        Ok(config) if config.num_interfaces() > 0 => {
            config.num_interfaces().min(MAX_CLAIMED_INTERFACES)
        }
        Ok(_) => 1,
        Err(error) => {
            debug!("Unable to read the first configuration descriptor: {}", error);
            1
        }
    }
}
