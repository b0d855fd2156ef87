use log::{debug, warn};
use rusb::UsbContext;

use crate::descriptor::MAX_CLAIMED_INTERFACES;

/// The interface and kernel-driver operations the claim/release walk needs.
pub trait InterfaceOps {
    fn driver_active(&mut self, interface: u8) -> Result<bool, rusb::Error>;
    fn detach_driver(&mut self, interface: u8) -> Result<(), rusb::Error>;
    fn attach_driver(&mut self, interface: u8) -> Result<(), rusb::Error>;
    fn claim(&mut self, interface: u8) -> Result<(), rusb::Error>;
    fn release(&mut self, interface: u8) -> Result<(), rusb::Error>;
}

impl<T: UsbContext> InterfaceOps for rusb::DeviceHandle<T> {
    fn driver_active(&mut self, interface: u8) -> Result<bool, rusb::Error> {
        self.kernel_driver_active(interface)
    }

    fn detach_driver(&mut self, interface: u8) -> Result<(), rusb::Error> {
        self.detach_kernel_driver(interface)
    }

    fn attach_driver(&mut self, interface: u8) -> Result<(), rusb::Error> {
        self.attach_kernel_driver(interface)
    }

    fn claim(&mut self, interface: u8) -> Result<(), rusb::Error> {
        self.claim_interface(interface)
    }

    fn release(&mut self, interface: u8) -> Result<(), rusb::Error> {
        self.release_interface(interface)
    }
}

/// What one interface looked like at claim time. `had_kernel_driver` is recorded
/// before any detach attempt so release can restore the pre-claim state even when
/// the detach or the claim itself failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InterfaceState {
    pub number: u8,
    pub had_kernel_driver: bool,
    pub claimed: bool,
}

/// The claim walk over interfaces 0..count and its guaranteed mirror image.
///
/// No sub-step failure is fatal: a single interface that cannot be detached or
/// claimed must not cost the retrieval pass, and must not block cleanup of the
/// others.
#[derive(Debug)]
pub struct InterfaceClaims {
    states: Vec<InterfaceState>,
    released: bool,
}

impl InterfaceClaims {
    /// Detaches kernel drivers where present and claims interfaces 0..count, capped
    /// at [`MAX_CLAIMED_INTERFACES`]. Records the pre-detach driver state for every
    /// interface, including the ones that subsequently fail.
    pub fn acquire<H: InterfaceOps>(handle: &mut H, count: u8) -> Self {
        let count = count.min(MAX_CLAIMED_INTERFACES);
        let mut states = Vec::with_capacity(count as usize);

        for number in 0..count {
            let had_kernel_driver = match handle.driver_active(number) {
                Ok(active) => active,
                Err(error) => {
                    debug!("Kernel driver query failed on interface {}: {}", number, error);
                    false
                }
            };

            if had_kernel_driver {
                if let Err(error) = handle.detach_driver(number) {
                    warn!("Unable to detach the kernel driver from interface {}: {}", number, error);
                }
            }

            let claimed = match handle.claim(number) {
                Ok(()) => true,
                Err(error) => {
                    warn!("Unable to claim interface {}: {}", number, error);
                    false
                }
            };

            states.push(InterfaceState {
                number,
                had_kernel_driver,
                claimed,
            });
        }

        Self {
            states,
            released: false,
        }
    }

    pub fn states(&self) -> &[InterfaceState] {
        &self.states
    }

    /// Walks every recorded interface: releases it if the claim succeeded, then
    /// reattaches the kernel driver if and only if one was attached at claim time.
    /// Failures are logged and the walk continues; calling this twice is a no-op.
    pub fn release<H: InterfaceOps>(&mut self, handle: &mut H) {
        if self.released {
            return;
        }
        self.released = true;

        for state in &self.states {
            if state.claimed {
                if let Err(error) = handle.release(state.number) {
                    warn!("Unable to release interface {}: {}", state.number, error);
                }
            }
            if state.had_kernel_driver {
                if let Err(error) = handle.attach_driver(state.number) {
                    warn!(
                        "Unable to reattach the kernel driver to interface {}: {}",
                        state.number, error
                    );
                }
            }
        }
    }
}

impl Drop for InterfaceClaims {
    fn drop(&mut self) {
        if !self.released && !self.states.is_empty() {
            warn!("Interface claims dropped without release");
        }
    }
}
