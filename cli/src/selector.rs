use std::io::{self, Write};

use anyhow::{bail, Context as _, Result};
use log::debug;
use usbdump_usb::descriptor::DeviceInfo;
use usbdump_usb::rusb::{Context, Device, DeviceDescriptor, UsbContext};

/// One row of the selection list: enough to print it and to open the device later.
pub struct Candidate<T: UsbContext> {
    pub device: Device<T>,
    pub info: DeviceInfo,
    pub product: Option<String>,
}

/// Collects every enumerable device. A device whose descriptor cannot be read is
/// skipped with a log line; the product name is best-effort and never blocks the
/// listing (many devices cannot be opened without privileges).
pub fn candidates(context: &Context) -> Result<Vec<Candidate<Context>>> {
    let mut list = Vec::new();

    for device in context
        .devices()
        .context("Unable to enumerate USB devices")?
        .iter()
    {
        let descriptor = match device.device_descriptor() {
            Ok(descriptor) => descriptor,
            Err(error) => {
                debug!(
                    "Skipping device on bus {} address {}: {}",
                    device.bus_number(),
                    device.address(),
                    error
                );
                continue;
            }
        };

        let product = read_product_string(&device, &descriptor);
        list.push(Candidate {
            info: DeviceInfo::from(&descriptor),
            product,
            device,
        });
    }

    Ok(list)
}

fn read_product_string<T: UsbContext>(
    device: &Device<T>,
    descriptor: &DeviceDescriptor,
) -> Option<String> {
    let index = descriptor.product_string_index()?;
    let handle = device.open().ok()?;
    handle.read_string_descriptor_ascii(index).ok()
}

pub fn print_candidates<T: UsbContext>(candidates: &[Candidate<T>]) {
    println!("Connected USB devices:");
    for (index, candidate) in candidates.iter().enumerate() {
        match &candidate.product {
            Some(name) => println!(
                "[{}] VID: {:04x} PID: {:04x} - {}",
                index, candidate.info.vendor_id, candidate.info.product_id, name
            ),
            None => println!(
                "[{}] VID: {:04x} PID: {:04x}",
                index, candidate.info.vendor_id, candidate.info.product_id
            ),
        }
    }
}

/// Reads one line from stdin and resolves it against the candidate list.
pub fn prompt_selection(count: usize) -> Result<usize> {
    print!("\nSelect a device by number: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Unable to read the selection")?;

    parse_selection(&line, count)
}

pub fn parse_selection(line: &str, count: usize) -> Result<usize> {
    let input = line.trim();
    let choice: usize = match input.parse() {
        Ok(choice) => choice,
        Err(_) => bail!("Invalid selection: {:?}", input),
    };
    if choice >= count {
        bail!("Invalid selection: {} is not on the list", choice);
    }
    Ok(choice)
}
