use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{bail, Context as _, Result};
use log::info;
use usbdump_usb::decode;
use usbdump_usb::descriptor::DescriptorResult;
use usbdump_usb::error::DecodeError;
use usbdump_usb::rusb::Context;
use usbdump_usb::session::RetrievalSession;

use crate::output;
use crate::selector;

/// The interactive front half shared by `usbdump` and `usbdump-show`: bring up the
/// transport, enumerate, list, prompt, open. Every failure in here is fatal; nothing
/// has been claimed yet, so there is nothing to clean up.
fn select_and_open() -> Result<RetrievalSession<Context>> {
    let context = Context::new().context("Unable to initialise the USB transport")?;

    let candidates = selector::candidates(&context)?;
    if candidates.is_empty() {
        bail!("No USB devices found");
    }

    selector::print_candidates(&candidates);
    let choice = selector::prompt_selection(candidates.len())?;

    let session = RetrievalSession::open(&candidates[choice].device)
        .context("Failed to open the selected device")?;
    info!(
        "Device {:04x}:{:04x}, claiming {} interface(s)",
        session.device_info().vendor_id,
        session.device_info().product_id,
        session.interface_count()
    );
    Ok(session)
}

fn log_outcome(results: &[DescriptorResult]) {
    let retrieved = results.iter().filter(|result| result.bytes().is_some()).count();
    info!("Retrieved {} of {} descriptors", retrieved, results.len());
}

/// `usbdump`: full retrieval, persisted hex dump. Partial retrieval still exits 0;
/// the dump simply contains what was retrievable.
pub fn run_dump(path: &Path) -> Result<()> {
    let session = select_and_open()?;

    // Created before any interface is touched, so a bad path fails while there is
    // still nothing to unwind.
    let file = File::create(path)
        .with_context(|| format!("Unable to create the dump file {}", path.display()))?;

    let results = session.run();
    log_outcome(&results);

    let mut writer = BufWriter::new(file);
    output::write_hex_dump(&mut writer, &results)?;
    writer.flush()?;

    println!("\nDescriptor dump complete. File saved to: {}", path.display());
    Ok(())
}

/// `usbdump-show`: same retrieval, hex table on stdout instead of a file.
pub fn run_show() -> Result<()> {
    let session = select_and_open()?;

    let results = session.run();
    log_outcome(&results);

    let stdout = io::stdout();
    output::print_hex_table(&mut stdout.lock(), &results)?;
    Ok(())
}

/// `usbdump-decode`: read a persisted dump (`-` for stdin), print decoded fields.
pub fn run_decode(input: &Path) -> Result<()> {
    let text = if input == Path::new("-") {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Unable to read from stdin")?;
        text
    } else {
        fs::read_to_string(input)
            .with_context(|| format!("Unable to read {}", input.display()))?
    };

    let bytes = decode::parse_hex_tokens(&text)?;
    if bytes.is_empty() {
        return Err(DecodeError::Empty.into());
    }

    let descriptors = decode::decode_all(&bytes);
    let stdout = io::stdout();
    output::print_decoded(&mut stdout.lock(), &descriptors)?;
    Ok(())
}
