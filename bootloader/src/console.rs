//! Firmware text console as a `log` sink
//!
//! ```text
//! [INFO] Searching for target partition on boot disk:
//! [WARN] Unloading existing 'AMI NTFS Driver v0x10'
//! [FAIL] Could not locate target partition
//! ```

use crate::uefi::from_ucs2_ptr;
use crate::{SimpleTextOutputProtocol, SystemTable};
use core::fmt::{self, Write};
use log::{Level, LevelFilter, Log, Metadata, Record};
use ntfsboot_core::arch::Arch;
use spin::Mutex;

// EFI text colors
pub const EFI_LIGHTGRAY: usize = 0x07;
pub const EFI_YELLOW: usize = 0x0E;
pub const EFI_LIGHTRED: usize = 0x0C;
pub const EFI_WHITE: usize = 0x0F;

struct ConOut(*mut SimpleTextOutputProtocol);

// SAFETY: boot services are single threaded; the mutex only serialises
// re-entrant logging from the panic handler.
unsafe impl Send for ConOut {}

impl ConOut {
    fn set_color(&mut self, fg: usize) {
        // SAFETY: pointer comes from the system table and is non-null
        unsafe {
            ((*self.0).set_attribute)(self.0, fg);
        }
    }
}

impl Write for ConOut {
    /// Encode in fixed-size chunks, turning `\n` into `\r\n`.
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut buffer = [0u16; 128];
        let mut len = 0;
        let mut flush = |buffer: &mut [u16; 128], len: &mut usize| {
            buffer[*len] = 0;
            // SAFETY: buffer is NUL terminated
            unsafe {
                ((*self.0).output_string)(self.0, buffer.as_ptr());
            }
            *len = 0;
        };

        for c in s.chars() {
            let mut units = [0u16; 2];
            let encoded: &[u16] = if c == '\n' {
                units = [b'\r' as u16, b'\n' as u16];
                &units
            } else {
                c.encode_utf16(&mut units)
            };
            if len + encoded.len() >= buffer.len() {
                flush(&mut buffer, &mut len);
            }
            buffer[len..len + encoded.len()].copy_from_slice(encoded);
            len += encoded.len();
        }
        if len > 0 {
            flush(&mut buffer, &mut len);
        }
        Ok(())
    }
}

static CON_OUT: Mutex<Option<ConOut>> = Mutex::new(None);

pub struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

fn prefix(level: Level) -> (&'static str, usize) {
    match level {
        Level::Error => ("[FAIL]", EFI_LIGHTRED),
        Level::Warn => ("[WARN]", EFI_YELLOW),
        _ => ("[INFO]", EFI_WHITE),
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut guard = CON_OUT.lock();
        let Some(out) = guard.as_mut() else {
            return;
        };
        let (tag, color) = prefix(record.level());
        out.set_color(color);
        let _ = out.write_str(tag);
        out.set_color(EFI_LIGHTGRAY);
        let _ = writeln!(out, " {}", record.args());
    }

    fn flush(&self) {}
}

/// Route `log` output to `con_out`. A null console leaves logging off.
pub fn init(con_out: *mut SimpleTextOutputProtocol) {
    if con_out.is_null() {
        return;
    }
    *CON_OUT.lock() = Some(ConOut(con_out));
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }
}

/// Version line and firmware identification.
pub fn banner(st: &SystemTable, arch: &Arch) {
    log::info!("ntfsboot {} ({})", ntfsboot_core::VERSION, arch.tag);

    // SAFETY: firmware_vendor is a NUL terminated string in the system table
    let vendor = unsafe { from_ucs2_ptr(st.firmware_vendor) };
    let revision = st.header.revision;
    log::info!(
        "{} {}.{:02} (UEFI {}.{})",
        vendor.as_deref().unwrap_or("Unknown firmware"),
        st.firmware_revision >> 16,
        st.firmware_revision & 0xFFFF,
        revision >> 16,
        (revision & 0xFFFF) / 10,
    );
}
