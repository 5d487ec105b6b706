//! Volume open with bounded retry
//!
//! A freshly connected driver may still be probing the partition when we
//! first ask for its filesystem, so the open is retried after a fixed delay.

use crate::config::RetryPolicy;
use crate::error::{LoaderError, Result};
use crate::firmware::{Directory, Firmware, Handle, Volume};
use crate::Status;
use log::{error, info, warn};

/// Open the Simple File System on `handle`, making at most
/// `policy.retries + 1` attempts. The first success is returned right away.
pub fn open_with_retry<F: Firmware>(
    firmware: &F,
    handle: Handle,
    policy: &RetryPolicy,
) -> Result<F::Volume> {
    let mut last = Status::NOT_FOUND;

    for attempt in 0..=policy.retries {
        match firmware.open_file_system(handle) {
            Ok(volume) => return Ok(volume),
            Err(status) => {
                error!("  Could not open partition: {}", status);
                last = status;
            }
        }
        if attempt < policy.retries {
            warn!("  Waiting {} seconds before retrying...", policy.delay_secs());
            firmware.stall(policy.delay_us);
        }
    }

    Err(LoaderError::VolumeUnavailable(last))
}

/// Open the root directory of `volume`.
pub fn open_root<V: Volume>(volume: &mut V) -> Result<V::Dir> {
    volume.open_root().map_err(LoaderError::RootDirectory)
}

/// Report the volume label. Purely informational.
pub fn log_volume_label<D: Directory>(root: &mut D) {
    match root.volume_label() {
        Ok(label) => info!("  Volume label is '{}'", label),
        Err(status) => warn!("  Could not read volume label: {}", status),
    }
}
