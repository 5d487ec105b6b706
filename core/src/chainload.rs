//! Load and start the next-stage loader

use crate::error::{LoaderError, Result};
use crate::firmware::{Firmware, Handle};
use crate::probe::LoaderProbe;
use crate::secure_boot::SecureBootState;
use crate::Status;
use log::{info, warn};

/// Load `loader` (already case resolved) from the target partition at
/// `target_device` and start it. Returns once the loader exits.
pub fn launch<F: Firmware>(
    firmware: &F,
    target_device: Handle,
    loader: &str,
    secure_boot: SecureBootState,
    probe: &dyn LoaderProbe,
) -> Result<()> {
    let path = firmware
        .device_path(target_device)
        .map(|device| device.with_file(loader))
        .ok_or(LoaderError::LoaderPath)?;

    let image = firmware
        .load_image(&path)
        .map_err(|status| LoaderError::LoaderLoad(secure_boot.translate_load_error(status)))?;
    drop(path);

    let identified = match firmware.loaded_image(image) {
        Ok(loaded) => probe.identify(loaded.image),
        Err(status) => {
            warn!("Unable to inspect loaded executable: {}", status);
            None
        }
    };
    if let Some(name) = identified {
        info!("Starting {}...", name);
    }

    match firmware.start_image(image) {
        Ok(()) => Ok(()),
        // bootmgr reports both internal errors and security rejections
        // this way
        Err(Status::NO_MAPPING) if identified.is_some() => Err(LoaderError::BootManagerRejected),
        Err(status) => Err(LoaderError::LoaderStart(status)),
    }
}
