//! Filesystem driver lifecycle
//!
//! Three narrow operations, applied in order:
//!
//! 1. [`disconnect_blocking_drivers`]: some firmwares (HP notebooks for
//!    one) leave Disk I/O on partitions opened BY_DRIVER even though no
//!    filesystem was produced, which keeps every other driver off them.
//! 2. [`unload_conflicting_driver`]: a native driver already servicing the
//!    target is unloaded (buggy AMI NTFS drivers are common).
//! 3. [`start_companion_driver`]: our own driver is loaded from the boot
//!    partition, started and connected to the target.

use crate::arch::Arch;
use crate::config::Config;
use crate::error::{LoaderError, Result};
use crate::firmware::{Firmware, Handle, MemoryType};
use crate::secure_boot::SecureBootState;
use crate::topology::Target;
use crate::Status;
use alloc::string::String;
use log::{error, info, warn};

const UNKNOWN_DRIVER: &str = "(unknown driver)";

/// Whether a partition already has a filesystem driver attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Serviced,
    NeedsService,
}

impl ServiceState {
    /// Interpret the status of a Simple File System TEST_PROTOCOL open.
    /// Unsupported is the "no filesystem yet" signal, not a failure.
    pub fn from_test_status(status: Status) -> core::result::Result<Self, Status> {
        match status {
            Status::SUCCESS => Ok(Self::Serviced),
            Status::UNSUPPORTED => Ok(Self::NeedsService),
            other => Err(other),
        }
    }
}

/// Driver about to be unloaded, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverRecord {
    pub image: Handle,
    pub version: u32,
    pub name: String,
}

fn driver_name<F: Firmware>(firmware: &F, driver: Handle) -> String {
    firmware
        .driver_name(driver)
        .unwrap_or_else(|| String::from(UNKNOWN_DRIVER))
}

/// Disconnect BY_DRIVER openers of Disk I/O on partitions that produced no
/// filesystem. Best effort: failures are reported and skipped.
pub fn disconnect_blocking_drivers<F: Firmware>(firmware: &F) {
    let handles = match firmware.disk_io_handles() {
        Ok(handles) => handles,
        Err(_) => return,
    };

    for handle in handles {
        // Whole disks are legitimately held by the partition driver
        match firmware.block_media(handle) {
            Ok(media) if media.logical_partition => {}
            _ => continue,
        }
        if firmware.test_file_system(handle) == Status::SUCCESS {
            continue;
        }

        let openers = match firmware.disk_io_openers(handle) {
            Ok(openers) => openers,
            Err(status) => {
                warn!(
                    "  Could not get DiskIo protocol for {}: {}",
                    describe(firmware, handle),
                    status
                );
                continue;
            }
        };

        for opener in openers.iter().filter(|o| o.is_by_driver()) {
            let name = driver_name(firmware, opener.agent);
            match firmware.disconnect_controller(handle, opener.agent) {
                Ok(()) => warn!("  Disconnected '{}' on {}", name, describe(firmware, handle)),
                Err(_) => error!(
                    "  Could not disconnect '{}' on {}",
                    name,
                    describe(firmware, handle)
                ),
            }
        }
    }
}

fn describe<F: Firmware>(firmware: &F, handle: Handle) -> String {
    use alloc::string::ToString;
    match firmware.device_path(handle) {
        Some(path) => path.to_string(),
        None => alloc::format!("{:?}", handle),
    }
}

/// Unload the first driver with a resolvable binding among the Disk I/O
/// openers of `handle`. Openers without a Driver Binding ("phantom"
/// instances) are skipped.
pub fn unload_conflicting_driver<F: Firmware>(
    firmware: &F,
    handle: Handle,
) -> core::result::Result<DriverRecord, Status> {
    let openers = firmware
        .disk_io_openers(handle)
        .map_err(|_| Status::NOT_FOUND)?;

    for opener in openers {
        let binding = match firmware.driver_binding(opener.agent) {
            Ok(binding) => binding,
            Err(_) => continue,
        };
        let record = DriverRecord {
            image: binding.image,
            version: binding.version,
            name: driver_name(firmware, opener.agent),
        };

        warn!("Unloading existing '{} v0x{:x}'", record.name, record.version);
        match firmware.unload_image(record.image) {
            Ok(()) => return Ok(record),
            Err(status) => warn!("  Could not unload driver: {}", status),
        }
    }

    Err(Status::NOT_FOUND)
}

/// Load `<driver_dir>\<fs>_<arch>.efi` from `own_device`, start it and
/// connect it to the target. Returns the driver image handle.
pub fn start_companion_driver<F: Firmware>(
    firmware: &F,
    config: &Config,
    arch: &Arch,
    secure_boot: SecureBootState,
    own_device: Handle,
    target: &Target,
) -> Result<Handle> {
    info!("Starting {} driver service:", target.fs);

    let driver_file = arch
        .driver_path(config.driver_dir, target.fs)
        .ok_or(LoaderError::TargetNotFound)?;
    let path = firmware
        .device_path(own_device)
        .map(|device| device.with_file(&driver_file))
        .ok_or_else(|| LoaderError::DriverPath(driver_file.clone()))?;

    // With Secure Boot on, this is where an unsigned driver gets rejected
    let image = firmware
        .load_image(&path)
        .map_err(|status| LoaderError::DriverLoad {
            path: driver_file.clone(),
            status: secure_boot.translate_load_error(status),
        })?;
    drop(path);

    // Some HP firmwares refuse to start anything but boot services drivers,
    // failing StartImage() with a Load Error. Check up front.
    let code_type = firmware
        .loaded_image(image)
        .map_err(LoaderError::DriverInterface)?
        .code_type;
    if code_type != MemoryType::BOOT_SERVICES_CODE {
        return Err(LoaderError::DriverType(driver_file));
    }

    firmware
        .start_image(image)
        .map_err(LoaderError::DriverStart)?;
    info!("  {}", driver_name(firmware, image));

    firmware
        .connect_controller(target.handle, &[image])
        .map_err(|status| LoaderError::DriverConnect {
            fs: target.fs,
            status,
        })?;

    Ok(image)
}

/// Make sure a filesystem driver of ours services the target partition.
pub fn ensure_service<F: Firmware>(
    firmware: &F,
    config: &Config,
    arch: &Arch,
    secure_boot: SecureBootState,
    own_device: Handle,
    target: &Target,
) -> Result<ServiceState> {
    let state = ServiceState::from_test_status(firmware.test_file_system(target.handle)).map_err(
        |status| LoaderError::ServiceCheck {
            fs: target.fs,
            status,
        },
    )?;

    // Native drivers are unloaded unconditionally; if that works the
    // partition is back to needing service.
    let state = match state {
        ServiceState::Serviced => match unload_conflicting_driver(firmware, target.handle) {
            Ok(_) => ServiceState::NeedsService,
            Err(_) => ServiceState::Serviced,
        },
        needs => needs,
    };

    if state == ServiceState::NeedsService {
        start_companion_driver(firmware, config, arch, secure_boot, own_device, target)?;
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_state_from_status() {
        assert_eq!(
            ServiceState::from_test_status(Status::SUCCESS),
            Ok(ServiceState::Serviced)
        );
        assert_eq!(
            ServiceState::from_test_status(Status::UNSUPPORTED),
            Ok(ServiceState::NeedsService)
        );
        assert_eq!(
            ServiceState::from_test_status(Status::DEVICE_ERROR),
            Err(Status::DEVICE_ERROR)
        );
    }
}
