//! Boot device topology and target selection
//!
//! Works out which partition we booted from, which disk holds it, and picks
//! the first NTFS/exFAT partition on that same disk.

use crate::block_io::FirmwareBlockIo;
use crate::config::Config;
use crate::device_path::{DevicePath, DevicePathBuf};
use crate::error::{LoaderError, Result};
use crate::firmware::{Firmware, Handle};
use crate::signature::{classify, FsType};
use alloc::borrow::ToOwned;
use alloc::vec::Vec;
use log::{info, warn};

/// Where we booted from, and what else is out there.
#[derive(Debug)]
pub struct Topology<'a> {
    /// Partition holding this program. Borrowed from the firmware.
    pub boot_partition: &'a DevicePath,
    /// Parent of `boot_partition`.
    pub boot_disk: DevicePathBuf,
    /// Every Disk I/O handle, in firmware order.
    pub handles: Vec<Handle>,
}

/// The partition we are going to hand off to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub handle: Handle,
    pub fs: FsType,
    pub path: DevicePathBuf,
}

impl<'a> Topology<'a> {
    /// Resolve the topology around `boot_device`, the device our image was
    /// loaded from.
    pub fn resolve<F: Firmware>(firmware: &'a F, boot_device: Handle) -> Result<Self> {
        let boot_partition = firmware
            .device_path(boot_device)
            .ok_or(LoaderError::BootDevice)?;
        let boot_disk = boot_partition.parent();

        info!("Searching for target partition on boot disk:");
        info!("  {}", boot_disk);

        let handles = firmware
            .disk_io_handles()
            .map_err(LoaderError::DiskEnumeration)?;
        if handles.is_empty() {
            return Err(LoaderError::DiskEnumeration(crate::Status::NOT_FOUND));
        }

        Ok(Self {
            boot_partition,
            boot_disk,
            handles,
        })
    }

    /// First candidate carrying a recognised filesystem, in enumeration order.
    pub fn select_target<F: Firmware>(&self, firmware: &F, config: &Config) -> Result<Target> {
        for &handle in &self.handles {
            let path = match firmware.device_path(handle) {
                Some(path) => path,
                None => continue,
            };
            if path == self.boot_partition {
                continue;
            }
            if config.require_same_disk && path.parent() != self.boot_disk {
                continue;
            }

            let fs = detect_filesystem(firmware, handle);
            if fs.is_known() {
                info!("Found {} target partition:", fs);
                info!("  {}", path);
                return Ok(Target {
                    handle,
                    fs,
                    path: path.to_owned(),
                });
            }
        }

        Err(LoaderError::TargetNotFound)
    }
}

/// Classify the partition behind `handle` from its first block. Any I/O
/// failure reads as [`FsType::Unknown`].
pub fn detect_filesystem<F: Firmware>(firmware: &F, handle: Handle) -> FsType {
    let block = FirmwareBlockIo::new(firmware, handle).and_then(|mut io| io.read_block(0));
    match block {
        Ok(block) => classify(&block),
        Err(status) => {
            warn!("  Could not read {:?}: {}", handle, status);
            FsType::Unknown
        }
    }
}
