//! Firmware seam
//!
//! Everything the chain loader needs from the platform, expressed as safe
//! calls. The UEFI binary implements [`Firmware`] over the raw boot services
//! table; tests implement it over a scripted model.
//!
//! All calls are synchronous. Handles are never released by the caller.

use crate::device_path::DevicePath;
use crate::Status;
use alloc::string::String;
use alloc::vec::Vec;
use core::ffi::c_void;
use core::fmt;

/// Opaque firmware handle.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(usize);

impl Handle {
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn from_ptr(ptr: *mut c_void) -> Self {
        Self(ptr as usize)
    }

    pub const fn as_raw(self) -> usize {
        self.0
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:#x})", self.0)
    }
}

/// `EFI_MEMORY_TYPE` of a loaded image's code section.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryType(pub u32);

impl MemoryType {
    pub const LOADER_CODE: MemoryType = MemoryType(1);
    pub const BOOT_SERVICES_CODE: MemoryType = MemoryType(3);
    pub const RUNTIME_SERVICES_CODE: MemoryType = MemoryType(5);
}

/// View of an image's Loaded Image protocol.
#[derive(Debug, Clone, Copy)]
pub struct LoadedImage<'a> {
    /// Device the image was loaded from.
    pub device: Handle,
    pub code_type: MemoryType,
    /// The image as mapped in memory.
    pub image: &'a [u8],
}

/// Media descriptor of a Block I/O instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMedia {
    pub media_id: u32,
    pub block_size: u32,
    pub last_block: u64,
    pub logical_partition: bool,
    pub media_present: bool,
}

/// `OpenProtocol` attribute bits.
pub mod open_attr {
    pub const BY_HANDLE_PROTOCOL: u32 = 0x01;
    pub const GET_PROTOCOL: u32 = 0x02;
    pub const TEST_PROTOCOL: u32 = 0x04;
    pub const BY_CHILD_CONTROLLER: u32 = 0x08;
    pub const BY_DRIVER: u32 = 0x10;
    pub const EXCLUSIVE: u32 = 0x20;
}

/// One entry of a protocol's open-information list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenInfo {
    pub agent: Handle,
    pub controller: Handle,
    pub attributes: u32,
    pub open_count: u32,
}

impl OpenInfo {
    /// Opened by a driver's `Start()`, i.e. the driver is bound to the handle.
    pub fn is_by_driver(&self) -> bool {
        self.attributes & open_attr::BY_DRIVER == open_attr::BY_DRIVER
    }
}

/// Driver Binding protocol of a driver handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverBinding {
    pub version: u32,
    /// Image that installed the binding.
    pub image: Handle,
}

/// Platform services used by the chain loader.
pub trait Firmware {
    type Volume: Volume;

    /// Loaded Image protocol of `image`.
    fn loaded_image(&self, image: Handle) -> Result<LoadedImage<'_>, Status>;

    /// Device path installed on `handle`. Borrowed from the firmware.
    fn device_path(&self, handle: Handle) -> Option<&DevicePath>;

    /// All handles carrying Disk I/O, in firmware order.
    fn disk_io_handles(&self) -> Result<Vec<Handle>, Status>;

    fn block_media(&self, handle: Handle) -> Result<BlockMedia, Status>;

    /// Read whole blocks starting at `lba`; `buffer` is a multiple of the
    /// block size.
    fn read_blocks(
        &self,
        handle: Handle,
        media_id: u32,
        lba: u64,
        buffer: &mut [u8],
    ) -> Result<(), Status>;

    /// Raw status of a TEST_PROTOCOL open of Simple File System on `handle`.
    fn test_file_system(&self, handle: Handle) -> Status;

    /// Open-information entries of the Disk I/O protocol on `handle`.
    fn disk_io_openers(&self, handle: Handle) -> Result<Vec<OpenInfo>, Status>;

    fn disconnect_controller(&self, controller: Handle, driver: Handle) -> Result<(), Status>;

    fn driver_binding(&self, driver: Handle) -> Result<DriverBinding, Status>;

    /// Human readable driver name, if the driver publishes one.
    fn driver_name(&self, driver: Handle) -> Option<String>;

    fn unload_image(&self, image: Handle) -> Result<(), Status>;

    /// Load an image, our own image being the parent.
    fn load_image(&self, path: &DevicePath) -> Result<Handle, Status>;

    fn start_image(&self, image: Handle) -> Result<(), Status>;

    /// Recursively connect `drivers` (and only those) to `controller`.
    fn connect_controller(&self, controller: Handle, drivers: &[Handle]) -> Result<(), Status>;

    /// Open the Simple File System protocol on `handle`.
    fn open_file_system(&self, handle: Handle) -> Result<Self::Volume, Status>;

    /// Busy-wait.
    fn stall(&self, microseconds: usize);

    /// Block until a key is pressed.
    fn wait_for_key(&self);
}

/// A mounted filesystem.
pub trait Volume {
    type Dir: Directory;

    fn open_root(&mut self) -> Result<Self::Dir, Status>;
}

/// An open directory. Dropping it closes the underlying file handle.
pub trait Directory: Sized {
    /// Open a directory by absolute path (`\` alone being the root). Path
    /// components are matched by the filesystem's own rules.
    fn open_dir(&mut self, path: &str) -> Result<Self, Status>;

    /// Next entry name, `None` once the listing is exhausted.
    fn read_entry(&mut self) -> Result<Option<String>, Status>;

    fn volume_label(&mut self) -> Result<String, Status>;
}
