// UEFI protocol bindings used by the chain loader

pub mod file_system;
pub mod firmware;
pub mod pool;
pub mod variables;

use core::ffi::c_void;
use uguid::{guid, Guid};

pub const LOADED_IMAGE_PROTOCOL_GUID: Guid = guid!("5b1b31a1-9562-11d2-8e3f-00a0c969723b");
pub const DEVICE_PATH_PROTOCOL_GUID: Guid = guid!("09576e91-6d3f-11d2-8e39-00a0c969723b");
pub const BLOCK_IO_PROTOCOL_GUID: Guid = guid!("964e5b21-6459-11d2-8e39-00a0c969723b");
pub const DISK_IO_PROTOCOL_GUID: Guid = guid!("ce345171-ba0b-11d2-8e4f-00a0c969723b");
pub const SIMPLE_FILE_SYSTEM_PROTOCOL_GUID: Guid = guid!("964e5b22-6459-11d2-8e39-00a0c969723b");
pub const DRIVER_BINDING_PROTOCOL_GUID: Guid = guid!("18a031ab-b443-4d1a-a5c0-0c09261e9f71");
pub const COMPONENT_NAME_PROTOCOL_GUID: Guid = guid!("107a772c-d5e1-11d4-9a46-0090273fc14d");
pub const COMPONENT_NAME2_PROTOCOL_GUID: Guid = guid!("6a7a5cff-e8d9-4f70-bada-75ab3025ce14");
pub const GLOBAL_VARIABLE_GUID: Guid = guid!("8be4df61-93ca-11d2-aa0d-00e098032b8c");
pub const FILE_INFO_GUID: Guid = guid!("09576e92-6d3f-11d2-8e39-00a0c969723b");
pub const FILE_SYSTEM_VOLUME_LABEL_GUID: Guid = guid!("db47d7d3-fe81-11d3-9a35-0090273fc14d");

/// `LocateHandleBuffer` search type
pub const BY_PROTOCOL: usize = 2;

/// EfiLoaderData
pub const LOADER_DATA: usize = 2;

#[repr(C)]
pub struct LoadedImageProtocol {
    revision: u32,
    parent_handle: *mut c_void,
    system_table: *mut c_void,
    pub device_handle: *mut c_void,
    file_path: *mut c_void,
    _reserved: *mut c_void,
    load_options_size: u32,
    load_options: *mut c_void,
    pub image_base: *mut c_void,
    pub image_size: u64,
    pub image_code_type: u32,
    image_data_type: u32,
    unload: usize,
}

#[repr(C)]
pub struct BlockIoProtocol {
    pub revision: u64,
    pub media: *const BlockIoMedia,
    pub reset: extern "efiapi" fn(*mut BlockIoProtocol, bool) -> usize,
    pub read_blocks: extern "efiapi" fn(
        *mut BlockIoProtocol,
        u32,     // MediaId
        u64,     // LBA
        usize,   // BufferSize
        *mut u8, // Buffer
    ) -> usize,
    write_blocks: usize,
    flush_blocks: usize,
}

#[repr(C)]
pub struct BlockIoMedia {
    pub media_id: u32,
    pub removable_media: bool,
    pub media_present: bool,
    pub logical_partition: bool,
    pub read_only: bool,
    pub write_caching: bool,
    pub block_size: u32,
    pub io_align: u32,
    pub last_block: u64,
}

#[repr(C)]
pub struct OpenProtocolInformationEntry {
    pub agent_handle: *mut c_void,
    pub controller_handle: *mut c_void,
    pub attributes: u32,
    pub open_count: u32,
}

#[repr(C)]
pub struct DriverBindingProtocol {
    supported: usize,
    start: usize,
    stop: usize,
    pub version: u32,
    pub image_handle: *mut c_void,
    pub driver_binding_handle: *mut c_void,
}

/// Layout shared by Component Name and Component Name 2; only the language
/// code format differs (ISO 639-2 vs RFC 4646).
#[repr(C)]
pub struct ComponentNameProtocol {
    pub get_driver_name: extern "efiapi" fn(
        this: *mut ComponentNameProtocol,
        language: *const u8,
        driver_name: *mut *const u16,
    ) -> usize,
    get_controller_name: usize,
    pub supported_languages: *const u8,
}

#[repr(C)]
pub struct SimpleFileSystemProtocol {
    revision: u64,
    pub open_volume: extern "efiapi" fn(
        this: *mut SimpleFileSystemProtocol,
        root: *mut *mut FileProtocol,
    ) -> usize,
}

#[repr(C)]
pub struct FileProtocol {
    revision: u64,
    pub open: extern "efiapi" fn(
        this: *mut FileProtocol,
        new_handle: *mut *mut FileProtocol,
        file_name: *const u16,
        open_mode: u64,
        attributes: u64,
    ) -> usize,
    pub close: extern "efiapi" fn(this: *mut FileProtocol) -> usize,
    delete: usize,
    pub read: extern "efiapi" fn(
        this: *mut FileProtocol,
        buffer_size: *mut usize,
        buffer: *mut u8,
    ) -> usize,
    write: usize,
    get_position: usize,
    set_position: usize,
    pub get_info: extern "efiapi" fn(
        this: *mut FileProtocol,
        information_type: *const Guid,
        buffer_size: *mut usize,
        buffer: *mut u8,
    ) -> usize,
    set_info: usize,
    flush: usize,
}

pub const EFI_FILE_MODE_READ: u64 = 0x0000000000000001;

/// Offset of `FileName` in `EFI_FILE_INFO`: three u64 sizes, three
/// `EFI_TIME`s and the attribute word.
pub const FILE_INFO_NAME_OFFSET: usize = 3 * 8 + 3 * 16 + 8;

/// NUL terminated UCS-2 copy of `s`.
pub fn to_ucs2(s: &str) -> alloc::vec::Vec<u16> {
    s.encode_utf16().chain(core::iter::once(0)).collect()
}

/// Decode a NUL terminated UCS-2 string, stopping at the end of `units`.
pub fn from_ucs2(units: &[u16]) -> alloc::string::String {
    char::decode_utf16(units.iter().copied().take_while(|&u| u != 0))
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Decode a NUL terminated UCS-2 string owned by the firmware.
///
/// # Safety
/// `ptr` must be null or point to a NUL terminated string.
pub unsafe fn from_ucs2_ptr(ptr: *const u16) -> Option<alloc::string::String> {
    if ptr.is_null() {
        return None;
    }
    let mut len = 0;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    Some(from_ucs2(core::slice::from_raw_parts(ptr, len)))
}
