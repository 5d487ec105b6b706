//! ntfsboot UEFI entry point
//!
//! Finds the NTFS or exFAT partition sitting next to the one we were booted
//! from, makes sure our filesystem driver services it, and chain loads the
//! removable-media loader it carries.

#![no_std]
#![no_main]

extern crate alloc;

use core::ffi::c_void;
use core::panic::PanicInfo;

mod console;
mod uefi;
mod uefi_allocator;

use ntfsboot_core::arch::ARCH;
use ntfsboot_core::config::Config;
use ntfsboot_core::firmware::Handle;
use ntfsboot_core::pipeline::{self, RunContext};
use ntfsboot_core::probe::WindowsBootManager;
use ntfsboot_core::Status;
use uguid::Guid;

pub type Event = *mut c_void;

#[repr(C)]
pub struct InputKey {
    pub scan_code: u16,
    pub unicode_char: u16,
}

#[repr(C)]
pub struct SimpleTextInputProtocol {
    pub reset: extern "efiapi" fn(*mut SimpleTextInputProtocol, bool) -> usize,
    pub read_key_stroke: extern "efiapi" fn(*mut SimpleTextInputProtocol, *mut InputKey) -> usize,
    pub wait_for_key: Event,
}

#[repr(C)]
pub struct SimpleTextOutputMode {
    max_mode: i32,
    mode: i32,
    attribute: i32,
    cursor_column: i32,
    cursor_row: i32,
    cursor_visible: bool,
}

#[repr(C)]
pub struct SimpleTextOutputProtocol {
    pub reset: extern "efiapi" fn(*mut SimpleTextOutputProtocol, bool) -> usize,
    pub output_string: extern "efiapi" fn(*mut SimpleTextOutputProtocol, *const u16) -> usize,
    test_string: usize,
    query_mode: usize,
    set_mode: usize,
    pub set_attribute: extern "efiapi" fn(*mut SimpleTextOutputProtocol, usize) -> usize,
    pub clear_screen: extern "efiapi" fn(*mut SimpleTextOutputProtocol) -> usize,
    set_cursor_position: usize,
    enable_cursor: usize,
    mode: *const SimpleTextOutputMode,
}

#[repr(C)]
pub struct TableHeader {
    pub signature: u64,
    pub revision: u32,
    pub header_size: u32,
    pub crc32: u32,
    _reserved: u32,
}

#[repr(C)]
pub struct SystemTable {
    pub header: TableHeader,
    pub firmware_vendor: *const u16,
    pub firmware_revision: u32,
    _console_in_handle: *const (),
    pub con_in: *mut SimpleTextInputProtocol,
    _console_out_handle: *const (),
    pub con_out: *mut SimpleTextOutputProtocol,
    _stderr_handle: *const (),
    _stderr: *const (),
    pub runtime_services: *const RuntimeServices,
    pub boot_services: *const BootServices,
    number_of_table_entries: usize,
    configuration_table: *const (),
}

#[repr(C)]
pub struct RuntimeServices {
    _header: TableHeader,
    // Time Services
    _get_time: usize,
    _set_time: usize,
    _get_wakeup_time: usize,
    _set_wakeup_time: usize,
    // Virtual Memory Services
    _set_virtual_address_map: usize,
    _convert_pointer: usize,
    // Variable Services
    pub get_variable: extern "efiapi" fn(
        variable_name: *const u16,
        vendor_guid: *const Guid,
        attributes: *mut u32,
        data_size: *mut usize,
        data: *mut u8,
    ) -> usize,
    _get_next_variable_name: usize,
    _set_variable: usize,
    // Miscellaneous Services
    _get_next_high_monotonic_count: usize,
    _reset_system: usize,
}

#[repr(C)]
pub struct BootServices {
    _header: TableHeader,
    // Task Priority Services
    _raise_tpl: usize,
    _restore_tpl: usize,
    // Memory Services
    _allocate_pages: usize,
    _free_pages: usize,
    _get_memory_map: usize,
    pub allocate_pool:
        extern "efiapi" fn(pool_type: usize, size: usize, buffer: *mut *mut u8) -> usize,
    pub free_pool: extern "efiapi" fn(buffer: *mut u8) -> usize,
    // Event & Timer Services
    _create_event: usize,
    _set_timer: usize,
    pub wait_for_event:
        extern "efiapi" fn(number_of_events: usize, event: *const Event, index: *mut usize) -> usize,
    _signal_event: usize,
    _close_event: usize,
    _check_event: usize,
    // Protocol Handler Services
    _install_protocol_interface: usize,
    _reinstall_protocol_interface: usize,
    _uninstall_protocol_interface: usize,
    pub handle_protocol: extern "efiapi" fn(
        handle: *mut c_void,
        protocol: *const Guid,
        interface: *mut *mut c_void,
    ) -> usize,
    _reserved: usize,
    _register_protocol_notify: usize,
    _locate_handle: usize,
    _locate_device_path: usize,
    _install_configuration_table: usize,
    // Image Services
    pub load_image: extern "efiapi" fn(
        boot_policy: bool,
        parent_image_handle: *mut c_void,
        file_path: *const u8,
        source_buffer: *const c_void,
        source_size: usize,
        image_handle: *mut *mut c_void,
    ) -> usize,
    pub start_image: extern "efiapi" fn(
        image_handle: *mut c_void,
        exit_data_size: *mut usize,
        exit_data: *mut *mut u16,
    ) -> usize,
    _exit: usize,
    pub unload_image: extern "efiapi" fn(image_handle: *mut c_void) -> usize,
    _exit_boot_services: usize,
    // Miscellaneous Services
    _get_next_monotonic_count: usize,
    /// Stall for microseconds
    pub stall: extern "efiapi" fn(microseconds: usize) -> usize,
    _set_watchdog_timer: usize,
    // Driver Support Services
    pub connect_controller: extern "efiapi" fn(
        controller_handle: *mut c_void,
        driver_image_handle: *const *mut c_void,
        remaining_device_path: *const u8,
        recursive: bool,
    ) -> usize,
    pub disconnect_controller: extern "efiapi" fn(
        controller_handle: *mut c_void,
        driver_image_handle: *mut c_void,
        child_handle: *mut c_void,
    ) -> usize,
    // Open/Close Protocol Services
    pub open_protocol: extern "efiapi" fn(
        handle: *mut c_void,
        protocol: *const Guid,
        interface: *mut *mut c_void,
        agent_handle: *mut c_void,
        controller_handle: *mut c_void,
        attributes: u32,
    ) -> usize,
    _close_protocol: usize,
    pub open_protocol_information: extern "efiapi" fn(
        handle: *mut c_void,
        protocol: *const Guid,
        entry_buffer: *mut *mut uefi::OpenProtocolInformationEntry,
        entry_count: *mut usize,
    ) -> usize,
    // Library Services
    _protocols_per_handle: usize,
    pub locate_handle_buffer: extern "efiapi" fn(
        search_type: usize,
        protocol: *const Guid,
        search_key: *const c_void,
        no_handles: *mut usize,
        buffer: *mut *mut *mut c_void,
    ) -> usize,
    _locate_protocol: usize,
    _install_multiple_protocol_interfaces: usize,
    _uninstall_multiple_protocol_interfaces: usize,
}

#[no_mangle]
pub extern "efiapi" fn efi_main(image_handle: *mut c_void, system_table: *const SystemTable) -> usize {
    // SAFETY: the firmware hands us a valid system table that outlives boot
    // services, and we never exit boot services.
    let st = unsafe { &*system_table };
    let bs = unsafe { &*st.boot_services };
    let rt = unsafe { &*st.runtime_services };

    uefi_allocator::set_boot_services(st.boot_services);
    console::init(st.con_out);

    console::banner(st, &ARCH);

    let firmware = uefi::firmware::UefiFirmware::new(bs, st.con_in, Handle::from_ptr(image_handle));
    let probe = WindowsBootManager;
    let ctx = RunContext {
        image: Handle::from_ptr(image_handle),
        arch: ARCH,
        secure_boot: uefi::variables::secure_boot_state(rt),
        config: Config::default(),
        probe: &probe,
    };

    let status: Status = pipeline::execute(&firmware, &ctx);
    status.into()
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    log::error!("{}", info);
    loop {
        core::hint::spin_loop();
    }
}
