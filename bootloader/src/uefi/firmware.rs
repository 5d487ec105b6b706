//! [`Firmware`] over the raw boot services table

use super::file_system::UefiVolume;
use super::pool::{HandleBuffer, PoolBuffer};
use super::*;
use crate::{BootServices, InputKey, SimpleTextInputProtocol};
use alloc::string::String;
use alloc::vec::Vec;
use core::ffi::c_void;
use core::ptr;
use ntfsboot_core::device_path::DevicePath;
use ntfsboot_core::firmware::{
    open_attr, BlockMedia, DriverBinding, Firmware, Handle, LoadedImage, MemoryType, OpenInfo,
};
use ntfsboot_core::Status;
use uguid::Guid;

pub struct UefiFirmware<'a> {
    bs: &'a BootServices,
    con_in: *mut SimpleTextInputProtocol,
    /// Our own image, agent for every protocol we open.
    image: Handle,
}

impl<'a> UefiFirmware<'a> {
    pub fn new(bs: &'a BootServices, con_in: *mut SimpleTextInputProtocol, image: Handle) -> Self {
        Self { bs, con_in, image }
    }

    fn protocol<T>(&self, handle: Handle, guid: &Guid) -> Result<*mut T, Status> {
        let mut interface: *mut c_void = ptr::null_mut();
        Status((self.bs.handle_protocol)(handle.as_ptr(), guid, &mut interface)).to_result()?;
        if interface.is_null() {
            return Err(Status::UNSUPPORTED);
        }
        Ok(interface as *mut T)
    }

    fn block_io(&self, handle: Handle) -> Result<&mut BlockIoProtocol, Status> {
        let block_io = self.protocol::<BlockIoProtocol>(handle, &BLOCK_IO_PROTOCOL_GUID)?;
        // SAFETY: installed protocol interfaces stay valid while boot
        // services are up
        let block_io = unsafe { &mut *block_io };
        if block_io.media.is_null() {
            return Err(Status::UNSUPPORTED);
        }
        Ok(block_io)
    }

    /// Driver name from Component Name 2, falling back to Component Name,
    /// in the first language the driver supports.
    fn component_name(&self, driver: Handle, guid: &Guid, rfc4646: bool) -> Option<String> {
        let protocol = self.protocol::<ComponentNameProtocol>(driver, guid).ok()?;
        // SAFETY: see block_io
        let languages = unsafe { (*protocol).supported_languages };
        if languages.is_null() {
            return None;
        }

        let mut language = Vec::with_capacity(8);
        for i in 0.. {
            // SAFETY: the language list is a NUL terminated ASCII string
            let c = unsafe { *languages.add(i) };
            let done = c == 0 || (rfc4646 && c == b';') || (!rfc4646 && i == 3);
            if done {
                break;
            }
            language.push(c);
        }
        language.push(0);

        let mut name: *const u16 = ptr::null();
        let status = unsafe { ((*protocol).get_driver_name)(protocol, language.as_ptr(), &mut name) };
        if Status(status).is_error() {
            return None;
        }
        // SAFETY: the firmware returns a NUL terminated string
        unsafe { from_ucs2_ptr(name) }
    }
}

impl Firmware for UefiFirmware<'_> {
    type Volume = UefiVolume;

    fn loaded_image(&self, image: Handle) -> Result<LoadedImage<'_>, Status> {
        let loaded = self.protocol::<LoadedImageProtocol>(image, &LOADED_IMAGE_PROTOCOL_GUID)?;
        // SAFETY: the loaded image describes a mapped image of image_size
        // bytes at image_base
        unsafe {
            let loaded = &*loaded;
            let bytes = if loaded.image_base.is_null() {
                &[][..]
            } else {
                core::slice::from_raw_parts(loaded.image_base as *const u8, loaded.image_size as usize)
            };
            Ok(LoadedImage {
                device: Handle::from_ptr(loaded.device_handle),
                code_type: MemoryType(loaded.image_code_type),
                image: bytes,
            })
        }
    }

    fn device_path(&self, handle: Handle) -> Option<&DevicePath> {
        let path = self.protocol::<u8>(handle, &DEVICE_PATH_PROTOCOL_GUID).ok()?;
        // SAFETY: device paths installed on handles are never freed while we
        // run
        unsafe { DevicePath::from_ptr(path) }
    }

    fn disk_io_handles(&self) -> Result<Vec<Handle>, Status> {
        let mut count = 0usize;
        let mut buffer: *mut *mut c_void = ptr::null_mut();
        Status((self.bs.locate_handle_buffer)(
            BY_PROTOCOL,
            &DISK_IO_PROTOCOL_GUID,
            ptr::null(),
            &mut count,
            &mut buffer,
        ))
        .to_result()?;

        // SAFETY: LocateHandleBuffer allocated `count` handles
        let handles: HandleBuffer = unsafe { PoolBuffer::from_raw(self.bs, buffer, count) };
        Ok(handles.as_slice().iter().map(|&h| Handle::from_ptr(h)).collect())
    }

    fn block_media(&self, handle: Handle) -> Result<BlockMedia, Status> {
        let block_io = self.block_io(handle)?;
        // SAFETY: checked non-null in block_io
        let media = unsafe { &*block_io.media };
        Ok(BlockMedia {
            media_id: media.media_id,
            block_size: media.block_size,
            last_block: media.last_block,
            logical_partition: media.logical_partition,
            media_present: media.media_present,
        })
    }

    fn read_blocks(
        &self,
        handle: Handle,
        media_id: u32,
        lba: u64,
        buffer: &mut [u8],
    ) -> Result<(), Status> {
        let block_io = self.block_io(handle)?;
        Status((block_io.read_blocks)(
            block_io,
            media_id,
            lba,
            buffer.len(),
            buffer.as_mut_ptr(),
        ))
        .to_result()
    }

    fn test_file_system(&self, handle: Handle) -> Status {
        Status((self.bs.open_protocol)(
            handle.as_ptr(),
            &SIMPLE_FILE_SYSTEM_PROTOCOL_GUID,
            ptr::null_mut(),
            self.image.as_ptr(),
            ptr::null_mut(),
            open_attr::TEST_PROTOCOL,
        ))
    }

    fn disk_io_openers(&self, handle: Handle) -> Result<Vec<OpenInfo>, Status> {
        let mut entries: *mut OpenProtocolInformationEntry = ptr::null_mut();
        let mut count = 0usize;
        Status((self.bs.open_protocol_information)(
            handle.as_ptr(),
            &DISK_IO_PROTOCOL_GUID,
            &mut entries,
            &mut count,
        ))
        .to_result()?;

        // SAFETY: OpenProtocolInformation allocated `count` entries
        let entries = unsafe { PoolBuffer::from_raw(self.bs, entries, count) };
        Ok(entries
            .as_slice()
            .iter()
            .map(|e| OpenInfo {
                agent: Handle::from_ptr(e.agent_handle),
                controller: Handle::from_ptr(e.controller_handle),
                attributes: e.attributes,
                open_count: e.open_count,
            })
            .collect())
    }

    fn disconnect_controller(&self, controller: Handle, driver: Handle) -> Result<(), Status> {
        Status((self.bs.disconnect_controller)(
            controller.as_ptr(),
            driver.as_ptr(),
            ptr::null_mut(),
        ))
        .to_result()
    }

    fn driver_binding(&self, driver: Handle) -> Result<DriverBinding, Status> {
        let binding = self.protocol::<DriverBindingProtocol>(driver, &DRIVER_BINDING_PROTOCOL_GUID)?;
        // SAFETY: see block_io
        let binding = unsafe { &*binding };
        Ok(DriverBinding {
            version: binding.version,
            image: Handle::from_ptr(binding.image_handle),
        })
    }

    fn driver_name(&self, driver: Handle) -> Option<String> {
        self.component_name(driver, &COMPONENT_NAME2_PROTOCOL_GUID, true)
            .or_else(|| self.component_name(driver, &COMPONENT_NAME_PROTOCOL_GUID, false))
    }

    fn unload_image(&self, image: Handle) -> Result<(), Status> {
        Status((self.bs.unload_image)(image.as_ptr())).to_result()
    }

    fn load_image(&self, path: &DevicePath) -> Result<Handle, Status> {
        let mut image: *mut c_void = ptr::null_mut();
        Status((self.bs.load_image)(
            false,
            self.image.as_ptr(),
            path.as_bytes().as_ptr(),
            ptr::null(),
            0,
            &mut image,
        ))
        .to_result()?;
        Ok(Handle::from_ptr(image))
    }

    fn start_image(&self, image: Handle) -> Result<(), Status> {
        Status((self.bs.start_image)(image.as_ptr(), ptr::null_mut(), ptr::null_mut())).to_result()
    }

    fn connect_controller(&self, controller: Handle, drivers: &[Handle]) -> Result<(), Status> {
        let list: Vec<*mut c_void> = drivers
            .iter()
            .map(|d| d.as_ptr())
            .chain(core::iter::once(ptr::null_mut()))
            .collect();
        Status((self.bs.connect_controller)(controller.as_ptr(), list.as_ptr(), ptr::null(), true))
            .to_result()
    }

    fn open_file_system(&self, handle: Handle) -> Result<UefiVolume, Status> {
        let sfs =
            self.protocol::<SimpleFileSystemProtocol>(handle, &SIMPLE_FILE_SYSTEM_PROTOCOL_GUID)?;
        Ok(UefiVolume::new(sfs))
    }

    fn stall(&self, microseconds: usize) {
        (self.bs.stall)(microseconds);
    }

    fn wait_for_key(&self) {
        if self.con_in.is_null() {
            return;
        }
        // SAFETY: con_in comes from the system table
        unsafe {
            let con_in = &mut *self.con_in;
            let mut index = 0usize;
            let mut key = InputKey {
                scan_code: 0,
                unicode_char: 0,
            };
            // Drop keystrokes typed before the prompt
            while (con_in.read_key_stroke)(con_in, &mut key) == 0 {}
            (self.bs.wait_for_event)(1, &con_in.wait_for_key, &mut index);
            (con_in.read_key_stroke)(con_in, &mut key);
        }
    }
}
