// Simple File System volumes and directories

use super::*;
use alloc::string::String;
use alloc::vec;
use core::ptr;
use ntfsboot_core::firmware::{Directory, Volume};
use ntfsboot_core::Status;
use uguid::Guid;

pub struct UefiVolume {
    sfs: *mut SimpleFileSystemProtocol,
}

impl UefiVolume {
    pub fn new(sfs: *mut SimpleFileSystemProtocol) -> Self {
        Self { sfs }
    }
}

impl Volume for UefiVolume {
    type Dir = UefiDir;

    fn open_root(&mut self) -> Result<UefiDir, Status> {
        let mut root: *mut FileProtocol = ptr::null_mut();
        // SAFETY: sfs was obtained from HandleProtocol
        let status = unsafe { ((*self.sfs).open_volume)(self.sfs, &mut root) };
        Status(status).to_result()?;
        if root.is_null() {
            return Err(Status::DEVICE_ERROR);
        }
        Ok(UefiDir { file: root })
    }
}

/// An open directory handle, closed on drop.
pub struct UefiDir {
    file: *mut FileProtocol,
}

impl UefiDir {
    /// `GetInfo` into a growable buffer, retrying once with the exact size
    /// the firmware asks for.
    fn info(&mut self, kind: &Guid) -> Result<alloc::vec::Vec<u8>, Status> {
        let mut buffer = vec![0u8; 128];
        for _ in 0..2 {
            let mut size = buffer.len();
            // SAFETY: file is an open handle and buffer holds `size` bytes
            let status = unsafe { ((*self.file).get_info)(self.file, kind, &mut size, buffer.as_mut_ptr()) };
            match Status(status) {
                Status::BUFFER_TOO_SMALL => buffer.resize(size, 0),
                status => {
                    status.to_result()?;
                    buffer.truncate(size);
                    return Ok(buffer);
                }
            }
        }
        Err(Status::BUFFER_TOO_SMALL)
    }
}

fn ucs2_from_bytes(bytes: &[u8]) -> String {
    let units: alloc::vec::Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    from_ucs2(&units)
}

impl Directory for UefiDir {
    fn open_dir(&mut self, path: &str) -> Result<Self, Status> {
        let name = to_ucs2(path);
        let mut file: *mut FileProtocol = ptr::null_mut();
        // SAFETY: file is an open handle, name is NUL terminated
        let status = unsafe {
            ((*self.file).open)(self.file, &mut file, name.as_ptr(), EFI_FILE_MODE_READ, 0)
        };
        Status(status).to_result()?;
        if file.is_null() {
            return Err(Status::DEVICE_ERROR);
        }
        Ok(UefiDir { file })
    }

    fn read_entry(&mut self) -> Result<Option<String>, Status> {
        let mut buffer = vec![0u8; FILE_INFO_NAME_OFFSET + 2 * 256];
        loop {
            let mut size = buffer.len();
            // SAFETY: file is an open handle and buffer holds `size` bytes
            let status = unsafe { ((*self.file).read)(self.file, &mut size, buffer.as_mut_ptr()) };
            match Status(status) {
                Status::BUFFER_TOO_SMALL if size > buffer.len() => buffer.resize(size, 0),
                status => {
                    status.to_result()?;
                    if size == 0 {
                        return Ok(None);
                    }
                    let end = size.min(buffer.len());
                    if end <= FILE_INFO_NAME_OFFSET {
                        return Err(Status::DEVICE_ERROR);
                    }
                    return Ok(Some(ucs2_from_bytes(&buffer[FILE_INFO_NAME_OFFSET..end])));
                }
            }
        }
    }

    fn volume_label(&mut self) -> Result<String, Status> {
        let info = self.info(&FILE_SYSTEM_VOLUME_LABEL_GUID)?;
        Ok(ucs2_from_bytes(&info))
    }
}

impl Drop for UefiDir {
    fn drop(&mut self) {
        // SAFETY: file is open and closed exactly once here
        unsafe {
            ((*self.file).close)(self.file);
        }
    }
}
