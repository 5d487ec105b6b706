//! Firmware Block I/O to gpt_disk_io::BlockIo adapter
//!
//! Lets the signature detector read sectors through the same trait the GPT
//! and ISO tooling is written against.

use crate::firmware::{BlockMedia, Firmware, Handle};
use crate::Status;
use alloc::vec;
use alloc::vec::Vec;
use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};

/// Read-only Block I/O view of one firmware handle.
pub struct FirmwareBlockIo<'a, F: Firmware> {
    firmware: &'a F,
    handle: Handle,
    media: BlockMedia,
    block_size: BlockSize,
}

impl<'a, F: Firmware> FirmwareBlockIo<'a, F> {
    /// Fails when the handle has no Block I/O, no media, or a block size
    /// `gpt_disk_types` cannot represent.
    pub fn new(firmware: &'a F, handle: Handle) -> Result<Self, Status> {
        let media = firmware.block_media(handle)?;
        if !media.media_present {
            return Err(Status::NOT_FOUND);
        }
        let block_size = BlockSize::new(media.block_size).ok_or(Status::BAD_BUFFER_SIZE)?;
        Ok(Self {
            firmware,
            handle,
            media,
            block_size,
        })
    }

    pub fn media(&self) -> &BlockMedia {
        &self.media
    }

    /// Block size in bytes
    pub fn block_size_bytes(&self) -> usize {
        self.media.block_size as usize
    }

    /// Read a single block into a freshly allocated buffer.
    pub fn read_block(&mut self, lba: u64) -> Result<Vec<u8>, Status> {
        let mut block = vec![0u8; self.block_size_bytes()];
        self.read_blocks(Lba(lba), &mut block)?;
        Ok(block)
    }
}

impl<F: Firmware> BlockIo for FirmwareBlockIo<'_, F> {
    type Error = Status;

    fn block_size(&self) -> BlockSize {
        self.block_size
    }

    fn num_blocks(&mut self) -> Result<u64, Self::Error> {
        Ok(self.media.last_block + 1)
    }

    fn read_blocks(&mut self, start_lba: Lba, buffer: &mut [u8]) -> Result<(), Self::Error> {
        if buffer.is_empty() || buffer.len() % self.block_size_bytes() != 0 {
            return Err(Status::BAD_BUFFER_SIZE);
        }
        self.firmware
            .read_blocks(self.handle, self.media.media_id, start_lba.0, buffer)
    }

    fn write_blocks(&mut self, _start_lba: Lba, _buffer: &[u8]) -> Result<(), Self::Error> {
        // Candidate partitions are only ever inspected
        Err(Status::ACCESS_DENIED)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::*;

    #[test]
    fn test_reads_first_block() {
        let fw = MockFirmware::usb_stick();
        let mut io = FirmwareBlockIo::new(&fw, BOOT_PART).unwrap();
        assert_eq!(io.block_size_bytes(), 512);
        assert_eq!(io.num_blocks(), Ok(0x10000));
        assert_eq!(&io.read_block(0).unwrap()[3..11], b"MSDOS5.0");
    }

    #[test]
    fn test_rejects_partial_blocks_and_writes() {
        let fw = MockFirmware::usb_stick();
        let mut io = FirmwareBlockIo::new(&fw, BOOT_PART).unwrap();
        let mut short = [0u8; 100];
        assert_eq!(io.read_blocks(Lba(0), &mut short), Err(Status::BAD_BUFFER_SIZE));
        assert_eq!(io.write_blocks(Lba(0), &[0u8; 512]), Err(Status::ACCESS_DENIED));
    }

    #[test]
    fn test_requires_media() {
        let mut fw = MockFirmware::usb_stick();
        let mut device = MockDevice::partition(
            Handle::from_raw(0x11),
            usb_partition(3, 2),
            b"NTFS    ",
        );
        device.media = device.media.map(|m| BlockMedia {
            media_present: false,
            ..m
        });
        fw.add_device(device);
        assert!(matches!(
            FirmwareBlockIo::new(&fw, Handle::from_raw(0x11)),
            Err(Status::NOT_FOUND)
        ));
        assert!(matches!(
            FirmwareBlockIo::new(&fw, Handle::from_raw(0x99)),
            Err(Status::UNSUPPORTED)
        ));
    }
}
