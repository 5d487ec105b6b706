//! Scripted firmware for host tests
//!
//! Models just enough of a platform to drive the pipeline: partitions with
//! a first block and a directory tree, driver bindings, and images that can
//! be loaded from a device path. Every side effect is recorded in `calls`.

use crate::arch::ARCH;
use crate::device_path::*;
use crate::firmware::*;
use crate::signature::FsType;
use crate::Status;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

pub const OWN_IMAGE: Handle = Handle::from_raw(0x1);
pub const BOOT_PART: Handle = Handle::from_raw(0x10);
pub const BOOT_DISK: Handle = Handle::from_raw(0x20);
pub const OUR_NTFS_DRIVER: Handle = Handle::from_raw(0x100);
pub const OUR_EXFAT_DRIVER: Handle = Handle::from_raw(0x101);
pub const NATIVE_AGENT: Handle = Handle::from_raw(0x200);
pub const NATIVE_IMAGE: Handle = Handle::from_raw(0x201);
pub const LOADER_IMAGE: Handle = Handle::from_raw(0x300);

/// Side effects, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Disconnect(Handle, Handle),
    Unload(Handle),
    Load(Handle),
    Start(Handle),
    Connect(Handle, Vec<Handle>),
    OpenFs(Handle),
    Stall(usize),
    WaitKey,
}

/// Directory path (exact case) to entry names.
pub type Tree = BTreeMap<String, Vec<String>>;

/// Build a tree from absolute file paths.
pub fn tree_from(files: &[&str]) -> Tree {
    let mut tree = Tree::new();
    tree.insert("\\".to_string(), Vec::new());
    for file in files {
        let mut parent = String::from("\\");
        for component in file.trim_start_matches('\\').split('\\') {
            let entries = tree.entry(parent.clone()).or_default();
            if !entries.iter().any(|e| e == component) {
                entries.push(component.to_string());
            }
            if parent.len() > 1 {
                parent.push('\\');
            }
            parent.push_str(component);
        }
    }
    tree
}

pub struct MockDevice {
    pub handle: Handle,
    pub path: Option<DevicePathBuf>,
    pub media: Option<BlockMedia>,
    /// `None` makes reads fail.
    pub block0: Option<Vec<u8>>,
    pub openers: RefCell<Vec<OpenInfo>>,
    pub fs_status: Cell<Status>,
    pub tree: Option<Rc<Tree>>,
    pub label: Option<String>,
}

pub struct MockImage {
    pub handle: Handle,
    /// Device the image is loaded from.
    pub device: Handle,
    /// Full path the image is loaded by.
    pub path: Option<DevicePathBuf>,
    pub code_type: MemoryType,
    pub bytes: Vec<u8>,
    pub load_status: Option<Status>,
    pub start_status: Option<Status>,
}

pub struct MockFirmware {
    pub devices: Vec<MockDevice>,
    pub images: Vec<MockImage>,
    pub bindings: Vec<(Handle, DriverBinding)>,
    pub names: Vec<(Handle, String)>,
    pub unload_failures: Vec<Handle>,
    pub enumeration: Option<Status>,
    /// Volume opens that fail before the filesystem shows up.
    pub open_failures: Cell<usize>,
    pub calls: RefCell<Vec<Call>>,
    /// Directories currently open across all volumes.
    pub open_dirs: Rc<Cell<usize>>,
}

fn pci_root() -> [u8; 8] {
    let mut d = [0u8; 8];
    d[..4].copy_from_slice(&0x0A03_41D0u32.to_le_bytes());
    d
}

/// `PciRoot(0)/Pci(0x14,0)/USB(port,0)`
pub fn usb_disk(port: u8) -> DevicePathBuf {
    let mut path = DevicePathBuf::new();
    path.push(ACPI_PATH, ACPI_DP, &pci_root());
    path.push(HARDWARE_PATH, HW_PCI, &[0x00, 0x14]);
    path.push(MESSAGING_PATH, MSG_USB, &[port, 0x00]);
    path
}

/// Partition `number` of [`usb_disk`]`(port)`.
pub fn usb_partition(port: u8, number: u32) -> DevicePathBuf {
    let mut hd = [0u8; 38];
    hd[..4].copy_from_slice(&number.to_le_bytes());
    hd[4..12].copy_from_slice(&(2048u64 * number as u64).to_le_bytes());
    let mut path = usb_disk(port);
    path.push(MEDIA_PATH, MEDIA_HARDDRIVE, &hd);
    path
}

pub fn boot_sector(oem: &[u8; 8]) -> Vec<u8> {
    let mut block = vec![0u8; 512];
    block[..3].copy_from_slice(&[0xEB, 0x52, 0x90]);
    block[3..11].copy_from_slice(oem);
    block[510] = 0x55;
    block[511] = 0xAA;
    block
}

pub fn partition_media() -> BlockMedia {
    BlockMedia {
        media_id: 7,
        block_size: 512,
        last_block: 0xFFFF,
        logical_partition: true,
        media_present: true,
    }
}

/// Loader file name as it would be spelled on a Windows install medium.
pub fn loader_file_name() -> String {
    format!("BOOT{}.EFI", ARCH.tag.to_uppercase())
}

pub fn windows_bootmgr_image() -> Vec<u8> {
    let mut image = vec![0u8; 0x1000];
    image[..2].copy_from_slice(b"MZ");
    image[0x800..0x80C].copy_from_slice(b"bootmgr.dll\0");
    image
}

impl MockDevice {
    pub fn partition(handle: Handle, path: DevicePathBuf, oem: &[u8; 8]) -> Self {
        Self {
            handle,
            path: Some(path),
            media: Some(partition_media()),
            block0: Some(boot_sector(oem)),
            openers: RefCell::new(Vec::new()),
            fs_status: Cell::new(Status::UNSUPPORTED),
            tree: None,
            label: None,
        }
    }

    pub fn with_tree(mut self, files: &[&str], label: &str) -> Self {
        self.tree = Some(Rc::new(tree_from(files)));
        self.label = Some(label.to_string());
        self
    }

    pub fn with_fs(self) -> Self {
        self.fs_status.set(Status::SUCCESS);
        self
    }
}

impl MockFirmware {
    /// A USB stick with a FAT boot partition (1) holding our drivers, and a
    /// whole-disk handle. Target partitions are added by the test.
    pub fn usb_stick() -> Self {
        let boot = MockDevice::partition(BOOT_PART, usb_partition(3, 1), b"MSDOS5.0").with_fs();
        let disk = MockDevice {
            handle: BOOT_DISK,
            path: Some(usb_disk(3)),
            media: Some(BlockMedia {
                logical_partition: false,
                ..partition_media()
            }),
            block0: Some(vec![0u8; 512]),
            openers: RefCell::new(Vec::new()),
            fs_status: Cell::new(Status::UNSUPPORTED),
            tree: None,
            label: None,
        };

        let boot_path = usb_partition(3, 1);
        let driver = |handle: Handle, fs: FsType| MockImage {
            handle,
            device: BOOT_PART,
            path: ARCH
                .driver_path("\\efi\\rufus", fs)
                .map(|file| boot_path.with_file(&file)),
            code_type: MemoryType::BOOT_SERVICES_CODE,
            bytes: vec![0u8; 0x200],
            load_status: None,
            start_status: None,
        };

        Self {
            devices: vec![disk, boot],
            images: vec![
                MockImage {
                    handle: OWN_IMAGE,
                    device: BOOT_PART,
                    path: None,
                    code_type: MemoryType::LOADER_CODE,
                    bytes: vec![0u8; 0x200],
                    load_status: None,
                    start_status: None,
                },
                driver(OUR_NTFS_DRIVER, FsType::Ntfs),
                driver(OUR_EXFAT_DRIVER, FsType::Exfat),
            ],
            bindings: vec![
                (
                    NATIVE_AGENT,
                    DriverBinding {
                        version: 0x10,
                        image: NATIVE_IMAGE,
                    },
                ),
                (
                    OUR_NTFS_DRIVER,
                    DriverBinding {
                        version: 0x20003,
                        image: OUR_NTFS_DRIVER,
                    },
                ),
            ],
            names: vec![
                (NATIVE_AGENT, "AMI NTFS Driver".to_string()),
                (OUR_NTFS_DRIVER, "NTFS Driver (ro)".to_string()),
                (OUR_EXFAT_DRIVER, "exFAT Driver (ro)".to_string()),
            ],
            unload_failures: Vec::new(),
            enumeration: None,
            open_failures: Cell::new(0),
            calls: RefCell::new(Vec::new()),
            open_dirs: Rc::new(Cell::new(0)),
        }
    }

    pub fn add_device(&mut self, device: MockDevice) {
        self.devices.push(device);
    }

    /// Register the next-stage loader found on `device`.
    pub fn add_loader(&mut self, device: Handle, file: &str, bytes: Vec<u8>) {
        let path = self.device(device).and_then(|d| d.path.as_ref()).map(|p| p.with_file(file));
        self.images.push(MockImage {
            handle: LOADER_IMAGE,
            device,
            path,
            code_type: MemoryType::LOADER_CODE,
            bytes,
            load_status: None,
            start_status: None,
        });
    }

    pub fn image_mut(&mut self, handle: Handle) -> &mut MockImage {
        self.images
            .iter_mut()
            .find(|i| i.handle == handle)
            .expect("no such image")
    }

    pub fn device(&self, handle: Handle) -> Option<&MockDevice> {
        self.devices.iter().find(|d| d.handle == handle)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn image(&self, handle: Handle) -> Option<&MockImage> {
        self.images.iter().find(|i| i.handle == handle)
    }
}

impl Firmware for MockFirmware {
    type Volume = MockVolume;

    fn loaded_image(&self, image: Handle) -> Result<LoadedImage<'_>, Status> {
        let image = self.image(image).ok_or(Status::UNSUPPORTED)?;
        Ok(LoadedImage {
            device: image.device,
            code_type: image.code_type,
            image: &image.bytes,
        })
    }

    fn device_path(&self, handle: Handle) -> Option<&DevicePath> {
        self.device(handle)?.path.as_deref()
    }

    fn disk_io_handles(&self) -> Result<Vec<Handle>, Status> {
        match self.enumeration {
            Some(status) => Err(status),
            None => Ok(self.devices.iter().map(|d| d.handle).collect()),
        }
    }

    fn block_media(&self, handle: Handle) -> Result<BlockMedia, Status> {
        self.device(handle)
            .and_then(|d| d.media)
            .ok_or(Status::UNSUPPORTED)
    }

    fn read_blocks(
        &self,
        handle: Handle,
        _media_id: u32,
        lba: u64,
        buffer: &mut [u8],
    ) -> Result<(), Status> {
        let block = self
            .device(handle)
            .and_then(|d| d.block0.as_ref())
            .ok_or(Status::DEVICE_ERROR)?;
        if lba != 0 || buffer.len() > block.len() {
            return Err(Status::INVALID_PARAMETER);
        }
        buffer.copy_from_slice(&block[..buffer.len()]);
        Ok(())
    }

    fn test_file_system(&self, handle: Handle) -> Status {
        self.device(handle)
            .map(|d| d.fs_status.get())
            .unwrap_or(Status::UNSUPPORTED)
    }

    fn disk_io_openers(&self, handle: Handle) -> Result<Vec<OpenInfo>, Status> {
        self.device(handle)
            .map(|d| d.openers.borrow().clone())
            .ok_or(Status::NOT_FOUND)
    }

    fn disconnect_controller(&self, controller: Handle, driver: Handle) -> Result<(), Status> {
        self.record(Call::Disconnect(controller, driver));
        let device = self.device(controller).ok_or(Status::INVALID_PARAMETER)?;
        device.openers.borrow_mut().retain(|o| o.agent != driver);
        Ok(())
    }

    fn driver_binding(&self, driver: Handle) -> Result<DriverBinding, Status> {
        self.bindings
            .iter()
            .find(|(agent, _)| *agent == driver)
            .map(|(_, binding)| *binding)
            .ok_or(Status::UNSUPPORTED)
    }

    fn driver_name(&self, driver: Handle) -> Option<String> {
        self.names
            .iter()
            .find(|(handle, _)| *handle == driver)
            .map(|(_, name)| name.clone())
    }

    fn unload_image(&self, image: Handle) -> Result<(), Status> {
        self.record(Call::Unload(image));
        if self.unload_failures.contains(&image) {
            return Err(Status::ACCESS_DENIED);
        }
        // Unloading a driver stops it on every controller it manages
        let agents: Vec<Handle> = self
            .bindings
            .iter()
            .filter(|(_, b)| b.image == image)
            .map(|(agent, _)| *agent)
            .collect();
        for device in &self.devices {
            let mut openers = device.openers.borrow_mut();
            let before = openers.len();
            openers.retain(|o| !agents.contains(&o.agent));
            if openers.len() != before {
                device.fs_status.set(Status::UNSUPPORTED);
            }
        }
        Ok(())
    }

    fn load_image(&self, path: &DevicePath) -> Result<Handle, Status> {
        let image = self
            .images
            .iter()
            .find(|i| i.path.as_deref() == Some(path))
            .ok_or(Status::NOT_FOUND)?;
        if let Some(status) = image.load_status {
            return Err(status);
        }
        self.record(Call::Load(image.handle));
        Ok(image.handle)
    }

    fn start_image(&self, image: Handle) -> Result<(), Status> {
        self.record(Call::Start(image));
        match self.image(image).and_then(|i| i.start_status) {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }

    fn connect_controller(&self, controller: Handle, drivers: &[Handle]) -> Result<(), Status> {
        self.record(Call::Connect(controller, drivers.to_vec()));
        let device = self.device(controller).ok_or(Status::INVALID_PARAMETER)?;
        let serviceable = drivers.iter().any(|d| {
            self.image(*d)
                .is_some_and(|i| i.code_type == MemoryType::BOOT_SERVICES_CODE)
        });
        if !serviceable || device.tree.is_none() {
            return Err(Status::NOT_FOUND);
        }
        device.fs_status.set(Status::SUCCESS);
        Ok(())
    }

    fn open_file_system(&self, handle: Handle) -> Result<MockVolume, Status> {
        self.record(Call::OpenFs(handle));
        if self.open_failures.get() > 0 {
            self.open_failures.set(self.open_failures.get() - 1);
            return Err(Status::UNSUPPORTED);
        }
        let device = self.device(handle).ok_or(Status::INVALID_PARAMETER)?;
        if device.fs_status.get() != Status::SUCCESS {
            return Err(Status::UNSUPPORTED);
        }
        let tree = device.tree.clone().ok_or(Status::UNSUPPORTED)?;
        Ok(MockVolume {
            tree,
            label: device.label.clone(),
            open_dirs: self.open_dirs.clone(),
        })
    }

    fn stall(&self, microseconds: usize) {
        self.record(Call::Stall(microseconds));
    }

    fn wait_for_key(&self) {
        self.record(Call::WaitKey);
    }
}

pub struct MockVolume {
    tree: Rc<Tree>,
    label: Option<String>,
    open_dirs: Rc<Cell<usize>>,
}

impl Volume for MockVolume {
    type Dir = MockDir;

    fn open_root(&mut self) -> Result<MockDir, Status> {
        MockDir::open(&self.tree, self.label.clone(), &self.open_dirs, "\\")
    }
}

pub struct MockDir {
    tree: Rc<Tree>,
    label: Option<String>,
    open_dirs: Rc<Cell<usize>>,
    entries: Vec<String>,
    cursor: usize,
}

impl MockDir {
    fn open(
        tree: &Rc<Tree>,
        label: Option<String>,
        open_dirs: &Rc<Cell<usize>>,
        path: &str,
    ) -> Result<Self, Status> {
        // The driver under test is case sensitive
        let listing = tree.get(path).ok_or(Status::NOT_FOUND)?;
        let mut entries = vec![".".to_string(), "..".to_string()];
        entries.extend(listing.iter().cloned());
        open_dirs.set(open_dirs.get() + 1);
        Ok(Self {
            tree: tree.clone(),
            label,
            open_dirs: open_dirs.clone(),
            entries,
            cursor: 0,
        })
    }
}

impl Directory for MockDir {
    fn open_dir(&mut self, path: &str) -> Result<Self, Status> {
        MockDir::open(&self.tree, self.label.clone(), &self.open_dirs, path)
    }

    fn read_entry(&mut self) -> Result<Option<String>, Status> {
        let entry = self.entries.get(self.cursor).cloned();
        self.cursor += 1;
        Ok(entry)
    }

    fn volume_label(&mut self) -> Result<String, Status> {
        self.label.clone().ok_or(Status::UNSUPPORTED)
    }
}

impl Drop for MockDir {
    fn drop(&mut self) {
        self.open_dirs.set(self.open_dirs.get() - 1);
    }
}
