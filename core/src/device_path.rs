//! Device paths
//!
//! A device path is a packed sequence of variable-length nodes:
//!
//! ```text
//! ┌──────┬─────────┬────────────┬──────────────┐
//! │ type │ subtype │ length(LE) │ data ...     │   repeated,
//! │  u8  │   u8    │    u16     │ length - 4   │   then End-Entire (7F FF 04 00)
//! └──────┴─────────┴────────────┴──────────────┘
//! ```
//!
//! Like `Path`/`PathBuf`, [`DevicePath`] is the borrowed form (a path handed
//! out by the firmware, never freed by us) and [`DevicePathBuf`] the owned
//! form (built by us, released on drop).
//!
//! Comparisons are structural: two paths are equal when their bytes up to and
//! including the end node are identical.

use alloc::borrow::ToOwned;
use alloc::vec::Vec;
use core::borrow::Borrow;
use core::fmt;
use core::ops::Deref;

pub const NODE_HEADER_LEN: usize = 4;

/// Node types
pub const HARDWARE_PATH: u8 = 0x01;
pub const ACPI_PATH: u8 = 0x02;
pub const MESSAGING_PATH: u8 = 0x03;
pub const MEDIA_PATH: u8 = 0x04;
pub const END_PATH: u8 = 0x7F;

/// Node subtypes used by this crate
pub const HW_PCI: u8 = 0x01;
pub const ACPI_DP: u8 = 0x01;
pub const MSG_SCSI: u8 = 0x02;
pub const MSG_USB: u8 = 0x05;
pub const MSG_SATA: u8 = 0x12;
pub const MSG_NVME: u8 = 0x17;
pub const MEDIA_HARDDRIVE: u8 = 0x01;
pub const MEDIA_CDROM: u8 = 0x02;
pub const MEDIA_FILEPATH: u8 = 0x04;
pub const END_INSTANCE: u8 = 0x01;
pub const END_ENTIRE: u8 = 0xFF;

const END_ENTIRE_NODE: [u8; NODE_HEADER_LEN] = [END_PATH, END_ENTIRE, 0x04, 0x00];

/// EISA id of a PCI root bridge (`PNP0A03`)
const PNP0A03: u32 = 0x0A03_41D0;

/// Upper bound on the size of a path we are willing to walk from a raw pointer.
pub const MAX_DEVICE_PATH_LEN: usize = 4096;

/// A single device path node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node<'a> {
    pub kind: u8,
    pub sub_type: u8,
    pub data: &'a [u8],
}

impl Node<'_> {
    /// Total encoded length, header included.
    pub fn len(&self) -> usize {
        NODE_HEADER_LEN + self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_end(&self) -> bool {
        self.kind == END_PATH
    }

    pub fn is(&self, kind: u8, sub_type: u8) -> bool {
        self.kind == kind && self.sub_type == sub_type
    }
}

/// Length of the well-formed path at the start of `bytes`, End-Entire node
/// included. `None` if a node is truncated or shorter than its header, or no
/// end node is found.
fn encoded_len(bytes: &[u8]) -> Option<usize> {
    let mut offset = 0;
    loop {
        let header = bytes.get(offset..offset + NODE_HEADER_LEN)?;
        let len = u16::from_le_bytes([header[2], header[3]]) as usize;
        if len < NODE_HEADER_LEN || offset + len > bytes.len() {
            return None;
        }
        offset += len;
        if header[0] == END_PATH && header[1] == END_ENTIRE {
            return Some(offset);
        }
    }
}

/// Borrowed device path.
#[repr(transparent)]
#[derive(PartialEq, Eq, Hash)]
pub struct DevicePath([u8]);

impl DevicePath {
    /// Wrap `bytes` if they start with a well-formed path; trailing bytes
    /// after the End-Entire node are ignored.
    pub fn new(bytes: &[u8]) -> Option<&DevicePath> {
        let len = encoded_len(bytes)?;
        Some(Self::from_bytes_unchecked(&bytes[..len]))
    }

    fn from_bytes_unchecked(bytes: &[u8]) -> &DevicePath {
        // SAFETY: DevicePath is a repr(transparent) wrapper around [u8]
        unsafe { &*(bytes as *const [u8] as *const DevicePath) }
    }

    /// Borrow a firmware-owned path.
    ///
    /// # Safety
    /// `ptr` must point to a device path that stays mapped for `'a`. At most
    /// [`MAX_DEVICE_PATH_LEN`] bytes are inspected.
    pub unsafe fn from_ptr<'a>(ptr: *const u8) -> Option<&'a DevicePath> {
        if ptr.is_null() {
            return None;
        }
        // Walk node headers first so we never read past the end node.
        let mut offset = 0usize;
        while offset + NODE_HEADER_LEN <= MAX_DEVICE_PATH_LEN {
            let header = core::slice::from_raw_parts(ptr.add(offset), NODE_HEADER_LEN);
            let len = u16::from_le_bytes([header[2], header[3]]) as usize;
            if len < NODE_HEADER_LEN {
                return None;
            }
            offset += len;
            if header[0] == END_PATH && header[1] == END_ENTIRE {
                return DevicePath::new(core::slice::from_raw_parts(ptr, offset));
            }
        }
        None
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Size in bytes, end node included.
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the nodes, End-Entire node excluded.
    pub fn nodes(&self) -> Nodes<'_> {
        Nodes {
            bytes: &self.0,
            offset: 0,
        }
    }

    /// Path of the parent device: every node but the last one.
    ///
    /// This is a structural transform, not a lookup; for a partition path
    /// it yields the path of the disk holding the partition. A path with no
    /// nodes is its own parent.
    pub fn parent(&self) -> DevicePathBuf {
        let mut parent = DevicePathBuf::new();
        let count = self.nodes().count();
        for node in self.nodes().take(count.saturating_sub(1)) {
            parent.push_node(node);
        }
        parent
    }

    /// `self` with a media file-path node for `file` appended.
    pub fn with_file(&self, file: &str) -> DevicePathBuf {
        let mut path = self.to_owned();
        path.push_file(file);
        path
    }

    /// Text of the last file-path node, if any.
    pub fn file_name(&self) -> Option<alloc::string::String> {
        self.nodes()
            .filter(|n| n.is(MEDIA_PATH, MEDIA_FILEPATH))
            .last()
            .map(|n| decode_ucs2(n.data))
    }
}

impl ToOwned for DevicePath {
    type Owned = DevicePathBuf;

    fn to_owned(&self) -> DevicePathBuf {
        DevicePathBuf(self.0.to_vec())
    }
}

impl PartialEq<DevicePathBuf> for DevicePath {
    fn eq(&self, other: &DevicePathBuf) -> bool {
        self == other.as_path()
    }
}

impl PartialEq<DevicePath> for DevicePathBuf {
    fn eq(&self, other: &DevicePath) -> bool {
        self.as_path() == other
    }
}

impl AsRef<DevicePath> for DevicePath {
    fn as_ref(&self) -> &DevicePath {
        self
    }
}

/// Iterator over device path nodes.
pub struct Nodes<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for Nodes<'a> {
    type Item = Node<'a>;

    fn next(&mut self) -> Option<Node<'a>> {
        let header = self.bytes.get(self.offset..self.offset + NODE_HEADER_LEN)?;
        let len = u16::from_le_bytes([header[2], header[3]]) as usize;
        if header[0] == END_PATH && header[1] == END_ENTIRE {
            return None;
        }
        let data = self
            .bytes
            .get(self.offset + NODE_HEADER_LEN..self.offset + len)?;
        let node = Node {
            kind: header[0],
            sub_type: header[1],
            data,
        };
        self.offset += len;
        Some(node)
    }
}

/// Owned device path.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DevicePathBuf(Vec<u8>);

impl DevicePathBuf {
    /// An empty path (End-Entire node only).
    pub fn new() -> Self {
        Self(END_ENTIRE_NODE.to_vec())
    }

    pub fn as_path(&self) -> &DevicePath {
        DevicePath::from_bytes_unchecked(&self.0)
    }

    /// Append a raw node before the end node.
    pub fn push(&mut self, kind: u8, sub_type: u8, data: &[u8]) {
        let len = (NODE_HEADER_LEN + data.len()) as u16;
        let at = self.0.len() - NODE_HEADER_LEN;
        let mut node = Vec::with_capacity(len as usize);
        node.extend_from_slice(&[kind, sub_type]);
        node.extend_from_slice(&len.to_le_bytes());
        node.extend_from_slice(data);
        self.0.splice(at..at, node);
    }

    pub fn push_node(&mut self, node: Node<'_>) {
        self.push(node.kind, node.sub_type, node.data);
    }

    /// Append a media file-path node (NUL terminated UCS-2).
    pub fn push_file(&mut self, file: &str) {
        let mut data = Vec::with_capacity((file.len() + 1) * 2);
        for unit in file.encode_utf16().chain(core::iter::once(0)) {
            data.extend_from_slice(&unit.to_le_bytes());
        }
        self.push(MEDIA_PATH, MEDIA_FILEPATH, &data);
    }
}

impl Default for DevicePathBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for DevicePathBuf {
    type Target = DevicePath;

    fn deref(&self) -> &DevicePath {
        self.as_path()
    }
}

impl Borrow<DevicePath> for DevicePathBuf {
    fn borrow(&self) -> &DevicePath {
        self.as_path()
    }
}

impl AsRef<DevicePath> for DevicePathBuf {
    fn as_ref(&self) -> &DevicePath {
        self.as_path()
    }
}

fn decode_ucs2(data: &[u8]) -> alloc::string::String {
    let units = data
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0);
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

fn le_u16(data: &[u8], at: usize) -> u16 {
    data.get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .unwrap_or(0)
}

fn le_u32(data: &[u8], at: usize) -> u32 {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .unwrap_or(0)
}

fn le_u64(data: &[u8], at: usize) -> u64 {
    data.get(at..at + 8)
        .map(|b| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(b);
            u64::from_le_bytes(raw)
        })
        .unwrap_or(0)
}

impl fmt::Display for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.data;
        match (self.kind, self.sub_type) {
            (HARDWARE_PATH, HW_PCI) => write!(
                f,
                "Pci({:#x},{:#x})",
                d.get(1).copied().unwrap_or(0),
                d.first().copied().unwrap_or(0)
            ),
            (ACPI_PATH, ACPI_DP) if le_u32(d, 0) == PNP0A03 => {
                write!(f, "PciRoot({:#x})", le_u32(d, 4))
            }
            (ACPI_PATH, ACPI_DP) => write!(f, "Acpi({:#x},{:#x})", le_u32(d, 0), le_u32(d, 4)),
            (MESSAGING_PATH, MSG_SCSI) => write!(f, "Scsi({:#x},{:#x})", le_u16(d, 0), le_u16(d, 2)),
            (MESSAGING_PATH, MSG_USB) => write!(
                f,
                "USB({:#x},{:#x})",
                d.first().copied().unwrap_or(0),
                d.get(1).copied().unwrap_or(0)
            ),
            (MESSAGING_PATH, MSG_SATA) => write!(
                f,
                "Sata({:#x},{:#x},{:#x})",
                le_u16(d, 0),
                le_u16(d, 2),
                le_u16(d, 4)
            ),
            (MESSAGING_PATH, MSG_NVME) => write!(f, "NVMe({:#x})", le_u32(d, 0)),
            (MEDIA_PATH, MEDIA_HARDDRIVE) => write!(
                f,
                "HD({},{:#x},{:#x})",
                le_u32(d, 0),
                le_u64(d, 4),
                le_u64(d, 12)
            ),
            (MEDIA_PATH, MEDIA_CDROM) => write!(f, "CDROM({:#x})", le_u32(d, 0)),
            (MEDIA_PATH, MEDIA_FILEPATH) => f.write_str(&decode_ucs2(d)),
            (END_PATH, END_INSTANCE) => f.write_str(","),
            (kind, sub_type) => write!(f, "Path({},{})", kind, sub_type),
        }
    }
}

impl fmt::Display for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for node in self.nodes() {
            if !first && !node.is(MEDIA_PATH, MEDIA_FILEPATH) {
                f.write_str("/")?;
            }
            write!(f, "{}", node)?;
            first = false;
        }
        Ok(())
    }
}

impl fmt::Display for DevicePathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_path(), f)
    }
}

impl fmt::Debug for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DevicePath({})", self)
    }
}

impl fmt::Debug for DevicePathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_path(), f)
    }
}
