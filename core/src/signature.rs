//! On-disk signature matching
//!
//! Pure byte-window matchers, no I/O. The filesystem detector reads block 0
//! and hands it to [`classify`]; the chain loader hands loaded image memory to
//! [`find_marker`] through a probe.

use core::fmt;

/// Offset of the OEM identifier in an NTFS/exFAT boot sector.
pub const OEM_ID_OFFSET: usize = 3;

/// Length of the OEM identifier.
pub const OEM_ID_LEN: usize = 8;

/// Filesystem recognised on a candidate partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsType {
    Ntfs,
    Exfat,
    Unknown,
}

impl FsType {
    /// Display name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ntfs => "NTFS",
            Self::Exfat => "exFAT",
            Self::Unknown => "unknown",
        }
    }

    /// Base name of the companion driver that services this filesystem.
    pub const fn driver_name(&self) -> Option<&'static str> {
        match self {
            Self::Ntfs => Some("ntfs"),
            Self::Exfat => Some("exfat"),
            Self::Unknown => None,
        }
    }

    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for FsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// OEM identifiers, checked in order.
pub const FS_SIGNATURES: [(FsType, &[u8; OEM_ID_LEN]); 2] = [
    (FsType::Ntfs, b"NTFS    "),
    (FsType::Exfat, b"EXFAT   "),
];

/// Return the tag of the first `table` entry whose magic sits at `offset` in
/// `window`.
pub fn match_magic<T: Copy, const N: usize>(
    window: &[u8],
    offset: usize,
    table: &[(T, &[u8; N])],
) -> Option<T> {
    let field = window.get(offset..offset + N)?;
    table
        .iter()
        .find(|(_, magic)| field == &magic[..])
        .map(|(tag, _)| *tag)
}

/// Classify the first block of a partition by its OEM identifier.
pub fn classify(block: &[u8]) -> FsType {
    match_magic(block, OEM_ID_OFFSET, &FS_SIGNATURES).unwrap_or(FsType::Unknown)
}

/// Locate `head` followed by `tail` at or after `start` in `haystack`.
///
/// The marker is split in two so a binary that searches for it never embeds
/// the contiguous byte sequence itself.
pub fn find_marker(haystack: &[u8], start: usize, head: u8, tail: &[u8]) -> Option<usize> {
    let marker_len = tail.len() + 1;
    if haystack.len() < marker_len {
        return None;
    }
    (start..=haystack.len() - marker_len)
        .find(|&i| haystack[i] == head && &haystack[i + 1..i + marker_len] == tail)
}
