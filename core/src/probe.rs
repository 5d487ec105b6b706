//! Next-stage loader identification
//!
//! Some loaders need special handling of their return status. A probe looks
//! at the image as mapped in memory and names the loader it recognises.

use crate::signature::find_marker;

pub trait LoaderProbe {
    /// Name of the loader contained in `image`, if recognised.
    fn identify(&self, image: &[u8]) -> Option<&'static str>;
}

/// Recognises the Windows boot manager by the name of its main DLL.
///
/// Packed images read as "not bootmgr"; any binary carrying the marker reads
/// as bootmgr.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsBootManager;

impl WindowsBootManager {
    /// Skip the DOS header.
    const SCAN_START: usize = 0x40;
    const MARKER_HEAD: u8 = b'b';
    const MARKER_TAIL: &'static [u8] = b"ootmgr.dll\0";
}

impl LoaderProbe for WindowsBootManager {
    fn identify(&self, image: &[u8]) -> Option<&'static str> {
        find_marker(image, Self::SCAN_START, Self::MARKER_HEAD, Self::MARKER_TAIL)
            .map(|_| "Microsoft Windows bootmgr")
    }
}

/// Recognises nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProbe;

impl LoaderProbe for NoProbe {
    fn identify(&self, _image: &[u8]) -> Option<&'static str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    fn image_with(at: usize, bytes: &[u8]) -> Vec<u8> {
        let mut image = vec![0u8; 0x400];
        image[..2].copy_from_slice(b"MZ");
        image[at..at + bytes.len()].copy_from_slice(bytes);
        image
    }

    #[test]
    fn test_bootmgr_detected() {
        let image = image_with(0x200, b"bootmgr.dll\0");
        assert_eq!(
            WindowsBootManager.identify(&image),
            Some("Microsoft Windows bootmgr")
        );
    }

    #[test]
    fn test_marker_requires_terminator() {
        let image = image_with(0x200, b"bootmgr.dllx");
        assert_eq!(WindowsBootManager.identify(&image), None);
    }

    #[test]
    fn test_marker_in_header_ignored() {
        let image = image_with(0x10, b"bootmgr.dll\0");
        assert_eq!(WindowsBootManager.identify(&image), None);
    }

    #[test]
    fn test_marker_at_scan_start() {
        let image = image_with(0x40, b"bootmgr.dll\0");
        assert!(WindowsBootManager.identify(&image).is_some());
    }

    #[test]
    fn test_tiny_image() {
        assert_eq!(WindowsBootManager.identify(b"MZ"), None);
        assert_eq!(WindowsBootManager.identify(&[]), None);
    }

    #[test]
    fn test_no_probe() {
        let image = image_with(0x200, b"bootmgr.dll\0");
        assert_eq!(NoProbe.identify(&image), None);
    }
}
