//! Chain loader error types
//!
//! One variant per stage that can end the run. Each maps back onto a standard
//! firmware status via [`LoaderError::status`]; no new codes are introduced,
//! only more precise descriptions of existing ones.

use crate::signature::FsType;
use crate::Status;
use alloc::string::String;
use core::fmt;

pub type Result<T> = core::result::Result<T, LoaderError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    /// Our own Loaded Image protocol could not be opened.
    ImageInterface(Status),
    /// The device we were loaded from has no device path.
    BootDevice,
    /// No Disk I/O handles, or enumeration failed.
    DiskEnumeration(Status),
    /// No NTFS/exFAT partition on the boot disk.
    TargetNotFound,
    /// The Simple File System test returned neither Success nor Unsupported.
    ServiceCheck { fs: FsType, status: Status },
    /// The companion driver device path could not be built.
    DriverPath(String),
    DriverLoad { path: String, status: Status },
    DriverInterface(Status),
    /// The companion driver is not a boot services driver.
    DriverType(String),
    DriverStart(Status),
    DriverConnect { fs: FsType, status: Status },
    /// Retries exhausted; carries the last open status.
    VolumeUnavailable(Status),
    RootDirectory(Status),
    /// Case resolution of the loader path failed.
    LoaderNotFound { path: String, status: Status },
    LoaderPath,
    LoaderLoad(Status),
    LoaderStart(Status),
    /// Windows bootmgr returned No Mapping, its catch-all for internal errors
    /// and security rejections.
    BootManagerRejected,
}

impl LoaderError {
    /// Status handed back to the firmware.
    pub fn status(&self) -> Status {
        match self {
            Self::ImageInterface(s)
            | Self::DriverLoad { status: s, .. }
            | Self::DriverInterface(s)
            | Self::DriverStart(s)
            | Self::DriverConnect { status: s, .. }
            | Self::ServiceCheck { status: s, .. }
            | Self::RootDirectory(s)
            | Self::LoaderLoad(s)
            | Self::LoaderStart(s) => *s,
            Self::BootDevice
            | Self::DiskEnumeration(_)
            | Self::TargetNotFound
            | Self::VolumeUnavailable(_)
            | Self::LoaderNotFound { .. } => Status::NOT_FOUND,
            Self::DriverPath(_) | Self::LoaderPath => Status::DEVICE_ERROR,
            Self::DriverType(_) => Status::LOAD_ERROR,
            Self::BootManagerRejected => Status::NO_MAPPING,
        }
    }
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageInterface(s) => write!(f, "Unable to access boot image interface: {}", s),
            Self::BootDevice => write!(f, "Unable to identify the boot device"),
            Self::DiskEnumeration(s) => write!(f, "Failed to list disks: {}", s),
            Self::TargetNotFound => write!(f, "Could not locate target partition"),
            Self::ServiceCheck { fs, status } => {
                write!(f, "Could not check for {} service: {}", fs, status)
            }
            Self::DriverPath(path) => write!(f, "Unable to set path for '{}'", path),
            Self::DriverLoad { path, status } => {
                write!(f, "Unable to load driver '{}': {}", path, status)
            }
            Self::DriverInterface(s) => write!(f, "Unable to access driver interface: {}", s),
            Self::DriverType(path) => write!(f, "'{}' is not a Boot System Driver", path),
            Self::DriverStart(s) => write!(f, "Unable to start driver: {}", s),
            Self::DriverConnect { fs, status } => {
                write!(f, "Could not start {} partition service: {}", fs, status)
            }
            Self::VolumeUnavailable(s) => write!(f, "Could not open partition: {}", s),
            Self::RootDirectory(s) => write!(f, "Could not open root directory: {}", s),
            Self::LoaderNotFound { path, status } => {
                write!(f, "Could not locate '{}': {}", path.trim_start_matches('\\'), status)
            }
            Self::LoaderPath => write!(f, "Could not create path"),
            Self::LoaderLoad(s) => write!(f, "Load failure: {}", s),
            Self::LoaderStart(s) => write!(f, "Start failure: {}", s),
            Self::BootManagerRejected => write!(
                f,
                "Windows bootmgr encountered a security validation or internal error"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_status_mapping() {
        assert_eq!(LoaderError::TargetNotFound.status(), Status::NOT_FOUND);
        assert_eq!(
            LoaderError::VolumeUnavailable(Status::UNSUPPORTED).status(),
            Status::NOT_FOUND
        );
        assert_eq!(
            LoaderError::DriverPath("x".into()).status(),
            Status::DEVICE_ERROR
        );
        assert_eq!(LoaderError::DriverType("x".into()).status(), Status::LOAD_ERROR);
        assert_eq!(
            LoaderError::DriverLoad {
                path: "x".into(),
                status: Status::SECURITY_VIOLATION
            }
            .status(),
            Status::SECURITY_VIOLATION
        );
        assert_eq!(LoaderError::BootManagerRejected.status(), Status::NO_MAPPING);
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(
            LoaderError::LoaderNotFound {
                path: "\\efi\\boot\\bootx64.efi".into(),
                status: Status::NOT_FOUND
            }
            .to_string(),
            "Could not locate 'efi\\boot\\bootx64.efi': Not Found"
        );
        assert!(!LoaderError::BootManagerRejected
            .to_string()
            .contains("No Mapping"));
    }
}
