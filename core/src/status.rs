//! Firmware status codes.
//!
//! A thin newtype over the raw `EFI_STATUS` value. Only the codes this loader
//! produces or reacts to are named; anything else is carried through verbatim.

use core::fmt;

const ERROR_BIT: usize = 1 << (usize::BITS - 1);

/// Raw firmware status (`EFI_STATUS`).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub usize);

impl Status {
    pub const SUCCESS: Status = Status(0);
    pub const LOAD_ERROR: Status = Status(ERROR_BIT | 1);
    pub const INVALID_PARAMETER: Status = Status(ERROR_BIT | 2);
    pub const UNSUPPORTED: Status = Status(ERROR_BIT | 3);
    pub const BAD_BUFFER_SIZE: Status = Status(ERROR_BIT | 4);
    pub const BUFFER_TOO_SMALL: Status = Status(ERROR_BIT | 5);
    pub const DEVICE_ERROR: Status = Status(ERROR_BIT | 7);
    pub const OUT_OF_RESOURCES: Status = Status(ERROR_BIT | 9);
    pub const NOT_FOUND: Status = Status(ERROR_BIT | 14);
    pub const ACCESS_DENIED: Status = Status(ERROR_BIT | 15);
    pub const NO_MAPPING: Status = Status(ERROR_BIT | 17);
    pub const SECURITY_VIOLATION: Status = Status(ERROR_BIT | 26);

    /// Check if status indicates an error.
    #[inline]
    pub const fn is_error(self) -> bool {
        self.0 & ERROR_BIT != 0
    }

    #[inline]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Convert into a `Result`, treating warnings as success.
    #[inline]
    pub fn to_result(self) -> Result<(), Status> {
        if self.is_error() {
            Err(self)
        } else {
            Ok(())
        }
    }

    /// Status code without the error bit, as printed by firmware shells.
    pub const fn code(self) -> usize {
        self.0 & !ERROR_BIT
    }

    pub const fn as_str(self) -> Option<&'static str> {
        match self {
            Self::SUCCESS => Some("Success"),
            Self::LOAD_ERROR => Some("Load Error"),
            Self::INVALID_PARAMETER => Some("Invalid Parameter"),
            Self::UNSUPPORTED => Some("Unsupported"),
            Self::BAD_BUFFER_SIZE => Some("Bad Buffer Size"),
            Self::BUFFER_TOO_SMALL => Some("Buffer Too Small"),
            Self::DEVICE_ERROR => Some("Device Error"),
            Self::OUT_OF_RESOURCES => Some("Out of Resources"),
            Self::NOT_FOUND => Some("Not Found"),
            Self::ACCESS_DENIED => Some("Access Denied"),
            Self::NO_MAPPING => Some("No Mapping"),
            Self::SECURITY_VIOLATION => Some("Security Violation"),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(name) => f.write_str(name),
            None if self.is_error() => write!(f, "Error {:#x}", self.code()),
            None => write!(f, "Warning {:#x}", self.code()),
        }
    }
}

impl From<Status> for usize {
    fn from(status: Status) -> usize {
        status.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_error_bit_classification() {
        assert!(!Status::SUCCESS.is_error());
        assert!(Status::NOT_FOUND.is_error());
        assert!(Status::SECURITY_VIOLATION.is_error());
        // Warnings have the high bit clear
        assert!(!Status(1).is_error());
        assert!(Status(1).to_result().is_ok());
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Status::NOT_FOUND.to_string(), "Not Found");
        assert_eq!(Status::NO_MAPPING.to_string(), "No Mapping");
        assert_eq!(Status(ERROR_BIT | 0x30).to_string(), "Error 0x30");
    }

    #[test]
    fn test_code_strips_error_bit() {
        assert_eq!(Status::NOT_FOUND.code(), 14);
        assert_eq!(Status::SECURITY_VIOLATION.code(), 26);
    }
}
