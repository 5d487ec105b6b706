// Secure Boot state, read once at startup

use crate::Status;
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecureBootState {
    Disabled,
    /// Platform key not enrolled; signature checks may still be enforced.
    Setup,
    Enabled,
}

impl SecureBootState {
    /// Derive the state from the `SecureBoot` and `SetupMode` global
    /// variables. Setup mode takes precedence.
    pub fn from_variables(secure_boot: Option<u8>, setup_mode: Option<u8>) -> Self {
        if setup_mode.is_some_and(|v| v != 0) {
            Self::Setup
        } else if secure_boot.is_some_and(|v| v != 0) {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Some platforms report image validation failures as Access Denied;
    /// with Secure Boot active that really is a security violation.
    pub fn translate_load_error(&self, status: Status) -> Status {
        if status == Status::ACCESS_DENIED && self.is_active() {
            Status::SECURITY_VIOLATION
        } else {
            status
        }
    }
}

impl fmt::Display for SecureBootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disabled => "Disabled",
            Self::Setup => "Setup",
            Self::Enabled => "Enabled",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_variables() {
        assert_eq!(SecureBootState::from_variables(None, None), SecureBootState::Disabled);
        assert_eq!(SecureBootState::from_variables(Some(0), Some(0)), SecureBootState::Disabled);
        assert_eq!(SecureBootState::from_variables(Some(1), Some(0)), SecureBootState::Enabled);
        assert_eq!(SecureBootState::from_variables(Some(1), None), SecureBootState::Enabled);
        assert_eq!(SecureBootState::from_variables(Some(0), Some(1)), SecureBootState::Setup);
        assert_eq!(SecureBootState::from_variables(Some(1), Some(1)), SecureBootState::Setup);
    }

    #[test]
    fn test_access_denied_translation() {
        let denied = Status::ACCESS_DENIED;
        assert_eq!(
            SecureBootState::Enabled.translate_load_error(denied),
            Status::SECURITY_VIOLATION
        );
        assert_eq!(
            SecureBootState::Setup.translate_load_error(denied),
            Status::SECURITY_VIOLATION
        );
        assert_eq!(SecureBootState::Disabled.translate_load_error(denied), denied);
        // Other failures are never rewritten
        assert_eq!(
            SecureBootState::Enabled.translate_load_error(Status::NOT_FOUND),
            Status::NOT_FOUND
        );
    }
}
