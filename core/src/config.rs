//! Compile-time policy
//!
//! There is no runtime configuration source: the program takes no arguments
//! and the firmware passes no environment. Everything tunable lives here.

/// Volume open retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts made after the first one.
    pub retries: usize,
    /// Wait between two attempts, in microseconds.
    pub delay_us: usize,
}

impl RetryPolicy {
    pub const fn delay_secs(&self) -> usize {
        self.delay_us / 1_000_000
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 1,
            delay_us: 3_000_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub retry: RetryPolicy,
    /// Directory holding the companion drivers on the boot partition. The
    /// `rufus` component keeps us from latching onto a user's own driver.
    pub driver_dir: &'static str,
    /// Removable-media loader directory on the target partition.
    pub loader_dir: &'static str,
    /// Only accept targets on the disk we booted from. Disabled in debug
    /// builds, emulators rarely expose multi-partition removable media.
    pub require_same_disk: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            driver_dir: "\\efi\\rufus",
            loader_dir: "\\efi\\boot",
            require_same_disk: !cfg!(debug_assertions),
        }
    }
}
