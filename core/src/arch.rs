// Build-time architecture selection

use crate::signature::FsType;
use alloc::format;
use alloc::string::String;

/// Firmware architecture tag plus a display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arch {
    /// Suffix used in removable-media file names (`bootx64.efi`).
    pub tag: &'static str,
    pub name: &'static str,
}

#[cfg(target_arch = "x86_64")]
pub const ARCH: Arch = Arch {
    tag: "x64",
    name: "64-bit x86",
};

#[cfg(target_arch = "x86")]
pub const ARCH: Arch = Arch {
    tag: "ia32",
    name: "32-bit x86",
};

#[cfg(target_arch = "aarch64")]
pub const ARCH: Arch = Arch {
    tag: "aa64",
    name: "64-bit ARM",
};

#[cfg(target_arch = "arm")]
pub const ARCH: Arch = Arch {
    tag: "arm",
    name: "32-bit ARM",
};

#[cfg(target_arch = "riscv64")]
pub const ARCH: Arch = Arch {
    tag: "riscv64",
    name: "64-bit RISC-V",
};

#[cfg(target_arch = "loongarch64")]
pub const ARCH: Arch = Arch {
    tag: "loongarch64",
    name: "64-bit LoongArch",
};

#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "x86",
    target_arch = "aarch64",
    target_arch = "arm",
    target_arch = "riscv64",
    target_arch = "loongarch64"
)))]
compile_error!("Unsupported architecture");

impl Arch {
    /// `<dir>\<driver>_<tag>.efi`
    pub fn driver_path(&self, dir: &str, fs: FsType) -> Option<String> {
        fs.driver_name()
            .map(|driver| format!("{}\\{}_{}.efi", dir, driver, self.tag))
    }

    /// `<dir>\boot<tag>.efi`
    pub fn loader_path(&self, dir: &str) -> String {
        format!("{}\\boot{}.efi", dir, self.tag)
    }
}
