//! ntfsboot core library
//!
//! Target resolution and chain-load state machine of the NTFS/exFAT UEFI
//! chain loader. Everything platform specific goes through the
//! [`firmware::Firmware`] trait, so the pipeline runs unchanged on real
//! firmware and under test.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod arch;
pub mod block_io;
pub mod chainload;
pub mod config;
pub mod device_path;
pub mod driver;
pub mod error;
pub mod firmware;
pub mod path_case;
pub mod pipeline;
pub mod probe;
pub mod secure_boot;
pub mod signature;
pub mod status;
pub mod topology;
pub mod volume;

#[cfg(test)]
mod mock;

pub use error::{LoaderError, Result};
pub use status::Status;

/// Crate version, shown in the startup banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
