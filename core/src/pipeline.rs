//! The chain loading pipeline
//!
//! Strictly linear: every stage runs once, fed by the previous one, and the
//! first unrecovered failure ends the run.

use crate::arch::Arch;
use crate::chainload;
use crate::config::Config;
use crate::driver;
use crate::error::{LoaderError, Result};
use crate::firmware::{Firmware, Handle};
use crate::path_case::resolve_case;
use crate::probe::LoaderProbe;
use crate::secure_boot::SecureBootState;
use crate::topology::Topology;
use crate::volume;
use crate::Status;
use log::{error, info, warn};

/// Everything decided before the pipeline starts. Built once by the entry
/// point.
pub struct RunContext<'a> {
    /// Our own image handle.
    pub image: Handle,
    pub arch: Arch,
    pub secure_boot: SecureBootState,
    pub config: Config,
    pub probe: &'a dyn LoaderProbe,
}

/// Run the pipeline up to and including the next-stage loader returning.
pub fn run<F: Firmware>(firmware: &F, ctx: &RunContext<'_>) -> Result<()> {
    let own_device = firmware
        .loaded_image(ctx.image)
        .map_err(LoaderError::ImageInterface)?
        .device;

    info!("Secure Boot status: {}", ctx.secure_boot);
    info!(
        "This system uses {} UEFI => searching for {} EFI bootloader",
        ctx.arch.name, ctx.arch.tag
    );

    driver::disconnect_blocking_drivers(firmware);

    let topology = Topology::resolve(firmware, own_device)?;
    let target = topology.select_target(firmware, &ctx.config)?;

    driver::ensure_service(
        firmware,
        &ctx.config,
        &ctx.arch,
        ctx.secure_boot,
        own_device,
        &target,
    )?;

    let loader = {
        let mut volume = volume::open_with_retry(firmware, target.handle, &ctx.config.retry)?;
        let mut root = volume::open_root(&mut volume)?;
        volume::log_volume_label(&mut root);

        let wanted = ctx.arch.loader_path(ctx.config.loader_dir);
        resolve_case(&mut root, &wanted)
            .map_err(|status| LoaderError::LoaderNotFound { path: wanted, status })?
    };

    info!("Launching '{}'...", loader.trim_start_matches('\\'));
    chainload::launch(firmware, target.handle, &loader, ctx.secure_boot, ctx.probe)
}

/// Run the pipeline and turn the outcome into the status returned to the
/// firmware. Failures are reported and wait for a key press first.
pub fn execute<F: Firmware>(firmware: &F, ctx: &RunContext<'_>) -> Status {
    match run(firmware, ctx) {
        Ok(()) => Status::SUCCESS,
        Err(err) => {
            error!("{}", err);
            warn!("Press any key to exit.");
            firmware.wait_for_key();
            err.status()
        }
    }
}
