// Global variables we read at startup

use super::{to_ucs2, GLOBAL_VARIABLE_GUID};
use crate::RuntimeServices;
use core::ptr;
use ntfsboot_core::secure_boot::SecureBootState;

/// Read a one-byte global variable. Missing or oversized variables read as
/// `None`.
fn read_u8(rt: &RuntimeServices, name: &str) -> Option<u8> {
    let name = to_ucs2(name);
    let mut value = 0u8;
    let mut size = 1usize;
    let status = (rt.get_variable)(
        name.as_ptr(),
        &GLOBAL_VARIABLE_GUID,
        ptr::null_mut(),
        &mut size,
        &mut value,
    );
    (status == 0 && size == 1).then_some(value)
}

pub fn secure_boot_state(rt: &RuntimeServices) -> SecureBootState {
    SecureBootState::from_variables(read_u8(rt, "SecureBoot"), read_u8(rt, "SetupMode"))
}
