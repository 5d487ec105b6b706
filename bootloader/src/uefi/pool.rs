// Firmware pool buffers handed to us by boot services

use crate::BootServices;
use core::ffi::c_void;

/// `count` elements of `T` allocated by the firmware, freed on drop.
pub struct PoolBuffer<'a, T> {
    bs: &'a BootServices,
    ptr: *mut T,
    count: usize,
}

impl<'a, T> PoolBuffer<'a, T> {
    /// Take ownership of a pool allocation returned by a boot service.
    ///
    /// # Safety
    /// `ptr` must be null or come from `AllocatePool`, holding `count`
    /// initialized elements.
    pub unsafe fn from_raw(bs: &'a BootServices, ptr: *mut T, count: usize) -> Self {
        Self { bs, ptr, count }
    }

    pub fn as_slice(&self) -> &[T] {
        if self.ptr.is_null() {
            return &[];
        }
        // SAFETY: guaranteed by from_raw
        unsafe { core::slice::from_raw_parts(self.ptr, self.count) }
    }
}

impl<T> Drop for PoolBuffer<'_, T> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            (self.bs.free_pool)(self.ptr as *mut u8);
        }
    }
}

/// Handles returned by `LocateHandleBuffer`.
pub type HandleBuffer<'a> = PoolBuffer<'a, *mut c_void>;
