//! Global allocator over UEFI pool memory
//!
//! We never leave boot services, so `AllocatePool`/`FreePool` are all the
//! heap we need. Alignments above 8 are served by over-allocating and
//! stashing the original pointer right below the aligned block.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use crate::uefi::LOADER_DATA;

/// UEFI Boot Services pointer - set by efi_main
static BOOT_SERVICES: AtomicPtr<()> = AtomicPtr::new(ptr::null_mut());

/// Pool allocations are 8-byte aligned
const POOL_ALIGN: usize = 8;

/// Set the boot services pointer (call once at start of efi_main)
pub fn set_boot_services(bs: *const crate::BootServices) {
    BOOT_SERVICES.store(bs as *mut (), Ordering::SeqCst);
}

fn boot_services() -> Option<&'static crate::BootServices> {
    let bs = BOOT_SERVICES.load(Ordering::SeqCst);
    // SAFETY: only ever set from the system table handed to efi_main
    unsafe { (bs as *const crate::BootServices).as_ref() }
}

pub struct PoolAllocator;

unsafe impl GlobalAlloc for PoolAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let Some(bs) = boot_services() else {
            return ptr::null_mut();
        };
        let align = layout.align();
        let size = layout.size();

        if align <= POOL_ALIGN {
            let mut buffer: *mut u8 = ptr::null_mut();
            if (bs.allocate_pool)(LOADER_DATA, size, &mut buffer) != 0 {
                return ptr::null_mut();
            }
            return buffer;
        }

        let total_size = size + align + core::mem::size_of::<usize>();
        let mut buffer: *mut u8 = ptr::null_mut();
        if (bs.allocate_pool)(LOADER_DATA, total_size, &mut buffer) != 0 {
            return ptr::null_mut();
        }

        let raw_addr = buffer as usize;
        let aligned_addr = (raw_addr + core::mem::size_of::<usize>() + align - 1) & !(align - 1);
        let original = (aligned_addr - core::mem::size_of::<usize>()) as *mut usize;
        *original = raw_addr;

        aligned_addr as *mut u8
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let Some(bs) = boot_services() else {
            return;
        };
        if ptr.is_null() {
            return;
        }

        if layout.align() <= POOL_ALIGN {
            (bs.free_pool)(ptr);
        } else {
            let original = (ptr as usize - core::mem::size_of::<usize>()) as *const usize;
            (bs.free_pool)(*original as *mut u8);
        }
    }
}

#[global_allocator]
static ALLOCATOR: PoolAllocator = PoolAllocator;
