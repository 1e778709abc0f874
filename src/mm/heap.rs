//! Kernel Heap Allocator
//!
//! Uses `linked_list_allocator` for heap management. Descriptor tables,
//! page descriptors and file objects all live here.
//!
//! On bare-metal targets the heap is the global allocator; hosted builds
//! (unit tests) keep the system allocator and exercise the heap directly.
//!
//! # Security Considerations
//! - Heap is initialized once during boot
//! - A second initialization is refused rather than corrupting the free list

use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicBool, Ordering};

use linked_list_allocator::LockedHeap;

/// Global heap allocator instance
#[cfg_attr(all(target_os = "none", not(test)), global_allocator)]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize the kernel heap over `region`.
///
/// Returns `false` (and leaves the heap untouched) if the heap was
/// already initialized.
pub fn init_heap(region: &'static mut [MaybeUninit<u8>]) -> bool {
    if INITIALIZED.swap(true, Ordering::AcqRel) {
        log::warn!("heap: ignoring second initialization");
        return false;
    }
    let len = region.len();
    ALLOCATOR.lock().init_from_slice(region);
    log::info!("heap: initialized ({} KiB)", len / 1024);
    true
}

/// Get the size of the kernel heap
pub fn heap_size() -> usize {
    ALLOCATOR.lock().size()
}

/// Bytes currently free in the kernel heap.
pub fn heap_free() -> usize {
    ALLOCATOR.lock().free()
}
