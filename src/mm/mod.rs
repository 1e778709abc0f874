//! Memory management module for Sysgate
//!
//! Provides:
//! - Address types and page arithmetic
//! - Physical frame ownership and a bitmap frame pool
//! - Per-process page directories
//! - Kernel heap allocation
//!
//! # Security Principles
//! - All allocations are bounds-checked
//! - Frames are zeroed before reuse
//! - Unsafe code is minimal and audited

pub mod address;
pub mod frame;
pub mod heap;
pub mod paging;

pub use address::{PhysAddr, VirtAddr, PAGE_SIZE};
pub use frame::{FrameAllocator, FramePool, PhysFrame};
pub use heap::{heap_size, init_heap};
pub use paging::{MappingError, PageDirectory};
