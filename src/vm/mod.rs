//! Virtual Memory
//!
//! Demand paging support: page descriptors, the per-process supplemental
//! page table, and the address space that ties the table to the page
//! directory for fault resolution and eviction.
//!
//! # Security Principles
//! - A fault on an undeclared page is never resolved
//! - Frames are owned by exactly one resident descriptor
//! - The table and the directory change together under one lock

pub mod fault;
pub mod page;
pub mod spt;

pub use fault::{AddressSpace, SegmentReader, SegmentRef, SwapDevice, VmError};
pub use page::{Backing, BackingKind, FileSegment, PageDescriptor, PageError, SwapSlot};
pub use spt::{SptError, SupplementalPageTable};
