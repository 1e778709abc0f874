//! Per-Process Page Directory
//!
//! The page directory is the hardware-visible half of a process's address
//! space: which user pages are mapped to which frames, right now. The
//! supplemental page table (see [`crate::vm`]) is the durable plan; this
//! directory is the cache of it that the MMU walks.
//!
//! # Security Properties
//! - Only page-aligned user addresses can be mapped
//! - Every user mapping carries the USER bit; kernel-only mappings are
//!   never created here
//! - A page cannot be double-mapped without an explicit unmap first

use alloc::collections::BTreeMap;
use bitflags::bitflags;

use super::address::{PhysAddr, VirtAddr};

bitflags! {
    /// Page table entry flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u64 {
        /// Entry is present.
        const PRESENT = 1 << 0;
        /// Page may be written.
        const WRITABLE = 1 << 1;
        /// Page is reachable from user mode.
        const USER = 1 << 2;
        /// Set by the MMU on any access.
        const ACCESSED = 1 << 5;
        /// Set by the MMU on write.
        const DIRTY = 1 << 6;
    }
}

impl PageFlags {
    /// Flags for a user page.
    pub const fn user(writable: bool) -> Self {
        if writable {
            Self::PRESENT.union(Self::USER).union(Self::WRITABLE)
        } else {
            Self::PRESENT.union(Self::USER)
        }
    }
}

/// A single page table entry: frame address plus flags.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct PageTableEntry(u64);

impl PageTableEntry {
    /// Address mask for page table entries (bits [47:12]).
    const ADDR_MASK: u64 = 0x0000_FFFF_FFFF_F000;

    /// Create a page entry mapping a physical frame.
    #[inline]
    pub fn page(phys: PhysAddr, flags: PageFlags) -> Self {
        debug_assert!(phys.is_aligned());
        Self((phys.as_usize() as u64 & Self::ADDR_MASK) | flags.bits())
    }

    /// Check if the entry is valid (present).
    #[inline]
    pub fn is_present(self) -> bool {
        self.flags().contains(PageFlags::PRESENT)
    }

    /// Get the physical address from this entry.
    #[inline]
    pub fn addr(self) -> PhysAddr {
        PhysAddr::new((self.0 & Self::ADDR_MASK) as usize)
    }

    /// Get the flags from this entry.
    #[inline]
    pub fn flags(self) -> PageFlags {
        PageFlags::from_bits_truncate(self.0 & !Self::ADDR_MASK)
    }

    #[inline]
    fn insert_flags(&mut self, flags: PageFlags) {
        self.0 |= flags.bits();
    }
}

impl core::fmt::Debug for PageTableEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_present() {
            write!(f, "PTE(addr={}, flags={:?})", self.addr(), self.flags())
        } else {
            write!(f, "PTE(invalid)")
        }
    }
}

/// Error type for page mapping operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingError {
    /// The virtual address is already mapped.
    AlreadyMapped,
    /// The virtual address is not mapped.
    NotMapped,
    /// The address is not properly aligned.
    MisalignedAddress,
    /// Attempted to map a kernel address into user space.
    InvalidPermissions,
}

impl core::fmt::Display for MappingError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AlreadyMapped => write!(f, "virtual address already mapped"),
            Self::NotMapped => write!(f, "virtual address not mapped"),
            Self::MisalignedAddress => write!(f, "address not properly aligned"),
            Self::InvalidPermissions => write!(f, "invalid permission combination"),
        }
    }
}

/// User mappings of one process, keyed by virtual page number.
#[derive(Debug)]
pub struct PageDirectory {
    user_top: usize,
    entries: BTreeMap<usize, PageTableEntry>,
}

impl PageDirectory {
    /// Create an empty directory for an address space whose kernel half
    /// begins at `user_top`.
    pub fn new(user_top: usize) -> Self {
        Self {
            user_top,
            entries: BTreeMap::new(),
        }
    }

    pub fn user_top(&self) -> usize {
        self.user_top
    }

    /// Look up the entry for the page containing `va`.
    pub fn entry(&self, va: VirtAddr) -> Option<PageTableEntry> {
        self.entries
            .get(&va.page_number())
            .copied()
            .filter(|e| e.is_present())
    }

    /// Translate a user address to the physical address backing it.
    ///
    /// Returns `None` for kernel addresses and unmapped pages.
    pub fn translate(&self, va: VirtAddr) -> Option<PhysAddr> {
        if !va.is_user(self.user_top) {
            return None;
        }
        self.entry(va).map(|e| e.addr().add(va.page_offset()))
    }

    /// Map `upage` to `frame`.
    pub fn map(&mut self, upage: VirtAddr, frame: PhysAddr, writable: bool) -> Result<(), MappingError> {
        if !upage.is_aligned() || !frame.is_aligned() {
            return Err(MappingError::MisalignedAddress);
        }
        if !upage.is_user(self.user_top) {
            return Err(MappingError::InvalidPermissions);
        }
        if self.entry(upage).is_some() {
            return Err(MappingError::AlreadyMapped);
        }
        self.entries
            .insert(upage.page_number(), PageTableEntry::page(frame, PageFlags::user(writable)));
        Ok(())
    }

    /// Remove the mapping of `upage`, returning the entry it had.
    pub fn unmap(&mut self, upage: VirtAddr) -> Result<PageTableEntry, MappingError> {
        self.entries
            .remove(&upage.page_number())
            .filter(|e| e.is_present())
            .ok_or(MappingError::NotMapped)
    }

    /// Record an access the way the MMU does.
    pub fn mark_accessed(&mut self, va: VirtAddr, write: bool) {
        if let Some(entry) = self.entries.get_mut(&va.page_number()) {
            entry.insert_flags(PageFlags::ACCESSED);
            if write {
                entry.insert_flags(PageFlags::DIRTY);
            }
        }
    }

    /// Check if the page containing `va` has been written since mapping.
    pub fn is_dirty(&self, va: VirtAddr) -> bool {
        self.entry(va)
            .map(|e| e.flags().contains(PageFlags::DIRTY))
            .unwrap_or(false)
    }

    /// Number of mapped pages.
    pub fn mapped_pages(&self) -> usize {
        self.entries.len()
    }

    /// Drop every mapping.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
