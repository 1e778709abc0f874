//! Supplemental Page Table
//!
//! Per-process index from page-aligned virtual address to
//! [`PageDescriptor`]. It answers "what does virtual page X mean"
//! whether or not the page is resident; the page directory only says
//! where resident pages currently live.
//!
//! # Ownership
//! - The table owns every descriptor
//! - A resident descriptor owns its frame, so removing the descriptor
//!   (or destroying the table) returns the frame to its allocator
//! - [`SupplementalPageTable::destroy_all`] consumes the table; tearing
//!   the same table down twice does not type-check

use core::fmt;

use hashbrown::HashMap;

use super::page::PageDescriptor;
use crate::mm::address::VirtAddr;

/// Error type for SPT operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SptError {
    /// A descriptor for that page already exists.
    AlreadyPresent(VirtAddr),
    /// No descriptor covers that address.
    NotPresent(VirtAddr),
}

impl fmt::Display for SptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyPresent(page) => write!(f, "page {} already declared", page),
            Self::NotPresent(va) => write!(f, "no page declared at {}", va),
        }
    }
}

/// Hash-indexed set of page descriptors keyed by virtual page.
#[derive(Debug)]
pub struct SupplementalPageTable<S> {
    pages: HashMap<VirtAddr, PageDescriptor<S>>,
}

impl<S> SupplementalPageTable<S> {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
        }
    }

    /// Add a descriptor. Fails without touching the table if its page is
    /// already declared.
    pub fn insert(&mut self, desc: PageDescriptor<S>) -> Result<(), SptError> {
        let upage = desc.upage();
        if self.pages.contains_key(&upage) {
            log::debug!("spt: refusing to double-map {}", upage);
            return Err(SptError::AlreadyPresent(upage));
        }
        self.pages.insert(upage, desc);
        Ok(())
    }

    /// Find the descriptor for the page containing `va`.
    pub fn lookup(&self, va: VirtAddr) -> Option<&PageDescriptor<S>> {
        self.pages.get(&va.page_base())
    }

    /// Mutable variant of [`Self::lookup`].
    pub fn lookup_mut(&mut self, va: VirtAddr) -> Option<&mut PageDescriptor<S>> {
        self.pages.get_mut(&va.page_base())
    }

    /// Detach the descriptor for the page containing `va` and hand it to
    /// the caller.
    pub fn take(&mut self, va: VirtAddr) -> Option<PageDescriptor<S>> {
        self.pages.remove(&va.page_base())
    }

    /// Delete the descriptor for the page containing `va`, releasing its
    /// frame. Returns whether a descriptor was present.
    pub fn remove(&mut self, va: VirtAddr) -> bool {
        self.take(va).is_some()
    }

    /// Release every descriptor and its frame and discard the table.
    ///
    /// Returns the number of frames released.
    pub fn destroy_all(self) -> usize {
        let declared = self.pages.len();
        let released = self.resident_count();
        drop(self.pages);
        log::debug!("spt: destroyed {} pages, released {} frames", declared, released);
        released
    }

    /// Number of declared pages.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Number of descriptors currently holding a frame.
    pub fn resident_count(&self) -> usize {
        self.pages.values().filter(|d| d.is_resident()).count()
    }

    /// Iterate over all descriptors in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &PageDescriptor<S>> {
        self.pages.values()
    }
}

impl<S> Default for SupplementalPageTable<S> {
    fn default() -> Self {
        Self::new()
    }
}
