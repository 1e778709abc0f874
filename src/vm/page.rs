//! Page Descriptors
//!
//! A page descriptor is the durable plan for one virtual page: where its
//! contents come from when it is not resident, whether user code may
//! write it, and (while resident) the frame that holds it.

use core::fmt;

use crate::mm::address::{VirtAddr, PAGE_SIZE};
use crate::mm::frame::PhysFrame;

/// Slot index on the swap device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapSlot(pub usize);

/// A run of bytes from a file followed by zero padding.
///
/// `file` is a non-owning reference; whoever loaded the segment keeps the
/// file open for the life of the address space.
#[derive(Debug, Clone)]
pub struct FileSegment<S> {
    pub file: S,
    pub offset: u64,
    pub read_bytes: usize,
    pub zero_bytes: usize,
}

/// How to reconstruct a page that is not resident.
#[derive(Debug, Clone)]
pub enum Backing<S> {
    /// `read_bytes` from `file` at `offset`, then `zero_bytes` zeros.
    FileSegment(FileSegment<S>),
    /// All zeros.
    ZeroFill,
    /// Contents were written to swap when the page was evicted.
    Swapped(SwapSlot),
}

impl<S> Backing<S> {
    pub fn kind(&self) -> BackingKind {
        match self {
            Self::FileSegment(_) => BackingKind::FileSegment,
            Self::ZeroFill => BackingKind::ZeroFill,
            Self::Swapped(_) => BackingKind::Swapped,
        }
    }
}

/// Backing discriminant, for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackingKind {
    FileSegment,
    ZeroFill,
    Swapped,
}

/// Error returned when a descriptor would violate its invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageError {
    /// The virtual page is not page-aligned.
    Misaligned,
    /// `read_bytes + zero_bytes` does not cover exactly one page.
    BadSegmentLength,
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Misaligned => write!(f, "virtual page not page-aligned"),
            Self::BadSegmentLength => write!(f, "segment does not cover exactly one page"),
        }
    }
}

/// Everything the kernel knows about one declared virtual page.
#[derive(Debug)]
pub struct PageDescriptor<S> {
    upage: VirtAddr,
    writable: bool,
    backing: Backing<S>,
    frame: Option<PhysFrame>,
}

impl<S> PageDescriptor<S> {
    /// Declare a page loaded lazily from a file segment.
    pub fn file_segment(
        upage: VirtAddr,
        file: S,
        offset: u64,
        read_bytes: usize,
        zero_bytes: usize,
        writable: bool,
    ) -> Result<Self, PageError> {
        if read_bytes.checked_add(zero_bytes) != Some(PAGE_SIZE) {
            return Err(PageError::BadSegmentLength);
        }
        Self::new(
            upage,
            writable,
            Backing::FileSegment(FileSegment {
                file,
                offset,
                read_bytes,
                zero_bytes,
            }),
        )
    }

    /// Declare an all-zero page (bss, stack).
    pub fn zero_fill(upage: VirtAddr, writable: bool) -> Result<Self, PageError> {
        Self::new(upage, writable, Backing::ZeroFill)
    }

    fn new(upage: VirtAddr, writable: bool, backing: Backing<S>) -> Result<Self, PageError> {
        if !upage.is_aligned() {
            return Err(PageError::Misaligned);
        }
        Ok(Self {
            upage,
            writable,
            backing,
            frame: None,
        })
    }

    /// Page-aligned virtual address this descriptor is keyed by.
    #[inline]
    pub fn upage(&self) -> VirtAddr {
        self.upage
    }

    #[inline]
    pub fn writable(&self) -> bool {
        self.writable
    }

    #[inline]
    pub fn is_resident(&self) -> bool {
        self.frame.is_some()
    }

    #[inline]
    pub fn backing(&self) -> &Backing<S> {
        &self.backing
    }

    #[inline]
    pub fn frame(&self) -> Option<&PhysFrame> {
        self.frame.as_ref()
    }

    /// Take ownership of the frame now holding this page's contents.
    pub(crate) fn make_resident(&mut self, frame: PhysFrame) {
        debug_assert!(self.frame.is_none(), "page {} already resident", self.upage);
        self.frame = Some(frame);
    }

    /// Give up the frame; the page must be reconstructible from `backing`.
    pub(crate) fn make_nonresident(&mut self, backing: Option<Backing<S>>) -> Option<PhysFrame> {
        if let Some(backing) = backing {
            self.backing = backing;
        }
        self.frame.take()
    }
}
