//! Physical Frame Management
//!
//! Defines the frame-allocator collaborator, the RAII frame owner used by
//! resident pages, and a bitmap allocator over an owned frame arena.
//!
//! # Design
//! - Each bit in the bitmap represents one 4KB frame
//! - Bit = 0: frame is free
//! - Bit = 1: frame is allocated
//!
//! # Security Properties
//! - All allocated frames are zeroed before returning
//! - Double-free is detected and causes a panic
//! - The pool is protected by a spinlock

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use spin::Mutex;

use super::address::{PhysAddr, PAGE_SHIFT, PAGE_SIZE};

/// Source of physical frames and the kernel's view of their contents.
///
/// The kernel reaches frame bytes through its direct map; the trait keeps
/// that access behind the allocator that owns the memory.
pub trait FrameAllocator: Send + Sync {
    /// Allocate one zeroed frame.
    fn allocate(&self) -> Option<PhysAddr>;

    /// Return a frame previously handed out by [`Self::allocate`].
    fn deallocate(&self, frame: PhysAddr);

    /// Copy `src` into the frame starting at `offset`.
    fn write(&self, frame: PhysAddr, offset: usize, src: &[u8]);

    /// Copy bytes out of the frame starting at `offset`.
    fn read(&self, frame: PhysAddr, offset: usize, dst: &mut [u8]);

    /// Fill `len` bytes of the frame with zeros starting at `offset`.
    fn zero(&self, frame: PhysAddr, offset: usize, len: usize);
}

/// A RAII guard for a physical frame that automatically frees it on drop.
///
/// A resident page owns exactly one of these; dropping the page
/// descriptor is what returns the frame.
pub struct PhysFrame {
    addr: PhysAddr,
    allocator: Arc<dyn FrameAllocator>,
}

impl PhysFrame {
    /// Allocate a new physical frame.
    pub fn alloc(allocator: &Arc<dyn FrameAllocator>) -> Option<Self> {
        allocator.allocate().map(|addr| Self {
            addr,
            allocator: Arc::clone(allocator),
        })
    }

    /// Get the physical address of this frame.
    #[inline]
    pub fn addr(&self) -> PhysAddr {
        self.addr
    }

    pub fn write(&self, offset: usize, src: &[u8]) {
        self.allocator.write(self.addr, offset, src);
    }

    pub fn read(&self, offset: usize, dst: &mut [u8]) {
        self.allocator.read(self.addr, offset, dst);
    }

    pub fn zero(&self, offset: usize, len: usize) {
        self.allocator.zero(self.addr, offset, len);
    }
}

impl Drop for PhysFrame {
    fn drop(&mut self) {
        self.allocator.deallocate(self.addr);
    }
}

impl core::fmt::Debug for PhysFrame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "PhysFrame({})", self.addr)
    }
}

/// Frame allocator state.
struct FramePoolInner {
    /// Bitmap tracking allocated frames (1 = allocated, 0 = free).
    bitmap: Vec<u8>,
    /// Backing storage, one `PAGE_SIZE` run per frame.
    arena: Vec<u8>,
    /// Number of free frames remaining.
    free_count: usize,
}

impl FramePoolInner {
    /// Set a bit in the bitmap.
    #[inline]
    fn set_bit(&mut self, frame: usize, allocated: bool) {
        let byte_idx = frame / 8;
        let bit_idx = frame % 8;

        if allocated {
            self.bitmap[byte_idx] |= 1 << bit_idx;
        } else {
            self.bitmap[byte_idx] &= !(1 << bit_idx);
        }
    }

    /// Check if a frame is allocated.
    #[inline]
    fn is_allocated(&self, frame: usize) -> bool {
        (self.bitmap[frame / 8] >> (frame % 8)) & 1 == 1
    }

    fn bytes_mut(&mut self, frame: usize) -> &mut [u8] {
        let start = frame * PAGE_SIZE;
        &mut self.arena[start..start + PAGE_SIZE]
    }
}

/// Bitmap allocator over an owned, contiguous arena of frames.
///
/// Frame `i` is reported at physical address `base + i * PAGE_SIZE`.
pub struct FramePool {
    base: PhysAddr,
    frames: usize,
    inner: Mutex<FramePoolInner>,
}

impl FramePool {
    /// Create a pool of `frames` frames whose first frame sits at `base`.
    ///
    /// # Panics
    /// Panics if `base` is not page-aligned.
    pub fn new(base: PhysAddr, frames: usize) -> Self {
        assert!(base.is_aligned(), "frame pool base {:?} is not page-aligned", base);
        Self {
            base,
            frames,
            inner: Mutex::new(FramePoolInner {
                bitmap: vec![0; frames.div_ceil(8)],
                arena: vec![0; frames * PAGE_SIZE],
                free_count: frames,
            }),
        }
    }

    /// Get the number of free frames remaining.
    pub fn free_frames(&self) -> usize {
        self.inner.lock().free_count
    }

    /// Translate an address into a frame index.
    ///
    /// # Panics
    /// Panics on unaligned addresses or addresses outside the pool.
    fn index_of(&self, addr: PhysAddr) -> usize {
        if !addr.is_aligned() {
            panic!("frame address not aligned: {:?}", addr);
        }
        let index = addr
            .as_usize()
            .checked_sub(self.base.as_usize())
            .map(|off| off >> PAGE_SHIFT)
            .filter(|&i| i < self.frames);
        match index {
            Some(i) => i,
            None => panic!("frame outside managed range: {:?}", addr),
        }
    }
}

impl FrameAllocator for FramePool {
    fn allocate(&self) -> Option<PhysAddr> {
        let mut inner = self.inner.lock();
        if inner.free_count == 0 {
            return None;
        }

        let frame = (0..self.frames).find(|&f| !inner.is_allocated(f))?;
        inner.set_bit(frame, true);
        inner.free_count -= 1;
        // Zero the frame so no stale contents leak between processes
        inner.bytes_mut(frame).fill(0);

        Some(self.base.add(frame << PAGE_SHIFT))
    }

    fn deallocate(&self, addr: PhysAddr) {
        let frame = self.index_of(addr);
        let mut inner = self.inner.lock();
        if !inner.is_allocated(frame) {
            panic!("double free detected for frame: {:?}", addr);
        }
        inner.set_bit(frame, false);
        inner.free_count += 1;
    }

    fn write(&self, addr: PhysAddr, offset: usize, src: &[u8]) {
        let frame = self.index_of(addr);
        self.inner.lock().bytes_mut(frame)[offset..offset + src.len()].copy_from_slice(src);
    }

    fn read(&self, addr: PhysAddr, offset: usize, dst: &mut [u8]) {
        let frame = self.index_of(addr);
        let len = dst.len();
        dst.copy_from_slice(&self.inner.lock().bytes_mut(frame)[offset..offset + len]);
    }

    fn zero(&self, addr: PhysAddr, offset: usize, len: usize) {
        let frame = self.index_of(addr);
        self.inner.lock().bytes_mut(frame)[offset..offset + len].fill(0);
    }
}
