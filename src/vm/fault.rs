//! Address Space and Demand Paging
//!
//! An [`AddressSpace`] pairs a process's supplemental page table with its
//! page directory. The two are only ever changed together, under the
//! per-process lock the owning [`crate::Process`] wraps around this type,
//! so a fault on one thread cannot race an unmap or a second fault on
//! another.
//!
//! # Lock Order
//! address space -> file system. Fault resolution reads file segments
//! while holding the address space; the syscall layer therefore never
//! takes the address space while holding the file-system lock.

use alloc::sync::{Arc, Weak};
use alloc::vec;
use core::fmt;

use spin::Mutex;

use super::page::{Backing, PageDescriptor, PageError, SwapSlot};
use super::spt::{SptError, SupplementalPageTable};
use crate::fs::{FileSystem, FileSystemLock};
use crate::mm::address::{VirtAddr, PAGE_SIZE};
use crate::mm::frame::{FrameAllocator, PhysFrame};
use crate::mm::paging::{MappingError, PageDirectory};

/// Swap collaborator used by eviction.
pub trait SwapDevice: Send + Sync {
    /// Write the frame's contents to a free slot.
    fn swap_out(&self, frame: &PhysFrame) -> Option<SwapSlot>;

    /// Restore a slot into `frame` and free the slot.
    fn swap_in(&self, slot: SwapSlot, frame: &PhysFrame);

    /// Free a slot whose contents are no longer needed.
    fn release(&self, slot: SwapSlot);
}

/// Reads the file bytes behind a [`Backing::FileSegment`].
pub trait SegmentReader<S> {
    /// Fill `buf` from `file` at `offset`; returns the byte count read.
    fn read_segment(&self, file: &S, offset: u64, buf: &mut [u8]) -> Result<usize, VmError>;
}

/// Non-owning reference from a page descriptor to an open file.
pub type SegmentRef<F> = Weak<Mutex<<F as FileSystem>::File>>;

impl<F: FileSystem> SegmentReader<SegmentRef<F>> for FileSystemLock<F> {
    fn read_segment(&self, file: &SegmentRef<F>, offset: u64, buf: &mut [u8]) -> Result<usize, VmError> {
        let file = file.upgrade().ok_or(VmError::SegmentClosed)?;
        let offset = u32::try_from(offset).map_err(|_| VmError::ShortRead)?;
        let mut io = self.lock();
        let mut file = file.lock();
        Ok(io.fs.read_at(&mut file, buf, offset))
    }
}

/// Errors from address-space operations and fault resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    /// No page is declared at the address (or it is not a user address).
    Unmapped(VirtAddr),
    /// A write hit a page declared read-only.
    WriteToReadOnly(VirtAddr),
    /// The frame allocator is exhausted.
    OutOfFrames,
    /// The file behind a segment has been closed.
    SegmentClosed,
    /// The file held fewer bytes than the segment promised.
    ShortRead,
    /// A dirty page needs swap but none is available.
    NoSwap,
    /// The page is not resident.
    NotResident(VirtAddr),
    Page(PageError),
    Spt(SptError),
    Mapping(MappingError),
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmapped(va) => write!(f, "no page declared at {}", va),
            Self::WriteToReadOnly(va) => write!(f, "write to read-only page at {}", va),
            Self::OutOfFrames => write!(f, "out of physical frames"),
            Self::SegmentClosed => write!(f, "segment file is closed"),
            Self::ShortRead => write!(f, "segment file ended early"),
            Self::NoSwap => write!(f, "no swap space for dirty page"),
            Self::NotResident(va) => write!(f, "page at {} is not resident", va),
            Self::Page(e) => write!(f, "{}", e),
            Self::Spt(e) => write!(f, "{}", e),
            Self::Mapping(e) => write!(f, "{}", e),
        }
    }
}

impl From<PageError> for VmError {
    fn from(e: PageError) -> Self {
        Self::Page(e)
    }
}

impl From<SptError> for VmError {
    fn from(e: SptError) -> Self {
        Self::Spt(e)
    }
}

impl From<MappingError> for VmError {
    fn from(e: MappingError) -> Self {
        Self::Mapping(e)
    }
}

/// A process's virtual memory: the plan (SPT) and the live mappings.
pub struct AddressSpace<S> {
    spt: SupplementalPageTable<S>,
    pagedir: PageDirectory,
    frames: Arc<dyn FrameAllocator>,
    swap: Option<Arc<dyn SwapDevice>>,
}

impl<S> AddressSpace<S> {
    pub fn new(user_top: usize, frames: Arc<dyn FrameAllocator>, swap: Option<Arc<dyn SwapDevice>>) -> Self {
        Self {
            spt: SupplementalPageTable::new(),
            pagedir: PageDirectory::new(user_top),
            frames,
            swap,
        }
    }

    #[inline]
    pub fn spt(&self) -> &SupplementalPageTable<S> {
        &self.spt
    }

    #[inline]
    pub fn pagedir(&self) -> &PageDirectory {
        &self.pagedir
    }

    /// Declare a run of pages loaded lazily from `file`, the way an
    /// executable loader lays out a segment.
    ///
    /// `read_bytes + zero_bytes` must be a whole number of pages. On
    /// failure, pages declared by this call are withdrawn again.
    pub fn declare_segment(
        &mut self,
        upage: VirtAddr,
        file: S,
        offset: u64,
        mut read_bytes: usize,
        mut zero_bytes: usize,
        writable: bool,
    ) -> Result<(), VmError>
    where
        S: Clone,
    {
        match read_bytes.checked_add(zero_bytes) {
            Some(total) if total % PAGE_SIZE == 0 => {}
            _ => return Err(PageError::BadSegmentLength.into()),
        }
        if !upage.is_aligned() {
            return Err(PageError::Misaligned.into());
        }

        let mut page = upage;
        let mut offset = offset;
        let mut declared = 0;
        while read_bytes > 0 || zero_bytes > 0 {
            let page_read = read_bytes.min(PAGE_SIZE);
            let page_zero = PAGE_SIZE - page_read;
            let result = self.declare(page, |page| {
                PageDescriptor::file_segment(page, file.clone(), offset, page_read, page_zero, writable)
            });
            if let Err(e) = result {
                self.withdraw(upage, declared);
                return Err(e);
            }

            declared += 1;
            read_bytes -= page_read;
            zero_bytes -= page_zero;
            offset += page_read as u64;
            page = match page.next_page() {
                Some(next) => next,
                None => break,
            };
        }
        log::trace!("vm: declared {} segment pages at {}", declared, upage);
        Ok(())
    }

    /// Declare one all-zero page (stack, bss).
    pub fn declare_zero(&mut self, upage: VirtAddr, writable: bool) -> Result<(), VmError> {
        self.declare(upage, |page| PageDescriptor::zero_fill(page, writable))
    }

    fn declare(
        &mut self,
        upage: VirtAddr,
        make: impl FnOnce(VirtAddr) -> Result<PageDescriptor<S>, PageError>,
    ) -> Result<(), VmError> {
        if !upage.is_user(self.pagedir.user_top()) {
            return Err(MappingError::InvalidPermissions.into());
        }
        self.spt.insert(make(upage)?)?;
        Ok(())
    }

    fn withdraw(&mut self, upage: VirtAddr, pages: usize) {
        for n in 0..pages {
            self.spt.remove(VirtAddr::new(upage.as_usize() + n * PAGE_SIZE));
        }
    }

    /// Resolve a page fault at `addr`.
    ///
    /// Resident pages are left alone. Otherwise a frame is allocated,
    /// filled according to the page's backing, mapped with the page's
    /// writability, and handed to the descriptor.
    pub fn handle_fault<R>(&mut self, addr: VirtAddr, write: bool, reader: &R) -> Result<(), VmError>
    where
        R: SegmentReader<S>,
    {
        if !addr.is_user(self.pagedir.user_top()) {
            return Err(VmError::Unmapped(addr));
        }
        let desc = self.spt.lookup_mut(addr).ok_or(VmError::Unmapped(addr))?;
        if write && !desc.writable() {
            return Err(VmError::WriteToReadOnly(addr));
        }
        if desc.is_resident() {
            return Ok(());
        }

        let frame = PhysFrame::alloc(&self.frames).ok_or(VmError::OutOfFrames)?;
        match desc.backing() {
            Backing::FileSegment(seg) => {
                let mut buf = vec![0u8; seg.read_bytes];
                let n = reader.read_segment(&seg.file, seg.offset, &mut buf)?;
                if n != seg.read_bytes {
                    return Err(VmError::ShortRead);
                }
                frame.write(0, &buf);
                frame.zero(seg.read_bytes, seg.zero_bytes);
            }
            Backing::ZeroFill => frame.zero(0, PAGE_SIZE),
            Backing::Swapped(slot) => {
                let swap = self.swap.as_ref().ok_or(VmError::NoSwap)?;
                swap.swap_in(*slot, &frame);
            }
        }

        // On failure `frame` drops here and goes back to the allocator.
        self.pagedir.map(desc.upage(), frame.addr(), desc.writable())?;
        log::trace!("vm: {} resident in {}", desc.upage(), frame.addr());
        desc.make_resident(frame);
        Ok(())
    }

    /// Push a resident page out of memory.
    ///
    /// Dirty pages, and pages that already came back from swap, are
    /// written to swap; clean pages keep their original backing.
    pub fn evict(&mut self, upage: VirtAddr) -> Result<(), VmError> {
        let desc = self.spt.lookup_mut(upage).ok_or(VmError::Unmapped(upage))?;
        let frame = desc.frame().ok_or(VmError::NotResident(upage))?;

        // A page that returned from swap gave its slot back on swap-in, so
        // its only copy is the frame.
        let needs_swap = self.pagedir.is_dirty(upage) || matches!(desc.backing(), Backing::Swapped(_));
        let backing = if needs_swap {
            let swap = self.swap.as_ref().ok_or(VmError::NoSwap)?;
            Some(Backing::Swapped(swap.swap_out(frame).ok_or(VmError::NoSwap)?))
        } else {
            None
        };

        self.pagedir.unmap(desc.upage())?;
        let upage = desc.upage();
        drop(desc.make_nonresident(backing));
        log::trace!("vm: evicted {} (swapped: {})", upage, needs_swap);
        Ok(())
    }

    /// Remove a declared page entirely, releasing its frame or swap slot.
    pub fn unmap(&mut self, va: VirtAddr) -> Result<(), VmError> {
        let desc = self.spt.take(va).ok_or(SptError::NotPresent(va))?;
        self.release(&desc);
        Ok(())
    }

    fn release(&mut self, desc: &PageDescriptor<S>) {
        if desc.is_resident() {
            let _ = self.pagedir.unmap(desc.upage());
        } else if let (Backing::Swapped(slot), Some(swap)) = (desc.backing(), self.swap.as_ref()) {
            swap.release(*slot);
        }
    }

    /// Tear down every page: mappings, frames and swap slots.
    ///
    /// Leaves an empty address space behind and returns the number of
    /// frames released.
    pub fn destroy(&mut self) -> usize {
        let spt = core::mem::take(&mut self.spt);
        if let Some(swap) = self.swap.as_ref() {
            for desc in spt.iter().filter(|d| !d.is_resident()) {
                if let Backing::Swapped(slot) = desc.backing() {
                    swap.release(*slot);
                }
            }
        }
        self.pagedir.clear();
        spt.destroy_all()
    }

    /// Translate a user address for the kernel's copy routines.
    fn frame_of(&self, va: VirtAddr) -> Result<crate::mm::PhysAddr, VmError> {
        self.pagedir
            .translate(va.page_base())
            .ok_or(VmError::Unmapped(va))
    }

    /// Copy bytes out of user memory. Every touched page must be mapped.
    pub fn copy_from_user(&self, va: VirtAddr, dst: &mut [u8]) -> Result<(), VmError> {
        let mut done = 0;
        while done < dst.len() {
            let at = va.checked_add(done).ok_or(VmError::Unmapped(va))?;
            let chunk = (PAGE_SIZE - at.page_offset()).min(dst.len() - done);
            let frame = self.frame_of(at)?;
            self.frames
                .read(frame, at.page_offset(), &mut dst[done..done + chunk]);
            done += chunk;
        }
        Ok(())
    }

    /// Copy bytes into user memory, marking pages accessed and dirty.
    /// Every touched page must be mapped writable.
    pub fn copy_to_user(&mut self, va: VirtAddr, src: &[u8]) -> Result<(), VmError> {
        let mut done = 0;
        while done < src.len() {
            let at = va.checked_add(done).ok_or(VmError::Unmapped(va))?;
            let chunk = (PAGE_SIZE - at.page_offset()).min(src.len() - done);
            let entry = self.pagedir.entry(at).ok_or(VmError::Unmapped(at))?;
            if !entry.flags().contains(crate::mm::paging::PageFlags::WRITABLE) {
                return Err(VmError::WriteToReadOnly(at));
            }
            self.frames.write(entry.addr(), at.page_offset(), &src[done..done + chunk]);
            self.pagedir.mark_accessed(at, true);
            done += chunk;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::RamFs;
    use crate::mm::address::PhysAddr;
    use crate::mm::frame::FramePool;
    use crate::testing::{MemSwap, NoSegments, ScriptedConsole, FRAME_BASE, TOP};
    use crate::vm::page::BackingKind;
    use alloc::boxed::Box;
    use alloc::vec::Vec;

    const CODE: usize = 0x0804_8000;

    /// File contents served from memory; `limit` truncates the file.
    struct Image {
        bytes: Vec<u8>,
        limit: usize,
    }

    impl Image {
        fn new(len: usize) -> Self {
            Self {
                bytes: (0..len).map(|i| (i % 251) as u8).collect(),
                limit: len,
            }
        }
    }

    impl SegmentReader<()> for Image {
        fn read_segment(&self, _file: &(), offset: u64, buf: &mut [u8]) -> Result<usize, VmError> {
            let start = (offset as usize).min(self.limit);
            let n = buf.len().min(self.limit - start);
            buf[..n].copy_from_slice(&self.bytes[start..start + n]);
            Ok(n)
        }
    }

    fn pool(frames: usize) -> Arc<FramePool> {
        Arc::new(FramePool::new(PhysAddr::new(FRAME_BASE), frames))
    }

    fn space(frames: &Arc<FramePool>, swap: Option<Arc<MemSwap>>) -> AddressSpace<()> {
        AddressSpace::new(TOP, frames.clone(), swap.map(|s| s as Arc<dyn SwapDevice>))
    }

    fn page(n: usize) -> VirtAddr {
        VirtAddr::new(CODE + n * PAGE_SIZE)
    }

    fn read_page(space: &AddressSpace<()>, va: VirtAddr) -> Vec<u8> {
        let mut buf = vec![0u8; PAGE_SIZE];
        space.copy_from_user(va, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_fault_loads_file_bytes_then_zeros() {
        let frames = pool(4);
        let mut space = space(&frames, None);
        let image = Image::new(6000);
        space.declare_segment(page(0), (), 0, 6000, 2 * PAGE_SIZE - 6000, false).unwrap();
        assert_eq!(space.spt().len(), 2);
        assert_eq!(space.spt().resident_count(), 0);

        // Any address inside the page resolves it.
        space.handle_fault(page(0).checked_add(10).unwrap(), false, &image).unwrap();
        assert_eq!(read_page(&space, page(0)), image.bytes[..PAGE_SIZE]);

        space.handle_fault(page(1), false, &image).unwrap();
        let second = read_page(&space, page(1));
        assert_eq!(second[..6000 - PAGE_SIZE], image.bytes[PAGE_SIZE..]);
        assert!(second[6000 - PAGE_SIZE..].iter().all(|&b| b == 0));
        assert_eq!(frames.free_frames(), 2);

        // Resident pages are left alone.
        space.handle_fault(page(1), false, &image).unwrap();
        assert_eq!(frames.free_frames(), 2);
    }

    #[test]
    fn test_segment_offset_advances_per_page() {
        let frames = pool(2);
        let mut space = space(&frames, None);
        let image = Image::new(3 * PAGE_SIZE);
        space.declare_segment(page(0), (), PAGE_SIZE as u64, 2 * PAGE_SIZE, 0, true).unwrap();
        space.handle_fault(page(1), false, &image).unwrap();
        assert_eq!(read_page(&space, page(1)), image.bytes[2 * PAGE_SIZE..]);
    }

    #[test]
    fn test_fault_classification() {
        let frames = pool(2);
        let mut space = space(&frames, None);
        space.declare_zero(page(0), false).unwrap();

        assert_eq!(space.handle_fault(page(5), false, &NoSegments), Err(VmError::Unmapped(page(5))));
        let kernel = VirtAddr::new(TOP + 8);
        assert_eq!(space.handle_fault(kernel, false, &NoSegments), Err(VmError::Unmapped(kernel)));
        assert_eq!(
            space.handle_fault(page(0), true, &NoSegments),
            Err(VmError::WriteToReadOnly(page(0)))
        );

        space.handle_fault(page(0), false, &NoSegments).unwrap();
        assert!(read_page(&space, page(0)).iter().all(|&b| b == 0));
        assert_eq!(
            space.copy_to_user(page(0), b"x"),
            Err(VmError::WriteToReadOnly(page(0)))
        );
    }

    #[test]
    fn test_failed_fill_returns_frame() {
        let frames = pool(2);
        let mut space = space(&frames, None);
        let mut image = Image::new(PAGE_SIZE);
        image.limit = 100;
        space.declare_segment(page(0), (), 0, PAGE_SIZE, 0, false).unwrap();

        assert_eq!(space.handle_fault(page(0), false, &image), Err(VmError::ShortRead));
        assert_eq!(frames.free_frames(), 2);
        assert!(!space.spt().lookup(page(0)).unwrap().is_resident());
    }

    #[test]
    fn test_out_of_frames() {
        let frames = pool(1);
        let mut space = space(&frames, None);
        space.declare_zero(page(0), true).unwrap();
        space.declare_zero(page(1), true).unwrap();
        space.handle_fault(page(0), true, &NoSegments).unwrap();
        assert_eq!(space.handle_fault(page(1), true, &NoSegments), Err(VmError::OutOfFrames));
    }

    #[test]
    fn test_declare_segment_rolls_back() {
        let frames = pool(1);
        let mut space = space(&frames, None);
        assert_eq!(
            space.declare_segment(page(0), (), 0, 100, 100, false),
            Err(VmError::Page(PageError::BadSegmentLength))
        );
        assert_eq!(
            space.declare_segment(page(0), (), 0, usize::MAX, 1, false),
            Err(VmError::Page(PageError::BadSegmentLength))
        );
        assert!(space.spt().is_empty());

        space.declare_zero(page(1), true).unwrap();
        assert_eq!(
            space.declare_segment(page(0), (), 0, 3 * PAGE_SIZE, 0, false),
            Err(VmError::Spt(SptError::AlreadyPresent(page(1))))
        );
        assert_eq!(space.spt().len(), 1);
        assert!(space.spt().lookup(page(0)).is_none());
    }

    #[test]
    fn test_clean_eviction_reloads_from_backing() {
        let frames = pool(1);
        let swap = Arc::new(MemSwap::default());
        let mut space = space(&frames, Some(swap.clone()));
        let image = Image::new(PAGE_SIZE);
        space.declare_segment(page(0), (), 0, PAGE_SIZE, 0, false).unwrap();
        space.handle_fault(page(0), false, &image).unwrap();

        space.evict(page(0)).unwrap();
        assert_eq!(frames.free_frames(), 1);
        assert_eq!(swap.used_slots(), 0);
        assert!(space.pagedir().translate(page(0)).is_none());
        let desc = space.spt().lookup(page(0)).unwrap();
        assert_eq!(desc.backing().kind(), BackingKind::FileSegment);

        space.handle_fault(page(0), false, &image).unwrap();
        assert_eq!(read_page(&space, page(0)), image.bytes);
        assert_eq!(space.evict(page(1)), Err(VmError::Unmapped(page(1))));
    }

    #[test]
    fn test_dirty_eviction_round_trips_through_swap() {
        let frames = pool(1);
        let swap = Arc::new(MemSwap::default());
        let mut space = space(&frames, Some(swap.clone()));
        space.declare_zero(page(0), true).unwrap();
        space.handle_fault(page(0), true, &NoSegments).unwrap();
        space.copy_to_user(page(0).checked_add(100).unwrap(), b"dirty").unwrap();

        space.evict(page(0)).unwrap();
        assert_eq!(swap.used_slots(), 1);
        assert_eq!(space.spt().lookup(page(0)).unwrap().backing().kind(), BackingKind::Swapped);
        assert_eq!(space.evict(page(0)), Err(VmError::NotResident(page(0))));

        space.handle_fault(page(0), false, &NoSegments).unwrap();
        assert_eq!(swap.used_slots(), 0);
        assert_eq!(&read_page(&space, page(0))[100..105], b"dirty");

        // Clean, but its only copy is the frame.
        space.evict(page(0)).unwrap();
        assert_eq!(swap.used_slots(), 1);
        space.handle_fault(page(0), false, &NoSegments).unwrap();
        assert_eq!(&read_page(&space, page(0))[100..105], b"dirty");
    }

    #[test]
    fn test_dirty_eviction_needs_swap() {
        let frames = pool(1);
        let mut space = space(&frames, None);
        space.declare_zero(page(0), true).unwrap();
        space.handle_fault(page(0), true, &NoSegments).unwrap();
        space.copy_to_user(page(0), b"x").unwrap();
        assert_eq!(space.evict(page(0)), Err(VmError::NoSwap));
        assert!(space.spt().lookup(page(0)).unwrap().is_resident());
    }

    #[test]
    fn test_faults_race_eviction_and_unmap() {
        let frames = pool(2);
        let swap = Arc::new(MemSwap::default());
        let shared = spin::Mutex::new(space(&frames, Some(swap.clone())));
        {
            let mut space = shared.lock();
            space.declare_zero(page(0), true).unwrap();
            space.declare_zero(page(1), true).unwrap();
            space.handle_fault(page(0), true, &NoSegments).unwrap();
            space.copy_to_user(page(0).checked_add(100).unwrap(), b"keep").unwrap();
        }

        std::thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..500 {
                    let mut space = shared.lock();
                    space.handle_fault(page(0), true, &NoSegments).unwrap();
                    assert_eq!(&read_page(&space, page(0))[100..104], b"keep");
                    match space.handle_fault(page(1), false, &NoSegments) {
                        Ok(()) | Err(VmError::Unmapped(_)) => {}
                        Err(e) => panic!("fault on page 1: {:?}", e),
                    }
                }
            });
            s.spawn(|| {
                for i in 0..500 {
                    let mut space = shared.lock();
                    match space.evict(page(0)) {
                        Ok(()) | Err(VmError::NotResident(_)) => {}
                        Err(e) => panic!("evict: {:?}", e),
                    }
                    if i == 250 {
                        space.unmap(page(1)).unwrap();
                    }
                }
            });
        });

        let mut space = shared.lock();
        space.handle_fault(page(0), false, &NoSegments).unwrap();
        assert_eq!(&read_page(&space, page(0))[100..104], b"keep");
        assert!(space.spt().lookup(page(1)).is_none());
        assert_eq!(space.spt().len(), 1);
        assert_eq!(frames.free_frames(), 1);
        assert_eq!(swap.used_slots(), 0);
    }

    #[test]
    fn test_unmap_releases_frame_and_slot() {
        let frames = pool(2);
        let swap = Arc::new(MemSwap::default());
        let mut space = space(&frames, Some(swap.clone()));
        space.declare_zero(page(0), true).unwrap();
        space.declare_zero(page(1), true).unwrap();
        space.handle_fault(page(0), true, &NoSegments).unwrap();
        space.handle_fault(page(1), true, &NoSegments).unwrap();
        space.copy_to_user(page(1), b"x").unwrap();
        space.evict(page(1)).unwrap();

        space.unmap(page(0)).unwrap();
        space.unmap(page(1)).unwrap();
        assert_eq!(frames.free_frames(), 2);
        assert_eq!(swap.used_slots(), 0);
        assert!(space.pagedir().translate(page(0)).is_none());
        assert_eq!(space.unmap(page(0)), Err(VmError::Spt(SptError::NotPresent(page(0)))));
    }

    #[test]
    fn test_destroy_releases_everything() {
        let frames = pool(4);
        let swap = Arc::new(MemSwap::default());
        let mut space = space(&frames, Some(swap.clone()));
        for n in 0..3 {
            space.declare_zero(page(n), true).unwrap();
            space.handle_fault(page(n), true, &NoSegments).unwrap();
        }
        space.declare_zero(page(3), true).unwrap();
        space.copy_to_user(page(2), b"x").unwrap();
        space.evict(page(2)).unwrap();

        assert_eq!(space.destroy(), 2);
        assert_eq!(frames.free_frames(), 4);
        assert_eq!(swap.used_slots(), 0);
        assert!(space.spt().is_empty());
        assert_eq!(space.pagedir().mapped_pages(), 0);
        for n in 0..4 {
            assert!(space.spt().lookup(page(n)).is_none());
        }
    }

    #[test]
    fn test_segments_read_through_file_system_lock() {
        let image: Vec<u8> = (0..PAGE_SIZE as u32).map(|i| (i % 7) as u8).collect();
        let io = FileSystemLock::new(
            RamFs::new().with_file("prog", &image),
            Box::new(ScriptedConsole::new(b"")),
        );
        let file = io.lock().fs.open("prog").unwrap();
        let file = Arc::new(Mutex::new(file));

        let frames = pool(1);
        let mut space: AddressSpace<SegmentRef<RamFs>> = AddressSpace::new(TOP, frames.clone(), None);
        space
            .declare_segment(page(0), Arc::downgrade(&file), 0, PAGE_SIZE, 0, false)
            .unwrap();
        space.handle_fault(page(0), false, &io).unwrap();
        let mut buf = vec![0u8; PAGE_SIZE];
        space.copy_from_user(page(0), &mut buf).unwrap();
        assert_eq!(buf, image);

        // Once the loader lets go of the file the segment cannot be read.
        space.evict(page(0)).unwrap();
        drop(file);
        assert_eq!(space.handle_fault(page(0), false, &io), Err(VmError::SegmentClosed));
    }
}
