//! Host-side test doubles and a small kernel harness.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use hashbrown::HashMap;
use spin::Mutex;

use crate::config::{BoundaryConfig, DEFAULT_USER_TOP};
use crate::console::Console;
use crate::fs::{FileSystemLock, RamFs};
use crate::mm::address::{PhysAddr, VirtAddr, PAGE_SIZE};
use crate::mm::frame::{FrameAllocator, FramePool, PhysFrame};
use crate::process::{Pid, Process};
use crate::syscall::{dispatch, Disposition, ProcessControl, SyscallContext, TrapFrame};
use crate::vm::{AddressSpace, SegmentReader, SwapDevice, SwapSlot, VmError};

pub const TOP: usize = DEFAULT_USER_TOP;
pub const FRAME_BASE: usize = 0x0010_0000;

/// Console fed from a script, capturing everything written to it.
#[derive(Clone)]
pub struct ScriptedConsole {
    input: Arc<Mutex<VecDeque<u8>>>,
    output: Arc<Mutex<Vec<u8>>>,
    writes: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedConsole {
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: Arc::new(Mutex::new(input.iter().copied().collect())),
            output: Arc::new(Mutex::new(Vec::new())),
            writes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output.lock()).into_owned()
    }

    /// Length of every `putbuf` call, in order.
    pub fn write_sizes(&self) -> Vec<usize> {
        self.writes.lock().clone()
    }

    pub fn remaining_input(&self) -> usize {
        self.input.lock().len()
    }
}

impl Console for ScriptedConsole {
    fn getc(&mut self) -> u8 {
        self.input.lock().pop_front().unwrap_or(0)
    }

    fn putbuf(&mut self, bytes: &[u8]) {
        self.output.lock().extend_from_slice(bytes);
        self.writes.lock().push(bytes.len());
    }
}

/// Reader for address spaces that declare no file segments.
pub struct NoSegments;

impl<S> SegmentReader<S> for NoSegments {
    fn read_segment(&self, _file: &S, _offset: u64, _buf: &mut [u8]) -> Result<usize, VmError> {
        Err(VmError::SegmentClosed)
    }
}

/// Frame allocator that records every read the kernel makes.
pub struct RecordingFrames {
    pool: FramePool,
    reads: Mutex<Vec<(PhysAddr, usize, usize)>>,
}

impl RecordingFrames {
    pub fn new(frames: usize) -> Self {
        Self {
            pool: FramePool::new(PhysAddr::new(FRAME_BASE), frames),
            reads: Mutex::new(Vec::new()),
        }
    }

    pub fn free_frames(&self) -> usize {
        self.pool.free_frames()
    }

    /// `(frame, offset, len)` of every read so far.
    pub fn reads(&self) -> Vec<(PhysAddr, usize, usize)> {
        self.reads.lock().clone()
    }

    pub fn clear_reads(&self) {
        self.reads.lock().clear();
    }
}

impl FrameAllocator for RecordingFrames {
    fn allocate(&self) -> Option<PhysAddr> {
        self.pool.allocate()
    }

    fn deallocate(&self, frame: PhysAddr) {
        self.pool.deallocate(frame)
    }

    fn write(&self, frame: PhysAddr, offset: usize, src: &[u8]) {
        self.pool.write(frame, offset, src)
    }

    fn read(&self, frame: PhysAddr, offset: usize, dst: &mut [u8]) {
        self.reads.lock().push((frame, offset, dst.len()));
        self.pool.read(frame, offset, dst)
    }

    fn zero(&self, frame: PhysAddr, offset: usize, len: usize) {
        self.pool.zero(frame, offset, len)
    }
}

/// Swap device backed by host memory.
#[derive(Default)]
pub struct MemSwap {
    slots: Mutex<Vec<Option<Vec<u8>>>>,
}

impl MemSwap {
    pub fn used_slots(&self) -> usize {
        self.slots.lock().iter().flatten().count()
    }
}

impl SwapDevice for MemSwap {
    fn swap_out(&self, frame: &PhysFrame) -> Option<SwapSlot> {
        let mut page = vec![0u8; PAGE_SIZE];
        frame.read(0, &mut page);
        let mut slots = self.slots.lock();
        let index = match slots.iter().position(Option::is_none) {
            Some(free) => free,
            None => {
                slots.push(None);
                slots.len() - 1
            }
        };
        slots[index] = Some(page);
        Some(SwapSlot(index))
    }

    fn swap_in(&self, slot: SwapSlot, frame: &PhysFrame) {
        if let Some(page) = self.slots.lock().get_mut(slot.0).and_then(Option::take) {
            frame.write(0, &page);
        }
    }

    fn release(&self, slot: SwapSlot) {
        if let Some(entry) = self.slots.lock().get_mut(slot.0) {
            *entry = None;
        }
    }
}

/// Scheduler stand-in: "loads" any command line except those naming a
/// missing program, and reports canned exit statuses.
#[derive(Default)]
pub struct StubControl {
    started: Mutex<Vec<String>>,
    statuses: Mutex<HashMap<u32, i32>>,
}

impl StubControl {
    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    pub fn set_status(&self, pid: u32, status: i32) {
        self.statuses.lock().insert(pid, status);
    }
}

impl ProcessControl for StubControl {
    fn execute(&self, cmdline: &str) -> Option<Pid> {
        if cmdline.starts_with("no-such-program") {
            return None;
        }
        let mut started = self.started.lock();
        started.push(String::from(cmdline));
        Some(Pid(100 + started.len() as u32))
    }

    fn wait(&self, child: Pid) -> i32 {
        self.statuses.lock().remove(&child.0).unwrap_or(-1)
    }
}

/// Address space with each `(page, writable)` declared zero-filled and
/// faulted in.
pub fn space_with_pages(pages: &[(usize, bool)]) -> AddressSpace<()> {
    let frames: Arc<dyn FrameAllocator> = Arc::new(FramePool::new(PhysAddr::new(FRAME_BASE), 16));
    let mut space = AddressSpace::new(TOP, frames, None);
    for &(page, writable) in pages {
        let page = VirtAddr::new(page);
        space.declare_zero(page, writable).unwrap();
        space.handle_fault(page, false, &NoSegments).unwrap();
    }
    space
}

/// First of two writable data pages; the page after them is unmapped.
pub const DATA_PAGE: usize = 0x0804_8000;
/// Top page of the user stack.
pub const STACK_PAGE: usize = TOP - PAGE_SIZE;
/// Unmapped page following the data pages.
pub const HOLE_PAGE: usize = DATA_PAGE + 2 * PAGE_SIZE;

/// A process on a `RamFs`, with a stack, two data pages, a scripted
/// console and a stub scheduler.
pub struct Kernel {
    pub io: FileSystemLock<RamFs>,
    pub console: ScriptedConsole,
    pub control: StubControl,
    pub frames: Arc<RecordingFrames>,
    pub swap: Arc<MemSwap>,
    pub process: Process<RamFs>,
    next_data: usize,
}

impl Kernel {
    pub fn new(cmdline: &str, fs: RamFs) -> Self {
        Self::with_config(cmdline, fs, BoundaryConfig::default(), b"")
    }

    pub fn with_config(cmdline: &str, fs: RamFs, config: BoundaryConfig, input: &[u8]) -> Self {
        let console = ScriptedConsole::new(input);
        let frames = Arc::new(RecordingFrames::new(32));
        let swap = Arc::new(MemSwap::default());
        let process = Process::new(Pid(7), cmdline, config, frames.clone(), Some(swap.clone() as Arc<dyn SwapDevice>));
        {
            let mut space = process.address_space();
            for page in [STACK_PAGE, DATA_PAGE, DATA_PAGE + PAGE_SIZE] {
                let page = VirtAddr::new(page);
                space.declare_zero(page, true).unwrap();
                space.handle_fault(page, true, &NoSegments).unwrap();
            }
        }
        Self {
            io: FileSystemLock::new(fs, Box::new(console.clone())),
            console,
            control: StubControl::default(),
            frames,
            swap,
            process,
            next_data: DATA_PAGE,
        }
    }

    /// Add a read-only zero page at `page`.
    pub fn map_read_only(&self, page: usize) {
        let mut space = self.process.address_space();
        space.declare_zero(VirtAddr::new(page), false).unwrap();
        space.handle_fault(VirtAddr::new(page), false, &NoSegments).unwrap();
    }

    /// Write raw bytes at a user address.
    pub fn poke(&self, addr: usize, bytes: &[u8]) {
        self.process
            .address_space()
            .copy_to_user(VirtAddr::new(addr), bytes)
            .unwrap();
    }

    /// Read raw bytes from a user address.
    pub fn peek(&self, addr: usize, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        self.process
            .address_space()
            .copy_from_user(VirtAddr::new(addr), &mut buf)
            .unwrap();
        buf
    }

    /// Reserve `len` bytes of data memory.
    pub fn alloc(&mut self, len: usize) -> u32 {
        let at = self.next_data;
        self.next_data += len;
        assert!(self.next_data <= HOLE_PAGE, "harness data pages exhausted");
        at as u32
    }

    /// Store a NUL-terminated string in data memory.
    pub fn string(&mut self, s: &str) -> u32 {
        let at = self.alloc(s.len() + 1);
        self.poke(at as usize, s.as_bytes());
        self.poke(at as usize + s.len(), &[0]);
        at
    }

    /// Store raw bytes in data memory.
    pub fn bytes(&mut self, data: &[u8]) -> u32 {
        let at = self.alloc(data.len());
        self.poke(at as usize, data);
        at
    }

    /// Push the syscall number and arguments on the stack and trap.
    pub fn syscall(&self, nr: u32, args: &[u32]) -> (Disposition, i32) {
        let esp = STACK_PAGE + PAGE_SIZE - 64;
        self.poke(esp, &nr.to_le_bytes());
        for (i, arg) in args.iter().enumerate() {
            self.poke(esp + 4 * (i + 1), &arg.to_le_bytes());
        }
        self.trap(esp)
    }

    /// Trap with an arbitrary stack pointer.
    pub fn trap(&self, esp: usize) -> (Disposition, i32) {
        let ctx = SyscallContext {
            process: &self.process,
            io: &self.io,
            control: &self.control,
        };
        let mut frame = TrapFrame { esp, eax: 0xdead_beef };
        let disposition = dispatch(&mut frame, &ctx);
        (disposition, frame.eax as i32)
    }

    /// Value a syscall returned; panics if it did not return normally.
    pub fn call(&self, nr: u32, args: &[u32]) -> i32 {
        match self.syscall(nr, args) {
            (Disposition::Return, eax) => eax,
            (other, _) => panic!("syscall {} did not return: {:?}", nr, other),
        }
    }
}
