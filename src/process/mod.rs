//! Process Control Block
//!
//! The per-process state the trust boundary populates and drains. The
//! process itself is created and scheduled elsewhere; this module owns
//! its open files, its address space and its exit status.
//!
//! # Locking
//! - The descriptor table has its own lock (two threads of one process
//!   may race on `open`/`close`)
//! - The address space has its own lock, held across SPT lookup and
//!   residency changes
//! - Neither lock is ever acquired while holding the file-system lock

pub mod fd_table;

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use spin::{Mutex, MutexGuard, Once};

use crate::config::BoundaryConfig;
use crate::fs::{FileSystem, FileSystemLock};
use crate::mm::frame::FrameAllocator;
use crate::vm::{AddressSpace, SegmentRef, SwapDevice};

pub use fd_table::{FdEntry, FdTable, TableFull, FIRST_HANDLE, STDIN_HANDLE, STDOUT_HANDLE};

/// Process identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address space type used by a process on file system `F`.
pub type UserAddressSpace<F> = AddressSpace<SegmentRef<F>>;

/// Program name of a command line: its first whitespace-separated word.
pub fn program_name(cmdline: &str) -> &str {
    cmdline.split_ascii_whitespace().next().unwrap_or("")
}

/// Kernel bookkeeping for one user process.
pub struct Process<F: FileSystem> {
    pid: Pid,
    name: String,
    config: BoundaryConfig,
    files: Mutex<FdTable<F::File>>,
    address_space: Mutex<UserAddressSpace<F>>,
    executable: Mutex<Option<Arc<Mutex<F::File>>>>,
    exit_status: Once<i32>,
}

impl<F: FileSystem> Process<F> {
    /// Create the bookkeeping for a process started with `cmdline`.
    pub fn new(
        pid: Pid,
        cmdline: &str,
        config: BoundaryConfig,
        frames: Arc<dyn FrameAllocator>,
        swap: Option<Arc<dyn SwapDevice>>,
    ) -> Self {
        Self {
            pid,
            name: String::from(program_name(cmdline)),
            config,
            files: Mutex::new(FdTable::new(config.max_open_files)),
            address_space: Mutex::new(AddressSpace::new(config.user_top, frames, swap)),
            executable: Mutex::new(None),
            exit_status: Once::new(),
        }
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Program name, as printed in the exit announcement.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn config(&self) -> &BoundaryConfig {
        &self.config
    }

    /// Lock the descriptor table.
    pub fn files(&self) -> MutexGuard<'_, FdTable<F::File>> {
        self.files.lock()
    }

    /// Lock the address space.
    pub fn address_space(&self) -> MutexGuard<'_, UserAddressSpace<F>> {
        self.address_space.lock()
    }

    /// Keep the running executable open, write-protected, for the life
    /// of the process. Returns the reference its segments are declared
    /// against.
    pub fn set_executable(&self, io: &FileSystemLock<F>, mut file: F::File) -> SegmentRef<F> {
        io.lock().fs.deny_write(&mut file);
        let file = Arc::new(Mutex::new(file));
        let segment = Arc::downgrade(&file);
        if let Some(previous) = self.executable.lock().replace(file) {
            release_executable(io, previous);
        }
        segment
    }

    /// Exit status, once the process has terminated.
    pub fn exit_status(&self) -> Option<i32> {
        self.exit_status.get().copied()
    }

    pub fn has_exited(&self) -> bool {
        self.exit_status.is_completed()
    }

    /// Terminate the process with `status`.
    ///
    /// The first call records the status, prints `"<name>: exit(<status>)"`
    /// to the console, closes every open file and tears down the address
    /// space. Later calls do nothing and return the status recorded first.
    pub fn terminate(&self, io: &FileSystemLock<F>, status: i32) -> i32 {
        let mut first = false;
        let recorded = *self.exit_status.call_once(|| {
            first = true;
            status
        });
        if !first {
            return recorded;
        }

        // Descriptor table before the file-system lock.
        let entries: Vec<_> = self.files.lock().drain().collect();
        let closed = entries.len();
        {
            let mut io = io.lock();
            crate::kprintln!(io.console.as_mut(), "{}: exit({})", self.name, recorded);
            for mut entry in entries {
                if entry.denies_write() {
                    io.fs.allow_write(&mut entry.file);
                }
                io.fs.close(entry.file);
            }
        }

        // Waits out any fault still reading a segment, so the executable
        // has no other strong holder when it is released.
        let frames = self.address_space.lock().destroy();
        if let Some(exe) = self.executable.lock().take() {
            release_executable(io, exe);
        }
        log::info!(
            "process {} ({}) exited with {}: closed {} files, released {} frames",
            self.pid,
            self.name,
            recorded,
            closed,
            frames
        );
        recorded
    }
}

/// Drop the process's hold on its executable, re-enabling writes.
fn release_executable<F: FileSystem>(io: &FileSystemLock<F>, exe: Arc<Mutex<F::File>>) {
    match Arc::try_unwrap(exe) {
        Ok(file) => {
            let mut file = file.into_inner();
            let mut io = io.lock();
            io.fs.allow_write(&mut file);
            io.fs.close(file);
        }
        // A fault handler upgraded a segment reference and is mid-read.
        Err(_) => log::warn!("executable still in use at release"),
    }
}
