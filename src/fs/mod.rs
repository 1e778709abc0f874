//! File-System Collaborator Interface
//!
//! The syscall layer never touches on-disk structures; it talks to a
//! [`FileSystem`] through one shared lock.
//!
//! # Locking Model
//! - One [`FileSystemLock`] guards the file system *and* the console for
//!   every process in the system
//! - Every file-system and console operation takes `&mut self`, so it can
//!   only be reached through the lock guard
//! - Open-file objects live in per-process descriptor tables, outside the
//!   lock, but every operation on one needs the guarded file system

use alloc::boxed::Box;
use spin::{Mutex, MutexGuard};

use crate::console::Console;

pub mod ramfs;

pub use ramfs::{RamFile, RamFs};

/// Operations the boundary layer needs from a file system.
///
/// `Self::File` is an opaque open-file object. The descriptor table owns
/// it; [`FileSystem::close`] is the only way to give it back.
pub trait FileSystem: Send {
    type File: Send;

    /// Open an existing file by name.
    fn open(&mut self, name: &str) -> Option<Self::File>;

    /// Create a file of `initial_size` zero bytes. Fails if it exists.
    fn create(&mut self, name: &str, initial_size: u32) -> bool;

    /// Unlink a file by name. Open files keep working until closed.
    fn remove(&mut self, name: &str) -> bool;

    /// Read at the file's cursor, advancing it.
    fn read(&mut self, file: &mut Self::File, buf: &mut [u8]) -> usize;

    /// Read at an absolute offset without moving the cursor.
    fn read_at(&mut self, file: &mut Self::File, buf: &mut [u8], offset: u32) -> usize;

    /// Write at the file's cursor, advancing it.
    fn write(&mut self, file: &mut Self::File, buf: &[u8]) -> usize;

    /// Length of the file in bytes.
    fn length(&mut self, file: &Self::File) -> u32;

    /// Move the cursor. Positions past the end are allowed.
    fn seek(&mut self, file: &mut Self::File, position: u32);

    /// Current cursor position.
    fn tell(&mut self, file: &Self::File) -> u32;

    /// Refuse writes to the underlying file while this object is open.
    fn deny_write(&mut self, file: &mut Self::File);

    /// Undo a previous [`FileSystem::deny_write`] on this object.
    fn allow_write(&mut self, file: &mut Self::File);

    /// Release an open file.
    fn close(&mut self, file: Self::File);
}

/// Everything the shared lock protects.
pub struct IoContext<F> {
    pub fs: F,
    pub console: Box<dyn Console>,
}

/// The single system-wide lock over file-system and console state.
pub struct FileSystemLock<F> {
    inner: Mutex<IoContext<F>>,
}

impl<F: FileSystem> FileSystemLock<F> {
    pub fn new(fs: F, console: Box<dyn Console>) -> Self {
        Self {
            inner: Mutex::new(IoContext { fs, console }),
        }
    }

    /// Acquire the lock. Blocks (spins) until it is available.
    pub fn lock(&self) -> MutexGuard<'_, IoContext<F>> {
        self.inner.lock()
    }
}
