//! File Descriptor Table
//!
//! Per-process mapping from small integer handles to open files.
//!
//! # Design
//! - Fixed pool of slots sized by [`crate::BoundaryConfig::max_open_files`]
//! - Handles come from a monotonically increasing counter starting at
//!   [`FIRST_HANDLE`] and are never reused, even after `close`
//! - Handles 0 and 1 are the console and never appear in the table
//! - Lookups only ever consult the calling process's own table

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// Console input.
pub const STDIN_HANDLE: i32 = 0;
/// Console output.
pub const STDOUT_HANDLE: i32 = 1;
/// First handle handed out for an opened file.
pub const FIRST_HANDLE: i32 = 2;

/// One open file owned by the table.
#[derive(Debug)]
pub struct FdEntry<T> {
    handle: i32,
    name: String,
    /// Whether this entry denied writes to its file (running executable).
    denies_write: bool,
    pub file: T,
}

impl<T> FdEntry<T> {
    /// Name the file was opened under.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn denies_write(&self) -> bool {
        self.denies_write
    }
}

/// The table had no free slot; the file is handed back to the caller.
pub struct TableFull<T>(pub T);

impl<T> fmt::Debug for TableFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableFull")
    }
}

/// Bounded table of open files for one process.
#[derive(Debug)]
pub struct FdTable<T> {
    slots: Vec<Option<FdEntry<T>>>,
    next_handle: i32,
}

impl<T> FdTable<T> {
    /// Create a table with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            next_handle: FIRST_HANDLE,
        }
    }

    /// Take ownership of an open file and give it a fresh handle.
    ///
    /// Fails, returning the file, if every slot is in use or the handle
    /// space is exhausted.
    pub fn insert(&mut self, name: &str, file: T, denies_write: bool) -> Result<i32, TableFull<T>> {
        let Some(slot) = self.slots.iter().position(Option::is_none) else {
            return Err(TableFull(file));
        };
        let Some(following) = self.next_handle.checked_add(1) else {
            return Err(TableFull(file));
        };

        let handle = self.next_handle;
        self.next_handle = following;
        self.slots[slot] = Some(FdEntry {
            handle,
            name: String::from(name),
            denies_write,
            file,
        });
        Ok(handle)
    }

    /// Look up an open file by handle.
    pub fn get(&self, handle: i32) -> Option<&FdEntry<T>> {
        self.slots.iter().flatten().find(|e| e.handle == handle)
    }

    /// Mutable variant of [`Self::get`].
    pub fn get_mut(&mut self, handle: i32) -> Option<&mut FdEntry<T>> {
        self.slots.iter_mut().flatten().find(|e| e.handle == handle)
    }

    /// Detach an entry, handing its file to the caller for release.
    pub fn remove(&mut self, handle: i32) -> Option<FdEntry<T>> {
        self.slots
            .iter_mut()
            .find(|s| s.as_ref().is_some_and(|e| e.handle == handle))
            .and_then(Option::take)
    }

    /// Check whether any entry was opened under `name`.
    pub fn is_open(&self, name: &str) -> bool {
        self.slots.iter().flatten().any(|e| e.name == name)
    }

    /// Detach every entry (process exit).
    pub fn drain(&mut self) -> impl Iterator<Item = FdEntry<T>> + '_ {
        self.slots.iter_mut().filter_map(Option::take)
    }

    /// Number of open files.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
