//! RAM File System
//!
//! Flat, in-memory [`FileSystem`] used for the boot image and tests.
//!
//! # Semantics
//! - Names are unique; `create` on an existing name fails
//! - `remove` unlinks the name; open files keep their inode until closed
//! - Writes extend the file up to the size limit and stop short there;
//!   writes to a write-denied inode write nothing

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use spin::Mutex;

use super::FileSystem;

/// Contents and bookkeeping of one file.
struct Inode {
    data: Vec<u8>,
    /// Number of open files currently denying writes.
    deny_write_count: u32,
}

/// An open file: shared inode plus a private cursor.
pub struct RamFile {
    inode: Arc<Mutex<Inode>>,
    pos: u32,
    denies_write: bool,
}

/// Default largest size a file may grow to.
pub const MAX_FILE_SIZE: usize = 8 * 1024 * 1024;

/// Flat in-memory file system.
pub struct RamFs {
    files: BTreeMap<String, Arc<Mutex<Inode>>>,
    open_files: usize,
    max_file_size: usize,
}

impl RamFs {
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
            open_files: 0,
            max_file_size: MAX_FILE_SIZE,
        }
    }

    /// Cap file growth at `limit` bytes (at most `u32::MAX`).
    pub fn with_max_file_size(mut self, limit: usize) -> Self {
        self.max_file_size = limit.min(u32::MAX as usize);
        self
    }

    /// Add a file with the given contents. An existing file is left alone.
    pub fn with_file(mut self, name: &str, contents: &[u8]) -> Self {
        if self.create(name, 0) {
            if let Some(inode) = self.files.get(name) {
                inode.lock().data.extend_from_slice(contents);
            }
        }
        self
    }

    /// Number of open files not yet closed.
    pub fn open_file_count(&self) -> usize {
        self.open_files
    }

    /// Copy of a file's contents, if it exists.
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.files.get(name).map(|inode| inode.lock().data.clone())
    }
}

impl Default for RamFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for RamFs {
    type File = RamFile;

    fn open(&mut self, name: &str) -> Option<RamFile> {
        let inode = Arc::clone(self.files.get(name)?);
        self.open_files += 1;
        Some(RamFile {
            inode,
            pos: 0,
            denies_write: false,
        })
    }

    fn create(&mut self, name: &str, initial_size: u32) -> bool {
        if name.is_empty() || self.files.contains_key(name) || initial_size as usize > self.max_file_size {
            return false;
        }
        self.files.insert(
            String::from(name),
            Arc::new(Mutex::new(Inode {
                data: vec![0; initial_size as usize],
                deny_write_count: 0,
            })),
        );
        true
    }

    fn remove(&mut self, name: &str) -> bool {
        self.files.remove(name).is_some()
    }

    fn read(&mut self, file: &mut RamFile, buf: &mut [u8]) -> usize {
        let pos = file.pos;
        let n = self.read_at(file, buf, pos);
        file.pos += n as u32;
        n
    }

    fn read_at(&mut self, file: &mut RamFile, buf: &mut [u8], offset: u32) -> usize {
        let inode = file.inode.lock();
        let start = offset as usize;
        if start >= inode.data.len() {
            return 0;
        }
        let n = buf.len().min(inode.data.len() - start);
        buf[..n].copy_from_slice(&inode.data[start..start + n]);
        n
    }

    fn write(&mut self, file: &mut RamFile, buf: &[u8]) -> usize {
        let mut inode = file.inode.lock();
        if inode.deny_write_count > 0 {
            return 0;
        }
        let start = file.pos as usize;
        if start >= self.max_file_size {
            return 0;
        }
        let n = buf.len().min(self.max_file_size - start);
        let end = start + n;
        if inode.data.len() < end {
            inode.data.resize(end, 0);
        }
        inode.data[start..end].copy_from_slice(&buf[..n]);
        file.pos = end as u32;
        n
    }

    fn length(&mut self, file: &RamFile) -> u32 {
        file.inode.lock().data.len() as u32
    }

    fn seek(&mut self, file: &mut RamFile, position: u32) {
        file.pos = position;
    }

    fn tell(&mut self, file: &RamFile) -> u32 {
        file.pos
    }

    fn deny_write(&mut self, file: &mut RamFile) {
        if !file.denies_write {
            file.denies_write = true;
            file.inode.lock().deny_write_count += 1;
        }
    }

    fn allow_write(&mut self, file: &mut RamFile) {
        if file.denies_write {
            file.denies_write = false;
            file.inode.lock().deny_write_count -= 1;
        }
    }

    fn close(&mut self, mut file: RamFile) {
        self.allow_write(&mut file);
        self.open_files -= 1;
    }
}
