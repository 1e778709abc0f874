//! Boundary Configuration
//!
//! Address-space layout constants and the limits the syscall layer
//! enforces. Limits travel with a [`BoundaryConfig`] value handed to every
//! table and handler instead of living in globals, so one kernel image can
//! run differently-sized processes and tests can shrink the pools.

/// Lowest user-reachable address. Page 0 is never mapped for user code
/// so that null dereferences always fault.
pub const USER_BASE: usize = 0x0000_1000;

/// Default start of kernel space (everything below is user space).
pub const DEFAULT_USER_TOP: usize = 0xC000_0000;

/// Longest file name accepted by `create`, `remove` and `open`.
pub const DEFAULT_MAX_FILENAME_LEN: usize = 14;

/// Open-file slots per process.
pub const DEFAULT_MAX_OPEN_FILES: usize = 128;

/// Largest console write issued in one piece so long writes
/// do not starve other console users.
pub const DEFAULT_CONSOLE_CHUNK: usize = 256;

/// Upper bound on command lines passed to `exec`.
pub const MAX_CMDLINE_LEN: usize = 4096;

/// Per-kernel tunables for the trust boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryConfig {
    /// First address that belongs to the kernel.
    pub user_top: usize,
    /// Maximum file name length in bytes.
    pub max_filename_len: usize,
    /// Number of descriptor slots in each process's table.
    pub max_open_files: usize,
    /// Console write chunk size.
    pub console_chunk: usize,
}

impl BoundaryConfig {
    /// Configuration with the default layout.
    pub const fn new() -> Self {
        Self {
            user_top: DEFAULT_USER_TOP,
            max_filename_len: DEFAULT_MAX_FILENAME_LEN,
            max_open_files: DEFAULT_MAX_OPEN_FILES,
            console_chunk: DEFAULT_CONSOLE_CHUNK,
        }
    }

    /// Override the descriptor pool size.
    pub const fn with_max_open_files(mut self, slots: usize) -> Self {
        self.max_open_files = slots;
        self
    }
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self::new()
    }
}
