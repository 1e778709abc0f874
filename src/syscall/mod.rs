//! System Call Interface
//!
//! The trust boundary between user mode and the kernel.
//!
//! # Architecture
//! ```text
//! trap ─► dispatch ─► read number + argument words (validated)
//!                  ─► handler ─► validate pointers, copy in
//!                             ─► FileSystemLock ─► file system / console
//!                             ─► copy out
//!                  ─► eax, or terminate(-1) on a violation
//! ```
//!
//! # Security Model
//! - User pointers are never dereferenced directly; all data crosses via
//!   the validated copy routines in [`validate`]
//! - Handles index only the calling process's own descriptor table
//! - A violation ends the process; a benign failure returns a sentinel

pub mod error;
pub mod file;
pub mod handler;
pub mod numbers;
pub mod process;
pub mod validate;


pub use error::{SyscallError, SyscallResult, Violation, KILLED_STATUS};
pub use handler::{dispatch, Disposition, SyscallContext, TrapFrame};
pub use numbers::Syscall;
pub use process::ProcessControl;
