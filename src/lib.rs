//! Sysgate - PantherOS User/Kernel Trust Boundary
//!
//! The privileged layer every user-mode request passes through.
//!
//! # Subsystems
//! - Syscall boundary: trap-frame decoding, pointer and string validation,
//!   per-process file descriptor tables behind one shared file-system lock
//! - Supplemental page table: per-process record of what every declared
//!   virtual page means, used by the page-fault path for demand paging
//!
//! # Security Model
//! - Untrusted integers never index kernel memory directly
//! - Every user address is validated page-by-page before it is read
//! - A trust violation terminates the offending process with status -1
//! - All file-system state is reached through an explicit lock guard
//!
//! # Collaborators
//! The file system, console, frame allocator, swap device and process
//! control are traits; this crate never reaches for an ambient
//! "current process" and takes every piece of state as an argument.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod config;
pub mod console;
pub mod fs;
pub mod logger;
pub mod mm;
pub mod process;
pub mod syscall;
pub mod vm;

#[cfg(test)]
mod testing;

pub use config::BoundaryConfig;
pub use fs::{FileSystem, FileSystemLock, IoContext};
pub use process::{Pid, Process};
pub use syscall::{dispatch, Disposition, SyscallContext, TrapFrame};
