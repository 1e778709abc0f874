//! System Call Errors
//!
//! Two disjoint classes:
//! - [`Violation`]: the request cannot be trusted. The caller is
//!   terminated with status -1 and never sees a return value.
//! - [`SyscallError`]: the request was well-formed but failed. The caller
//!   gets the syscall's failure sentinel (-1 or false) and keeps running.

use core::fmt;

use crate::mm::address::VirtAddr;

/// Exit status recorded for a process killed by a trust violation.
pub const KILLED_STATUS: i32 = -1;

/// A trust violation detected while decoding or validating a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// A pointer argument was null.
    NullPointer,
    /// An address lies outside the user portion of the address space.
    KernelAddress(VirtAddr),
    /// A user address has no frame behind it.
    Unmapped(VirtAddr),
    /// A buffer the kernel must fill is mapped read-only.
    ReadOnly(VirtAddr),
    /// The syscall number is not one we implement.
    BadSyscall(u32),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NullPointer => write!(f, "null pointer"),
            Self::KernelAddress(va) => write!(f, "kernel address {}", va),
            Self::Unmapped(va) => write!(f, "unmapped address {}", va),
            Self::ReadOnly(va) => write!(f, "read-only buffer at {}", va),
            Self::BadSyscall(nr) => write!(f, "unknown syscall {}", nr),
        }
    }
}

/// A benign failure reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    /// The handle is not open in the caller's table.
    BadHandle,
    /// No file by that name.
    NotFound,
    /// Empty, overlong or non-UTF-8 file name.
    InvalidName,
    /// `create` on a name the caller has open.
    AlreadyOpen,
    /// The file system refused the operation.
    Refused,
    /// No free descriptor slot.
    TableFull,
}

impl fmt::Display for SyscallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadHandle => write!(f, "bad file handle"),
            Self::NotFound => write!(f, "file not found"),
            Self::InvalidName => write!(f, "invalid file name"),
            Self::AlreadyOpen => write!(f, "file is open"),
            Self::Refused => write!(f, "file system refused the request"),
            Self::TableFull => write!(f, "descriptor table full"),
        }
    }
}

/// Outcome of a handler: a value for the caller, a benign failure, or a
/// violation that ends the process.
pub type SyscallResult<T> = Result<Result<T, SyscallError>, Violation>;
