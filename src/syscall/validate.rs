//! System Call Input Validation
//!
//! Decides whether a user address may be dereferenced, and copies data
//! across the boundary only after it has been.
//!
//! # Security Principles
//! - Validate ALL inputs before use
//! - Fail-secure: deny by default
//! - Prevent common vulnerabilities:
//!   - Null pointer dereference (explicit checks)
//!   - Kernel memory disclosure (user/kernel split checked per address)
//!   - Strings that start valid and run into unmapped memory (every
//!     byte's page is checked before that byte is read)
//!   - TOCTOU races (data is copied into kernel buffers once validated)

use alloc::string::String;
use alloc::vec::Vec;

use super::error::Violation;
use crate::mm::address::{pages_spanning, VirtAddr};
use crate::mm::paging::PageFlags;
use crate::vm::{AddressSpace, VmError};

/// Size of one argument word on the user stack.
pub const WORD_SIZE: usize = 4;

/// Check a single address: non-null, in user space, and mapped.
pub fn check_address<S>(va: VirtAddr, space: &AddressSpace<S>) -> Result<(), Violation> {
    if va.is_null() {
        return Err(Violation::NullPointer);
    }
    if !va.is_user(space.pagedir().user_top()) {
        return Err(Violation::KernelAddress(va));
    }
    if space.pagedir().translate(va).is_none() {
        return Err(Violation::Unmapped(va));
    }
    Ok(())
}

/// Whether `va` may be dereferenced in `space`.
pub fn is_safe<S>(va: VirtAddr, space: &AddressSpace<S>) -> bool {
    check_address(va, space).is_ok()
}

/// Whether a NUL-terminated string starting at `va` lies entirely in
/// mapped user memory.
pub fn is_safe_string<S>(va: VirtAddr, space: &AddressSpace<S>) -> bool {
    walk_string(va, space, |_| ()).is_ok()
}

/// Walk a NUL-terminated user string, validating the page of each byte
/// before reading it. `visit` sees every byte before the terminator.
fn walk_string<S>(va: VirtAddr, space: &AddressSpace<S>, mut visit: impl FnMut(u8)) -> Result<(), Violation> {
    let mut at = va;
    // Page most recently validated; bytes on it need no further check.
    let mut checked_page = None;
    loop {
        if checked_page != Some(at.page_base()) {
            check_address(at, space)?;
            checked_page = Some(at.page_base());
        }
        let mut byte = [0u8; 1];
        space.copy_from_user(at, &mut byte).map_err(|_| Violation::Unmapped(at))?;
        if byte[0] == 0 {
            return Ok(());
        }
        visit(byte[0]);
        at = at.checked_add(1).ok_or(Violation::KernelAddress(at))?;
    }
}

/// A user range whose every page has been validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserBuffer {
    va: VirtAddr,
    len: usize,
}

impl UserBuffer {
    #[inline]
    pub fn addr(&self) -> VirtAddr {
        self.va
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Validate a user-space buffer the kernel will read from.
///
/// # Security Checks
/// 1. Start is non-null and in user space
/// 2. The range does not wrap
/// 3. Every page the range touches is mapped
///
/// An empty buffer is valid wherever it points.
pub fn validate_user_read<S>(va: VirtAddr, len: usize, space: &AddressSpace<S>) -> Result<UserBuffer, Violation> {
    if len == 0 {
        return Ok(UserBuffer { va, len });
    }
    let pages = pages_spanning(va, len).ok_or(Violation::KernelAddress(va))?;
    // The first byte is checked exactly, the rest page by page.
    check_address(va, space)?;
    for page in pages.skip(1) {
        check_address(page, space)?;
    }
    Ok(UserBuffer { va, len })
}

/// Validate a user-space buffer the kernel will write into.
///
/// Same as read validation, plus every page must be writable.
pub fn validate_user_write<S>(va: VirtAddr, len: usize, space: &AddressSpace<S>) -> Result<UserBuffer, Violation> {
    let buf = validate_user_read(va, len, space)?;
    if let Some(pages) = pages_spanning(va, len) {
        for page in pages {
            let writable = space
                .pagedir()
                .entry(page)
                .is_some_and(|e| e.flags().contains(PageFlags::WRITABLE));
            if !writable {
                return Err(Violation::ReadOnly(page.max(va)));
            }
        }
    }
    Ok(buf)
}

/// Read one argument word from user memory.
pub fn read_word<S>(va: VirtAddr, space: &AddressSpace<S>) -> Result<u32, Violation> {
    let buf = validate_user_read(va, WORD_SIZE, space)?;
    let mut bytes = [0u8; WORD_SIZE];
    space
        .copy_from_user(buf.addr(), &mut bytes)
        .map_err(|_| Violation::Unmapped(va))?;
    Ok(u32::from_le_bytes(bytes))
}

/// Copy a validated buffer into the kernel.
pub fn copy_in<S>(buf: UserBuffer, space: &AddressSpace<S>) -> Result<Vec<u8>, Violation> {
    let mut data = alloc::vec![0u8; buf.len()];
    space
        .copy_from_user(buf.addr(), &mut data)
        .map_err(|_| Violation::Unmapped(buf.addr()))?;
    Ok(data)
}

/// Copy kernel bytes out to a validated buffer.
pub fn copy_out<S>(buf: UserBuffer, data: &[u8], space: &mut AddressSpace<S>) -> Result<(), Violation> {
    debug_assert!(data.len() <= buf.len());
    space.copy_to_user(buf.addr(), data).map_err(|e| match e {
        VmError::WriteToReadOnly(va) => Violation::ReadOnly(va),
        _ => Violation::Unmapped(buf.addr()),
    })
}

/// Copy a NUL-terminated user string into the kernel.
///
/// The whole string is validated up to its terminator. Returns `None`
/// (a benign failure) if it is longer than `limit` bytes or not UTF-8.
pub fn copy_in_string<S>(va: VirtAddr, space: &AddressSpace<S>, limit: usize) -> Result<Option<String>, Violation> {
    let mut bytes = Vec::new();
    let mut overlong = false;
    walk_string(va, space, |b| {
        if bytes.len() < limit {
            bytes.push(b);
        } else {
            overlong = true;
        }
    })?;
    if overlong {
        return Ok(None);
    }
    Ok(String::from_utf8(bytes).ok())
}
