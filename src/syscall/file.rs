//! File System Calls
//!
//! create, remove, open, filesize, read, write, seek, tell, close.
//!
//! # Locking
//! User memory is copied in before the file-system lock is taken and
//! copied out after it is released. The descriptor table lock may be held
//! while taking the file-system lock, never the reverse.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::fs::FileSystem;
use crate::mm::address::VirtAddr;
use crate::process::{TableFull, STDIN_HANDLE, STDOUT_HANDLE};

use super::error::{SyscallError, SyscallResult};
use super::handler::SyscallContext;
use super::validate;

/// Byte count as the caller sees it.
fn byte_count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Copy in and check a file name argument.
///
/// A null or unterminated name is a violation; an empty, overlong or
/// non-UTF-8 one is a benign failure.
fn file_name<F: FileSystem>(ctx: &SyscallContext<'_, F>, va: VirtAddr) -> SyscallResult<String> {
    let limit = ctx.process.config().max_filename_len;
    let name = validate::copy_in_string(va, &ctx.process.address_space(), limit)?;
    Ok(match name {
        Some(name) if !name.is_empty() => Ok(name),
        _ => {
            log::debug!("syscall: {} passed an invalid file name", ctx.process.pid());
            Err(SyscallError::InvalidName)
        }
    })
}

/// Create a file of `initial_size` bytes.
///
/// Refused if the caller has a file of that name open.
pub fn create<F: FileSystem>(ctx: &SyscallContext<'_, F>, name: VirtAddr, initial_size: u32) -> SyscallResult<()> {
    let name = match file_name(ctx, name)? {
        Ok(name) => name,
        Err(e) => return Ok(Err(e)),
    };
    if ctx.process.files().is_open(&name) {
        return Ok(Err(SyscallError::AlreadyOpen));
    }
    if ctx.io.lock().fs.create(&name, initial_size) {
        Ok(Ok(()))
    } else {
        Ok(Err(SyscallError::Refused))
    }
}

/// Unlink a file. Descriptors already open on it keep working.
pub fn remove<F: FileSystem>(ctx: &SyscallContext<'_, F>, name: VirtAddr) -> SyscallResult<()> {
    let name = match file_name(ctx, name)? {
        Ok(name) => name,
        Err(e) => return Ok(Err(e)),
    };
    if ctx.io.lock().fs.remove(&name) {
        Ok(Ok(()))
    } else {
        Ok(Err(SyscallError::NotFound))
    }
}

/// Open a file and return a fresh handle.
///
/// A file named after the running program is write-protected until the
/// handle is closed.
pub fn open<F: FileSystem>(ctx: &SyscallContext<'_, F>, name: VirtAddr) -> SyscallResult<i32> {
    let name = match file_name(ctx, name)? {
        Ok(name) => name,
        Err(e) => return Ok(Err(e)),
    };
    let protect = name == ctx.process.name();

    let file = {
        let mut io = ctx.io.lock();
        let Some(mut file) = io.fs.open(&name) else {
            return Ok(Err(SyscallError::NotFound));
        };
        if protect {
            io.fs.deny_write(&mut file);
        }
        file
    };

    let inserted = ctx.process.files().insert(&name, file, protect);
    match inserted {
        Ok(handle) => {
            log::debug!("syscall: {} opened {:?} as {}", ctx.process.pid(), name, handle);
            Ok(Ok(handle))
        }
        Err(TableFull(mut file)) => {
            log::debug!("syscall: {} has no free descriptor for {:?}", ctx.process.pid(), name);
            let mut io = ctx.io.lock();
            if protect {
                io.fs.allow_write(&mut file);
            }
            io.fs.close(file);
            Ok(Err(SyscallError::TableFull))
        }
    }
}

/// Size in bytes of an open file.
pub fn filesize<F: FileSystem>(ctx: &SyscallContext<'_, F>, handle: i32) -> SyscallResult<u32> {
    let files = ctx.process.files();
    let Some(entry) = files.get(handle) else {
        return Ok(Err(SyscallError::BadHandle));
    };
    Ok(Ok(ctx.io.lock().fs.length(&entry.file)))
}

/// Read up to `size` bytes into the user buffer.
///
/// Handle 0 reads a single byte from the console regardless of `size`.
pub fn read<F: FileSystem>(ctx: &SyscallContext<'_, F>, handle: i32, buffer: VirtAddr, size: usize) -> SyscallResult<i32> {
    let buf = validate::validate_user_write(buffer, size, &ctx.process.address_space())?;
    let data = match handle {
        STDIN_HANDLE if buf.is_empty() => Vec::new(),
        STDIN_HANDLE => vec![ctx.io.lock().console.getc()],
        STDOUT_HANDLE => return Ok(Err(SyscallError::BadHandle)),
        _ => {
            let mut files = ctx.process.files();
            let Some(entry) = files.get_mut(handle) else {
                return Ok(Err(SyscallError::BadHandle));
            };
            let mut data = vec![0u8; size];
            let n = ctx.io.lock().fs.read(&mut entry.file, &mut data);
            data.truncate(n);
            data
        }
    };

    validate::copy_out(buf, &data, &mut ctx.process.address_space())?;
    Ok(Ok(byte_count(data.len())))
}

/// Write `size` bytes from the user buffer.
///
/// Handle 1 goes to the console in chunks of at most `console_chunk`.
pub fn write<F: FileSystem>(ctx: &SyscallContext<'_, F>, handle: i32, buffer: VirtAddr, size: usize) -> SyscallResult<i32> {
    let data = {
        let space = ctx.process.address_space();
        let buf = validate::validate_user_read(buffer, size, &space)?;
        validate::copy_in(buf, &space)?
    };

    match handle {
        STDOUT_HANDLE => {
            let chunk = ctx.process.config().console_chunk.max(1);
            let mut io = ctx.io.lock();
            for piece in data.chunks(chunk) {
                io.console.putbuf(piece);
            }
            Ok(Ok(byte_count(data.len())))
        }
        STDIN_HANDLE => Ok(Err(SyscallError::BadHandle)),
        _ => {
            let mut files = ctx.process.files();
            let Some(entry) = files.get_mut(handle) else {
                return Ok(Err(SyscallError::BadHandle));
            };
            let n = ctx.io.lock().fs.write(&mut entry.file, &data);
            Ok(Ok(byte_count(n)))
        }
    }
}

/// Move an open file's cursor.
pub fn seek<F: FileSystem>(ctx: &SyscallContext<'_, F>, handle: i32, position: u32) -> SyscallResult<()> {
    let mut files = ctx.process.files();
    let Some(entry) = files.get_mut(handle) else {
        return Ok(Err(SyscallError::BadHandle));
    };
    ctx.io.lock().fs.seek(&mut entry.file, position);
    Ok(Ok(()))
}

/// Cursor position of an open file.
pub fn tell<F: FileSystem>(ctx: &SyscallContext<'_, F>, handle: i32) -> SyscallResult<u32> {
    let files = ctx.process.files();
    let Some(entry) = files.get(handle) else {
        return Ok(Err(SyscallError::BadHandle));
    };
    Ok(Ok(ctx.io.lock().fs.tell(&entry.file)))
}

/// Close a handle, re-enabling writes to its file.
pub fn close<F: FileSystem>(ctx: &SyscallContext<'_, F>, handle: i32) -> SyscallResult<()> {
    let Some(mut entry) = ctx.process.files().remove(handle) else {
        return Ok(Err(SyscallError::BadHandle));
    };
    let mut io = ctx.io.lock();
    io.fs.allow_write(&mut entry.file);
    io.fs.close(entry.file);
    Ok(Ok(()))
}
