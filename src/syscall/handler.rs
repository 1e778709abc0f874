//! System Call Handler
//!
//! Decodes a trap frame and routes the request to its handler.
//!
//! # Security Considerations
//! - The number and every argument word are read only after their
//!   addresses validate
//! - Unknown syscall numbers terminate the caller
//! - Pointer arguments are validated again by the handler that uses them
//! - Every case is isolated; no handler falls through into another

use crate::fs::{FileSystem, FileSystemLock};
use crate::mm::address::VirtAddr;
use crate::process::Process;

use super::error::{SyscallError, Violation, KILLED_STATUS};
use super::numbers::Syscall;
use super::process::ProcessControl;
use super::validate::{self, WORD_SIZE};
use super::{file, process};

/// Maximum number of argument words any syscall takes.
const MAX_ARGS: usize = 3;

/// Saved user state at the moment of the trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrapFrame {
    /// User stack pointer: the syscall number, followed by its arguments.
    pub esp: usize,
    /// Return-value slot.
    pub eax: u32,
}

/// Everything a handler may touch, passed explicitly.
pub struct SyscallContext<'a, F: FileSystem> {
    /// The calling process.
    pub process: &'a Process<F>,
    /// The system-wide file-system and console lock.
    pub io: &'a FileSystemLock<F>,
    /// Process creation and waiting.
    pub control: &'a dyn ProcessControl,
}

/// What the trap exit path must do after a syscall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Resume the caller; `eax` holds the result.
    Return,
    /// The caller has terminated with this status.
    Exit(i32),
    /// Power the machine off.
    Halt,
}

/// Result of a handler once benign failures are mapped to sentinels.
pub(super) enum Outcome {
    /// Store in `eax` and resume.
    Value(i32),
    /// Resume without touching `eax`.
    Void,
    Exit(i32),
    Halt,
}

/// Map a benign failure to its `-1` sentinel.
pub(super) fn or_minus_one<T: Into<i32>>(result: Result<T, SyscallError>) -> Outcome {
    Outcome::Value(result.map_or(-1, Into::into))
}

/// Map a boolean result to 1/0.
pub(super) fn as_bool(result: Result<(), SyscallError>) -> Outcome {
    Outcome::Value(i32::from(result.is_ok()))
}

/// Dispatch a system call
///
/// # Arguments
/// * `frame` - Trap frame of the calling thread
/// * `ctx` - The calling process and its collaborators
///
/// # Returns
/// What the trap exit path must do. On [`Disposition::Return`] the result
/// has been written to `frame.eax`.
///
/// # Security
/// Any [`Violation`] terminates the process with status -1 before the
/// caller could observe a partial result.
pub fn dispatch<F: FileSystem>(frame: &mut TrapFrame, ctx: &SyscallContext<'_, F>) -> Disposition {
    match decode_and_run(frame.esp, ctx) {
        Ok(Outcome::Value(value)) => {
            frame.eax = value as u32;
            Disposition::Return
        }
        Ok(Outcome::Void) => Disposition::Return,
        Ok(Outcome::Exit(status)) => Disposition::Exit(status),
        Ok(Outcome::Halt) => Disposition::Halt,
        Err(violation) => {
            log::warn!(
                "syscall: killing {} ({}): {}",
                ctx.process.pid(),
                ctx.process.name(),
                violation
            );
            Disposition::Exit(ctx.process.terminate(ctx.io, KILLED_STATUS))
        }
    }
}

/// Decoding state: read the number and argument words, then execute.
fn decode_and_run<F: FileSystem>(esp: usize, ctx: &SyscallContext<'_, F>) -> Result<Outcome, Violation> {
    let (call, args) = {
        let space = ctx.process.address_space();
        let nr = validate::read_word(VirtAddr::new(esp), &space)?;
        let call = Syscall::try_from(nr)?;
        let mut args = [0u32; MAX_ARGS];
        for (i, arg) in args.iter_mut().enumerate().take(call.arg_count()) {
            let at = WORD_SIZE
                .checked_mul(i + 1)
                .and_then(|off| esp.checked_add(off))
                .ok_or(Violation::KernelAddress(VirtAddr::new(esp)))?;
            *arg = validate::read_word(VirtAddr::new(at), &space)?;
        }
        (call, args)
    };
    log::trace!("syscall: {} {:?} {:?}", ctx.process.pid(), call, &args[..call.arg_count()]);

    let ptr = |word: u32| VirtAddr::new(word as usize);
    let outcome = match call {
        Syscall::Halt => process::halt(ctx),
        Syscall::Exit => process::exit(ctx, args[0] as i32),
        Syscall::Exec => or_minus_one(process::exec(ctx, ptr(args[0]))?.map(|pid| pid.0 as i32)),
        Syscall::Wait => Outcome::Value(process::wait(ctx, args[0] as i32)),
        Syscall::Create => as_bool(file::create(ctx, ptr(args[0]), args[1])?),
        Syscall::Remove => as_bool(file::remove(ctx, ptr(args[0]))?),
        Syscall::Open => or_minus_one(file::open(ctx, ptr(args[0]))?),
        Syscall::Filesize => or_minus_one(file::filesize(ctx, args[0] as i32)?.map(|n| n as i32)),
        Syscall::Read => or_minus_one(file::read(ctx, args[0] as i32, ptr(args[1]), args[2] as usize)?),
        Syscall::Write => or_minus_one(file::write(ctx, args[0] as i32, ptr(args[1]), args[2] as usize)?),
        Syscall::Seek => {
            // void: an unknown handle is a no-op
            let _ = file::seek(ctx, args[0] as i32, args[1])?;
            Outcome::Void
        }
        Syscall::Tell => or_minus_one(file::tell(ctx, args[0] as i32)?.map(|n| n as i32)),
        Syscall::Close => {
            let _ = file::close(ctx, args[0] as i32)?;
            Outcome::Void
        }
    };
    Ok(outcome)
}
