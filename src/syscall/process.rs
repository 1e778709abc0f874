//! Process System Calls
//!
//! halt, exit, exec and wait. Creating and scheduling processes is the
//! job of a [`ProcessControl`] supplied by the kernel.

use crate::config::MAX_CMDLINE_LEN;
use crate::fs::FileSystem;
use crate::mm::address::VirtAddr;
use crate::process::{program_name, Pid};

use super::error::{SyscallError, SyscallResult};
use super::handler::{Outcome, SyscallContext};
use super::validate;

/// Process creation and reaping, provided by the scheduler.
pub trait ProcessControl {
    /// Start a process running `cmdline`. Returns its pid once the
    /// executable has loaded, or `None` if loading failed.
    fn execute(&self, cmdline: &str) -> Option<Pid>;

    /// Wait for a child of the caller to exit and return its status.
    /// Returns -1 for a pid that is not an unwaited child.
    fn wait(&self, child: Pid) -> i32;
}

/// Power the machine off. Never returns to the caller.
pub(super) fn halt<F: FileSystem>(ctx: &SyscallContext<'_, F>) -> Outcome {
    log::info!("syscall: halt requested by {} ({})", ctx.process.pid(), ctx.process.name());
    Outcome::Halt
}

/// Terminate the caller with `status`.
pub(super) fn exit<F: FileSystem>(ctx: &SyscallContext<'_, F>, status: i32) -> Outcome {
    Outcome::Exit(ctx.process.terminate(ctx.io, status))
}

/// Start a child process from a command line in user memory.
pub fn exec<F: FileSystem>(ctx: &SyscallContext<'_, F>, cmdline: VirtAddr) -> SyscallResult<Pid> {
    let cmdline = validate::copy_in_string(cmdline, &ctx.process.address_space(), MAX_CMDLINE_LEN)?;
    let Some(cmdline) = cmdline.filter(|c| !program_name(c).is_empty()) else {
        return Ok(Err(SyscallError::InvalidName));
    };
    match ctx.control.execute(&cmdline) {
        Some(pid) => {
            log::debug!("syscall: {} started {} ({:?})", ctx.process.pid(), pid, cmdline);
            Ok(Ok(pid))
        }
        None => Ok(Err(SyscallError::Refused)),
    }
}

/// Wait for a child. Negative pids are never children.
pub fn wait<F: FileSystem>(ctx: &SyscallContext<'_, F>, child: i32) -> i32 {
    match u32::try_from(child) {
        Ok(pid) => ctx.control.wait(Pid(pid)),
        Err(_) => -1,
    }
}
