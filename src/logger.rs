//! Kernel Logger
//!
//! Implements the `log::Log` trait to route records to a console sink.
//! The compile-time ceiling is chosen with the `log_trace`, `log_info`
//! and `no_logs` features; the runtime level is set by [`init`].

use alloc::boxed::Box;
use core::fmt;

use log::{LevelFilter, Metadata, Record};
use spin::Mutex;

use crate::console::{Console, ConsoleWriter};

/// Console the logger writes to. Empty until [`init`] runs.
static SINK: Mutex<Option<Box<dyn Console>>> = Mutex::new(None);

static LOGGER: KernelLogger = KernelLogger;

struct KernelLogger;

impl log::Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut sink = SINK.lock();
        if let Some(console) = sink.as_mut() {
            use core::fmt::Write;
            let mut writer = ConsoleWriter::new(console.as_mut());
            let _ = writeln!(writer, "[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Error returned when the logger cannot be installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerError {
    /// Some logger (ours or another) is already registered.
    AlreadyInitialized,
}

impl fmt::Display for LoggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInitialized => write!(f, "logger already initialized"),
        }
    }
}

/// Install the kernel logger.
///
/// # Arguments
/// * `sink` - Console that receives `[LEVEL] message` lines
/// * `max_level` - Runtime level filter
pub fn init(sink: Box<dyn Console>, max_level: LevelFilter) -> Result<(), LoggerError> {
    log::set_logger(&LOGGER).map_err(|_| LoggerError::AlreadyInitialized)?;
    *SINK.lock() = Some(sink);
    log::set_max_level(max_level);
    log::info!("logger initialized with level {}", max_level);
    Ok(())
}
