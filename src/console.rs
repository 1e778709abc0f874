//! Console Device Interface
//!
//! The console is the keyboard/serial input and the text output that
//! descriptors 0 and 1 are wired to. The concrete device (PL011, VGA,
//! a test script) is supplied by the platform.
//!
//! # Security Considerations
//! - Console I/O is serialized by the shared file-system lock; the only
//!   way to reach a console is through a locked [`crate::IoContext`]

use core::fmt;

/// A character device used for standard input and output.
pub trait Console: Send {
    /// Block until one input byte is available and return it.
    fn getc(&mut self) -> u8;

    /// Write a run of bytes to the output.
    fn putbuf(&mut self, bytes: &[u8]);
}

/// Adapter that lets `core::fmt` machinery target a [`Console`].
pub struct ConsoleWriter<'a> {
    console: &'a mut dyn Console,
}

impl<'a> ConsoleWriter<'a> {
    pub fn new(console: &'a mut dyn Console) -> Self {
        Self { console }
    }
}

impl fmt::Write for ConsoleWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.console.putbuf(s.as_bytes());
        Ok(())
    }
}

/// Print formatted text to a console.
#[macro_export]
macro_rules! kprint {
    ($console:expr, $($arg:tt)*) => {{
        use core::fmt::Write;
        let mut writer = $crate::console::ConsoleWriter::new($console);
        let _ = write!(writer, $($arg)*);
    }};
}

/// Print formatted text followed by a newline to a console.
#[macro_export]
macro_rules! kprintln {
    ($console:expr) => {
        $crate::kprint!($console, "\n")
    };
    ($console:expr, $($arg:tt)*) => {{
        $crate::kprint!($console, $($arg)*);
        $crate::kprint!($console, "\n");
    }};
}
