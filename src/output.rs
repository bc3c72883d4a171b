//! Output sink for log, header and error text
//!
//! Every line an orchestrator produces goes through one [`OutputSink`]. The
//! underlying writer can be swapped at any time, e.g. to capture output in
//! a file.

use std::fmt;
use std::io::{self, Write};

const HEADER_RULE: &str =
    "################################################################################";

/// Line-oriented writer shared by all orchestrator output
pub struct OutputSink {
    out: Box<dyn Write>,
}

impl OutputSink {
    pub fn new(out: Box<dyn Write>) -> Self {
        Self { out }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Redirect all further output.
    pub fn set_output(&mut self, out: Box<dyn Write>) {
        let _ = self.out.flush();
        self.out = out;
    }

    /// Plain log line
    pub fn log(&mut self, text: impl fmt::Display) {
        self.write_line(format_args!("    {}", text));
    }

    /// Framed header block
    pub fn header(&mut self, text: impl fmt::Display) {
        self.write_line(format_args!("{}", HEADER_RULE));
        self.write_line(format_args!("# {}", text));
        self.write_line(format_args!("{}", HEADER_RULE));
    }

    /// Error line tagged with the cycle it occurred in
    pub fn error(&mut self, cycle_id: u64, time_ms: u64, text: impl fmt::Display) {
        self.write_line(format_args!(
            "!!! Error (cycle {}, t = {} ms): {}",
            cycle_id, time_ms, text
        ));
    }

    fn write_line(&mut self, args: fmt::Arguments<'_>) {
        // A broken sink must not change what the harness does.
        if let Err(e) = writeln!(self.out, "{}", args) {
            log::warn!("failed to write harness output: {}", e);
        }
    }

    pub fn flush(&mut self) {
        let _ = self.out.flush();
    }
}

impl Default for OutputSink {
    fn default() -> Self {
        Self::stdout()
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink").finish_non_exhaustive()
    }
}
