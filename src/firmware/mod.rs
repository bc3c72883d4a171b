//! The firmware side of a cycle
//!
//! Orchestrators call [`Firmware::scan`] once per cycle. The firmware looks
//! at the key matrix and hands every report it produces to the
//! [`ReportSink`], synchronously and in emission order.

mod echo;

pub use echo::{EchoFirmware, KeyAction, Keymap};

use crate::error::HarnessError;
use crate::hid::Report;
use crate::matrix::KeyMatrix;

/// What the firmware sees during one scan
#[derive(Debug, Clone, Copy)]
pub struct ScanInput<'a> {
    pub matrix: &'a KeyMatrix,
    pub cycle_id: u64,
    pub time_ms: u64,
}

/// Receiver for reports emitted during a scan
pub trait ReportSink {
    fn emit(&mut self, report: Report);

    /// Decode a raw HID payload and emit it.
    fn emit_hid(&mut self, report_id: u8, data: &[u8]) -> Result<(), HarnessError> {
        let report = Report::from_hid(report_id, data)?;
        self.emit(report);
        Ok(())
    }
}

impl ReportSink for Vec<Report> {
    fn emit(&mut self, report: Report) {
        self.push(report);
    }
}

/// A keyboard firmware scan routine
pub trait Firmware {
    fn scan(&mut self, input: &ScanInput<'_>, sink: &mut dyn ReportSink);
}

impl<F> Firmware for F
where
    F: FnMut(&ScanInput<'_>, &mut dyn ReportSink),
{
    fn scan(&mut self, input: &ScanInput<'_>, sink: &mut dyn ReportSink) {
        self(input, sink)
    }
}
