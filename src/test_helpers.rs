//! Shared utilities for tests of orchestrators and assertions
//!
//! Provides an in-memory output buffer and two small firmwares whose
//! behavior is fully under the test's control.

use crate::firmware::{Firmware, ReportSink, ScanInput};
use crate::hid::{KeyboardReport, Report};
use crate::matrix::KeyEvent;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::rc::Rc;

/// Writer whose contents stay readable after being handed to an
/// [`OutputSink`](crate::output::OutputSink).
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Rc<RefCell<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded as UTF-8
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.borrow()).into_owned()
    }

    /// Lines containing `needle`
    pub fn count_lines_containing(&self, needle: &str) -> usize {
        self.contents()
            .lines()
            .filter(|line| line.contains(needle))
            .count()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Firmware that emits a pre-programmed batch of reports per scan.
///
/// Scans beyond the programmed batches emit nothing.
#[derive(Debug, Default)]
pub struct ScriptedFirmware {
    batches: VecDeque<Vec<Report>>,
}

impl ScriptedFirmware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the reports of the next scan.
    pub fn then_emit(mut self, reports: Vec<Report>) -> Self {
        self.batches.push_back(reports);
        self
    }

    /// Queue a scan that emits nothing.
    pub fn then_idle(self) -> Self {
        self.then_emit(Vec::new())
    }
}

impl Firmware for ScriptedFirmware {
    fn scan(&mut self, _input: &ScanInput<'_>, sink: &mut dyn ReportSink) {
        for report in self.batches.pop_front().unwrap_or_default() {
            sink.emit(report);
        }
    }
}

/// What a [`RecordingFirmware`] saw during one scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    pub cycle_id: u64,
    pub time_ms: u64,
    pub events: Vec<KeyEvent>,
}

/// Firmware that records each scan and emits one empty keyboard report
/// per pending key event.
#[derive(Debug, Clone, Default)]
pub struct RecordingFirmware {
    scans: Rc<RefCell<Vec<ScanRecord>>>,
}

impl RecordingFirmware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle onto the recorded scans that outlives the firmware's move
    /// into an orchestrator.
    pub fn scans(&self) -> Rc<RefCell<Vec<ScanRecord>>> {
        Rc::clone(&self.scans)
    }
}

impl Firmware for RecordingFirmware {
    fn scan(&mut self, input: &ScanInput<'_>, sink: &mut dyn ReportSink) {
        let events = input.matrix.pending_events().to_vec();
        for _ in &events {
            sink.emit(Report::Keyboard(KeyboardReport::new()));
        }
        self.scans.borrow_mut().push(ScanRecord {
            cycle_id: input.cycle_id,
            time_ms: input.time_ms,
            events,
        });
    }
}

/// Keyboard report with the given keycodes active
pub fn keyboard_report(keycodes: &[u8]) -> Report {
    let mut report = KeyboardReport::new();
    for keycode in keycodes {
        report.set_keycode(*keycode, true);
    }
    Report::Keyboard(report)
}
