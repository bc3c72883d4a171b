//! Keyboard-only orchestrator

use super::dispatch::{CycleSink, KeyboardOnly};
use super::{CycleCore, CycleMode, Orchestrator, OrchestratorSettings};
use crate::assertions::AssertionQueue;
use crate::firmware::{Firmware, ScanInput};
use crate::hid::{ChannelKind, KeyboardReport};
use crate::output::OutputSink;

/// Orchestrator checking the keyboard reports of a firmware
///
/// Reports of other channels are logged at debug level and otherwise
/// ignored.
#[derive(Debug)]
pub struct Driver<F> {
    core: CycleCore,
    firmware: F,
    keyboard_assertions: AssertionQueue,
}

impl<F: Firmware> Driver<F> {
    /// Driver writing to stdout
    pub fn new(firmware: F, settings: &OrchestratorSettings) -> Self {
        Self::with_sink(firmware, settings, OutputSink::stdout())
    }

    pub fn with_sink(firmware: F, settings: &OrchestratorSettings, sink: OutputSink) -> Self {
        Self {
            core: CycleCore::new("Driver", settings, sink),
            firmware,
            keyboard_assertions: AssertionQueue::new(),
        }
    }

    pub fn keyboard_report_assertions(&mut self) -> &mut AssertionQueue {
        &mut self.keyboard_assertions
    }

    /// Most recent keyboard report
    pub fn current_keyboard_report(&self) -> Option<&KeyboardReport> {
        self.core.last_report().and_then(|report| report.as_keyboard())
    }

    pub fn keyboard_reports_in_cycle(&self) -> usize {
        self.core.reports_in_cycle()
    }

    pub fn overall_keyboard_reports(&self) -> u64 {
        self.core.report_count(ChannelKind::Keyboard)
    }

    pub fn firmware(&self) -> &F {
        &self.firmware
    }

    pub fn firmware_mut(&mut self) -> &mut F {
        &mut self.firmware
    }
}

impl<F: Firmware> Orchestrator for Driver<F> {
    fn core(&self) -> &CycleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CycleCore {
        &mut self.core
    }

    fn scan(&mut self, mode: CycleMode) {
        let core = &mut self.core;
        let options = core.dispatch_options(mode);
        let input = ScanInput {
            matrix: &core.matrix,
            cycle_id: core.clock.cycle_id,
            time_ms: core.clock.time_ms,
        };
        let mut sink = CycleSink {
            checker: &mut core.checker,
            state: &mut core.scan,
            matrix: &core.matrix,
            route: KeyboardOnly(&mut self.keyboard_assertions),
            cycle_id: core.clock.cycle_id,
            time_ms: core.clock.time_ms,
            options,
        };
        self.firmware.scan(&input, &mut sink);
    }

    fn check_report_queues_drained(&mut self) -> bool {
        self.core
            .check_drained("keyboard report", &self.keyboard_assertions)
    }
}
