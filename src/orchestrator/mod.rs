//! Cycle-accurate orchestration of a firmware under test
//!
//! An orchestrator owns the simulated key matrix, the simulated clock and
//! every assertion queue. One cycle is:
//!
//! 1. scan: the firmware runs once and emits reports
//! 2. dispatch: each report is checked against its channel's queue
//! 3. end of cycle: the cycle queue's head and permanent entries run
//! 4. advance: cycle id +1, time + cycle duration
//!
//! [`Driver`] consumes keyboard reports only; [`Simulator`] consumes every
//! channel and adds the run loops. Both share [`CycleCore`] and the
//! provided methods of [`Orchestrator`].

mod checker;
mod dispatch;
mod driver;
mod scope;
mod simulator;

pub use checker::Checker;
pub use driver::Driver;
pub use scope::TestScope;
pub use simulator::Simulator;

use crate::assertions::{Assertion, AssertionContext, AssertionQueue, CycleInfo};
use crate::error::HarnessError;
use crate::hid::{ChannelKind, Report};
use crate::matrix::KeyMatrix;
use crate::output::OutputSink;
use dispatch::{DispatchOptions, ScanState};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

/// Whether a cycle runs assertions or only logs reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleMode {
    /// Dispatch reports and evaluate cycle assertions
    Full,
    /// Log reports; no assertion is evaluated or drained
    LogOnly,
}

/// When a report with no queued assertion counts as an error
///
/// Only consulted while `error_if_report_without_queued_assertions` is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnconsumedReportPolicy {
    /// A queued assertion must have been waiting for the report
    #[default]
    QueuedOnly,
    /// A permanent assertion checking the report is enough
    AnyAssertion,
}

/// Settings an orchestrator is built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub cycle_duration_ms: u64,
    pub debug: bool,
    pub abort_on_first_error: bool,
    pub error_if_report_without_queued_assertions: bool,
    pub unconsumed_report_policy: UnconsumedReportPolicy,
    pub rows: u8,
    pub cols: u8,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            cycle_duration_ms: 5,
            debug: false,
            abort_on_first_error: false,
            error_if_report_without_queued_assertions: false,
            unconsumed_report_policy: UnconsumedReportPolicy::QueuedOnly,
            rows: 4,
            cols: 16,
        }
    }
}

/// Simulated time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimClock {
    pub time_ms: u64,
    pub cycle_id: u64,
    pub cycle_duration_ms: u64,
}

impl SimClock {
    fn advance(&mut self) {
        self.cycle_id += 1;
        self.time_ms = self.time_ms.saturating_add(self.cycle_duration_ms);
    }
}

/// Result of one [`TestScope`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub name: String,
    /// Errors recorded while the scope was open
    pub errors: u32,
    pub passed: bool,
    pub started_at_ms: u64,
    pub finished_at_ms: u64,
}

/// State shared by every orchestrator variant
#[derive(Debug)]
pub struct CycleCore {
    name: &'static str,
    clock: SimClock,
    matrix: KeyMatrix,
    checker: Checker,
    cycle_assertions: AssertionQueue,
    scan: ScanState,
    error_if_unconsumed: bool,
    policy: UnconsumedReportPolicy,
    outcomes: Vec<TestOutcome>,
}

impl CycleCore {
    /// Create the core and write the start header.
    pub fn new(name: &'static str, settings: &OrchestratorSettings, sink: OutputSink) -> Self {
        let mut core = Self {
            name,
            clock: SimClock {
                cycle_duration_ms: settings.cycle_duration_ms,
                ..SimClock::default()
            },
            matrix: KeyMatrix::new(settings.rows, settings.cols),
            checker: Checker::new(sink, settings.debug, settings.abort_on_first_error),
            cycle_assertions: AssertionQueue::new(),
            scan: ScanState::default(),
            error_if_unconsumed: settings.error_if_report_without_queued_assertions,
            policy: settings.unconsumed_report_policy,
            outcomes: Vec::new(),
        };
        core.checker.header(format_args!(
            "{} started: {}x{} matrix, {} ms per cycle",
            name, settings.rows, settings.cols, settings.cycle_duration_ms
        ));
        log::debug!("{} created with {:?}", name, settings);
        core
    }

    pub fn cycle_info(&self) -> CycleInfo {
        CycleInfo {
            cycle_id: self.clock.cycle_id,
            time_ms: self.clock.time_ms,
            reports_in_cycle: self.scan.reports_in_cycle,
        }
    }

    /// `Err(Aborted)` once abort-on-first-error has stopped the run.
    pub fn ensure_running(&self) -> Result<(), HarnessError> {
        if self.checker.is_aborted() {
            Err(HarnessError::Aborted)
        } else {
            Ok(())
        }
    }

    /// Record `err` as a harness error and hand it back for returning.
    pub fn fail(&mut self, err: HarnessError) -> HarnessError {
        if !matches!(err, HarnessError::Aborted) {
            let at = self.cycle_info();
            self.checker.record_error(at, &err);
        }
        err
    }

    /// Record a free-form error.
    pub fn error(&mut self, text: impl fmt::Display) {
        let at = self.cycle_info();
        self.checker.record_error(at, text);
    }

    pub fn log(&mut self, text: impl fmt::Display) {
        self.checker.log(text);
    }

    pub fn header(&mut self, text: impl fmt::Display) {
        self.checker.header(text);
    }

    pub fn set_output(&mut self, out: Box<dyn Write>) {
        self.checker.sink_mut().set_output(out);
    }

    /// Apply a matrix change, recording out-of-range keys as errors.
    fn update_matrix<T>(
        &mut self,
        change: impl FnOnce(&mut KeyMatrix) -> Result<T, HarnessError>,
    ) -> Result<T, HarnessError> {
        self.ensure_running()?;
        change(&mut self.matrix).map_err(|e| self.fail(e))
    }

    fn begin_cycle(&mut self) -> Result<(), HarnessError> {
        self.ensure_running()?;
        self.scan.reports_in_cycle = 0;
        log::trace!(
            "cycle {} at {} ms",
            self.clock.cycle_id,
            self.clock.time_ms
        );
        Ok(())
    }

    fn end_cycle(&mut self, mode: CycleMode) -> Result<(), HarnessError> {
        self.ensure_running()?;
        if mode == CycleMode::Full {
            let ctx = AssertionContext {
                cycle: self.cycle_info(),
                matrix: &self.matrix,
                report: None,
            };
            if let Some(mut head) = self.cycle_assertions.drain_queued_head() {
                self.checker.evaluate_entry(&mut head, &ctx);
            }
            for entry in self.cycle_assertions.permanent_entries_mut() {
                self.checker.evaluate_entry(entry, &ctx);
            }
            self.ensure_running()?;
        }
        self.matrix.clear_pending();
        self.clock.advance();
        Ok(())
    }

    fn dispatch_options(&self, mode: CycleMode) -> DispatchOptions {
        DispatchOptions {
            mode,
            error_if_unconsumed: self.error_if_unconsumed,
            policy: self.policy,
        }
    }

    /// Evaluate assertions right now, outside any queue. The last
    /// dispatched report is visible to them.
    pub fn evaluate_now(&mut self, assertions: &[&dyn Assertion]) -> Result<bool, HarnessError> {
        self.ensure_running()?;
        let ctx = AssertionContext {
            cycle: self.cycle_info(),
            matrix: &self.matrix,
            report: self.scan.last_report.as_ref(),
        };
        let mut all_passed = true;
        for assertion in assertions {
            all_passed &= self.checker.evaluate(*assertion, &ctx);
        }
        self.ensure_running()?;
        Ok(all_passed)
    }

    /// Record an error unless `condition` holds.
    pub fn assert_condition(&mut self, condition: bool, text: &str) -> bool {
        if condition {
            if self.checker.debug() {
                self.checker.log(format_args!("Condition passed: {}", text));
            }
        } else {
            self.error(format_args!("Condition failed: {}", text));
        }
        condition
    }

    /// Record one error if `queue` still holds assertions.
    fn check_drained(&mut self, what: &str, queue: &AssertionQueue) -> bool {
        if queue.is_empty() {
            return true;
        }
        self.error(format_args!(
            "{} assertions left in queue: {}",
            what,
            queue.describe_contents().join(", ")
        ));
        false
    }

    fn check_cycle_queue_drained(&mut self) -> bool {
        let queue = std::mem::take(&mut self.cycle_assertions);
        let drained = self.check_drained("cycle", &queue);
        self.cycle_assertions = queue;
        drained
    }

    fn record_outcome(&mut self, name: String, errors: u32, started_at_ms: u64) {
        let passed = errors == 0;
        if passed {
            self.checker.header(format_args!("Test {}: passed", name));
        } else {
            self.checker
                .header(format_args!("Test {}: failed with {} error(s)", name, errors));
        }
        self.outcomes.push(TestOutcome {
            name,
            errors,
            passed,
            started_at_ms,
            finished_at_ms: self.clock.time_ms,
        });
    }

    pub fn clock(&self) -> SimClock {
        self.clock
    }

    pub fn time_ms(&self) -> u64 {
        self.clock.time_ms
    }

    pub fn cycle_id(&self) -> u64 {
        self.clock.cycle_id
    }

    pub fn cycle_duration_ms(&self) -> u64 {
        self.clock.cycle_duration_ms
    }

    pub fn set_cycle_duration_ms(&mut self, duration_ms: u64) {
        self.clock.cycle_duration_ms = duration_ms;
    }

    fn require_cycle_duration(&mut self) -> Result<(), HarnessError> {
        if self.clock.cycle_duration_ms == 0 {
            return Err(self.fail(HarnessError::CycleDurationUnset));
        }
        Ok(())
    }

    pub fn matrix(&self) -> &KeyMatrix {
        &self.matrix
    }

    /// Assertions evaluated at the end of each full cycle
    pub fn cycle_assertions(&mut self) -> &mut AssertionQueue {
        &mut self.cycle_assertions
    }

    pub fn error_count(&self) -> u32 {
        self.checker.error_count()
    }

    pub fn passed(&self) -> bool {
        self.checker.passed()
    }

    pub fn is_aborted(&self) -> bool {
        self.checker.is_aborted()
    }

    pub fn debug(&self) -> bool {
        self.checker.debug()
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.checker.set_debug(debug);
    }

    pub fn set_abort_on_first_error(&mut self, abort: bool) {
        self.checker.set_abort_on_first_error(abort);
    }

    pub fn error_if_report_without_queued_assertions(&self) -> bool {
        self.error_if_unconsumed
    }

    pub fn set_error_if_report_without_queued_assertions(&mut self, enabled: bool) {
        self.error_if_unconsumed = enabled;
    }

    pub fn unconsumed_report_policy(&self) -> UnconsumedReportPolicy {
        self.policy
    }

    pub fn set_unconsumed_report_policy(&mut self, policy: UnconsumedReportPolicy) {
        self.policy = policy;
    }

    pub fn reports_in_cycle(&self) -> usize {
        self.scan.reports_in_cycle
    }

    /// Reports of a channel dispatched since the start of the run
    pub fn report_count(&self, channel: ChannelKind) -> u64 {
        self.scan.report_counts[channel.index()]
    }

    pub fn last_report(&self) -> Option<&Report> {
        self.scan.last_report.as_ref()
    }

    pub fn test_outcomes(&self) -> &[TestOutcome] {
        &self.outcomes
    }
}

impl Drop for CycleCore {
    fn drop(&mut self) {
        let verdict = if self.checker.passed() {
            "all assertions passed".to_string()
        } else {
            format!("{} error(s)", self.checker.error_count())
        };
        self.checker.header(format_args!(
            "{} finished after {} cycles ({} ms): {}",
            self.name, self.clock.cycle_id, self.clock.time_ms, verdict
        ));
        self.checker.sink_mut().flush();
    }
}

/// Operations common to every orchestrator
pub trait Orchestrator {
    fn core(&self) -> &CycleCore;

    fn core_mut(&mut self) -> &mut CycleCore;

    /// Run the firmware once and dispatch the reports it emits.
    fn scan(&mut self, mode: CycleMode);

    /// Record one error per report queue that still holds assertions.
    /// Returns whether all report queues were empty.
    fn check_report_queues_drained(&mut self) -> bool;

    fn press_key(&mut self, row: u8, col: u8) -> Result<(), HarnessError> {
        if !self.core_mut().update_matrix(|m| m.press(row, col))? {
            log::debug!("key ({}, {}) already pressed", row, col);
        }
        Ok(())
    }

    fn release_key(&mut self, row: u8, col: u8) -> Result<(), HarnessError> {
        if !self.core_mut().update_matrix(|m| m.release(row, col))? {
            log::debug!("key ({}, {}) already released", row, col);
        }
        Ok(())
    }

    /// Press and release without running a cycle in between.
    fn tap_key(&mut self, row: u8, col: u8) -> Result<(), HarnessError> {
        self.core_mut().update_matrix(|m| m.tap(row, col))
    }

    /// Release every pressed key.
    fn clear_all_keys(&mut self) -> Result<(), HarnessError> {
        self.core_mut().update_matrix(|m| {
            m.release_all();
            Ok(())
        })
    }

    fn run_cycle(&mut self, mode: CycleMode) -> Result<(), HarnessError> {
        self.core_mut().begin_cycle()?;
        self.scan(mode);
        self.core_mut().end_cycle(mode)
    }

    /// Run one full cycle.
    fn cycle(&mut self) -> Result<(), HarnessError> {
        self.run_cycle(CycleMode::Full)
    }

    fn cycles(&mut self, n: usize) -> Result<(), HarnessError> {
        for _ in 0..n {
            self.cycle()?;
        }
        Ok(())
    }

    /// Run `n` full cycles, evaluating `assertions` after each one.
    fn cycles_checked(&mut self, n: usize, assertions: &[&dyn Assertion]) -> Result<(), HarnessError> {
        for _ in 0..n {
            self.cycle()?;
            self.core_mut().evaluate_now(assertions)?;
        }
        Ok(())
    }

    /// Tap a key `n` times, running `interval_cycles` cycles after every
    /// tap and evaluating `assertion` after those cycles.
    fn multi_tap_key(
        &mut self,
        n: usize,
        row: u8,
        col: u8,
        interval_cycles: usize,
        assertion: Option<&dyn Assertion>,
    ) -> Result<(), HarnessError> {
        for _ in 0..n {
            self.tap_key(row, col)?;
            self.cycles(interval_cycles)?;
            if let Some(assertion) = assertion {
                self.core_mut().evaluate_now(&[assertion])?;
            }
        }
        Ok(())
    }

    /// Fast-forward by `delta_ms`, logging reports without checking them.
    ///
    /// Runs cycles until the target time is reached, so the clock ends at
    /// the first cycle boundary at or after it.
    fn advance_time_by(&mut self, delta_ms: u64) -> Result<(), HarnessError> {
        let now_ms = self.core().time_ms();
        match now_ms.checked_add(delta_ms) {
            Some(target) => self.advance_time_to(target),
            None => {
                let core = self.core_mut();
                core.ensure_running()?;
                Err(core.fail(HarnessError::ClockOverflow { now_ms, delta_ms }))
            }
        }
    }

    /// Fast-forward to the absolute time `time_ms`.
    fn advance_time_to(&mut self, time_ms: u64) -> Result<(), HarnessError> {
        let core = self.core_mut();
        core.ensure_running()?;
        core.require_cycle_duration()?;
        let now = core.time_ms();
        if time_ms < now {
            return Err(core.fail(HarnessError::TimeInPast {
                target_ms: time_ms,
                now_ms: now,
            }));
        }
        core.log(format_args!("Skipping {} ms", time_ms - now));
        while self.core().time_ms() < time_ms {
            self.run_cycle(CycleMode::LogOnly)?;
        }
        Ok(())
    }

    /// Evaluate assertions immediately.
    fn evaluate_assertions(&mut self, assertions: &[&dyn Assertion]) -> Result<bool, HarnessError> {
        self.core_mut().evaluate_now(assertions)
    }

    fn assert_condition(&mut self, condition: bool, text: &str) -> bool {
        self.core_mut().assert_condition(condition, text)
    }

    /// Record an error for every queue (report or cycle) that still holds
    /// assertions. Returns whether everything was drained.
    fn assert_nothing_queued(&mut self) -> bool {
        let reports_drained = self.check_report_queues_drained();
        let cycle_drained = self.core_mut().check_cycle_queue_drained();
        reports_drained && cycle_drained
    }

    /// Open a named test span; see [`TestScope`].
    fn new_test(&mut self, name: &str) -> TestScope<'_, Self>
    where
        Self: Sized,
    {
        TestScope::new(self, name)
    }

    fn time_ms(&self) -> u64 {
        self.core().time_ms()
    }

    fn cycle_id(&self) -> u64 {
        self.core().cycle_id()
    }

    fn error_count(&self) -> u32 {
        self.core().error_count()
    }

    fn passed(&self) -> bool {
        self.core().passed()
    }

    fn cycle_assertions(&mut self) -> &mut AssertionQueue {
        self.core_mut().cycle_assertions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertions::{Condition, KeyPressed, ReportsInCycle};
    use crate::test_helpers::{RecordingFirmware, SharedBuffer};

    fn driver(settings: OrchestratorSettings) -> (Driver<RecordingFirmware>, RecordingFirmware, SharedBuffer) {
        let firmware = RecordingFirmware::new();
        let buffer = SharedBuffer::new();
        let driver = Driver::with_sink(
            firmware.clone(),
            &settings,
            OutputSink::new(Box::new(buffer.clone())),
        );
        (driver, firmware, buffer)
    }

    #[test]
    fn cycle_advances_clock() {
        let (mut driver, _, _) = driver(OrchestratorSettings::default());
        driver.cycles(3).unwrap();
        assert_eq!(driver.cycle_id(), 3);
        assert_eq!(driver.time_ms(), 15);
    }

    #[test]
    fn cycle_assertions_see_post_scan_state() {
        let (mut driver, _, _) = driver(OrchestratorSettings::default());
        driver
            .cycle_assertions()
            .push_queued(ReportsInCycle(1))
            .push_queued(KeyPressed { row: 0, col: 0 });
        driver.press_key(0, 0).unwrap();
        driver.cycle().unwrap();
        driver.cycle().unwrap();
        assert_eq!(driver.error_count(), 0);
        assert!(driver.cycle_assertions().is_empty());
    }

    #[test]
    fn advance_time_rounds_up_to_cycle_boundary() {
        let (mut driver, firmware, _) = driver(OrchestratorSettings::default());
        driver.advance_time_by(12).unwrap();
        assert_eq!(driver.time_ms(), 15);
        assert_eq!(driver.cycle_id(), 3);
        assert_eq!(firmware.scans().borrow().len(), 3);

        driver.advance_time_by(0).unwrap();
        assert_eq!(driver.time_ms(), 15);
    }

    #[test]
    fn advance_time_needs_cycle_duration() {
        let (mut driver, _, buffer) = driver(OrchestratorSettings {
            cycle_duration_ms: 0,
            ..OrchestratorSettings::default()
        });
        assert!(matches!(
            driver.advance_time_by(10),
            Err(HarnessError::CycleDurationUnset)
        ));
        assert_eq!(driver.error_count(), 1);
        assert!(buffer.contents().contains("cycle duration"));
    }

    #[test]
    fn advance_time_to_rejects_the_past() {
        let (mut driver, _, _) = driver(OrchestratorSettings::default());
        driver.cycles(2).unwrap();
        assert!(matches!(
            driver.advance_time_to(5),
            Err(HarnessError::TimeInPast { target_ms: 5, now_ms: 10 })
        ));
        assert_eq!(driver.error_count(), 1);
    }

    #[test]
    fn advance_time_by_rejects_clock_overflow() {
        let (mut driver, firmware, buffer) = driver(OrchestratorSettings::default());
        driver.cycle().unwrap();
        assert!(matches!(
            driver.advance_time_by(u64::MAX),
            Err(HarnessError::ClockOverflow { now_ms: 5, delta_ms: u64::MAX })
        ));
        assert_eq!(driver.error_count(), 1);
        assert_eq!(driver.time_ms(), 5);
        assert_eq!(firmware.scans().borrow().len(), 1);
        assert!(buffer.contents().contains("overflows the simulated clock"));
    }

    #[test]
    fn log_only_cycles_leave_queues_untouched() {
        let (mut driver, _, _) = driver(OrchestratorSettings::default());
        driver.cycle_assertions().push_queued(ReportsInCycle(5));
        driver.advance_time_by(20).unwrap();
        assert_eq!(driver.cycle_assertions().queued_len(), 1);
        assert_eq!(driver.error_count(), 0);
    }

    #[test]
    fn out_of_range_key_is_recorded() {
        let (mut driver, _, _) = driver(OrchestratorSettings::default());
        assert!(driver.press_key(9, 0).is_err());
        assert_eq!(driver.error_count(), 1);
    }

    #[test]
    fn assert_condition_counts_failures() {
        let (mut driver, _, buffer) = driver(OrchestratorSettings::default());
        assert!(driver.assert_condition(true, "fine"));
        assert!(!driver.assert_condition(false, "broken"));
        assert_eq!(driver.error_count(), 1);
        assert!(buffer.contents().contains("Condition failed: broken"));
    }

    #[test]
    fn cycles_checked_evaluates_after_every_cycle() {
        let (mut driver, _, _) = driver(OrchestratorSettings::default());
        let late = Condition::new("time below 10 ms", |ctx| ctx.cycle.time_ms < 10);
        driver.cycles_checked(3, &[&late]).unwrap();
        // Checked at 5, 10 and 15 ms.
        assert_eq!(driver.error_count(), 2);
    }

    #[test]
    fn header_and_footer_frame_the_run() {
        let buffer = SharedBuffer::new();
        {
            let _driver = Driver::with_sink(
                RecordingFirmware::new(),
                &OrchestratorSettings::default(),
                OutputSink::new(Box::new(buffer.clone())),
            );
        }
        let out = buffer.contents();
        assert!(out.contains("# Driver started: 4x16 matrix, 5 ms per cycle"));
        assert!(out.contains("# Driver finished after 0 cycles (0 ms): all assertions passed"));
    }
}
