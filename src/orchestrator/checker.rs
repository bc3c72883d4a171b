//! Pass/fail accounting shared by all orchestrators

use crate::assertions::{Assertion, AssertionContext, AssertionEntry, CycleInfo};
use crate::output::OutputSink;
use std::fmt;

/// Counts errors, tracks the overall verdict and writes all output
#[derive(Debug)]
pub struct Checker {
    sink: OutputSink,
    debug: bool,
    abort_on_first_error: bool,
    error_count: u32,
    passed: bool,
    aborted: bool,
}

impl Checker {
    pub fn new(sink: OutputSink, debug: bool, abort_on_first_error: bool) -> Self {
        Self {
            sink,
            debug,
            abort_on_first_error,
            error_count: 0,
            passed: true,
            aborted: false,
        }
    }

    /// Evaluate a queued or permanent assertion. Skipped (and `false`)
    /// once the run has aborted.
    pub fn evaluate_entry(&mut self, entry: &mut AssertionEntry, ctx: &AssertionContext<'_>) -> bool {
        if self.aborted {
            return false;
        }
        let passed = entry.evaluate(ctx);
        self.record_outcome(passed, ctx, || entry.describe(), || entry.describe_state(ctx));
        passed
    }

    /// Evaluate an assertion that is not held by any queue.
    pub fn evaluate(&mut self, assertion: &dyn Assertion, ctx: &AssertionContext<'_>) -> bool {
        if self.aborted {
            return false;
        }
        let passed = assertion.evaluate(ctx);
        self.record_outcome(
            passed,
            ctx,
            || assertion.describe(),
            || assertion.describe_state(ctx),
        );
        passed
    }

    fn record_outcome(
        &mut self,
        passed: bool,
        ctx: &AssertionContext<'_>,
        describe: impl FnOnce() -> String,
        describe_state: impl FnOnce() -> String,
    ) {
        if passed {
            if self.debug {
                self.sink.log(format_args!("Assertion passed: {}", describe()));
            }
            return;
        }
        let detail = format!("actual: {}", describe_state());
        self.record_error_with(ctx.cycle, format_args!("Assertion failed: {}", describe()), Some(detail));
    }

    /// Record one error of any kind.
    pub fn record_error(&mut self, at: CycleInfo, message: impl fmt::Display) {
        self.record_error_with(at, message, None);
    }

    fn record_error_with(&mut self, at: CycleInfo, message: impl fmt::Display, detail: Option<String>) {
        if self.aborted {
            return;
        }
        self.error_count += 1;
        self.passed = false;
        log::warn!("cycle {}: {}", at.cycle_id, message);
        self.sink.error(at.cycle_id, at.time_ms, &message);
        if let Some(detail) = detail {
            self.sink.log(detail);
        }
        if self.abort_on_first_error {
            self.aborted = true;
            self.sink.header("Aborting after first error");
        }
    }

    pub fn log(&mut self, text: impl fmt::Display) {
        self.sink.log(text);
    }

    pub fn header(&mut self, text: impl fmt::Display) {
        self.sink.header(text);
    }

    pub fn sink_mut(&mut self) -> &mut OutputSink {
        &mut self.sink
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn abort_on_first_error(&self) -> bool {
        self.abort_on_first_error
    }

    pub fn set_abort_on_first_error(&mut self, abort: bool) {
        self.abort_on_first_error = abort;
    }
}
