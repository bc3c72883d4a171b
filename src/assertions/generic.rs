//! Assertions that work on any report or on end-of-cycle state

use super::{Assertion, AssertionContext};

/// The current report is the `n`th report of the current cycle (1-based)
#[derive(Debug, Clone, Copy)]
pub struct ReportNthInCycle(pub usize);

impl Assertion for ReportNthInCycle {
    fn evaluate(&self, ctx: &AssertionContext<'_>) -> bool {
        ctx.report.is_some() && ctx.cycle.reports_in_cycle == self.0
    }

    fn describe(&self) -> String {
        format!("Report {}. in cycle", self.0)
    }

    fn describe_state(&self, ctx: &AssertionContext<'_>) -> String {
        format!("Report is {}. in cycle", ctx.cycle.reports_in_cycle)
    }
}

/// Exactly `n` reports were emitted during the cycle
#[derive(Debug, Clone, Copy)]
pub struct ReportsInCycle(pub usize);

impl Assertion for ReportsInCycle {
    fn evaluate(&self, ctx: &AssertionContext<'_>) -> bool {
        ctx.cycle.reports_in_cycle == self.0
    }

    fn describe(&self) -> String {
        format!("{} reports in cycle", self.0)
    }

    fn describe_state(&self, ctx: &AssertionContext<'_>) -> String {
        format!("{} reports in cycle", ctx.cycle.reports_in_cycle)
    }
}

/// A matrix key is held down
#[derive(Debug, Clone, Copy)]
pub struct KeyPressed {
    pub row: u8,
    pub col: u8,
}

impl Assertion for KeyPressed {
    fn evaluate(&self, ctx: &AssertionContext<'_>) -> bool {
        ctx.matrix.is_pressed(self.row, self.col)
    }

    fn describe(&self) -> String {
        format!("Key ({}, {}) pressed", self.row, self.col)
    }

    fn describe_state(&self, ctx: &AssertionContext<'_>) -> String {
        format!(
            "Key ({}, {}) pressed: {}",
            self.row,
            self.col,
            ctx.matrix.is_pressed(self.row, self.col)
        )
    }
}

/// An arbitrary predicate with a fixed description
///
/// ```
/// use firmware_testkit::assertions::{Assertion, Condition};
///
/// let late = Condition::new("after 100 ms", |ctx| ctx.cycle.time_ms >= 100);
/// assert_eq!(late.describe(), "after 100 ms");
/// ```
pub struct Condition<F> {
    text: String,
    predicate: F,
}

impl<F> Condition<F>
where
    F: Fn(&AssertionContext<'_>) -> bool,
{
    pub fn new(text: impl Into<String>, predicate: F) -> Self {
        Self {
            text: text.into(),
            predicate,
        }
    }
}

impl<F> Assertion for Condition<F>
where
    F: Fn(&AssertionContext<'_>) -> bool,
{
    fn evaluate(&self, ctx: &AssertionContext<'_>) -> bool {
        (self.predicate)(ctx)
    }

    fn describe(&self) -> String {
        self.text.clone()
    }

    fn describe_state(&self, ctx: &AssertionContext<'_>) -> String {
        format!("{}: {}", self.text, (self.predicate)(ctx))
    }
}
