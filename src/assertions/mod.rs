//! Assertions evaluated against reports and cycle state
//!
//! Every check implements the [`Assertion`] trait. Orchestrators and queues
//! only ever hold `Box<dyn Assertion>`, so new checks can be added without
//! touching either.

mod generic;
mod keyboard;
mod mouse;
mod queue;

pub use generic::{Condition, KeyPressed, ReportNthInCycle, ReportsInCycle};
pub use keyboard::{AnyKeycodeActive, KeycodeActive, ModifierActive, NoKeysActive};
pub use mouse::{AbsolutePosition, MouseButtonsPressed, MouseMoved};
pub use queue::{AssertionQueue, AssertionQueueBundle};

use crate::hid::{AbsoluteMouseReport, KeyboardReport, MouseReport, Report};
use crate::matrix::KeyMatrix;

/// Position of an evaluation in simulated time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleInfo {
    pub cycle_id: u64,
    pub time_ms: u64,
    /// Reports seen so far in this cycle; the first report of a cycle is 1
    pub reports_in_cycle: usize,
}

/// Everything an assertion may look at
#[derive(Debug, Clone, Copy)]
pub struct AssertionContext<'a> {
    pub cycle: CycleInfo,
    pub matrix: &'a KeyMatrix,
    /// The report being dispatched; `None` for end-of-cycle checks
    pub report: Option<&'a Report>,
}

impl<'a> AssertionContext<'a> {
    pub fn keyboard_report(&self) -> Option<&'a KeyboardReport> {
        self.report.and_then(Report::as_keyboard)
    }

    pub fn mouse_report(&self) -> Option<&'a MouseReport> {
        self.report.and_then(Report::as_mouse)
    }

    pub fn absolute_mouse_report(&self) -> Option<&'a AbsoluteMouseReport> {
        self.report.and_then(Report::as_absolute_mouse)
    }
}

/// A check over the current report or cycle state
pub trait Assertion {
    /// Evaluate the check. Failure is a `false` return, never a panic.
    fn evaluate(&self, ctx: &AssertionContext<'_>) -> bool;

    /// What the assertion expects
    fn describe(&self) -> String;

    /// What was actually observed
    fn describe_state(&self, ctx: &AssertionContext<'_>) -> String;
}

impl<A: Assertion + ?Sized> Assertion for Box<A> {
    fn evaluate(&self, ctx: &AssertionContext<'_>) -> bool {
        (**self).evaluate(ctx)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn describe_state(&self, ctx: &AssertionContext<'_>) -> String {
        (**self).describe_state(ctx)
    }
}

/// Outcome of the most recent evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionState {
    Pending,
    Passed,
    Failed,
}

/// An assertion together with its evaluation state, as held by a queue
pub struct AssertionEntry {
    assertion: Box<dyn Assertion>,
    state: AssertionState,
    evaluations: u32,
}

impl AssertionEntry {
    pub fn new(assertion: Box<dyn Assertion>) -> Self {
        Self {
            assertion,
            state: AssertionState::Pending,
            evaluations: 0,
        }
    }

    pub fn evaluate(&mut self, ctx: &AssertionContext<'_>) -> bool {
        let passed = self.assertion.evaluate(ctx);
        self.state = if passed {
            AssertionState::Passed
        } else {
            AssertionState::Failed
        };
        self.evaluations += 1;
        passed
    }

    pub fn state(&self) -> AssertionState {
        self.state
    }

    pub fn evaluations(&self) -> u32 {
        self.evaluations
    }

    pub fn describe(&self) -> String {
        self.assertion.describe()
    }

    pub fn describe_state(&self, ctx: &AssertionContext<'_>) -> String {
        self.assertion.describe_state(ctx)
    }
}

impl<A: Assertion + 'static> From<A> for AssertionEntry {
    fn from(assertion: A) -> Self {
        Self::new(Box::new(assertion))
    }
}

impl std::fmt::Debug for AssertionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssertionEntry")
            .field("assertion", &self.assertion.describe())
            .field("state", &self.state)
            .field("evaluations", &self.evaluations)
            .finish()
    }
}
