//! Report dispatch shared by the driver and the simulator
//!
//! During a scan the firmware emits reports into a [`CycleSink`]. The sink
//! numbers each report within the cycle, picks the assertion queue of its
//! channel through a [`ReportRoute`] and evaluates the queued head followed
//! by every permanent assertion.

use super::checker::Checker;
use super::{CycleMode, UnconsumedReportPolicy};
use crate::assertions::{AssertionContext, AssertionQueue, AssertionQueueBundle, CycleInfo};
use crate::firmware::ReportSink;
use crate::hid::{ChannelKind, Report};
use crate::matrix::KeyMatrix;

/// Per-cycle report bookkeeping kept by every orchestrator
#[derive(Debug, Default)]
pub(crate) struct ScanState {
    /// Reports dispatched in the current cycle
    pub reports_in_cycle: usize,
    /// Reports dispatched since the start of the run, per channel
    pub report_counts: [u64; 3],
    /// Most recent dispatched report
    pub last_report: Option<Report>,
}

/// Picks the queue a report is checked against
pub(crate) trait ReportRoute {
    /// `None` when the orchestrator does not consume the report's channel.
    fn queue_for(&mut self, channel: ChannelKind) -> Option<&mut AssertionQueue>;
}

impl ReportRoute for AssertionQueueBundle {
    fn queue_for(&mut self, channel: ChannelKind) -> Option<&mut AssertionQueue> {
        Some(self.bundle_for(channel))
    }
}

impl<R: ReportRoute + ?Sized> ReportRoute for &mut R {
    fn queue_for(&mut self, channel: ChannelKind) -> Option<&mut AssertionQueue> {
        (**self).queue_for(channel)
    }
}

/// Route of an orchestrator that only consumes keyboard reports
pub(crate) struct KeyboardOnly<'a>(pub &'a mut AssertionQueue);

impl ReportRoute for KeyboardOnly<'_> {
    fn queue_for(&mut self, channel: ChannelKind) -> Option<&mut AssertionQueue> {
        match channel {
            ChannelKind::Keyboard => Some(&mut *self.0),
            _ => None,
        }
    }
}

/// How reports are treated during one scan
#[derive(Debug, Clone, Copy)]
pub(crate) struct DispatchOptions {
    pub mode: CycleMode,
    pub error_if_unconsumed: bool,
    pub policy: UnconsumedReportPolicy,
}

pub(crate) struct CycleSink<'a, R> {
    pub checker: &'a mut Checker,
    pub state: &'a mut ScanState,
    pub matrix: &'a KeyMatrix,
    pub route: R,
    pub cycle_id: u64,
    pub time_ms: u64,
    pub options: DispatchOptions,
}

impl<R: ReportRoute> ReportSink for CycleSink<'_, R> {
    fn emit(&mut self, report: Report) {
        if self.checker.is_aborted() {
            return;
        }
        let channel = report.channel();
        let Some(queue) = self.route.queue_for(channel) else {
            log::debug!("ignoring {} report: {}", channel, report);
            return;
        };

        self.state.reports_in_cycle += 1;
        self.state.report_counts[channel.index()] += 1;
        let ctx = AssertionContext {
            cycle: CycleInfo {
                cycle_id: self.cycle_id,
                time_ms: self.time_ms,
                reports_in_cycle: self.state.reports_in_cycle,
            },
            matrix: self.matrix,
            report: Some(&report),
        };
        dispatch_report(self.checker, queue, &ctx, self.options);
        self.state.last_report = Some(report);
    }
}

/// Check one report against its channel's queue.
pub(crate) fn dispatch_report(
    checker: &mut Checker,
    queue: &mut AssertionQueue,
    ctx: &AssertionContext<'_>,
    options: DispatchOptions,
) {
    let Some(report) = ctx.report else {
        return;
    };
    if options.mode == CycleMode::LogOnly {
        checker.log(report);
        return;
    }
    if checker.debug() {
        checker.log(format_args!(
            "Report {} in cycle: {}",
            ctx.cycle.reports_in_cycle, report
        ));
    }

    let head = queue.drain_queued_head();
    let had_head = head.is_some();
    if let Some(mut entry) = head {
        checker.evaluate_entry(&mut entry, ctx);
    }
    for entry in queue.permanent_entries_mut() {
        checker.evaluate_entry(entry, ctx);
    }

    if !had_head && options.error_if_unconsumed {
        let covered = options.policy == UnconsumedReportPolicy::AnyAssertion
            && queue.permanent_len() > 0;
        if !covered {
            checker.record_error(
                ctx.cycle,
                format_args!("{} report without queued assertions: {}", report.channel(), report),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertions::{AnyKeycodeActive, NoKeysActive};
    use crate::output::OutputSink;
    use crate::test_helpers::{keyboard_report, SharedBuffer};

    fn options(error_if_unconsumed: bool, policy: UnconsumedReportPolicy) -> DispatchOptions {
        DispatchOptions {
            mode: CycleMode::Full,
            error_if_unconsumed,
            policy,
        }
    }

    fn run(queue: &mut AssertionQueue, report: &Report, options: DispatchOptions) -> (Checker, String) {
        let buffer = SharedBuffer::new();
        let mut checker = Checker::new(OutputSink::new(Box::new(buffer.clone())), false, false);
        let matrix = KeyMatrix::new(1, 1);
        let ctx = AssertionContext {
            cycle: CycleInfo {
                reports_in_cycle: 1,
                ..CycleInfo::default()
            },
            matrix: &matrix,
            report: Some(report),
        };
        dispatch_report(&mut checker, queue, &ctx, options);
        (checker, buffer.contents())
    }

    #[test]
    fn head_then_permanent_are_evaluated() {
        let mut queue = AssertionQueue::new();
        queue.push_queued(AnyKeycodeActive).push_permanent(NoKeysActive);
        let (checker, _) = run(
            &mut queue,
            &keyboard_report(&[4]),
            options(false, UnconsumedReportPolicy::QueuedOnly),
        );
        // Head passes, permanent fails.
        assert_eq!(checker.error_count(), 1);
        assert_eq!(queue.queued_len(), 0);
        assert_eq!(queue.permanent_entries()[0].evaluations(), 1);
    }

    #[test]
    fn unconsumed_report_is_an_error_when_enabled() {
        let mut queue = AssertionQueue::new();
        let (checker, out) = run(
            &mut queue,
            &keyboard_report(&[]),
            options(true, UnconsumedReportPolicy::QueuedOnly),
        );
        assert_eq!(checker.error_count(), 1);
        assert!(out.contains("keyboard report without queued assertions"));

        let (checker, _) = run(
            &mut queue,
            &keyboard_report(&[]),
            options(false, UnconsumedReportPolicy::QueuedOnly),
        );
        assert_eq!(checker.error_count(), 0);
    }

    #[test]
    fn permanent_assertions_cover_reports_under_any_assertion_policy() {
        let mut queue = AssertionQueue::new();
        queue.push_permanent(NoKeysActive);
        let report = keyboard_report(&[]);

        let (checker, _) = run(&mut queue, &report, options(true, UnconsumedReportPolicy::AnyAssertion));
        assert_eq!(checker.error_count(), 0);

        let (checker, _) = run(&mut queue, &report, options(true, UnconsumedReportPolicy::QueuedOnly));
        assert_eq!(checker.error_count(), 1);
    }

    #[test]
    fn log_only_mode_skips_assertions() {
        let mut queue = AssertionQueue::new();
        queue.push_queued(AnyKeycodeActive);
        let (checker, out) = run(
            &mut queue,
            &keyboard_report(&[]),
            DispatchOptions {
                mode: CycleMode::LogOnly,
                error_if_unconsumed: true,
                policy: UnconsumedReportPolicy::QueuedOnly,
            },
        );
        assert_eq!(checker.error_count(), 0);
        assert_eq!(queue.queued_len(), 1);
        assert!(out.contains("keyboard report"));
    }
}
