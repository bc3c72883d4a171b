//! Integration tests for Firmware TestKit
//!
//! These tests drive complete cycles through the public API: key matrix
//! changes, firmware scans, report dispatch, end-of-cycle checks, test
//! scopes and the run loops.

use firmware_testkit::assertions::{
    AbsolutePosition, AnyKeycodeActive, AssertionContext, Condition, KeyPressed, KeycodeActive,
    MouseButtonsPressed, NoKeysActive, ReportNthInCycle, ReportsInCycle,
};
use firmware_testkit::config::Config;
use firmware_testkit::firmware::{EchoFirmware, Keymap, ReportSink, ScanInput};
use firmware_testkit::hid::{ChannelKind, HID_REPORTID_KEYBOARD, HID_REPORTID_MOUSE_ABSOLUTE};
use firmware_testkit::output::OutputSink;
use firmware_testkit::test_helpers::{RecordingFirmware, SharedBuffer};
use firmware_testkit::{
    Driver, HarnessError, Orchestrator, OrchestratorSettings, SessionReport, Simulator,
};
use std::cell::Cell;
use std::io::Cursor;
use std::rc::Rc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn settings() -> OrchestratorSettings {
    OrchestratorSettings::default()
}

/// Simulator running the reference firmware on a 4x16 matrix
fn echo_simulator(settings: &OrchestratorSettings) -> (Simulator<EchoFirmware>, SharedBuffer) {
    let buffer = SharedBuffer::new();
    let sim = Simulator::with_sink(
        EchoFirmware::new(Keymap::standard(settings.rows, settings.cols)),
        settings,
        OutputSink::new(Box::new(buffer.clone())),
    );
    (sim, buffer)
}

fn recording_simulator() -> (Simulator<RecordingFirmware>, RecordingFirmware) {
    let firmware = RecordingFirmware::new();
    let sim = Simulator::with_sink(
        firmware.clone(),
        &settings(),
        OutputSink::new(Box::new(SharedBuffer::new())),
    );
    (sim, firmware)
}

/// Condition that counts how often it was evaluated
fn counting(text: &str) -> (Condition<impl Fn(&AssertionContext<'_>) -> bool>, Rc<Cell<u32>>) {
    let count = Rc::new(Cell::new(0));
    let seen = Rc::clone(&count);
    let condition = Condition::new(text, move |_| {
        seen.set(seen.get() + 1);
        true
    });
    (condition, count)
}

// ---------------------------------------------------------------------------
// Report dispatch
// ---------------------------------------------------------------------------

#[test]
fn pressed_key_satisfies_queued_keyboard_assertion() {
    let (mut sim, _) = echo_simulator(&settings());
    sim.keyboard_report_assertions().push_queued(AnyKeycodeActive);

    sim.press_key(1, 2).unwrap();
    sim.cycle().unwrap();

    assert_eq!(sim.overall_reports(ChannelKind::Keyboard), 1);
    assert!(sim.keyboard_report_assertions().is_empty());
    assert_eq!(sim.error_count(), 0);
    assert!(sim.passed());
}

#[test]
fn unconsumed_report_adds_exactly_one_error() {
    let (mut sim, buffer) = echo_simulator(&OrchestratorSettings {
        error_if_report_without_queued_assertions: true,
        ..settings()
    });

    sim.press_key(0, 0).unwrap();
    sim.cycle().unwrap();

    assert_eq!(sim.error_count(), 1);
    assert_eq!(
        buffer.count_lines_containing("keyboard report without queued assertions"),
        1
    );
}

#[test]
fn queued_assertions_drain_in_insertion_order() {
    let (mut sim, _) = echo_simulator(&settings());
    sim.keyboard_report_assertions()
        .push_queued(KeycodeActive(0x04))
        .push_queued(NoKeysActive)
        .push_queued(KeycodeActive(0x05))
        .push_queued(NoKeysActive);

    sim.tap_key(0, 0).unwrap();
    sim.cycle().unwrap();
    assert_eq!(sim.keyboard_report_assertions().queued_len(), 2);

    sim.tap_key(0, 1).unwrap();
    sim.cycle().unwrap();

    assert_eq!(sim.error_count(), 0);
    assert!(sim.keyboard_report_assertions().is_empty());
}

#[test]
fn reports_are_numbered_within_their_cycle() {
    let (mut sim, _) = echo_simulator(&settings());
    sim.keyboard_report_assertions()
        .push_queued(ReportNthInCycle(1))
        .push_queued(ReportNthInCycle(2))
        .push_queued(ReportNthInCycle(1));
    sim.cycle_assertions()
        .push_queued(ReportsInCycle(2))
        .push_queued(ReportsInCycle(1));

    sim.tap_key(0, 0).unwrap();
    sim.cycle().unwrap();
    sim.press_key(0, 0).unwrap();
    sim.cycle().unwrap();

    assert_eq!(sim.error_count(), 0);
}

#[test]
fn permanent_assertions_run_once_per_trigger() {
    let (mut sim, _) = echo_simulator(&settings());
    sim.keyboard_report_assertions().push_permanent(KeyPressed { row: 0, col: 0 });
    sim.cycle_assertions().push_permanent(ReportsInCycle(1));

    sim.press_key(0, 0).unwrap();
    sim.cycle().unwrap();
    sim.cycle().unwrap();
    sim.cycle().unwrap();

    let report_checks = sim.keyboard_report_assertions().permanent_entries()[0].evaluations();
    let cycle_checks = sim.cycle_assertions().permanent_entries()[0].evaluations();
    assert_eq!(report_checks, 1);
    assert_eq!(cycle_checks, 3);
    // The two idle cycles had no report.
    assert_eq!(sim.error_count(), 2);
}

#[test]
fn mouse_and_absolute_reports_use_their_own_queues() {
    let mut fired = false;
    let firmware = move |input: &ScanInput<'_>, sink: &mut dyn ReportSink| {
        if input.matrix.is_pressed(0, 0) && !fired {
            fired = true;
            sink.emit_hid(HID_REPORTID_MOUSE_ABSOLUTE, &[1, 0x00, 0x10, 0x00, 0x20, 0])
                .unwrap();
        }
    };
    let mut sim = Simulator::with_sink(
        firmware,
        &settings(),
        OutputSink::new(Box::new(SharedBuffer::new())),
    );
    sim.absolute_mouse_report_assertions()
        .push_queued(AbsolutePosition { x: 0x1000, y: 0x2000 });
    sim.keyboard_report_assertions().push_queued(AnyKeycodeActive);

    sim.press_key(0, 0).unwrap();
    sim.cycles(2).unwrap();

    assert_eq!(sim.error_count(), 0);
    assert!(sim.absolute_mouse_report_assertions().is_empty());
    assert_eq!(sim.keyboard_report_assertions().queued_len(), 1);
    assert_eq!(sim.overall_reports(ChannelKind::AbsoluteMouse), 1);
}

#[test]
fn boot_report_with_reserved_keycode_is_checked_not_fatal() {
    let firmware = |input: &ScanInput<'_>, sink: &mut dyn ReportSink| {
        if input.matrix.is_pressed(0, 0) {
            sink.emit_hid(HID_REPORTID_KEYBOARD, &[0, 0, 0xE8, 0x04, 0, 0, 0, 0])
                .unwrap();
        }
    };
    let mut sim = Simulator::with_sink(
        firmware,
        &settings(),
        OutputSink::new(Box::new(SharedBuffer::new())),
    );
    sim.keyboard_report_assertions().push_queued(KeycodeActive(0x04));

    sim.press_key(0, 0).unwrap();
    sim.cycle().unwrap();

    assert_eq!(sim.error_count(), 0);
    assert!(sim.keyboard_report_assertions().is_empty());
}

#[test]
fn expected_reports_include_assertions_queued_earlier() {
    let (mut sim, buffer) = echo_simulator(&settings());
    sim.keyboard_report_assertions()
        .push_queued(NoKeysActive)
        .push_queued(NoKeysActive);

    let ok = sim
        .cycle_expect_reports(vec![Box::new(AnyKeycodeActive)])
        .unwrap();

    assert!(!ok);
    assert_eq!(sim.error_count(), 1);
    assert!(buffer
        .contents()
        .contains("Expected 3 keyboard reports in cycle, got 0"));
    assert_eq!(sim.keyboard_report_assertions().queued_len(), 3);
}

#[test]
fn echo_firmware_mouse_keys_reach_the_mouse_queue() {
    let (mut sim, _) = echo_simulator(&settings());
    sim.mouse_report_assertions()
        .push_queued(MouseButtonsPressed(0b001))
        .push_queued(MouseButtonsPressed(0b011));

    sim.press_key(3, 4).unwrap();
    sim.cycle().unwrap();
    sim.press_key(3, 5).unwrap();
    sim.cycle().unwrap();

    assert_eq!(sim.error_count(), 0);
    assert_eq!(sim.overall_reports(ChannelKind::Mouse), 2);
}

// ---------------------------------------------------------------------------
// Key matrix and timing
// ---------------------------------------------------------------------------

#[test]
fn multi_tap_interleaves_taps_and_cycles() {
    let (mut sim, firmware) = recording_simulator();
    let (released, checks) = counting("key released");

    sim.multi_tap_key(3, 2, 5, 2, Some(&released)).unwrap();

    assert_eq!(sim.cycle_id(), 6);
    assert_eq!(checks.get(), 3);
    let scans = firmware.scans();
    let events: Vec<usize> = scans.borrow().iter().map(|scan| scan.events.len()).collect();
    assert_eq!(events, vec![2, 0, 2, 0, 2, 0]);
    assert!(!sim.core().matrix().is_any_pressed());
}

#[test]
fn advance_time_stops_at_first_cycle_boundary_reached() {
    for (delta, expected_time, expected_cycles) in
        [(0, 0, 0), (1, 5, 1), (4, 5, 1), (5, 5, 1), (6, 10, 2), (11, 15, 3)]
    {
        let (mut sim, _) = recording_simulator();
        sim.advance_time_by(delta).unwrap();
        assert_eq!(sim.time_ms(), expected_time, "delta {}", delta);
        assert_eq!(sim.cycle_id(), expected_cycles, "delta {}", delta);
    }
}

#[test]
fn advance_time_logs_reports_without_consuming_assertions() {
    let (mut sim, buffer) = echo_simulator(&OrchestratorSettings {
        error_if_report_without_queued_assertions: true,
        ..settings()
    });
    sim.keyboard_report_assertions().push_queued(NoKeysActive);

    sim.press_key(0, 0).unwrap();
    sim.advance_time_to(20).unwrap();

    assert_eq!(sim.time_ms(), 20);
    assert_eq!(sim.error_count(), 0);
    assert_eq!(sim.keyboard_report_assertions().queued_len(), 1);
    assert!(buffer.contents().contains("keyboard report: keycodes [0x04]"));

    // The next full cycle consumes the assertion with the release report.
    sim.release_key(0, 0).unwrap();
    sim.cycle().unwrap();
    assert!(sim.assert_nothing_queued());
}

#[test]
fn clear_all_keys_releases_everything() {
    let (mut sim, _) = echo_simulator(&settings());
    sim.press_key(0, 0).unwrap();
    sim.press_key(1, 1).unwrap();
    sim.cycle().unwrap();

    sim.keyboard_report_assertions()
        .push_queued(AnyKeycodeActive)
        .push_queued(NoKeysActive);
    sim.clear_all_keys().unwrap();
    sim.cycle().unwrap();

    assert_eq!(sim.error_count(), 0);
    assert!(!sim.core().matrix().is_any_pressed());
}

// ---------------------------------------------------------------------------
// Error policy
// ---------------------------------------------------------------------------

#[test]
fn abort_on_first_error_stops_before_second_assertion() {
    let (mut sim, buffer) = echo_simulator(&OrchestratorSettings {
        abort_on_first_error: true,
        ..settings()
    });
    sim.keyboard_report_assertions()
        .push_queued(KeycodeActive(0x05))
        .push_queued(AnyKeycodeActive);

    sim.tap_key(0, 0).unwrap();
    assert!(matches!(sim.cycle(), Err(HarnessError::Aborted)));

    assert_eq!(sim.error_count(), 1);
    assert_eq!(sim.keyboard_report_assertions().queued_len(), 1);
    assert_eq!(buffer.count_lines_containing("Assertion failed"), 1);
    assert!(buffer.contents().contains("Aborting after first error"));

    assert!(matches!(sim.cycle(), Err(HarnessError::Aborted)));
    assert!(matches!(sim.press_key(0, 1), Err(HarnessError::Aborted)));
    assert_eq!(sim.error_count(), 1);
}

#[test]
fn nothing_queued_fails_iff_some_queue_holds_assertions() {
    let (mut sim, _) = echo_simulator(&settings());
    assert!(sim.assert_nothing_queued());
    assert_eq!(sim.error_count(), 0);

    type Fill = fn(&mut Simulator<EchoFirmware>);
    let fills: [Fill; 5] = [
        |sim| {
            sim.keyboard_report_assertions().push_queued(NoKeysActive);
        },
        |sim| {
            sim.mouse_report_assertions().push_permanent(NoKeysActive);
        },
        |sim| {
            sim.absolute_mouse_report_assertions().push_queued(NoKeysActive);
        },
        |sim| {
            sim.cycle_assertions().push_queued(NoKeysActive);
        },
        |sim| {
            sim.cycle_assertions().push_permanent(NoKeysActive);
        },
    ];
    for fill in fills {
        let (mut sim, _) = echo_simulator(&settings());
        fill(&mut sim);
        assert!(!sim.assert_nothing_queued());
        assert_eq!(sim.error_count(), 1);
    }
}

#[test]
fn cycle_duration_is_required_for_time_skips() {
    let (mut sim, _) = echo_simulator(&OrchestratorSettings {
        cycle_duration_ms: 0,
        ..settings()
    });
    assert!(matches!(
        sim.advance_time_by(5),
        Err(HarnessError::CycleDurationUnset)
    ));
    assert!(matches!(
        sim.run_realtime(5, |_| {}),
        Err(HarnessError::CycleDurationUnset)
    ));
    assert_eq!(sim.error_count(), 2);
}

// ---------------------------------------------------------------------------
// Test scopes and session report
// ---------------------------------------------------------------------------

#[test]
fn test_scopes_report_pass_and_fail() {
    let (mut sim, buffer) = echo_simulator(&settings());
    {
        let mut test = sim.new_test("type a");
        test.keyboard_report_assertions()
            .push_queued(KeycodeActive(0x04))
            .push_queued(NoKeysActive);
        test.tap_key(0, 0).unwrap();
        test.cycle().unwrap();
    }
    {
        let mut test = sim.new_test("wrong key");
        test.keyboard_report_assertions().push_queued(KeycodeActive(0x06));
        test.tap_key(0, 1).unwrap();
        test.cycle().unwrap();
    }

    let outcomes = sim.core().test_outcomes();
    assert!(outcomes[0].passed);
    assert!(!outcomes[1].passed);
    // The unchecked release report is allowed by default.
    assert_eq!(outcomes[1].errors, 1);

    let report = SessionReport::new(&sim);
    assert_eq!(report.summary.error_count, 1);
    assert_eq!(report.tests.len(), 2);

    let out = buffer.contents();
    assert!(out.contains("# Test: type a"));
    assert!(out.contains("# Test wrong key: failed with 1 error(s)"));
}

// ---------------------------------------------------------------------------
// Run loops
// ---------------------------------------------------------------------------

#[test]
fn remote_controlled_loop_checks_each_line() {
    let (mut sim, _) = echo_simulator(&OrchestratorSettings {
        error_if_report_without_queued_assertions: true,
        ..settings()
    });
    sim.keyboard_report_assertions()
        .push_queued(KeycodeActive(0x16))
        .push_queued(NoKeysActive)
        .push_queued(KeycodeActive(0x04))
        .push_queued(NoKeysActive);

    let input = Cursor::new("p 1 2
# idle
r 1 2
tap 0 0
");
    let mut times = Vec::new();
    sim.run_remote_controlled(input, |sim| times.push(sim.time_ms()))
        .unwrap();

    assert_eq!(times, vec![5, 10, 15, 20]);
    assert_eq!(sim.error_count(), 0);
    assert!(sim.assert_nothing_queued());
}

#[test]
fn realtime_loop_tracks_simulated_time() {
    let (mut sim, _) = echo_simulator(&settings());
    let mut cycles = Vec::new();
    sim.run_realtime(15, |sim| cycles.push(sim.cycle_id())).unwrap();
    assert_eq!(cycles, vec![1, 2, 3]);
    assert_eq!(sim.time_ms(), 15);
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

#[test]
fn driver_checks_keyboard_reports_only() {
    let buffer = SharedBuffer::new();
    let mut driver = Driver::with_sink(
        EchoFirmware::new(Keymap::standard(4, 16)),
        &OrchestratorSettings {
            error_if_report_without_queued_assertions: true,
            ..settings()
        },
        OutputSink::new(Box::new(buffer.clone())),
    );
    driver.keyboard_report_assertions().push_queued(AnyKeycodeActive);

    driver.press_key(3, 4).unwrap();
    driver.press_key(0, 0).unwrap();
    driver.cycle().unwrap();

    assert_eq!(driver.error_count(), 0);
    assert_eq!(driver.keyboard_reports_in_cycle(), 1);
    assert_eq!(driver.overall_keyboard_reports(), 1);
    assert!(driver
        .current_keyboard_report()
        .unwrap()
        .is_keycode_active(0x04));
}

// ---------------------------------------------------------------------------
// Configuration and output
// ---------------------------------------------------------------------------

#[test]
fn config_builds_orchestrator_settings() {
    let mut config = Config::default();
    config.orchestrator.cycle_duration_ms = 2;
    config.matrix.rows = 2;
    config.matrix.cols = 3;

    let (mut sim, _) = echo_simulator(&config.orchestrator_settings());
    assert!(sim.press_key(1, 2).is_ok());
    assert!(matches!(
        sim.press_key(2, 0),
        Err(HarnessError::KeyOutOfRange { rows: 2, cols: 3, .. })
    ));
    sim.cycle().unwrap();
    assert_eq!(sim.time_ms(), 2);
}

#[test]
fn output_can_be_redirected_mid_run() {
    let (mut sim, first) = echo_simulator(&settings());
    let second = SharedBuffer::new();

    sim.assert_condition(false, "before redirect");
    sim.core_mut().set_output(Box::new(second.clone()));
    sim.assert_condition(false, "after redirect");

    assert!(first.contents().contains("before redirect"));
    assert!(!first.contents().contains("after redirect"));
    assert!(second.contents().contains("after redirect"));
    assert_eq!(sim.error_count(), 2);
}
