//! Multi-channel orchestrator with run loops

use super::dispatch::CycleSink;
use super::{CycleCore, CycleMode, Orchestrator, OrchestratorSettings};
use crate::assertions::{Assertion, AssertionQueue, AssertionQueueBundle};
use crate::error::HarnessError;
use crate::firmware::{Firmware, ScanInput};
use crate::hid::ChannelKind;
use crate::matrix::KeyCommand;
use crate::output::OutputSink;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Orchestrator checking keyboard, mouse and absolute mouse reports
#[derive(Debug)]
pub struct Simulator<F> {
    core: CycleCore,
    firmware: F,
    report_assertions: AssertionQueueBundle,
    stop: Arc<AtomicBool>,
}

impl<F: Firmware> Simulator<F> {
    /// Simulator writing to stdout
    pub fn new(firmware: F, settings: &OrchestratorSettings) -> Self {
        Self::with_sink(firmware, settings, OutputSink::stdout())
    }

    pub fn with_sink(firmware: F, settings: &OrchestratorSettings, sink: OutputSink) -> Self {
        Self {
            core: CycleCore::new("Simulator", settings, sink),
            firmware,
            report_assertions: AssertionQueueBundle::new(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn report_assertions_mut(&mut self) -> &mut AssertionQueueBundle {
        &mut self.report_assertions
    }

    pub fn keyboard_report_assertions(&mut self) -> &mut AssertionQueue {
        self.report_assertions.bundle_for(ChannelKind::Keyboard)
    }

    pub fn mouse_report_assertions(&mut self) -> &mut AssertionQueue {
        self.report_assertions.bundle_for(ChannelKind::Mouse)
    }

    pub fn absolute_mouse_report_assertions(&mut self) -> &mut AssertionQueue {
        self.report_assertions.bundle_for(ChannelKind::AbsoluteMouse)
    }

    /// Reports of a channel seen since the start of the run
    pub fn overall_reports(&self, channel: ChannelKind) -> u64 {
        self.core.report_count(channel)
    }

    pub fn firmware(&self) -> &F {
        &self.firmware
    }

    pub fn firmware_mut(&mut self) -> &mut F {
        &mut self.firmware
    }

    /// Jump the simulated clock without running cycles.
    pub fn set_time(&mut self, time_ms: u64) {
        self.core.log(format_args!("Setting time to {} ms", time_ms));
        self.core.clock.time_ms = time_ms;
    }

    /// Queue keyboard report assertions, run one cycle and record an error
    /// if the cycle left any queued keyboard assertion unconsumed.
    ///
    /// Assertions already queued count towards the expected reports and are
    /// consumed first. Leftovers stay queued.
    pub fn cycle_expect_reports(
        &mut self,
        assertions: Vec<Box<dyn Assertion>>,
    ) -> Result<bool, HarnessError> {
        let expected = self.report_assertions.queue(ChannelKind::Keyboard).queued_len()
            + assertions.len();
        self.keyboard_report_assertions().extend_queued(assertions);
        self.cycle()?;

        let left = self.report_assertions.queue(ChannelKind::Keyboard).queued_len();
        if left == 0 {
            return Ok(true);
        }
        self.core.error(format_args!(
            "Expected {} keyboard reports in cycle, got {}",
            expected,
            expected.saturating_sub(left)
        ));
        Ok(false)
    }

    /// Flag that stops [`Simulator::run_realtime`] at the next cycle boundary.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Run full cycles paced so that simulated time tracks wall-clock time.
    ///
    /// `on_cycle` runs after every cycle. The loop ends once `duration_ms`
    /// of simulated time have passed, or only through the stop handle when
    /// `duration_ms` is zero.
    pub fn run_realtime<C>(&mut self, duration_ms: u64, mut on_cycle: C) -> Result<(), HarnessError>
    where
        C: FnMut(&mut Self),
    {
        self.core.require_cycle_duration()?;
        let start_ms = self.core.time_ms();
        let start = Instant::now();
        if duration_ms == 0 {
            self.core.header("Running in realtime until stopped");
        } else {
            self.core
                .header(format_args!("Running in realtime for {} ms", duration_ms));
        }

        loop {
            if self.stop_requested() {
                log::info!("realtime loop stopped at {} ms", self.core.time_ms());
                break;
            }
            let simulated_ms = self.core.time_ms().saturating_sub(start_ms);
            if duration_ms != 0 && simulated_ms >= duration_ms {
                break;
            }

            self.cycle()?;
            on_cycle(self);

            let simulated =
                Duration::from_millis(self.core.time_ms().saturating_sub(start_ms));
            let elapsed = start.elapsed();
            if simulated > elapsed {
                thread::sleep(simulated - elapsed);
            }
        }
        Ok(())
    }

    /// Run one full cycle per input line, applying the line's key commands
    /// first. Ends at end of input.
    ///
    /// Lines that fail to parse are recorded as errors and still cycle.
    pub fn run_remote_controlled<R, C>(&mut self, input: R, mut on_cycle: C) -> Result<(), HarnessError>
    where
        R: BufRead,
        C: FnMut(&mut Self),
    {
        self.core.header("Running remote controlled");
        for line in input.lines() {
            let line = line?;
            match KeyCommand::parse_line(&line) {
                Ok(commands) => {
                    for command in commands {
                        self.apply(command)?;
                    }
                }
                Err(e) => {
                    self.core.fail(e);
                }
            }
            self.cycle()?;
            on_cycle(self);
        }
        log::info!("remote input ended after cycle {}", self.core.cycle_id());
        Ok(())
    }

    /// Apply one key command. Keys outside the matrix are recorded and
    /// skipped.
    fn apply(&mut self, command: KeyCommand) -> Result<(), HarnessError> {
        let result = match command {
            KeyCommand::Press { row, col } => self.press_key(row, col),
            KeyCommand::Release { row, col } => self.release_key(row, col),
            KeyCommand::Tap { row, col } => self.tap_key(row, col),
        };
        match result {
            Err(HarnessError::Aborted) => Err(HarnessError::Aborted),
            _ => Ok(()),
        }
    }
}

impl<F: Firmware> Orchestrator for Simulator<F> {
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
            route: &mut self.report_assertions,
            cycle_id: core.clock.cycle_id,
            time_ms: core.clock.time_ms,
            options,
        };
        self.firmware.scan(&input, &mut sink);
    }

    fn check_report_queues_drained(&mut self) -> bool {
        let mut drained = true;
        for channel in ChannelKind::ALL {
            let what = format!("{} report", channel);
            drained &= self
                .core
                .check_drained(&what, self.report_assertions.queue(channel));
        }
        drained
    }
}
