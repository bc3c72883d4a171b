//! Named test spans

use super::Orchestrator;
use std::ops::{Deref, DerefMut};

/// Guard around one named test
///
/// Opening a scope writes a header. Dropping it, on every exit path,
/// checks that all assertion queues were drained and reports whether any
/// error was recorded while the scope was open. The orchestrator stays
/// usable through the guard.
///
/// ```
/// use firmware_testkit::assertions::AnyKeycodeActive;
/// use firmware_testkit::firmware::{EchoFirmware, Keymap};
/// use firmware_testkit::orchestrator::{Orchestrator, OrchestratorSettings, Simulator};
///
/// let mut sim = Simulator::new(
///     EchoFirmware::new(Keymap::standard(4, 16)),
///     &OrchestratorSettings::default(),
/// );
/// {
///     let mut test = sim.new_test("press a");
///     test.keyboard_report_assertions().push_queued(AnyKeycodeActive);
///     test.press_key(0, 0).unwrap();
///     test.cycle().unwrap();
/// }
/// assert!(sim.core().test_outcomes()[0].passed);
/// ```
pub struct TestScope<'a, O: Orchestrator> {
    orchestrator: &'a mut O,
    name: String,
    errors_at_start: u32,
    started_at_ms: u64,
}

impl<'a, O: Orchestrator> TestScope<'a, O> {
    pub fn new(orchestrator: &'a mut O, name: &str) -> Self {
        orchestrator.core_mut().header(format_args!("Test: {}", name));
        let errors_at_start = orchestrator.error_count();
        let started_at_ms = orchestrator.time_ms();
        Self {
            orchestrator,
            name: name.to_string(),
            errors_at_start,
            started_at_ms,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<O: Orchestrator> Deref for TestScope<'_, O> {
    type Target = O;

    fn deref(&self) -> &O {
        self.orchestrator
    }
}

impl<O: Orchestrator> DerefMut for TestScope<'_, O> {
    fn deref_mut(&mut self) -> &mut O {
        self.orchestrator
    }
}

impl<O: Orchestrator> Drop for TestScope<'_, O> {
    fn drop(&mut self) {
        self.orchestrator.assert_nothing_queued();
        let errors = self
            .orchestrator
            .error_count()
            .saturating_sub(self.errors_at_start);
        let name = std::mem::take(&mut self.name);
        self.orchestrator
            .core_mut()
            .record_outcome(name, errors, self.started_at_ms);
    }
}
