//! Firmware TestKit - cycle-accurate test harness for keyboard firmware
//!
//! A firmware scan routine runs once per simulated cycle against a
//! simulated key matrix. Every HID report it emits is checked against
//! queued and permanent assertions, and a named test passes when no error
//! was recorded while it ran.

pub mod assertions;
pub mod config;
pub mod error;
pub mod firmware;
pub mod hid;
pub mod matrix;
pub mod orchestrator;
pub mod output;
pub mod report;
pub mod test_helpers;

pub use config::Config;
pub use error::HarnessError;
pub use orchestrator::{Driver, Orchestrator, OrchestratorSettings, Simulator, TestScope};
pub use report::SessionReport;
