//! Session report and export functionality

use crate::hid::ChannelKind;
use crate::orchestrator::{Orchestrator, TestOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Complete session report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    /// Report metadata
    pub metadata: ReportMetadata,
    /// Summary statistics
    pub summary: SessionSummary,
    /// Named test spans in the order they finished
    pub tests: Vec<TestOutcome>,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Report generation timestamp
    pub generated_at: String,
    /// Application version
    pub version: String,
    /// Simulated time at the end of the session
    pub simulated_time_ms: u64,
    /// Cycles run
    pub cycles: u64,
}

/// Session summary statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub error_count: u32,
    pub passed: bool,
    pub aborted: bool,
    pub reports: Vec<ChannelCount>,
}

/// Reports dispatched on one channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelCount {
    pub channel: ChannelKind,
    pub reports: u64,
}

impl SessionReport {
    /// Snapshot the state of an orchestrator
    pub fn new<O: Orchestrator + ?Sized>(orchestrator: &O) -> Self {
        let core = orchestrator.core();
        let now: DateTime<Utc> = Utc::now();

        Self {
            metadata: ReportMetadata {
                generated_at: now.to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                simulated_time_ms: core.time_ms(),
                cycles: core.cycle_id(),
            },
            summary: SessionSummary {
                error_count: core.error_count(),
                passed: core.passed(),
                aborted: core.is_aborted(),
                reports: ChannelKind::ALL
                    .into_iter()
                    .map(|channel| ChannelCount {
                        channel,
                        reports: core.report_count(channel),
                    })
                    .collect(),
            },
            tests: core.test_outcomes().to_vec(),
        }
    }

    /// Export report to JSON file
    pub fn export_json(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Export report to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
