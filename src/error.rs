//! Error types for the harness

use crate::hid::ChannelKind;
use thiserror::Error;

/// Errors raised by orchestrators, the key matrix and report decoding
#[derive(Debug, Error)]
pub enum HarnessError {
    /// An operation needs a non-zero cycle duration
    #[error("cycle duration must be set to a non-zero value")]
    CycleDurationUnset,
    /// `advance_time_to` was asked to go backwards
    #[error("target time {target_ms} ms lies before current time {now_ms} ms")]
    TimeInPast { target_ms: u64, now_ms: u64 },
    /// `advance_time_by` target beyond the representable time
    #[error("skipping {delta_ms} ms from {now_ms} ms overflows the simulated clock")]
    ClockOverflow { now_ms: u64, delta_ms: u64 },
    /// Key coordinates outside of the matrix
    #[error("key ({row}, {col}) is outside of the {rows}x{cols} matrix")]
    KeyOutOfRange {
        row: u8,
        col: u8,
        rows: u8,
        cols: u8,
    },
    /// A key-event input line could not be parsed
    #[error("invalid key event `{0}`")]
    InvalidKeyEvent(String),
    /// A HID payload has the wrong length
    #[error("malformed {kind} report: expected {expected} bytes, got {actual}")]
    MalformedReport {
        kind: ChannelKind,
        expected: usize,
        actual: usize,
    },
    /// A HID report id the harness does not consume
    #[error("unknown HID report id {0}")]
    UnknownReportId(u8),
    /// The run stopped after the first error
    #[error("run aborted after first error")]
    Aborted,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
