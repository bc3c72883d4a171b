//! HID report snapshots delivered by the firmware
//!
//! Reports are immutable once constructed. Assertions only ever see them
//! through the read-only query methods.

mod keyboard;
mod mouse;

pub use keyboard::{KeyboardReport, KEY_BYTES, MODIFIER_KEYCODE_BASE};
pub use mouse::{AbsoluteMouseReport, MouseReport};

use crate::error::HarnessError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Report id of relative mouse reports
pub const HID_REPORTID_MOUSE: u8 = 1;
/// Report id of boot protocol keyboard reports
pub const HID_REPORTID_KEYBOARD: u8 = 2;
/// Report id of absolute mouse reports
pub const HID_REPORTID_MOUSE_ABSOLUTE: u8 = 7;
/// Report id of NKRO keyboard reports
pub const HID_REPORTID_NKRO_KEYBOARD: u8 = 8;

/// The report channel a report or an assertion queue belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    Keyboard,
    Mouse,
    AbsoluteMouse,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 3] = [
        ChannelKind::Keyboard,
        ChannelKind::Mouse,
        ChannelKind::AbsoluteMouse,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Keyboard => "keyboard",
            Self::Mouse => "mouse",
            Self::AbsoluteMouse => "absolute mouse",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Keyboard => 0,
            Self::Mouse => 1,
            Self::AbsoluteMouse => 2,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One report emitted by the firmware during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Keyboard(KeyboardReport),
    Mouse(MouseReport),
    AbsoluteMouse(AbsoluteMouseReport),
}

impl Report {
    /// Decode a raw HID payload.
    pub fn from_hid(report_id: u8, data: &[u8]) -> Result<Self, HarnessError> {
        match report_id {
            HID_REPORTID_NKRO_KEYBOARD => KeyboardReport::from_bytes(data).map(Report::Keyboard),
            HID_REPORTID_KEYBOARD => KeyboardReport::from_boot_bytes(data).map(Report::Keyboard),
            HID_REPORTID_MOUSE => MouseReport::from_bytes(data).map(Report::Mouse),
            HID_REPORTID_MOUSE_ABSOLUTE => {
                AbsoluteMouseReport::from_bytes(data).map(Report::AbsoluteMouse)
            }
            other => Err(HarnessError::UnknownReportId(other)),
        }
    }

    pub fn channel(&self) -> ChannelKind {
        match self {
            Self::Keyboard(_) => ChannelKind::Keyboard,
            Self::Mouse(_) => ChannelKind::Mouse,
            Self::AbsoluteMouse(_) => ChannelKind::AbsoluteMouse,
        }
    }

    pub fn as_keyboard(&self) -> Option<&KeyboardReport> {
        match self {
            Self::Keyboard(report) => Some(report),
            _ => None,
        }
    }

    pub fn as_mouse(&self) -> Option<&MouseReport> {
        match self {
            Self::Mouse(report) => Some(report),
            _ => None,
        }
    }

    pub fn as_absolute_mouse(&self) -> Option<&AbsoluteMouseReport> {
        match self {
            Self::AbsoluteMouse(report) => Some(report),
            _ => None,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyboard(report) => report.fmt(f),
            Self::Mouse(report) => report.fmt(f),
            Self::AbsoluteMouse(report) => report.fmt(f),
        }
    }
}
