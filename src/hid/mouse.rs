//! Relative and absolute mouse report snapshots

use crate::error::HarnessError;
use crate::hid::ChannelKind;
use std::fmt;

const MOUSE_REPORT_LEN: usize = 5;
const ABSOLUTE_MOUSE_REPORT_LEN: usize = 6;

/// A relative mouse report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseReport {
    pub buttons: u8,
    pub x: i8,
    pub y: i8,
    pub v_wheel: i8,
    pub h_wheel: i8,
}

impl MouseReport {
    pub fn from_bytes(data: &[u8]) -> Result<Self, HarnessError> {
        if data.len() != MOUSE_REPORT_LEN {
            return Err(HarnessError::MalformedReport {
                kind: ChannelKind::Mouse,
                expected: MOUSE_REPORT_LEN,
                actual: data.len(),
            });
        }
        Ok(Self {
            buttons: data[0],
            x: data[1] as i8,
            y: data[2] as i8,
            v_wheel: data[3] as i8,
            h_wheel: data[4] as i8,
        })
    }

    /// True if every button in `mask` is pressed.
    pub fn are_buttons_pressed(&self, mask: u8) -> bool {
        (self.buttons & mask) == mask
    }

    pub fn is_moving(&self) -> bool {
        self.x != 0 || self.y != 0
    }

    pub fn is_scrolling(&self) -> bool {
        self.v_wheel != 0 || self.h_wheel != 0
    }
}

impl fmt::Display for MouseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mouse report: buttons 0b{:08b}, x {}, y {}, v-wheel {}, h-wheel {}",
            self.buttons, self.x, self.y, self.v_wheel, self.h_wheel
        )
    }
}

/// An absolute mouse report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbsoluteMouseReport {
    pub buttons: u8,
    pub x: u16,
    pub y: u16,
    pub wheel: i8,
}

impl AbsoluteMouseReport {
    /// Decode `buttons`, little-endian `x` and `y`, then `wheel`.
    pub fn from_bytes(data: &[u8]) -> Result<Self, HarnessError> {
        if data.len() != ABSOLUTE_MOUSE_REPORT_LEN {
            return Err(HarnessError::MalformedReport {
                kind: ChannelKind::AbsoluteMouse,
                expected: ABSOLUTE_MOUSE_REPORT_LEN,
                actual: data.len(),
            });
        }
        Ok(Self {
            buttons: data[0],
            x: u16::from_le_bytes([data[1], data[2]]),
            y: u16::from_le_bytes([data[3], data[4]]),
            wheel: data[5] as i8,
        })
    }

    pub fn position(&self) -> (u16, u16) {
        (self.x, self.y)
    }

    pub fn are_buttons_pressed(&self, mask: u8) -> bool {
        (self.buttons & mask) == mask
    }
}

impl fmt::Display for AbsoluteMouseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "absolute mouse report: buttons 0b{:08b}, position ({}, {}), wheel {}",
            self.buttons, self.x, self.y, self.wheel
        )
    }
}
