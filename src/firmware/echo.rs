//! Reference firmware that echoes matrix changes as HID reports
//!
//! Each press or release of a mapped key produces one report reflecting the
//! new state. Held mouse movement keys additionally produce one movement
//! report per scan.

use super::{Firmware, ReportSink, ScanInput};
use crate::hid::{AbsoluteMouseReport, KeyboardReport, MouseReport, Report};
use crate::matrix::KeyEventType;

/// First keycode assigned by [`Keymap::standard`] (`a`)
const FIRST_LETTER_KEYCODE: u8 = 0x04;
/// Last non-modifier keycode a standard keymap assigns
const LAST_KEYCODE: u8 = 0xDF;

/// What a matrix position does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyAction {
    #[default]
    None,
    /// Keyboard keycode (modifiers are 0xE0..=0xE7)
    Key(u8),
    /// Mouse button mask
    MouseButton(u8),
    /// Relative movement emitted every scan while held
    MouseMove { x: i8, y: i8 },
    /// Absolute pointer warp emitted on press
    AbsolutePosition { x: u16, y: u16 },
}

/// Mapping from matrix positions to actions
#[derive(Debug, Clone)]
pub struct Keymap {
    rows: u8,
    cols: u8,
    actions: Vec<KeyAction>,
}

impl Keymap {
    pub fn new(rows: u8, cols: u8) -> Self {
        Self {
            rows,
            cols,
            actions: vec![KeyAction::None; rows as usize * cols as usize],
        }
    }

    /// Keycodes counting up from `a` in row-major order on all rows but
    /// the last; the last row carries modifiers and mouse keys.
    pub fn standard(rows: u8, cols: u8) -> Self {
        let mut keymap = Self::new(rows, cols);
        if rows == 0 {
            return keymap;
        }
        let mut keycode = FIRST_LETTER_KEYCODE;
        for row in 0..rows - 1 {
            for col in 0..cols {
                if keycode > LAST_KEYCODE {
                    break;
                }
                keymap.set(row, col, KeyAction::Key(keycode));
                keycode += 1;
            }
        }
        let special = [
            KeyAction::Key(0xE0),
            KeyAction::Key(0xE1),
            KeyAction::Key(0xE2),
            KeyAction::Key(0xE3),
            KeyAction::MouseButton(0b001),
            KeyAction::MouseButton(0b010),
            KeyAction::MouseButton(0b100),
            KeyAction::MouseMove { x: 0, y: -1 },
            KeyAction::MouseMove { x: 0, y: 1 },
            KeyAction::MouseMove { x: -1, y: 0 },
            KeyAction::MouseMove { x: 1, y: 0 },
            KeyAction::AbsolutePosition {
                x: 0x4000,
                y: 0x4000,
            },
        ];
        for (col, action) in special.into_iter().enumerate().take(cols as usize) {
            keymap.set(rows - 1, col as u8, action);
        }
        keymap
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    pub fn cols(&self) -> u8 {
        self.cols
    }

    /// Positions outside the keymap are ignored.
    pub fn set(&mut self, row: u8, col: u8, action: KeyAction) {
        if row < self.rows && col < self.cols {
            self.actions[row as usize * self.cols as usize + col as usize] = action;
        }
    }

    pub fn get(&self, row: u8, col: u8) -> KeyAction {
        if row < self.rows && col < self.cols {
            self.actions[row as usize * self.cols as usize + col as usize]
        } else {
            KeyAction::None
        }
    }
}

/// Firmware that reports matrix transitions through a [`Keymap`]
#[derive(Debug, Clone)]
pub struct EchoFirmware {
    keymap: Keymap,
    keyboard: KeyboardReport,
    mouse_buttons: u8,
}

impl EchoFirmware {
    pub fn new(keymap: Keymap) -> Self {
        Self {
            keymap,
            keyboard: KeyboardReport::new(),
            mouse_buttons: 0,
        }
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }
}

impl Firmware for EchoFirmware {
    fn scan(&mut self, input: &ScanInput<'_>, sink: &mut dyn ReportSink) {
        for event in input.matrix.pending_events() {
            let pressed = event.event_type == KeyEventType::Press;
            match self.keymap.get(event.row, event.col) {
                KeyAction::None | KeyAction::MouseMove { .. } => {}
                KeyAction::Key(keycode) => {
                    self.keyboard.set_keycode(keycode, pressed);
                    sink.emit(Report::Keyboard(self.keyboard.clone()));
                }
                KeyAction::MouseButton(mask) => {
                    if pressed {
                        self.mouse_buttons |= mask;
                    } else {
                        self.mouse_buttons &= !mask;
                    }
                    sink.emit(Report::Mouse(MouseReport {
                        buttons: self.mouse_buttons,
                        ..MouseReport::default()
                    }));
                }
                KeyAction::AbsolutePosition { x, y } => {
                    if pressed {
                        sink.emit(Report::AbsoluteMouse(AbsoluteMouseReport {
                            buttons: self.mouse_buttons,
                            x,
                            y,
                            wheel: 0,
                        }));
                    }
                }
            }
        }

        let (mut dx, mut dy) = (0i8, 0i8);
        for (row, col) in input.matrix.pressed_keys() {
            if let KeyAction::MouseMove { x, y } = self.keymap.get(row, col) {
                dx = dx.saturating_add(x);
                dy = dy.saturating_add(y);
            }
        }
        if dx != 0 || dy != 0 {
            sink.emit(Report::Mouse(MouseReport {
                buttons: self.mouse_buttons,
                x: dx,
                y: dy,
                ..MouseReport::default()
            }));
        }
    }
}
