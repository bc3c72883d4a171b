//! Key matrix state tracking

use super::{KeyEvent, KeyEventType};
use crate::error::HarnessError;

/// Pressed/released state of every key plus the transitions that happened
/// since the firmware last scanned the matrix
#[derive(Debug, Clone)]
pub struct KeyMatrix {
    rows: u8,
    cols: u8,
    pressed: Vec<bool>,
    pending: Vec<KeyEvent>,
}

impl KeyMatrix {
    pub fn new(rows: u8, cols: u8) -> Self {
        Self {
            rows,
            cols,
            pressed: vec![false; rows as usize * cols as usize],
            pending: Vec::new(),
        }
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    pub fn cols(&self) -> u8 {
        self.cols
    }

    fn index(&self, row: u8, col: u8) -> Result<usize, HarnessError> {
        if row >= self.rows || col >= self.cols {
            return Err(HarnessError::KeyOutOfRange {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(row as usize * self.cols as usize + col as usize)
    }

    /// Press a key. Returns whether the state changed.
    pub fn press(&mut self, row: u8, col: u8) -> Result<bool, HarnessError> {
        self.set(row, col, KeyEventType::Press)
    }

    /// Release a key. Returns whether the state changed.
    pub fn release(&mut self, row: u8, col: u8) -> Result<bool, HarnessError> {
        self.set(row, col, KeyEventType::Release)
    }

    /// Press and release a key before the next scan.
    pub fn tap(&mut self, row: u8, col: u8) -> Result<(), HarnessError> {
        self.press(row, col)?;
        self.release(row, col)?;
        Ok(())
    }

    fn set(&mut self, row: u8, col: u8, event_type: KeyEventType) -> Result<bool, HarnessError> {
        let idx = self.index(row, col)?;
        let pressed = event_type == KeyEventType::Press;
        if self.pressed[idx] == pressed {
            return Ok(false);
        }
        self.pressed[idx] = pressed;
        self.pending.push(KeyEvent::new(row, col, event_type));
        Ok(true)
    }

    /// Release every pressed key.
    pub fn release_all(&mut self) {
        for (row, col) in self.pressed_keys() {
            // coordinates come from the matrix itself
            let _ = self.release(row, col);
        }
    }

    pub fn is_pressed(&self, row: u8, col: u8) -> bool {
        self.index(row, col)
            .map(|idx| self.pressed[idx])
            .unwrap_or(false)
    }

    pub fn is_any_pressed(&self) -> bool {
        self.pressed.iter().any(|&p| p)
    }

    /// Currently pressed keys in row-major order
    pub fn pressed_keys(&self) -> Vec<(u8, u8)> {
        let cols = self.cols as usize;
        self.pressed
            .iter()
            .enumerate()
            .filter(|(_, p)| **p)
            .map(|(idx, _)| ((idx / cols) as u8, (idx % cols) as u8))
            .collect()
    }

    /// Transitions since the last scan, in the order they happened
    pub fn pending_events(&self) -> &[KeyEvent] {
        &self.pending
    }

    /// Forget the transitions seen by the last scan.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }
}
