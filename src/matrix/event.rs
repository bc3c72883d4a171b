//! Key event types and the textual key-event format read by the
//! remote-controlled run loop

use crate::error::HarnessError;

/// Type of key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventType {
    /// Key was pressed down
    Press,
    /// Key was released
    Release,
}

/// A matrix transition recorded since the last scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub row: u8,
    pub col: u8,
    pub event_type: KeyEventType,
}

impl KeyEvent {
    pub fn new(row: u8, col: u8, event_type: KeyEventType) -> Self {
        Self {
            row,
            col,
            event_type,
        }
    }

    pub fn press(row: u8, col: u8) -> Self {
        Self::new(row, col, KeyEventType::Press)
    }

    pub fn release(row: u8, col: u8) -> Self {
        Self::new(row, col, KeyEventType::Release)
    }
}

/// One command of a key-event input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    Press { row: u8, col: u8 },
    Release { row: u8, col: u8 },
    Tap { row: u8, col: u8 },
}

impl KeyCommand {
    /// Parse one input line.
    ///
    /// Commands are separated by `;` and read `press R C`, `release R C` or
    /// `tap R C` (short forms `p`, `r`, `t`). Text after `#` is ignored. A
    /// blank line yields no commands.
    ///
    /// ```
    /// use firmware_testkit::matrix::KeyCommand;
    ///
    /// let commands = KeyCommand::parse_line("p 1 2; release 0 3").unwrap();
    /// assert_eq!(
    ///     commands,
    ///     vec![
    ///         KeyCommand::Press { row: 1, col: 2 },
    ///         KeyCommand::Release { row: 0, col: 3 },
    ///     ]
    /// );
    /// ```
    pub fn parse_line(line: &str) -> Result<Vec<KeyCommand>, HarnessError> {
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        };
        line.split(';')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Self::parse_command)
            .collect()
    }

    fn parse_command(text: &str) -> Result<KeyCommand, HarnessError> {
        let invalid = || HarnessError::InvalidKeyEvent(text.to_string());
        let mut tokens = text.split_whitespace();
        let verb = tokens.next().ok_or_else(invalid)?;
        let row: u8 = tokens
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(invalid)?;
        let col: u8 = tokens
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(invalid)?;
        if tokens.next().is_some() {
            return Err(invalid());
        }
        match verb.to_ascii_lowercase().as_str() {
            "press" | "p" => Ok(KeyCommand::Press { row, col }),
            "release" | "r" => Ok(KeyCommand::Release { row, col }),
            "tap" | "t" => Ok(KeyCommand::Tap { row, col }),
            _ => Err(invalid()),
        }
    }
}
