//! Keyboard report snapshot

use crate::error::HarnessError;
use crate::hid::ChannelKind;
use std::fmt;

/// Number of keycode bitmap bytes in an NKRO report
pub const KEY_BYTES: usize = 28;

/// First modifier keycode (left control); modifiers occupy 0xE0..=0xE7
pub const MODIFIER_KEYCODE_BASE: u8 = 0xE0;
/// Last modifier keycode (right GUI); 0xE8..=0xFF are reserved
pub const MODIFIER_KEYCODE_LAST: u8 = 0xE7;

const BOOT_REPORT_LEN: usize = 8;

/// A keyboard report: one modifier byte plus a keycode bitmap
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyboardReport {
    modifiers: u8,
    keys: [u8; KEY_BYTES],
}

impl KeyboardReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an NKRO payload (`modifiers` followed by the bitmap).
    pub fn from_bytes(data: &[u8]) -> Result<Self, HarnessError> {
        if data.len() != 1 + KEY_BYTES {
            return Err(HarnessError::MalformedReport {
                kind: ChannelKind::Keyboard,
                expected: 1 + KEY_BYTES,
                actual: data.len(),
            });
        }
        let mut keys = [0u8; KEY_BYTES];
        keys.copy_from_slice(&data[1..]);
        Ok(Self {
            modifiers: data[0],
            keys,
        })
    }

    /// Decode a boot protocol payload (`modifiers`, reserved, six keycodes).
    ///
    /// Reserved keycodes in the key slots are dropped.
    pub fn from_boot_bytes(data: &[u8]) -> Result<Self, HarnessError> {
        if data.len() != BOOT_REPORT_LEN {
            return Err(HarnessError::MalformedReport {
                kind: ChannelKind::Keyboard,
                expected: BOOT_REPORT_LEN,
                actual: data.len(),
            });
        }
        let mut report = Self {
            modifiers: data[0],
            ..Self::default()
        };
        for &code in data[2..].iter().filter(|&&code| code != 0) {
            report.set_keycode(code, true);
        }
        Ok(report)
    }

    /// Builder used by firmware implementations.
    pub fn with_keycode(mut self, keycode: u8) -> Self {
        self.set_keycode(keycode, true);
        self
    }

    /// Set or clear a keycode. Modifier keycodes update the modifier byte;
    /// reserved keycodes above 0xE7 are ignored.
    pub fn set_keycode(&mut self, keycode: u8, active: bool) {
        if keycode > MODIFIER_KEYCODE_LAST {
            log::trace!("ignoring reserved keycode 0x{:02X}", keycode);
            return;
        }
        if keycode >= MODIFIER_KEYCODE_BASE {
            let bit = 1u8 << (keycode - MODIFIER_KEYCODE_BASE);
            if active {
                self.modifiers |= bit;
            } else {
                self.modifiers &= !bit;
            }
            return;
        }
        let (byte, bit) = (keycode as usize / 8, keycode % 8);
        if active {
            self.keys[byte] |= 1 << bit;
        } else {
            self.keys[byte] &= !(1 << bit);
        }
    }

    pub fn is_keycode_active(&self, keycode: u8) -> bool {
        if keycode >= MODIFIER_KEYCODE_BASE {
            return self.is_modifier_active(keycode);
        }
        (self.keys[keycode as usize / 8] & (1 << (keycode % 8))) != 0
    }

    /// `keycode` must be one of the modifier keycodes 0xE0..=0xE7.
    pub fn is_modifier_active(&self, keycode: u8) -> bool {
        match keycode.checked_sub(MODIFIER_KEYCODE_BASE) {
            Some(bit) if bit < 8 => (self.modifiers & (1 << bit)) != 0,
            _ => false,
        }
    }

    pub fn is_any_key_active(&self) -> bool {
        self.keys.iter().any(|&byte| byte != 0)
    }

    pub fn is_any_modifier_active(&self) -> bool {
        self.modifiers != 0
    }

    pub fn modifiers(&self) -> u8 {
        self.modifiers
    }

    /// Non-modifier keycodes in ascending order
    pub fn active_keycodes(&self) -> Vec<u8> {
        (0..MODIFIER_KEYCODE_BASE)
            .filter(|&code| self.is_keycode_active(code))
            .collect()
    }

    /// Active modifiers as keycodes in ascending order
    pub fn active_modifiers(&self) -> Vec<u8> {
        (0..8u8)
            .filter(|bit| (self.modifiers & (1 << bit)) != 0)
            .map(|bit| MODIFIER_KEYCODE_BASE + bit)
            .collect()
    }
}

impl fmt::Display for KeyboardReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "keyboard report: keycodes [")?;
        for (i, code) in self.active_keycodes().iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "0x{:02X}", code)?;
        }
        write!(f, "], modifiers 0b{:08b}", self.modifiers)
    }
}
