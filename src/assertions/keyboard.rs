//! Keyboard report assertions

use super::{Assertion, AssertionContext};

const NO_KEYBOARD_REPORT: &str = "No keyboard report";

/// Any keycode is active in the current keyboard report
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyKeycodeActive;

impl Assertion for AnyKeycodeActive {
    fn evaluate(&self, ctx: &AssertionContext<'_>) -> bool {
        ctx.keyboard_report()
            .map(|report| report.is_any_key_active())
            .unwrap_or(false)
    }

    fn describe(&self) -> String {
        "Any keycodes active".to_string()
    }

    fn describe_state(&self, ctx: &AssertionContext<'_>) -> String {
        match ctx.keyboard_report() {
            Some(report) => format!("Any keycodes active: {}", report.is_any_key_active()),
            None => NO_KEYBOARD_REPORT.to_string(),
        }
    }
}

/// No keycode and no modifier is active in the current keyboard report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoKeysActive;

impl Assertion for NoKeysActive {
    fn evaluate(&self, ctx: &AssertionContext<'_>) -> bool {
        ctx.keyboard_report()
            .map(|report| !report.is_any_key_active() && !report.is_any_modifier_active())
            .unwrap_or(false)
    }

    fn describe(&self) -> String {
        "No keys active".to_string()
    }

    fn describe_state(&self, ctx: &AssertionContext<'_>) -> String {
        match ctx.keyboard_report() {
            Some(report) => format!(
                "Active keycodes: {:?}, modifiers: {:?}",
                report.active_keycodes(),
                report.active_modifiers()
            ),
            None => NO_KEYBOARD_REPORT.to_string(),
        }
    }
}

/// A specific keycode is active
#[derive(Debug, Clone, Copy)]
pub struct KeycodeActive(pub u8);

impl Assertion for KeycodeActive {
    fn evaluate(&self, ctx: &AssertionContext<'_>) -> bool {
        ctx.keyboard_report()
            .map(|report| report.is_keycode_active(self.0))
            .unwrap_or(false)
    }

    fn describe(&self) -> String {
        format!("Keycode 0x{:02X} active", self.0)
    }

    fn describe_state(&self, ctx: &AssertionContext<'_>) -> String {
        match ctx.keyboard_report() {
            Some(report) => format!("Active keycodes: {:?}", report.active_keycodes()),
            None => NO_KEYBOARD_REPORT.to_string(),
        }
    }
}

/// A specific modifier (keycode 0xE0..=0xE7) is active
#[derive(Debug, Clone, Copy)]
pub struct ModifierActive(pub u8);

impl Assertion for ModifierActive {
    fn evaluate(&self, ctx: &AssertionContext<'_>) -> bool {
        ctx.keyboard_report()
            .map(|report| report.is_modifier_active(self.0))
            .unwrap_or(false)
    }

    fn describe(&self) -> String {
        format!("Modifier 0x{:02X} active", self.0)
    }

    fn describe_state(&self, ctx: &AssertionContext<'_>) -> String {
        match ctx.keyboard_report() {
            Some(report) => format!("Active modifiers: {:?}", report.active_modifiers()),
            None => NO_KEYBOARD_REPORT.to_string(),
        }
    }
}
