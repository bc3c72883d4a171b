//! Mouse and absolute mouse report assertions

use super::{Assertion, AssertionContext};

/// All buttons in the mask are pressed in the current mouse report
#[derive(Debug, Clone, Copy)]
pub struct MouseButtonsPressed(pub u8);

impl Assertion for MouseButtonsPressed {
    fn evaluate(&self, ctx: &AssertionContext<'_>) -> bool {
        ctx.mouse_report()
            .map(|report| report.are_buttons_pressed(self.0))
            .unwrap_or(false)
    }

    fn describe(&self) -> String {
        format!("Mouse buttons 0b{:08b} pressed", self.0)
    }

    fn describe_state(&self, ctx: &AssertionContext<'_>) -> String {
        match ctx.mouse_report() {
            Some(report) => format!("Mouse buttons 0b{:08b}", report.buttons),
            None => "No mouse report".to_string(),
        }
    }
}

/// The current mouse report moves by exactly `(x, y)`
#[derive(Debug, Clone, Copy)]
pub struct MouseMoved {
    pub x: i8,
    pub y: i8,
}

impl Assertion for MouseMoved {
    fn evaluate(&self, ctx: &AssertionContext<'_>) -> bool {
        ctx.mouse_report()
            .map(|report| report.x == self.x && report.y == self.y)
            .unwrap_or(false)
    }

    fn describe(&self) -> String {
        format!("Mouse moved by ({}, {})", self.x, self.y)
    }

    fn describe_state(&self, ctx: &AssertionContext<'_>) -> String {
        match ctx.mouse_report() {
            Some(report) => format!("Mouse moved by ({}, {})", report.x, report.y),
            None => "No mouse report".to_string(),
        }
    }
}

/// The current absolute mouse report points at `(x, y)`
#[derive(Debug, Clone, Copy)]
pub struct AbsolutePosition {
    pub x: u16,
    pub y: u16,
}

impl Assertion for AbsolutePosition {
    fn evaluate(&self, ctx: &AssertionContext<'_>) -> bool {
        ctx.absolute_mouse_report()
            .map(|report| report.position() == (self.x, self.y))
            .unwrap_or(false)
    }

    fn describe(&self) -> String {
        format!("Absolute position ({}, {})", self.x, self.y)
    }

    fn describe_state(&self, ctx: &AssertionContext<'_>) -> String {
        match ctx.absolute_mouse_report() {
            Some(report) => format!("Absolute position ({}, {})", report.x, report.y),
            None => "No absolute mouse report".to_string(),
        }
    }
}
