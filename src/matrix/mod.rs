//! Simulated key matrix and key events

mod event;
mod state;

pub use event::{KeyCommand, KeyEvent, KeyEventType};
pub use state::KeyMatrix;
