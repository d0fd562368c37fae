//! Shared types for the tradelog trade whisper watcher.

mod action;
mod rule;
mod trade;
mod window;

pub use action::*;
pub use rule::*;
pub use trade::*;
pub use window::*;
