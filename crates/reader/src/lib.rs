//! Chapter reader for mangaread.
//!
//! - [`session`]: the per-chapter reader state machine
//! - [`controls`]: overlay visibility with an idle auto-hide timer
//! - [`input`]: keyboard, swipe, tap and pointer dispatch

pub mod controls;
pub mod input;
pub mod session;

#[cfg(test)]
mod testing;

pub use controls::Controls;
pub use input::{Action, InputEvent, SwipeDirection, action_for};
pub use session::{
    Effect, MangaRef, NavTarget, PageStatus, PageView, Phase, ReaderDeps, ReaderSession, ReaderView, SessionOptions,
};
