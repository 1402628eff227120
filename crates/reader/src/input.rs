//! Input dispatch.
//!
//! Maps keyboard, swipe, tap and pointer events onto session transitions.
//! Every mapped event also reveals the controls, so an action taken while
//! they are hidden both performs the action and shows them again.
//!
//! | event | action |
//! |-------|--------|
//! | `ArrowRight`, `ArrowDown`, swipe left, tap right half | advance |
//! | `ArrowLeft`, `ArrowUp`, swipe right, tap left half | retreat |
//! | `Escape` | close |
//! | pointer move | reveal controls |

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::session::ReaderSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SwipeDirection {
    Left,
    Right,
}

/// A raw input event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    /// Key press, named as in DOM `KeyboardEvent.key` (e.g. `ArrowRight`).
    Key { key: String },
    Swipe { direction: SwipeDirection },
    /// Tap or click at horizontal position `x` on a surface `width` wide.
    Tap { x: f64, width: f64 },
    PointerMove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Advance,
    Retreat,
    Close,
    RevealControls,
}

/// Action bound to an event, if any. Unbound keys map to nothing.
pub fn action_for(event: &InputEvent) -> Option<Action> {
    match event {
        InputEvent::Key { key } => match key.as_str() {
            "ArrowRight" | "ArrowDown" => Some(Action::Advance),
            "ArrowLeft" | "ArrowUp" => Some(Action::Retreat),
            "Escape" => Some(Action::Close),
            _ => None,
        },
        InputEvent::Swipe { direction: SwipeDirection::Left } => Some(Action::Advance),
        InputEvent::Swipe { direction: SwipeDirection::Right } => Some(Action::Retreat),
        InputEvent::Tap { x, width } => {
            if !x.is_finite() || !width.is_finite() || *width <= 0.0 {
                return None;
            }
            if *x < width / 2.0 { Some(Action::Retreat) } else { Some(Action::Advance) }
        }
        InputEvent::PointerMove => Some(Action::RevealControls),
    }
}

impl ReaderSession {
    /// Perform the action bound to `event`. Returns the action taken.
    pub fn dispatch(&mut self, event: &InputEvent) -> Option<Action> {
        let action = action_for(event)?;

        match action {
            Action::Advance => {
                self.advance();
            }
            Action::Retreat => {
                self.retreat();
            }
            Action::Close => {
                self.close();
                return Some(action);
            }
            Action::RevealControls => {}
        }

        self.reveal_controls();
        Some(action)
    }
}
