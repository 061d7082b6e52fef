//! Input vocabulary: the eight handheld buttons and the actions built from them.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::map::direction::Direction;

pub mod action;

pub use action::Action;

/// One of the eight physical inputs on the handheld.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    Start,
    Select,
}

impl Button {
    /// The movement direction this button maps to, if it is a d-pad button.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Button::Up => Some(Direction::Up),
            Button::Down => Some(Direction::Down),
            Button::Left => Some(Direction::Left),
            Button::Right => Some(Direction::Right),
            Button::A | Button::B | Button::Start | Button::Select => None,
        }
    }
}

impl From<Direction> for Button {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => Button::Up,
            Direction::Down => Button::Down,
            Direction::Left => Button::Left,
            Direction::Right => Button::Right,
        }
    }
}
