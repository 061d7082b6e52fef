use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ActionError;
use crate::input::Button;

/// A single caller request: press a sequence of buttons, or let frames pass.
///
/// Both variants are validated before they reach the emulator; use the constructors
/// to build them from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum Action {
    /// Press each key in order, one after another.
    #[serde(rename = "press_key")]
    PressKeys { keys: Vec<Button> },
    /// Advance the given number of frames without input.
    Wait { frames: u32 },
}

impl Action {
    /// Parses lowercase button names into a press action.
    pub fn press_keys<I, S>(keys: I) -> Result<Self, ActionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = keys
            .into_iter()
            .map(|key| Button::from_str(key.as_ref()).map_err(|_| ActionError::UnknownButton(key.as_ref().to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        if keys.is_empty() {
            return Err(ActionError::EmptyKeys);
        }
        Ok(Action::PressKeys { keys })
    }

    /// Builds a press action from already-typed buttons.
    pub fn press(keys: impl IntoIterator<Item = Button>) -> Self {
        Action::PressKeys {
            keys: keys.into_iter().collect(),
        }
    }

    /// Builds a wait action, rejecting non-positive frame counts.
    pub fn wait(frames: i64) -> Result<Self, ActionError> {
        match u32::try_from(frames) {
            Ok(frames) if frames > 0 => Ok(Action::Wait { frames }),
            _ => Err(ActionError::NonPositiveFrames(frames)),
        }
    }

    /// Re-checks the invariants of an action that may have been built directly.
    pub fn validate(&self) -> Result<(), ActionError> {
        match self {
            Action::Wait { frames: 0 } => Err(ActionError::NonPositiveFrames(0)),
            Action::PressKeys { keys } if keys.is_empty() => Err(ActionError::EmptyKeys),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::PressKeys { keys } => {
                let names: Vec<&str> = keys.iter().map(|key| key.as_ref()).collect();
                write!(f, "PressKey: {}", names.join(", "))
            }
            Action::Wait { frames } => write!(f, "Wait: {frames} frames"),
        }
    }
}
