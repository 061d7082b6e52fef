//! Pokégym: a thread-safe control layer over a handheld emulation engine.

pub mod config;
pub mod constants;
pub mod emulator;
pub mod error;
pub mod formatter;
pub mod game;
pub mod input;
pub mod logging;
pub mod map;
pub mod persistence;

pub use emulator::engine::{Engine, EngineOptions};
pub use emulator::Emulator;
pub use error::{PokegymError, PokegymResult};
pub use game::state::GameState;
pub use game::GameSession;
pub use input::{Action, Button};
