//! The caller-facing game session.

use std::path::Path;
use std::time::{Duration, Instant};

use circular_buffer::CircularBuffer;
use serde::Serialize;
use strum_macros::{AsRefStr, Display};
use tracing::{debug, info, warn};

use crate::constants::HISTORY_CAPACITY;
use crate::emulator::engine::Engine;
use crate::emulator::Emulator;
use crate::error::{PokegymResult, SessionError};
use crate::input::Action;
use crate::map::direction::Direction;
use crate::map::pathfinding::PathResult;
use crate::persistence::SessionStore;

pub mod state;

use state::GameState;

/// Lifecycle of a [`GameSession`]. A stopped session cannot be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum Lifecycle {
    Created,
    Active,
    Stopped,
}

/// What one step did and where it left the player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub step: u64,
    pub action: Action,
    pub location: String,
    pub coordinates: (u8, u8),
    pub party_size: usize,
    pub execution_time: Duration,
}

/// One game played through one emulator.
///
/// Every [`GameSession::step`] runs an action to completion and returns a fresh
/// [`GameState`]. With a [`SessionStore`] attached, steps are autosaved at the store's interval.
pub struct GameSession<E: Engine> {
    emulator: Emulator<E>,
    lifecycle: Lifecycle,
    current: Option<GameState>,
    steps_taken: u64,
    total_action_time: Duration,
    history: Box<CircularBuffer<HISTORY_CAPACITY, StepRecord>>,
    store: Option<SessionStore>,
}

impl<E: Engine + Send + 'static> GameSession<E> {
    pub fn new(emulator: Emulator<E>) -> Self {
        Self {
            emulator,
            lifecycle: Lifecycle::Created,
            current: None,
            steps_taken: 0,
            total_action_time: Duration::ZERO,
            history: CircularBuffer::boxed(),
            store: None,
        }
    }

    /// Attaches a store used for autosaves.
    pub fn with_store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn store(&self) -> Option<&SessionStore> {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> Option<&mut SessionStore> {
        self.store.as_mut()
    }

    pub fn emulator(&self) -> &Emulator<E> {
        &self.emulator
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Starts the emulator and returns the initial state.
    ///
    /// A second call logs a warning and returns the current state without touching the engine.
    pub fn initialize(&mut self) -> PokegymResult<GameState> {
        match self.lifecycle {
            Lifecycle::Stopped => return Err(SessionError::Stopped.into()),
            Lifecycle::Active => {
                warn!("Game session already initialized");
                if let Some(state) = &self.current {
                    return Ok(state.clone());
                }
            }
            Lifecycle::Created => {
                self.emulator.initialize()?;
                self.lifecycle = Lifecycle::Active;
                info!("Game session initialized");
            }
        }
        self.refresh()
    }

    fn ensure_active(&self) -> PokegymResult<()> {
        match self.lifecycle {
            Lifecycle::Active => Ok(()),
            Lifecycle::Created => Err(SessionError::NotActive.into()),
            Lifecycle::Stopped => Err(SessionError::Stopped.into()),
        }
    }

    fn refresh(&mut self) -> PokegymResult<GameState> {
        let state = self.emulator.game_state()?;
        self.current = Some(state.clone());
        Ok(state)
    }

    /// Runs one action and returns the resulting state.
    pub fn step(&mut self, action: Action) -> PokegymResult<GameState> {
        self.ensure_active()?;
        action.validate()?;

        let started = Instant::now();
        info!(%action, "Processing action");
        match &action {
            Action::PressKeys { keys } => {
                self.emulator.press_buttons(keys, true)?;
            }
            Action::Wait { frames } => self.emulator.tick(*frames)?,
        }
        let state = self.refresh()?;
        let elapsed = started.elapsed();

        self.steps_taken += 1;
        self.total_action_time += elapsed;
        self.history.push_back(StepRecord {
            step: self.steps_taken,
            action,
            location: state.location().to_string(),
            coordinates: state.coordinates(),
            party_size: state.party().len(),
            execution_time: elapsed,
        });
        debug!(step = self.steps_taken, ?elapsed, "Step complete");

        self.autosave();
        Ok(state)
    }

    /// Writes an autosave when the attached store says one is due. Failures are only logged.
    fn autosave(&mut self) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        if !store.is_active() || !store.should_autosave(self.steps_taken) {
            return;
        }
        if let Err(err) = store.save_state(&self.emulator, self.steps_taken, None, true) {
            warn!(step = self.steps_taken, %err, "Autosave failed");
        }
    }

    /// The state returned by the most recent call, if any.
    pub fn state(&self) -> Option<&GameState> {
        self.current.as_ref()
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    /// The most recent steps, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &StepRecord> {
        self.history.iter()
    }

    /// Mean wall-clock time per step; zero before the first step.
    pub fn average_action_time(&self) -> Duration {
        match u32::try_from(self.steps_taken) {
            Ok(0) => Duration::ZERO,
            Ok(steps) => self.total_action_time / steps,
            Err(_) => Duration::from_secs_f64(self.total_action_time.as_secs_f64() / self.steps_taken as f64),
        }
    }

    pub fn collision_map(&self) -> PokegymResult<Option<String>> {
        self.ensure_active()?;
        self.emulator.collision_map()
    }

    pub fn valid_moves(&self) -> PokegymResult<Vec<Direction>> {
        self.ensure_active()?;
        self.emulator.valid_moves()
    }

    pub fn find_path(&self, row: i32, col: i32) -> PokegymResult<PathResult> {
        self.ensure_active()?;
        self.emulator.find_path(row, col)
    }

    pub fn save_state(&self, path: impl AsRef<Path>) -> PokegymResult<()> {
        self.ensure_active()?;
        self.emulator.save_state(path)
    }

    /// Restores a saved state and returns the state it produces.
    pub fn load_state(&mut self, path: impl AsRef<Path>) -> PokegymResult<GameState> {
        self.ensure_active()?;
        self.emulator.load_state(path)?;
        self.refresh()
    }

    /// Stops the emulator. Idempotent.
    pub fn stop(&mut self) {
        if self.lifecycle == Lifecycle::Stopped {
            return;
        }
        self.emulator.stop();
        self.lifecycle = Lifecycle::Stopped;
        info!(steps = self.steps_taken, "Game session stopped");
    }
}
