//! The emulator facade and the machinery behind it.
//!
//! [`Emulator`] exposes one API in both operating modes. In streaming mode every mutation
//! is a [`command::Command`] for the [`worker::Worker`] thread, which alone touches the
//! engine; in traditional mode the engine is driven inline under a re-entrant mutex.

use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::EmulatorConfig;
use crate::error::{ActionError, EmulatorError, PokegymResult};
use crate::game::state::{GameState, MemoryInfo, MemoryReader};
use crate::input::Button;
use crate::map::direction::Direction;
use crate::map::pathfinding::PathResult;
use crate::map::sprites::SpriteSet;
use crate::map::terrain::TerrainGrid;
use crate::persistence::state_file::StateFile;
use crate::persistence::StatePersistence;

pub mod command;
pub mod engine;
pub mod frame;
pub mod handle;
pub mod lock;
pub mod worker;

use engine::Engine;
use frame::Frame;
use handle::{DirectHandle, EngineHandle, QueuedHandle};
use worker::{WorkerState, WorkerStats};

/// Thread-safe access to one emulation engine instance.
pub struct Emulator<E: Engine> {
    config: EmulatorConfig,
    reader: Arc<dyn MemoryReader>,
    handle: RwLock<Option<Arc<dyn EngineHandle>>>,
    /// State and accounting reported once the handle has been released.
    final_state: RwLock<WorkerState>,
    final_stats: RwLock<Option<StatsSnapshot>>,
    _engine: PhantomData<fn() -> E>,
}

impl<E: Engine + Send + 'static> Emulator<E> {
    pub fn new(config: EmulatorConfig, reader: Arc<dyn MemoryReader>) -> Self {
        Self {
            config,
            reader,
            handle: RwLock::new(None),
            final_state: RwLock::new(WorkerState::NotStarted),
            final_stats: RwLock::new(None),
            _engine: PhantomData,
        }
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn is_streaming(&self) -> bool {
        self.config.streaming
    }

    /// Starts the engine. Calling this on a running emulator logs a warning and does nothing.
    pub fn initialize(&self) -> PokegymResult<()> {
        let mut slot = self.handle.write();
        if slot.is_some() {
            warn!("Emulator already initialized; ignoring");
            return Ok(());
        }

        let handle: Arc<dyn EngineHandle> = if self.config.streaming {
            Arc::new(QueuedHandle::start::<E>(&self.config)?)
        } else {
            Arc::new(DirectHandle::<E>::open(&self.config)?)
        };
        info!(streaming = self.config.streaming, "Emulator initialized");
        *slot = Some(handle);
        Ok(())
    }

    fn handle(&self) -> PokegymResult<Arc<dyn EngineHandle>> {
        Ok(self.handle.read().clone().ok_or(EmulatorError::NotInitialized)?)
    }

    /// Advances `frames` frames, blocking until they have run.
    pub fn tick(&self, frames: u32) -> PokegymResult<()> {
        if frames == 0 {
            return Err(ActionError::NonPositiveFrames(0).into());
        }
        self.handle()?.tick(frames)
    }

    /// Presses each button in order with the configured hold and settle frames.
    ///
    /// `wait` selects the long settle wait after each release instead of the short one.
    pub fn press_buttons(&self, buttons: &[Button], wait: bool) -> PokegymResult<String> {
        let post_wait = if wait {
            self.config.long_wait_frames
        } else {
            self.config.short_wait_frames
        };
        self.press_buttons_with(buttons, self.config.hold_frames, post_wait)
    }

    /// Presses each button in order, holding for `hold_frames` and then waiting `post_wait` frames.
    ///
    /// Returns one `Pressed <button>` line per button.
    pub fn press_buttons_with(&self, buttons: &[Button], hold_frames: u32, post_wait: u32) -> PokegymResult<String> {
        let handle = self.handle()?;
        let mut results = Vec::with_capacity(buttons.len());

        handle.exclusive(&mut || {
            for &button in buttons {
                handle.press_button(button, hold_frames)?;
                if post_wait > 0 {
                    handle.tick(post_wait)?;
                }
                debug!(%button, hold_frames, post_wait, "Pressed");
                results.push(format!("Pressed {button}"));
            }
            Ok(())
        })?;

        Ok(results.join("\n"))
    }

    /// The latest complete frame.
    pub fn frame(&self) -> PokegymResult<Arc<Frame>> {
        self.handle()?.frame()
    }

    /// A copy of the current screen.
    pub fn screenshot(&self) -> PokegymResult<RgbaImage> {
        Ok(self.frame()?.screen.clone())
    }

    pub fn set_emulation_speed(&self, speed: u32) -> PokegymResult<()> {
        self.handle()?.set_emulation_speed(speed)
    }

    /// Serializes the engine state into a timestamped state file.
    pub fn save_state(&self, path: impl AsRef<Path>) -> PokegymResult<()> {
        let path = path.as_ref();
        let blob = self.handle()?.save_state()?;
        StateFile::new(blob).write(path)?;
        info!(path = %path.display(), "Game state saved");
        Ok(())
    }

    /// Restores the engine state from a state file.
    pub fn load_state(&self, path: impl AsRef<Path>) -> PokegymResult<()> {
        let path = path.as_ref();
        let file = StateFile::read(path)?;
        self.handle()?.load_state(file.engine_state)?;
        info!(path = %path.display(), captured_at = %file.captured_at, "Game state loaded");
        Ok(())
    }

    /// Decoded memory facts plus the valid moves, all from one frame.
    pub fn state_from_memory(&self) -> PokegymResult<MemoryInfo> {
        let frame = self.frame()?;
        let facts = self.reader.read(&frame.memory)?;
        Ok(MemoryInfo::new(facts, frame.valid_moves().into_vec()))
    }

    /// A full snapshot for callers, assembled from a single frame.
    pub fn game_state(&self) -> PokegymResult<GameState> {
        let frame = self.frame()?;
        GameState::from_frame(&frame, self.reader.as_ref())
    }

    /// The ASCII collision map, or `None` if the player's facing cannot be determined.
    pub fn collision_map(&self) -> PokegymResult<Option<String>> {
        Ok(self.frame()?.collision_map())
    }

    pub fn valid_moves(&self) -> PokegymResult<Vec<Direction>> {
        Ok(self.frame()?.valid_moves().into_vec())
    }

    pub fn sprites(&self) -> PokegymResult<SpriteSet> {
        Ok(self.frame()?.sprite_set())
    }

    /// Plans moves from the player to grid cell `(row, col)`.
    ///
    /// Out-of-bounds targets are answered immediately without reading a frame.
    pub fn find_path(&self, row: i32, col: i32) -> PokegymResult<PathResult> {
        if !TerrainGrid::in_bounds(row, col) {
            debug!(row, col, "Path target out of bounds");
            return Ok(PathResult::invalid_coordinates(row, col));
        }

        let frame = self.frame()?;
        let tileset = match self.reader.read(&frame.memory) {
            Ok(facts) => facts.tileset,
            Err(err) => {
                warn!(%err, "Could not read tileset; ignoring tile-pair rules");
                None
            }
        };
        Ok(frame.navigation(tileset).find_path(row, col))
    }
}

impl<E: Engine> Emulator<E> {
    /// Releases the engine. Idempotent.
    pub fn stop(&self) {
        let handle = self.handle.write().take();
        if let Some(handle) = handle {
            handle.shutdown();
            *self.final_state.write() = handle.worker_state();
            *self.final_stats.write() = Some(StatsSnapshot::of(handle.stats()));
            info!(stats = %handle.stats(), "Emulator stopped");
        }
    }

    pub fn worker_state(&self) -> WorkerState {
        match self.handle.read().as_ref() {
            Some(handle) => handle.worker_state(),
            None => *self.final_state.read(),
        }
    }

    /// Frame accounting for the current engine, or for the last one after [`Emulator::stop`].
    pub fn stats(&self) -> Option<StatsSnapshot> {
        match self.handle.read().as_ref() {
            Some(handle) => Some(StatsSnapshot::of(handle.stats())),
            None => *self.final_stats.read(),
        }
    }
}

impl<E: Engine> Drop for Emulator<E> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<E: Engine + Send + 'static> StatePersistence for Emulator<E> {
    fn save_state(&self, path: &Path) -> PokegymResult<()> {
        Emulator::save_state(self, path)
    }

    fn load_state(&self, path: &Path) -> PokegymResult<()> {
        Emulator::load_state(self, path)
    }
}

/// A point-in-time copy of [`WorkerStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub commands: u64,
    pub command_frames: u64,
    pub idle_frames: u64,
}

impl StatsSnapshot {
    fn of(stats: &WorkerStats) -> Self {
        Self {
            commands: stats.commands(),
            command_frames: stats.command_frames(),
            idle_frames: stats.idle_frames(),
        }
    }
}
