//! The two ways an [`Emulator`](super::Emulator) can reach its engine.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::ReentrantMutex;
use tracing::{debug, info};

use crate::config::EmulatorConfig;
use crate::emulator::command::{Command, Reply};
use crate::emulator::engine::Engine;
use crate::emulator::frame::Frame;
use crate::emulator::worker::{execute, run_frames, Worker, WorkerState, WorkerStats};
use crate::error::{EmulatorError, PokegymResult};
use crate::input::Button;

/// Mode-independent access to a running engine.
pub trait EngineHandle: Send + Sync {
    fn tick(&self, frames: u32) -> PokegymResult<()>;

    /// Presses `button`, holds it for `hold_frames` frames and releases it.
    fn press_button(&self, button: Button, hold_frames: u32) -> PokegymResult<()>;

    fn save_state(&self) -> PokegymResult<Vec<u8>>;

    fn load_state(&self, blob: Vec<u8>) -> PokegymResult<()>;

    fn set_emulation_speed(&self, speed: u32) -> PokegymResult<()>;

    /// A snapshot of the engine's readable surfaces.
    fn frame(&self) -> PokegymResult<Arc<Frame>>;

    /// Runs `body`, which may call back into this handle, as one uninterrupted sequence
    /// with respect to other callers where the mode allows it.
    fn exclusive(&self, body: &mut dyn FnMut() -> PokegymResult<()>) -> PokegymResult<()>;

    /// Releases the engine. Idempotent.
    fn shutdown(&self);

    fn worker_state(&self) -> WorkerState;

    fn stats(&self) -> &WorkerStats;
}

/// Traditional mode: the engine lives with the caller and every call runs inline under
/// a re-entrant mutex.
pub struct DirectHandle<E> {
    engine: ReentrantMutex<RefCell<Option<E>>>,
    frames: AtomicU64,
    stats: WorkerStats,
}

impl<E: Engine> DirectHandle<E> {
    /// Opens the engine on the calling thread and warms it up.
    pub fn open(config: &EmulatorConfig) -> PokegymResult<Self> {
        let mut engine = E::open(&config.engine_options())?;
        engine.set_emulation_speed(0);
        let (warmed, _) = run_frames(&mut engine, config.warmup_ticks);
        engine.set_emulation_speed(config.steady_speed());
        info!(rom = %config.rom_path.display(), speed = config.steady_speed(), "Engine opened inline");

        Ok(Self {
            engine: ReentrantMutex::new(RefCell::new(Some(engine))),
            frames: AtomicU64::new(u64::from(warmed)),
            stats: WorkerStats::default(),
        })
    }

    fn run(&self, command: Command) -> PokegymResult<Reply> {
        let guard = self.engine.lock();
        let mut slot = guard.borrow_mut();
        let engine = slot.as_mut().ok_or(EmulatorError::WorkerStopped)?;

        let executed = execute(engine, command).map_err(EmulatorError::from)?;
        self.stats.record_command(executed.frames);
        self.frames.fetch_add(executed.frames, Ordering::Relaxed);

        if !executed.live {
            info!("Engine reported end of content; releasing it");
            if let Some(engine) = slot.take() {
                engine.stop();
            }
        }
        Ok(executed.reply)
    }
}

impl<E: Engine + Send> EngineHandle for DirectHandle<E> {
    fn tick(&self, frames: u32) -> PokegymResult<()> {
        self.run(Command::Tick(frames)).map(drop)
    }

    fn press_button(&self, button: Button, hold_frames: u32) -> PokegymResult<()> {
        self.run(Command::PressButton { button, hold_frames }).map(drop)
    }

    fn save_state(&self) -> PokegymResult<Vec<u8>> {
        match self.run(Command::SaveState)? {
            Reply::Saved(blob) => Ok(blob),
            Reply::Done => Ok(Vec::new()),
        }
    }

    fn load_state(&self, blob: Vec<u8>) -> PokegymResult<()> {
        self.run(Command::LoadState(blob)).map(drop)
    }

    fn set_emulation_speed(&self, speed: u32) -> PokegymResult<()> {
        self.run(Command::SetSpeed(speed)).map(drop)
    }

    fn frame(&self) -> PokegymResult<Arc<Frame>> {
        let guard = self.engine.lock();
        let slot = guard.borrow();
        let engine = slot.as_ref().ok_or(EmulatorError::WorkerStopped)?;
        Ok(Arc::new(Frame::capture(engine, self.frames.load(Ordering::Relaxed))))
    }

    fn exclusive(&self, body: &mut dyn FnMut() -> PokegymResult<()>) -> PokegymResult<()> {
        let _guard = self.engine.lock();
        body()
    }

    fn shutdown(&self) {
        let guard = self.engine.lock();
        let engine = guard.borrow_mut().take();
        if let Some(engine) = engine {
            engine.stop();
            info!(stats = %self.stats, "Engine released");
        }
    }

    fn worker_state(&self) -> WorkerState {
        let guard = self.engine.lock();
        let live = guard.borrow().is_some();
        if live {
            WorkerState::Running
        } else {
            WorkerState::Stopped
        }
    }

    fn stats(&self) -> &WorkerStats {
        &self.stats
    }
}

/// Streaming mode: every mutation becomes a command for the emulation worker.
pub struct QueuedHandle {
    worker: Worker,
    queue_clear_timeout: Duration,
    settle_delay: Duration,
}

impl QueuedHandle {
    pub fn start<E: Engine + 'static>(config: &EmulatorConfig) -> PokegymResult<Self> {
        let worker = Worker::start::<E>(config)?;
        Ok(Self {
            worker,
            queue_clear_timeout: config.queue_clear_timeout(),
            settle_delay: config.settle_delay(),
        })
    }

    fn call(&self, command: Command) -> PokegymResult<Reply> {
        Ok(self.worker.call(command)?)
    }
}

impl EngineHandle for QueuedHandle {
    fn tick(&self, frames: u32) -> PokegymResult<()> {
        self.call(Command::Tick(frames)).map(drop)
    }

    fn press_button(&self, button: Button, hold_frames: u32) -> PokegymResult<()> {
        self.call(Command::PressButton { button, hold_frames }).map(drop)
    }

    fn save_state(&self) -> PokegymResult<Vec<u8>> {
        match self.call(Command::SaveState)? {
            Reply::Saved(blob) => Ok(blob),
            Reply::Done => Ok(Vec::new()),
        }
    }

    fn load_state(&self, blob: Vec<u8>) -> PokegymResult<()> {
        self.call(Command::LoadState(blob)).map(drop)
    }

    fn set_emulation_speed(&self, speed: u32) -> PokegymResult<()> {
        self.call(Command::SetSpeed(speed)).map(drop)
    }

    /// Waits for the queue to drain, lets the frame settle, then hands out the latest snapshot.
    fn frame(&self) -> PokegymResult<Arc<Frame>> {
        if !self.worker.wait_queue_clear(self.queue_clear_timeout) {
            debug!(timeout = ?self.queue_clear_timeout, "Queue not clear; reading possibly stale frame");
        }
        if !self.settle_delay.is_zero() {
            thread::sleep(self.settle_delay);
        }
        Ok(self.worker.latest_frame().ok_or(EmulatorError::NotInitialized)?)
    }

    fn exclusive(&self, body: &mut dyn FnMut() -> PokegymResult<()>) -> PokegymResult<()> {
        body()
    }

    fn shutdown(&self) {
        self.worker.stop();
    }

    fn worker_state(&self) -> WorkerState {
        self.worker.state()
    }

    fn stats(&self) -> &WorkerStats {
        self.worker.stats()
    }
}
