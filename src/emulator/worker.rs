//! The emulation worker: a single thread that owns the engine and drains the command queue.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use strum_macros::{AsRefStr, Display};
use thousands::Separable;
use tracing::{debug, error, info, info_span, trace, warn};

use crate::config::EmulatorConfig;
use crate::constants::PRIORITY_WORKER;
use crate::emulator::command::{Command, Envelope, Reply};
use crate::emulator::engine::{Engine, EngineOptions};
use crate::emulator::frame::Frame;
use crate::emulator::lock::{PriorityLock, Signal};
use crate::error::{EmulatorError, EngineError};
use crate::formatter;

/// Lifecycle of a worker. `Failed` is terminal, like `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum WorkerState {
    NotStarted,
    Initializing,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl WorkerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Stopped | WorkerState::Failed)
    }
}

/// Frame and command accounting for one engine instance.
///
/// Frames advanced by commands are counted separately from idle frames, so callers can
/// check that every requested frame ran exactly once.
#[derive(Debug, Default)]
pub struct WorkerStats {
    commands: AtomicU64,
    command_frames: AtomicU64,
    idle_frames: AtomicU64,
}

impl WorkerStats {
    pub fn commands(&self) -> u64 {
        self.commands.load(Ordering::Relaxed)
    }

    pub fn command_frames(&self) -> u64 {
        self.command_frames.load(Ordering::Relaxed)
    }

    pub fn idle_frames(&self) -> u64 {
        self.idle_frames.load(Ordering::Relaxed)
    }

    pub fn total_frames(&self) -> u64 {
        self.command_frames() + self.idle_frames()
    }

    pub(crate) fn record_command(&self, frames: u64) {
        self.commands.fetch_add(1, Ordering::Relaxed);
        self.command_frames.fetch_add(frames, Ordering::Relaxed);
    }

    pub(crate) fn record_idle(&self) {
        self.idle_frames.fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Display for WorkerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} commands, {} command frames, {} idle frames",
            self.commands().separate_with_commas(),
            self.command_frames().separate_with_commas(),
            self.idle_frames().separate_with_commas()
        )
    }
}

/// Ticks `engine` once per frame, stopping as soon as it reports termination.
///
/// Returns the number of frames that ran and whether the engine is still live.
pub(crate) fn run_frames<E: Engine>(engine: &mut E, frames: u32) -> (u32, bool) {
    for ran in 1..=frames {
        formatter::advance_frames(1);
        if !engine.tick() {
            return (ran, false);
        }
    }
    (frames, true)
}

/// What executing one command did to the engine.
#[derive(Debug)]
pub(crate) struct Executed {
    pub reply: Reply,
    /// Frames that actually ran, which is fewer than requested if the engine ended.
    pub frames: u64,
    pub live: bool,
}

/// Executes one command against an engine.
pub(crate) fn execute<E: Engine>(engine: &mut E, command: Command) -> Result<Executed, EngineError> {
    let (reply, ran, live) = match command {
        Command::Tick(frames) => {
            let (ran, live) = run_frames(engine, frames);
            (Reply::Done, ran, live)
        }
        Command::PressButton { button, hold_frames } => {
            engine.button_press(button);
            let (ran, live) = run_frames(engine, hold_frames);
            engine.button_release(button);
            (Reply::Done, ran, live)
        }
        Command::SaveState => {
            let mut blob = Vec::new();
            engine.save_state(&mut blob)?;
            (Reply::Saved(blob), 0, true)
        }
        Command::LoadState(blob) => {
            engine.load_state(&mut blob.as_slice())?;
            (Reply::Done, 0, true)
        }
        Command::SetSpeed(speed) => {
            engine.set_emulation_speed(speed);
            (Reply::Done, 0, true)
        }
        Command::Stop => (Reply::Done, 0, false),
    };
    Ok(Executed {
        reply,
        frames: u64::from(ran),
        live,
    })
}

/// State shared between the worker thread and its callers.
struct Shared {
    queue: PriorityLock<VecDeque<Envelope>>,
    queue_clear: Signal,
    ready: Signal,
    state: Mutex<WorkerState>,
    fault: Mutex<Option<String>>,
    frame: RwLock<Option<Arc<Frame>>>,
    stats: WorkerStats,
    running: AtomicBool,
}

impl Shared {
    fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    fn set_state(&self, state: WorkerState) {
        let mut current = self.state.lock();
        if *current != WorkerState::Failed {
            debug!(from = %*current, to = %state, "Worker state change");
            *current = state;
        }
    }

    fn fail(&self, reason: String) {
        error!(%reason, "Emulation worker failed");
        *self.fault.lock() = Some(reason);
        *self.state.lock() = WorkerState::Failed;
    }

    fn terminal_error(&self) -> EmulatorError {
        match self.fault.lock().clone() {
            Some(reason) => EmulatorError::EngineFault(reason),
            None => EmulatorError::WorkerStopped,
        }
    }

    fn publish(&self, frame: Frame) {
        *self.frame.write() = Some(Arc::new(frame));
    }
}

/// Runs when the worker thread leaves its loop, whether it returned or unwound.
struct ExitGuard {
    shared: Arc<Shared>,
    exited: Sender<()>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let shared = &self.shared;
        shared.running.store(false, Ordering::SeqCst);

        let pending: Vec<Envelope> = {
            let mut queue = shared.queue.lock(PRIORITY_WORKER);
            shared.set_state(WorkerState::Stopped);
            queue.drain(..).collect()
        };
        if !pending.is_empty() {
            debug!(count = pending.len(), "Rejecting commands left in queue");
        }
        for envelope in pending {
            envelope.respond(Err(shared.terminal_error()));
        }

        shared.queue_clear.set();
        shared.ready.set();
        info!(stats = %shared.stats, state = %shared.state(), "Emulation worker exited");
        let _ = self.exited.send(());
    }
}

/// Owns the worker thread of a streaming emulator.
pub struct Worker {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
    exited: Receiver<()>,
    stop_timeout: Duration,
}

impl Worker {
    /// Spawns the worker, constructs the engine on it and waits for warm-up to finish.
    pub fn start<E: Engine + 'static>(config: &EmulatorConfig) -> Result<Self, EmulatorError> {
        let shared = Arc::new(Shared {
            queue: PriorityLock::new(VecDeque::new()),
            queue_clear: Signal::new(true),
            ready: Signal::new(false),
            state: Mutex::new(WorkerState::NotStarted),
            fault: Mutex::new(None),
            frame: RwLock::new(None),
            stats: WorkerStats::default(),
            running: AtomicBool::new(true),
        });
        let (exited_tx, exited_rx) = bounded(1);

        let options = config.engine_options();
        let warmup_ticks = config.warmup_ticks;
        let steady_speed = config.steady_speed();
        let thread_shared = Arc::clone(&shared);

        shared.set_state(WorkerState::Initializing);
        let handle = thread::Builder::new()
            .name("emulation-worker".to_string())
            .spawn(move || {
                let _guard = ExitGuard {
                    shared: Arc::clone(&thread_shared),
                    exited: exited_tx,
                };
                let span = info_span!("worker");
                let _entered = span.enter();
                run::<E>(&thread_shared, &options, warmup_ticks, steady_speed);
            })
            .map_err(|err| EmulatorError::StartupFailed(err.to_string()))?;

        let worker = Self {
            shared,
            handle: Mutex::new(Some(handle)),
            exited: exited_rx,
            stop_timeout: config.stop_timeout(),
        };

        let timeout = config.startup_timeout();
        if !worker.shared.ready.wait_timeout(timeout) {
            warn!(?timeout, "Emulation worker did not become ready in time");
            worker.shared.running.store(false, Ordering::SeqCst);
            worker.stop();
            return Err(EmulatorError::StartupTimeout(timeout));
        }

        match worker.shared.state() {
            WorkerState::Running => Ok(worker),
            _ => {
                let reason = worker
                    .shared
                    .fault
                    .lock()
                    .clone()
                    .unwrap_or_else(|| "worker exited during startup".to_string());
                worker.stop();
                Err(EmulatorError::StartupFailed(reason))
            }
        }
    }

    /// Enqueues a command and blocks until the worker has executed it.
    pub fn call(&self, command: Command) -> Result<Reply, EmulatorError> {
        let (envelope, reply) = Envelope::with_reply(command);
        self.submit(envelope)?;
        reply.recv().map_err(|_| self.shared.terminal_error())?
    }

    /// Enqueues a command under the lock, clearing the queue-clear signal.
    fn submit(&self, envelope: Envelope) -> Result<(), EmulatorError> {
        let priority = envelope.command.priority();
        let mut queue = self.shared.queue.lock(priority);
        if self.shared.state().is_terminal() {
            return Err(self.shared.terminal_error());
        }
        trace!(command = envelope.command.name(), priority, "Enqueue");
        queue.push_back(envelope);
        self.shared.queue_clear.clear();
        Ok(())
    }

    /// Waits for the worker to observe an empty queue. Returns `false` on timeout.
    pub fn wait_queue_clear(&self, timeout: Duration) -> bool {
        self.shared.queue_clear.wait_timeout(timeout)
    }

    /// The most recently published frame, if the worker has produced one.
    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.shared.frame.read().clone()
    }

    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.shared.stats
    }

    /// Asks the worker to stop and joins it within the stop timeout.
    ///
    /// Idempotent. A worker that does not exit in time is logged and left detached.
    pub fn stop(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };

        self.shared.running.store(false, Ordering::SeqCst);
        if !self.shared.state().is_terminal() {
            // A worker that has just exited leaves nothing to stop.
            let _ = self.submit(Envelope::detached(Command::Stop));
        }

        match self.exited.recv_timeout(self.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    warn!("Emulation worker thread panicked during shutdown");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(timeout = ?self.stop_timeout, "Emulation worker did not exit in time; detaching");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Body of the worker thread.
fn run<E: Engine>(shared: &Shared, options: &EngineOptions, warmup_ticks: u32, steady_speed: u32) {
    let opened = panic::catch_unwind(AssertUnwindSafe(|| E::open(options)));
    let mut engine = match opened {
        Ok(Ok(engine)) => engine,
        Ok(Err(err)) => return shared.fail(err.to_string()),
        Err(payload) => return shared.fail(panic_message(payload.as_ref())),
    };

    let warmed = panic::catch_unwind(AssertUnwindSafe(|| {
        engine.set_emulation_speed(0);
        let (_, live) = run_frames(&mut engine, warmup_ticks);
        engine.set_emulation_speed(steady_speed);
        live
    }));
    let mut frames = u64::from(warmup_ticks);
    match warmed {
        Ok(true) => {}
        Ok(false) => return shared.fail("engine ended during warm-up".to_string()),
        Err(payload) => return shared.fail(panic_message(payload.as_ref())),
    }
    if let Err(reason) = capture(shared, &engine, frames) {
        return shared.fail(format!("frame capture panicked: {reason}"));
    }

    if !shared.running.load(Ordering::SeqCst) {
        // start() gave up waiting
        engine.stop();
        return;
    }
    shared.set_state(WorkerState::Running);
    shared.ready.set();
    info!(rom = %options.rom_path.display(), warmup_ticks, steady_speed, "Emulation worker running");

    loop {
        let next = shared.queue.lock(PRIORITY_WORKER).pop_front();

        let (live, reply) = match next {
            Some(Envelope { command, reply }) => {
                let name = command.name();
                let stopping = command == Command::Stop;
                trace!(command = name, frames = command.frames(), "Execute");

                match panic::catch_unwind(AssertUnwindSafe(|| execute(&mut engine, command))) {
                    Ok(Ok(executed)) => {
                        shared.stats.record_command(executed.frames);
                        frames += executed.frames;
                        (executed.live && !stopping, reply.map(|tx| (tx, Ok(executed.reply))))
                    }
                    Ok(Err(err)) => {
                        shared.fail(format!("{name} failed: {err}"));
                        if let Some(tx) = reply {
                            let _ = tx.send(Err(EmulatorError::EngineFault(err.to_string())));
                        }
                        break;
                    }
                    Err(payload) => {
                        let reason = panic_message(payload.as_ref());
                        shared.fail(format!("{name} panicked: {reason}"));
                        if let Some(tx) = reply {
                            let _ = tx.send(Err(EmulatorError::EngineFault(reason)));
                        }
                        break;
                    }
                }
            }
            None => {
                let live = match panic::catch_unwind(AssertUnwindSafe(|| run_frames(&mut engine, 1))) {
                    Ok((_, live)) => live,
                    Err(payload) => {
                        shared.fail(format!("idle tick panicked: {}", panic_message(payload.as_ref())));
                        break;
                    }
                };
                shared.stats.record_idle();
                frames += 1;
                (live, None)
            }
        };

        if let Err(reason) = capture(shared, &engine, frames) {
            shared.fail(format!("frame capture panicked: {reason}"));
            if let Some((tx, _)) = reply {
                let _ = tx.send(Err(EmulatorError::EngineFault(reason)));
            }
            break;
        }
        if let Some((tx, result)) = reply {
            let _ = tx.send(result);
        }

        {
            let queue = shared.queue.lock(PRIORITY_WORKER);
            if queue.is_empty() {
                shared.queue_clear.set();
            }
        }

        if !live {
            shared.set_state(WorkerState::Stopping);
            break;
        }
    }

    engine.stop();
}

/// Captures and publishes a frame. Engine read accessors may panic like any other engine call.
fn capture<E: Engine>(shared: &Shared, engine: &E, frames: u64) -> Result<(), String> {
    let frame = panic::catch_unwind(AssertUnwindSafe(|| Frame::capture(engine, frames)))
        .map_err(|payload| panic_message(payload.as_ref()))?;
    shared.publish(frame);
    Ok(())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
