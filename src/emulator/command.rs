//! Messages exchanged between callers and the emulation worker.

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::constants::{PRIORITY_ROUTINE, PRIORITY_URGENT};
use crate::error::EmulatorError;
use crate::input::Button;

/// A request for the worker. Consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Advance this many frames.
    Tick(u32),
    /// Press, hold for `hold_frames` frames, release.
    PressButton { button: Button, hold_frames: u32 },
    /// Serialize the engine state into a blob.
    SaveState,
    /// Restore the engine state from a blob.
    LoadState(Vec<u8>),
    SetSpeed(u32),
    /// Leave the worker loop.
    Stop,
}

impl Command {
    /// Lock priority used when enqueueing this command.
    pub fn priority(&self) -> u32 {
        match self {
            Command::Stop | Command::LoadState(_) => PRIORITY_URGENT,
            _ => PRIORITY_ROUTINE,
        }
    }

    /// Frames the engine advances while executing this command.
    pub fn frames(&self) -> u64 {
        match self {
            Command::Tick(frames) => u64::from(*frames),
            Command::PressButton { hold_frames, .. } => u64::from(*hold_frames),
            _ => 0,
        }
    }

    /// Short name used in log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Tick(_) => "tick",
            Command::PressButton { .. } => "press_button",
            Command::SaveState => "save_state",
            Command::LoadState(_) => "load_state",
            Command::SetSpeed(_) => "set_speed",
            Command::Stop => "stop",
        }
    }
}

/// What the worker hands back after executing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Done,
    Saved(Vec<u8>),
}

pub type Responder = Sender<Result<Reply, EmulatorError>>;
pub type ReplyReceiver = Receiver<Result<Reply, EmulatorError>>;

/// A command together with the channel its result is delivered on.
#[derive(Debug)]
pub struct Envelope {
    pub command: Command,
    pub reply: Option<Responder>,
}

impl Envelope {
    /// Wraps a command whose caller waits for the result.
    pub fn with_reply(command: Command) -> (Self, ReplyReceiver) {
        let (tx, rx) = bounded(1);
        (Self { command, reply: Some(tx) }, rx)
    }

    /// Wraps a command nobody waits for.
    pub fn detached(command: Command) -> Self {
        Self { command, reply: None }
    }

    /// Delivers a result. A caller that stopped listening is not an error.
    pub fn respond(self, result: Result<Reply, EmulatorError>) {
        if let Some(reply) = self.reply {
            let _ = reply.send(result);
        }
    }
}
