//! Centralized error types for the emulator bridge.
//!
//! This module defines every error that can cross the public API, grouped by the
//! layer that produces them and folded into [`PokegymError`] for callers.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Main error type for the emulator bridge.
///
/// This is the primary error type that should be used in public APIs.
/// Pathfinding outcomes are deliberately absent: an unreachable or out-of-bounds
/// target is a normal result, not an error.
#[derive(thiserror::Error, Debug)]
pub enum PokegymError {
    #[error("Invalid action: {0}")]
    InvalidAction(#[from] ActionError),

    #[error("Emulator error: {0}")]
    Emulator(#[from] EmulatorError),

    #[error("State I/O error: {0}")]
    StateIo(#[from] StateIoError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Memory decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<EngineError> for PokegymError {
    fn from(err: EngineError) -> Self {
        PokegymError::Emulator(EmulatorError::Engine(err))
    }
}

impl From<figment::Error> for PokegymError {
    fn from(err: figment::Error) -> Self {
        PokegymError::Config(Box::new(err))
    }
}

/// Malformed actions, rejected before anything reaches the engine.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("Unknown button: {0} (valid buttons are up, down, left, right, a, b, start, select)")]
    UnknownButton(String),

    #[error("Frame count must be a positive integer, got {0}")]
    NonPositiveFrames(i64),

    #[error("A key press needs at least one key")]
    EmptyKeys,
}

/// Errors raised by an emulation engine implementation.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Failed to load ROM {path}: {reason}")]
    RomLoad { path: PathBuf, reason: String },

    #[error("Engine IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Engine state rejected: {0}")]
    InvalidState(String),
}

/// Errors related to the emulator lifecycle and its worker.
#[derive(thiserror::Error, Debug)]
pub enum EmulatorError {
    #[error("Emulation worker did not become ready within {0:?}")]
    StartupTimeout(Duration),

    #[error("Emulation worker failed to start: {0}")]
    StartupFailed(String),

    #[error("Emulator has not been initialized")]
    NotInitialized,

    #[error("Emulation worker is no longer running")]
    WorkerStopped,

    #[error("Emulation worker faulted: {0}")]
    EngineFault(String),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Errors reading or writing persisted engine state.
#[derive(thiserror::Error, Debug)]
pub enum StateIoError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("State file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid state file header")]
    InvalidHeader,

    #[error("Incompatible state version: expected {expected}, found {found}")]
    IncompatibleVersion { expected: u32, found: u32 },
}

/// Errors related to game sessions and the on-disk session store.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("No active session - create or load a session first")]
    NoActiveSession,

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Invalid session ID: {0:?}")]
    InvalidId(String),

    #[error("Session metadata missing: {}", .0.display())]
    MetadataMissing(PathBuf),

    #[error("Game session has not been initialized")]
    NotActive,

    #[error("Game session has been stopped")]
    Stopped,
}

/// Errors produced by a memory reader while decoding game facts.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Address out of range: {0:#06X}")]
    AddressOutOfRange(usize),

    #[error("Invalid value for {field}: {value:#04X}")]
    InvalidValue { field: &'static str, value: u8 },
}

/// Result type for emulator bridge operations.
pub type PokegymResult<T> = Result<T, PokegymError>;
