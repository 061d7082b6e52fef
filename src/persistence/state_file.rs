//! The on-disk container for an engine state blob.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::StateIoError;

/// Current state file format version
pub const STATE_VERSION: u32 = 1;

/// An engine state blob plus the time it was captured.
///
/// The blob is opaque; only the engine that produced it can interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
    pub magic: String,
    pub version: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
    pub engine_state: Vec<u8>,
}

impl StateFile {
    const MAGIC: &'static str = "PGST";

    /// Wraps a freshly captured blob.
    pub fn new(engine_state: Vec<u8>) -> Self {
        Self {
            magic: Self::MAGIC.to_string(),
            version: STATE_VERSION,
            captured_at: OffsetDateTime::now_utc(),
            engine_state,
        }
    }

    pub fn validate(&self) -> Result<(), StateIoError> {
        if self.magic != Self::MAGIC {
            return Err(StateIoError::InvalidHeader);
        }
        if self.version != STATE_VERSION {
            return Err(StateIoError::IncompatibleVersion {
                expected: STATE_VERSION,
                found: self.version,
            });
        }
        Ok(())
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), StateIoError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, StateIoError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => StateIoError::NotFound(path.to_path_buf()),
            _ => StateIoError::Io(err),
        })?;
        let state: StateFile = serde_json::from_reader(BufReader::new(file))?;
        state.validate()?;
        Ok(state)
    }
}
