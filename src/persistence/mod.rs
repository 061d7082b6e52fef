//! Save, load and autosave of engine state.

use std::path::Path;

use crate::error::PokegymResult;

pub mod state_file;
pub mod store;

pub use state_file::StateFile;
pub use store::{SessionInfo, SessionMetadata, SessionStore, SessionSummary};

/// Something whose state can be written to and restored from a file.
pub trait StatePersistence {
    fn save_state(&self, path: &Path) -> PokegymResult<()>;

    fn load_state(&self, path: &Path) -> PokegymResult<()>;
}
