//! On-disk gameplay sessions: directories, metadata, named saves and autosaves.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{PokegymResult, SessionError, StateIoError};
use crate::persistence::StatePersistence;

const METADATA_FILE: &str = "session_metadata.json";
const FINAL_STATE_FILE: &str = "final_state.state";
const IMAGES_DIR: &str = "images";
const STATES_DIR: &str = "states";

const STAMP_FORMAT: &[FormatItem<'static>] = format_description!("[year][month][day]_[hour][minute][second]");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

/// Contents of `session_metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    #[serde(default)]
    pub total_steps: u64,
    pub status: SessionStatus,
    /// Wall-clock time since creation, e.g. `"12.5s"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

/// One entry of [`SessionStore::list_sessions`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    pub total_steps: u64,
    pub status: SessionStatus,
    pub has_autosave: bool,
    pub has_final_state: bool,
}

/// Returned by [`SessionStore::finalize_session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub session_dir: PathBuf,
    pub total_steps: u64,
    pub duration: Option<String>,
    pub status: SessionStatus,
}

#[derive(Debug, Clone)]
struct CurrentSession {
    id: String,
    dir: PathBuf,
    last_autosave_step: u64,
}

/// Manages session directories under a base directory.
///
/// At most one session is current at a time; saves and loads apply to it.
#[derive(Debug)]
pub struct SessionStore {
    config: SessionConfig,
    current: Option<CurrentSession>,
}

impl SessionStore {
    /// Opens a store, creating the base directory if needed.
    pub fn new(config: SessionConfig) -> PokegymResult<Self> {
        fs::create_dir_all(&config.base_dir)?;
        info!(base_dir = %config.base_dir.display(), "Session store ready");
        Ok(Self { config, current: None })
    }

    pub fn base_dir(&self) -> &Path {
        &self.config.base_dir
    }

    pub fn current_session(&self) -> Option<&str> {
        self.current.as_ref().map(|current| current.id.as_str())
    }

    pub fn current_session_dir(&self) -> Option<&Path> {
        self.current.as_ref().map(|current| current.dir.as_path())
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Creates a session directory and makes it current. Without an ID, one is derived from the clock.
    pub fn create_session(&mut self, session_id: Option<&str>) -> PokegymResult<String> {
        let now = OffsetDateTime::now_utc();
        let session_id = match session_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("session_{}", now.format(STAMP_FORMAT).map_err(std::io::Error::other)?),
        };

        let dir = self
            .session_dir(&session_id)
            .ok_or_else(|| SessionError::InvalidId(session_id.clone()))?;
        fs::create_dir_all(dir.join(IMAGES_DIR))?;
        fs::create_dir_all(dir.join(STATES_DIR))?;

        let metadata = SessionMetadata {
            session_id: session_id.clone(),
            created_at: now,
            last_updated: now,
            total_steps: 0,
            status: SessionStatus::Active,
            duration: None,
        };
        write_metadata(&dir, &metadata)?;

        info!(session = %session_id, dir = %dir.display(), "Created session");
        self.current = Some(CurrentSession {
            id: session_id.clone(),
            dir,
            last_autosave_step: 0,
        });
        Ok(session_id)
    }

    /// Makes an existing session current and marks it active again.
    pub fn load_session(&mut self, session_id: &str) -> PokegymResult<()> {
        let dir = self
            .session_dir(session_id)
            .filter(|dir| dir.is_dir())
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        let metadata_path = dir.join(METADATA_FILE);
        if !metadata_path.is_file() {
            return Err(SessionError::MetadataMissing(metadata_path).into());
        }

        let mut metadata = read_metadata(&dir)?;
        metadata.last_updated = OffsetDateTime::now_utc();
        metadata.status = SessionStatus::Active;
        write_metadata(&dir, &metadata)?;

        info!(session = %session_id, steps = metadata.total_steps, "Loaded session");
        self.current = Some(CurrentSession {
            id: session_id.to_string(),
            dir,
            last_autosave_step: metadata.total_steps,
        });
        Ok(())
    }

    /// The session updated most recently, if any.
    pub fn latest_session(&self) -> PokegymResult<Option<String>> {
        let latest = self
            .scan()?
            .into_iter()
            .max_by_key(|(_, metadata)| metadata.last_updated)
            .map(|(dir, _)| file_name(&dir));
        debug!(?latest, "Latest session");
        Ok(latest)
    }

    /// Saves the target's state into the current session and records the step count.
    ///
    /// Autosaves overwrite the session's autosave file; other saves get a timestamped file
    /// under `states/`.
    pub fn save_state(
        &mut self,
        target: &dyn StatePersistence,
        step: u64,
        name: Option<&str>,
        autosave: bool,
    ) -> PokegymResult<PathBuf> {
        let current = self.current.as_ref().ok_or(SessionError::NoActiveSession)?;
        let path = if autosave {
            current.dir.join(&self.config.autosave_filename)
        } else {
            let stamp = OffsetDateTime::now_utc()
                .format(STAMP_FORMAT)
                .map_err(std::io::Error::other)?;
            let filename = format!("{}_{stamp}.state", name.unwrap_or("game_state"));
            current.dir.join(STATES_DIR).join(filename)
        };

        target.save_state(&path)?;
        self.update_metadata(step, SessionStatus::Active)?;

        if autosave {
            if let Some(current) = self.current.as_mut() {
                current.last_autosave_step = step;
            }
            debug!(step, "Autosaved game state");
        } else {
            info!(path = %path.display(), "Saved game state");
        }
        Ok(path)
    }

    /// Restores the target from a state file of the current session.
    ///
    /// With no explicit path and no autosave request, the final state is preferred over the
    /// autosave. Returns the path that was loaded.
    pub fn load_state(
        &self,
        target: &dyn StatePersistence,
        path: Option<&Path>,
        autosave: bool,
    ) -> PokegymResult<PathBuf> {
        let current = self.current.as_ref().ok_or(SessionError::NoActiveSession)?;
        let autosave_path = current.dir.join(&self.config.autosave_filename);

        let load_path = match path {
            Some(path) => path.to_path_buf(),
            None if autosave => autosave_path,
            None => {
                let final_state = current.dir.join(FINAL_STATE_FILE);
                if final_state.is_file() {
                    info!("Loading final state from previous session");
                    final_state
                } else if autosave_path.is_file() {
                    info!("Loading autosave from previous session");
                    autosave_path
                } else {
                    warn!(session = %current.id, "No saved state found in session");
                    return Err(StateIoError::NotFound(final_state).into());
                }
            }
        };

        if !load_path.is_file() {
            warn!(path = %load_path.display(), "State file not found");
            return Err(StateIoError::NotFound(load_path).into());
        }

        target.load_state(&load_path)?;
        info!(path = %load_path.display(), "Loaded game state");
        Ok(load_path)
    }

    /// Whether `step` is due for an autosave.
    pub fn should_autosave(&self, step: u64) -> bool {
        let last = self.current.as_ref().map_or(0, |current| current.last_autosave_step);
        step > 0 && step % self.config.autosave_interval.max(1) == 0 && step != last
    }

    /// Writes the final state and autosave, marks the session completed and closes it.
    pub fn finalize_session(&mut self, target: &dyn StatePersistence, total_steps: u64) -> PokegymResult<SessionSummary> {
        let current = self.current.clone().ok_or(SessionError::NoActiveSession)?;

        let final_path = current.dir.join(FINAL_STATE_FILE);
        target.save_state(&final_path)?;
        info!(path = %final_path.display(), "Saved final state");
        target.save_state(&current.dir.join(&self.config.autosave_filename))?;

        let metadata = self.update_metadata(total_steps, SessionStatus::Completed)?;
        self.current = None;

        info!(session = %current.id, total_steps, "Finalized session");
        Ok(SessionSummary {
            session_id: current.id,
            session_dir: current.dir,
            total_steps,
            duration: metadata.duration,
            status: SessionStatus::Completed,
        })
    }

    /// All sessions with readable metadata, most recently updated first.
    pub fn list_sessions(&self) -> PokegymResult<Vec<SessionInfo>> {
        let mut sessions: Vec<SessionInfo> = self
            .scan()?
            .into_iter()
            .map(|(dir, metadata)| SessionInfo {
                session_id: file_name(&dir),
                created_at: metadata.created_at,
                last_updated: metadata.last_updated,
                total_steps: metadata.total_steps,
                status: metadata.status,
                has_autosave: dir.join(&self.config.autosave_filename).is_file(),
                has_final_state: dir.join(FINAL_STATE_FILE).is_file(),
            })
            .collect();
        sessions.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(sessions)
    }

    /// Removes a session and everything in it. Deleting the current session closes it.
    pub fn delete_session(&mut self, session_id: &str) -> PokegymResult<()> {
        let dir = self
            .session_dir(session_id)
            .filter(|dir| dir.is_dir())
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        fs::remove_dir_all(&dir)?;
        info!(session = %session_id, "Deleted session");

        if self.current_session() == Some(session_id) {
            self.current = None;
        }
        Ok(())
    }

    /// The directory of `session_id`, or `None` if the ID is not a single plain path component.
    fn session_dir(&self, session_id: &str) -> Option<PathBuf> {
        if session_id.contains(['/', '\\']) {
            return None;
        }
        let mut components = Path::new(session_id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Some(self.config.base_dir.join(session_id)),
            _ => None,
        }
    }

    /// Session directories with parseable metadata. Unreadable ones are skipped with a warning.
    fn scan(&self) -> PokegymResult<Vec<(PathBuf, SessionMetadata)>> {
        let mut sessions = Vec::new();
        if !self.config.base_dir.is_dir() {
            return Ok(sessions);
        }

        for entry in fs::read_dir(&self.config.base_dir)? {
            let dir = entry?.path();
            if !dir.is_dir() || !dir.join(METADATA_FILE).is_file() {
                continue;
            }
            match read_metadata(&dir) {
                Ok(metadata) => sessions.push((dir, metadata)),
                Err(err) => warn!(dir = %dir.display(), %err, "Unreadable session metadata"),
            }
        }
        Ok(sessions)
    }

    fn update_metadata(&self, step: u64, status: SessionStatus) -> PokegymResult<SessionMetadata> {
        let current = self.current.as_ref().ok_or(SessionError::NoActiveSession)?;
        let now = OffsetDateTime::now_utc();

        let mut metadata = match read_metadata(&current.dir) {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(%err, "Rebuilding session metadata");
                SessionMetadata {
                    session_id: current.id.clone(),
                    created_at: now,
                    last_updated: now,
                    total_steps: 0,
                    status,
                    duration: None,
                }
            }
        };

        metadata.last_updated = now;
        metadata.total_steps = step;
        metadata.status = status;
        metadata.duration = Some(format!("{:.1}s", (now - metadata.created_at).as_seconds_f64()));
        write_metadata(&current.dir, &metadata)?;
        Ok(metadata)
    }
}

fn read_metadata(dir: &Path) -> Result<SessionMetadata, StateIoError> {
    let file = File::open(dir.join(METADATA_FILE))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn write_metadata(dir: &Path, metadata: &SessionMetadata) -> Result<(), StateIoError> {
    let file = File::create(dir.join(METADATA_FILE))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, metadata)?;
    writer.flush()?;
    Ok(())
}

fn file_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
