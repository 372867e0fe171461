//! Persistence for derived sensor state
//!
//! Both derived sensors must survive restarts. Their snapshots are kept in a
//! single JSON file. A missing or unreadable file is not an error: the
//! sensors simply start from zero.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::derived::cumulative::CumulativeSnapshot;
use crate::derived::daily::DailySnapshot;
use crate::errors::StateError;

/// Default path for the state file.
pub const DEFAULT_STATE_PATH: &str = "./data/enpal_state.json";

/// Current schema version of every snapshot type.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything persisted across restarts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub cumulative: Option<CumulativeSnapshot>,
    #[serde(default)]
    pub daily: Option<DailySnapshot>,
}

/// Restore one snapshot from the state document.
///
/// Each snapshot stands alone: a corrupt or invalid one is dropped with a
/// warning and never takes its neighbours down with it.
fn restore_snapshot<T>(document: &Value, key: &str, is_valid: impl Fn(&T) -> bool) -> Option<T>
where
    T: DeserializeOwned + fmt::Debug,
{
    let value = document.get(key).filter(|v| !v.is_null())?;
    match serde_json::from_value::<T>(value.clone()) {
        Ok(snapshot) if is_valid(&snapshot) => Some(snapshot),
        Ok(snapshot) => {
            warn!("Ignoring invalid {} snapshot: {:?}", key, snapshot);
            None
        }
        Err(e) => {
            warn!("Ignoring corrupt {} snapshot: {}", key, e);
            None
        }
    }
}

/// Snapshot file manager
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load persisted state.
    ///
    /// Never fails: missing, unreadable or corrupt files yield empty state,
    /// a corrupt snapshot yields only that snapshot empty.
    pub fn load(&self) -> PersistedState {
        if !self.path.exists() {
            info!(
                "State file not found at {}, starting from zero",
                self.path.display()
            );
            return PersistedState::default();
        }

        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read state file {}: {}", self.path.display(), e);
                return PersistedState::default();
            }
        };

        match serde_json::from_str::<Value>(&contents) {
            Ok(document) => {
                let state = PersistedState {
                    cumulative: restore_snapshot(&document, "cumulative", CumulativeSnapshot::is_valid),
                    daily: restore_snapshot(&document, "daily", DailySnapshot::is_valid),
                };
                info!(
                    "Loaded state from {} (cumulative={}, daily={})",
                    self.path.display(),
                    state.cumulative.is_some(),
                    state.daily.is_some()
                );
                state
            }
            Err(e) => {
                warn!(
                    "State file {} is corrupt, starting from zero: {}",
                    self.path.display(),
                    e
                );
                PersistedState::default()
            }
        }
    }

    /// Save state using an atomic write (temp file + rename).
    pub fn save(&self, state: &PersistedState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| StateError::Io {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
        }

        let json = serde_json::to_string_pretty(state)?;

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, json).map_err(|source| StateError::Io {
            path: temp_path.display().to_string(),
            source,
        })?;
        fs::rename(&temp_path, &self.path).map_err(|source| StateError::Io {
            path: self.path.display().to_string(),
            source,
        })?;

        debug!("Saved state to {}", self.path.display());
        Ok(())
    }
}
