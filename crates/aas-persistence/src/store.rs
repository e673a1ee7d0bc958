//! Atomic JSON state file.
//!
//! Writes go to `{file}.tmp` and are renamed over the target, so a crash
//! mid-write leaves the previous state intact. A missing or unreadable
//! file loads as an empty state.

use aas_core::api::RunRecord;
use aas_core::billing::{CumulativeBilling, IndividualJob};
use aas_core::device::{AgvDevice, EngraverDevice};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::PersistenceResult;

/// Default state file name, relative to the working directory.
pub const DEFAULT_STATE_FILE: &str = "simulation_state.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedDevices {
    pub engraver: EngraverDevice,
    pub agv: AgvDevice,
}

/// On-disk document. Every section is optional so an older or partial
/// file still loads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devices: Option<PersistedDevices>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing: Option<CumulativeBilling>,
    pub jobs: Vec<IndividualJob>,
    pub history: BTreeMap<String, RunRecord>,
}

impl PersistedState {
    pub fn is_empty(&self) -> bool {
        self.devices.is_none()
            && self.billing.is_none()
            && self.jobs.is_empty()
            && self.history.is_empty()
    }
}

/// JSON file holding the whole simulation state.
#[derive(Debug)]
pub struct JsonStateStore {
    path: PathBuf,
    tmp_path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        Self {
            path,
            tmp_path: PathBuf::from(tmp),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the state file. `Ok(None)` when it does not exist.
    pub fn try_load(&self) -> PersistenceResult<Option<PersistedState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        let state = serde_json::from_str(&raw)?;
        Ok(Some(state))
    }

    /// Read the state file, falling back to an empty state on any error.
    pub fn load(&self) -> PersistedState {
        match self.try_load() {
            Ok(Some(state)) => {
                info!(
                    path = %self.path.display(),
                    runs = state.history.len(),
                    jobs = state.jobs.len(),
                    "Loaded simulation state"
                );
                state
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "No state file, starting fresh");
                PersistedState::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to load state file, starting fresh");
                PersistedState::default()
            }
        }
    }

    /// Write `state` atomically.
    pub fn save(&self, state: &PersistedState) -> PersistenceResult<()> {
        let _guard = self.write_lock.lock();
        self.write(state)
    }

    /// Take the snapshot and write it while holding the write lock, so
    /// concurrent savers land on disk in snapshot order.
    pub fn save_with<F>(&self, snapshot: F) -> PersistenceResult<()>
    where
        F: FnOnce() -> PersistedState,
    {
        let _guard = self.write_lock.lock();
        let state = snapshot();
        self.write(&state)
    }

    fn write(&self, state: &PersistedState) -> PersistenceResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec_pretty(state)?;
        {
            let mut file = fs::File::create(&self.tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&self.tmp_path, &self.path)?;

        debug!(path = %self.path.display(), bytes = json.len(), "Saved simulation state");
        Ok(())
    }
}
