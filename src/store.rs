//! Persisted key-value state, one JSON document on disk.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::kernel::time::Timestamp;

/// Badge value shown for the current tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TabProductivity {
    #[default]
    Unknown,
    #[serde(rename = "Checking...")]
    Checking,
    Productive,
    Unproductive,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    pub current_task: Option<String>,
    pub is_monitoring: bool,
    pub is_paused: bool,
    pub strikes: u32,
    pub checks: u32,
    pub last_strike_at: Option<Timestamp>,
    pub mom_called: bool,
    pub calls: u32,
    pub mom_phone_number: Option<String>,
    pub your_phone_number: Option<String>,
    pub current_tab_productivity: TabProductivity,
    pub productivity_justification: Option<String>,
}

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

    /// Missing file loads as the default state.
    pub fn load(&self) -> Result<PersistedState, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(PersistedState::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Write to a sibling temp file, then rename over the target.
    pub fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&serde_json::to_vec_pretty(state)?)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
