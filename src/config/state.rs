// src/config/state.rs
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::settings::Settings;

pub const DEFAULT_STATE_PATH: &str = "app_state.json";
pub const ENV_STATE_PATH: &str = "SENTINEL_STATE_PATH";

/// Process state written on shutdown and restored on startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PersistedState {
    pub active_profile: String,
    pub topics: Vec<String>,
    pub settings: Settings,
    pub data_source_file: String,
    pub prompt_file: String,
}

pub fn state_path() -> PathBuf {
    std::env::var(ENV_STATE_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATE_PATH))
}

/// `Ok(None)` if the file does not exist.
pub fn load(path: &Path) -> Result<Option<PersistedState>> {
    let data = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("reading state {}", path.display())),
    };
    let state: PersistedState = serde_json::from_str(&data)
        .with_context(|| format!("parsing state {}", path.display()))?;
    Ok(Some(state))
}

/// Write via temp file + rename so a crash never leaves a torn state file.
pub fn save(path: &Path, state: &PersistedState) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_vec_pretty(state).context("serializing state")?;
    let mut f = fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    f.write_all(&json)?;
    f.sync_all()?;
    fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}
