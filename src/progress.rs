use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::types::Provider;

/// One locally recorded playback position, written by the player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEntry {
    pub anime_id: i64,
    pub provider: Provider,
    #[serde(default)]
    pub voice: Option<String>,
    pub episode: u32,
    pub watched_seconds: u32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressKey<'a> {
    pub anime_id: i64,
    pub provider: Provider,
    pub voice: Option<&'a str>,
    pub episode: u32,
}

/// Read-only view of the local watch-progress cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressCache {
    pub entries: Vec<ProgressEntry>,
}

impl ProgressCache {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read progress cache {}", path.display()))?;
        let cache = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse progress cache {}", path.display()))?;
        Ok(cache)
    }

    /// Latest entry for the key; voice names compare case-insensitively.
    pub fn lookup(&self, key: ProgressKey<'_>) -> Option<&ProgressEntry> {
        self.entries
            .iter()
            .filter(|e| {
                e.anime_id == key.anime_id
                    && e.provider == key.provider
                    && e.episode == key.episode
                    && match (e.voice.as_deref(), key.voice) {
                        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                        (None, None) => true,
                        _ => false,
                    }
            })
            .max_by_key(|e| e.updated_at)
    }
}

pub fn progress_path(storage_dir: &Path) -> PathBuf {
    storage_dir.join("progress.json")
}
