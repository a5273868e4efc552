use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Persisted client-side state the page reads on demand.
pub trait ClientStorage {
    fn auth_token(&self) -> Option<String>;
    /// Login name of the signed-in user, used for ownership checks.
    fn session_username(&self) -> Option<String>;
    fn external_warning_shown(&self) -> bool;
    fn mark_external_warning_shown(&self) -> Result<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredState {
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub external_warning_shown: bool,
}

impl StoredState {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read client state {}", path.display()))?;
        let state = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse client state {}", path.display()))?;
        Ok(state)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create state directory {}", parent.display())
            })?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)
            .with_context(|| format!("failed to write client state {}", path.display()))?;
        Ok(())
    }
}

/// JSON file backed storage. Every read goes to disk so a token written by
/// another process is picked up on the next request.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("state.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> StoredState {
        match StoredState::load(&self.path) {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unreadable client state");
                StoredState::default()
            }
        }
    }
}

impl ClientStorage for FileStorage {
    fn auth_token(&self) -> Option<String> {
        self.read().auth_token.filter(|t| !t.trim().is_empty())
    }

    fn session_username(&self) -> Option<String> {
        self.read().username
    }

    fn external_warning_shown(&self) -> bool {
        self.read().external_warning_shown
    }

    fn mark_external_warning_shown(&self) -> Result<()> {
        let mut state = StoredState::load(&self.path)?;
        state.external_warning_shown = true;
        state.save(&self.path)
    }
}

/// Storage that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<StoredState>,
}

impl MemoryStorage {
    pub fn new(state: StoredState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn signed_in(username: &str, token: &str) -> Self {
        Self::new(StoredState {
            auth_token: Some(token.to_string()),
            username: Some(username.to_string()),
            external_warning_shown: false,
        })
    }
}

impl ClientStorage for MemoryStorage {
    fn auth_token(&self) -> Option<String> {
        self.state.lock().auth_token.clone()
    }

    fn session_username(&self) -> Option<String> {
        self.state.lock().username.clone()
    }

    fn external_warning_shown(&self) -> bool {
        self.state.lock().external_warning_shown
    }

    fn mark_external_warning_shown(&self) -> Result<()> {
        self.state.lock().external_warning_shown = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_means_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::in_dir(dir.path());
        assert_eq!(storage.auth_token(), None);
        assert!(!storage.external_warning_shown());
    }

    #[test]
    fn warning_flag_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::in_dir(&dir.path().join("nested"));
        storage.mark_external_warning_shown().unwrap();

        let reopened = FileStorage::in_dir(&dir.path().join("nested"));
        assert!(reopened.external_warning_shown());
    }

    #[test]
    fn token_is_read_on_every_call() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::in_dir(dir.path());
        assert_eq!(storage.auth_token(), None);

        StoredState {
            auth_token: Some("abc".into()),
            username: Some("alice".into()),
            external_warning_shown: false,
        }
        .save(storage.path())
        .unwrap();

        assert_eq!(storage.auth_token().as_deref(), Some("abc"));
        assert_eq!(storage.session_username().as_deref(), Some("alice"));
    }

    #[test]
    fn blank_token_counts_as_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::in_dir(dir.path());
        StoredState {
            auth_token: Some("  ".into()),
            ..StoredState::default()
        }
        .save(storage.path())
        .unwrap();
        assert_eq!(storage.auth_token(), None);
    }
}
