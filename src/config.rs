use anyhow::{Result, anyhow};
use config::{Config, ConfigError, Environment, File, FileFormat};
use dirs_next::{config_dir, data_dir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "ANIPAGE";
const DEFAULT_API_BASE_URL: &str = "https://api.yumeko.example/v1";
const DEFAULT_SITE_BASE_URL: &str = "https://yumeko.example";
const DEFAULT_USER_AGENT: &str = concat!("anipage/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Runtime settings: built-in defaults, then `config.toml`, then `ANIPAGE_*` variables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub site_base_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("api_base_url", DEFAULT_API_BASE_URL)?
            .set_default("site_base_url", DEFAULT_SITE_BASE_URL)?
            .set_default("user_agent", DEFAULT_USER_AGENT)?
            .set_default("request_timeout_secs", DEFAULT_TIMEOUT_SECS)?
            .add_source(
                File::from(path.to_path_buf())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Directory holding the client state and progress cache.
    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.storage_dir {
            return Ok(dir.clone());
        }
        let base = data_dir().ok_or_else(|| anyhow!("Could not determine data directory"))?;
        Ok(base.join("anipage"))
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

pub fn config_path() -> PathBuf {
    config_dir()
        .map(|dir| dir.join("anipage").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.site_base_url, DEFAULT_SITE_BASE_URL);
        assert_eq!(settings.request_timeout(), Duration::from_secs(15));
        assert_eq!(settings.storage_dir, None);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "api_base_url = \"http://localhost:8080/api\"\nstorage_dir = \"/tmp/anipage-test\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.api_base_url, "http://localhost:8080/api");
        assert_eq!(settings.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(
            settings.storage_dir().unwrap(),
            PathBuf::from("/tmp/anipage-test")
        );
    }

    #[test]
    fn settings_render_as_toml() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("none.toml")).unwrap();
        let rendered = settings.to_toml().unwrap();
        assert!(rendered.contains("site_base_url"));
    }
}
