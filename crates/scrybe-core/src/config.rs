//! Configuration (`settings.json`)
//!
//! Loaded once at daemon/CLI startup. Every field carries `#[serde(default)]`
//! so a partial or absent settings file is valid; the defaults mirror the
//! documented defaults in the persisted-state-layout table.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScreenMode {
    Primary,
    All,
    Specific,
    Combined,
}

impl Default for ScreenMode {
    fn default() -> Self {
        ScreenMode::Primary
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureConfig {
    pub screen_interval: f64,
    pub screen_mode: ScreenMode,
    pub specific_monitors: Vec<u32>,
    pub clipboard_poll_interval: f64,
    pub clipboard_max_size: u64,
    pub watch_directories: Vec<PathBuf>,
    pub file_max_size: u64,
    pub file_extensions: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            screen_interval: 5.0,
            screen_mode: ScreenMode::Primary,
            specific_monitors: Vec::new(),
            clipboard_poll_interval: 0.5,
            clipboard_max_size: 1024 * 1024,
            watch_directories: default_watch_directories(),
            file_max_size: 10 * 1024 * 1024,
            file_extensions: default_file_extensions(),
        }
    }
}

fn default_watch_directories() -> Vec<PathBuf> {
    let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) else {
        return Vec::new();
    };
    vec![
        home.join("Documents"),
        home.join("Desktop"),
        home.join("Downloads"),
    ]
}

fn default_file_extensions() -> Vec<String> {
    [
        ".txt", ".md", ".markdown", ".rst", ".py", ".js", ".ts", ".jsx", ".tsx", ".java", ".c",
        ".cpp", ".h", ".cs", ".go", ".rs", ".rb", ".php", ".swift", ".kt", ".scala", ".r", ".m",
        ".sh", ".bash", ".zsh", ".fish", ".sql", ".html", ".css", ".scss", ".sass", ".less",
        ".xml", ".json", ".yaml", ".yml", ".toml", ".ini", ".conf", ".cfg", ".pdf", ".docx",
        ".doc", ".odt", ".rtf",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageConfig {
    pub max_records: Option<u64>,
    pub max_age_days: Option<u64>,
    pub auto_cleanup: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_records: None,
            max_age_days: None,
            auto_cleanup: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrivacySettingsConfig {
    pub enable_pii_detection: bool,
    pub excluded_apps: Vec<String>,
    pub excluded_windows: Vec<String>,
}

impl Default for PrivacySettingsConfig {
    fn default() -> Self {
        Self {
            enable_pii_detection: true,
            excluded_apps: Vec::new(),
            excluded_windows: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LlmConfig {
    pub provider: String,
    pub fast_url: Option<String>,
    pub balanced_url: Option<String>,
    pub powerful_url: Option<String>,
    pub fast_api_key: Option<String>,
    pub balanced_api_key: Option<String>,
    pub powerful_api_key: Option<String>,
    pub fast_model: String,
    pub balanced_model: String,
    pub powerful_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            fast_url: Some("http://localhost:11434".to_string()),
            balanced_url: Some("http://localhost:11434".to_string()),
            powerful_url: Some("http://localhost:11434".to_string()),
            fast_api_key: None,
            balanced_api_key: None,
            powerful_api_key: None,
            fast_model: "llama3.2:1b".to_string(),
            balanced_model: "llama3.2".to_string(),
            powerful_model: "llama3.1:70b".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UiConfig {
    pub theme: String,
    pub timeline_page_size: u32,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: "system".to_string(),
            timeline_page_size: 50,
        }
    }
}

/// Top-level configuration, deserialized from `settings.json`. Every field
/// is optional in the file; missing sections fall back to their `Default`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub capture: CaptureConfig,
    pub storage: StorageConfig,
    pub privacy: PrivacySettingsConfig,
    pub llm: LlmConfig,
    pub ui: UiConfig,
}

impl Config {
    /// The default `<home>/.unified-ai/` data directory, resolved via
    /// `directories::ProjectDirs` where available and falling back to a
    /// literal `~/.unified-ai` otherwise.
    pub fn default_data_dir() -> PathBuf {
        if let Some(base_dirs) = directories::BaseDirs::new() {
            return base_dirs.home_dir().join(".unified-ai");
        }
        PathBuf::from(".unified-ai")
    }

    /// Load `settings.json` from `data_dir`, or return `Config::default()`
    /// if the file doesn't exist yet.
    pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        let path = data_dir.join("settings.json");
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Persist this configuration to `<data_dir>/settings.json`.
    pub fn save(&self, data_dir: &Path) -> Result<(), ConfigError> {
        let path = data_dir.join("settings.json");
        let contents = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, contents).map_err(|source| ConfigError::Write { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_in_defaults() {
        let json = r#"{"storage": {"maxRecords": 1000}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.storage.max_records, Some(1000));
        assert_eq!(config.capture.screen_interval, 5.0);
        assert_eq!(config.llm.balanced_model, "llama3.2");
    }

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.capture.screen_interval = 10.0;
        config.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.capture.screen_interval, 10.0);
    }

    #[test]
    fn missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.storage.max_records, None);
    }
}
