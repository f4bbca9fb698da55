use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

const APP_NAME: &str = "srcdb";
const CONFIG_FILE: &str = "config.json";

/// Application configuration stored in the app data directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Files larger than this are skipped by the build driver
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Glob patterns (relative to the project root) selecting files to index
    #[serde(default = "default_include_patterns")]
    pub include_patterns: Vec<String>,

    /// Directory names never descended into
    #[serde(default = "default_ignored_dirs")]
    pub ignored_dirs: Vec<String>,

    /// Id given to the first file of a build; later files count up from it
    #[serde(default = "default_first_file_id")]
    pub first_file_id: u64,
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_include_patterns() -> Vec<String> {
    vec!["**/*.java".to_string()]
}

fn default_ignored_dirs() -> Vec<String> {
    [".git", "node_modules", "target", "build", "out", ".gradle", ".idea"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_first_file_id() -> u64 {
    1
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            include_patterns: default_include_patterns(),
            ignored_dirs: default_ignored_dirs(),
            first_file_id: default_first_file_id(),
        }
    }
}

impl AppConfig {
    /// Load config from `path`, or from the app data directory when `path`
    /// is `None`. A missing default config file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = get_config_path()?;
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", config_path.display()))?;
        Ok(config)
    }

    /// Save config to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }
}

/// Get the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    let app_dir = get_app_data_dir()?;
    Ok(app_dir.join(CONFIG_FILE))
}

/// Get the application data directory for storing indexes
pub fn get_app_data_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Application Support"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
    } else {
        // Linux/Unix: use XDG_DATA_HOME or ~/.local/share
        dirs::data_dir()
    };

    let base = base.context("Could not determine app data directory")?;
    let app_dir = base.join(APP_NAME);

    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}

/// Get the default index directory for a project
pub fn get_index_dir(project: &str) -> Result<PathBuf> {
    let indexes_dir = get_app_data_dir()?.join("indexes");
    fs::create_dir_all(&indexes_dir)?;
    Ok(indexes_dir.join(index_folder_name(project)))
}

/// Folder name for a project: readable prefix + hash of the full name
fn index_folder_name(project: &str) -> String {
    let sanitized: String = project
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .take(16)
        .collect();

    let mut hasher = DefaultHasher::new();
    project.hash(&mut hasher);
    let hash = hasher.finish();

    format!("{}-{:016x}", sanitized, hash)
}
