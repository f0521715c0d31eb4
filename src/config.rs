use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

pub const CONFIG_FILE: &str = "docidx.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_index")]
    pub index: PathBuf,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub max_distance: Option<usize>,
    #[serde(default = "default_true")]
    pub show_descriptions: bool,
    #[serde(default = "default_true")]
    pub highlight: bool,
    #[serde(default)]
    pub crates: Vec<String>,
}

fn default_index() -> PathBuf {
    PathBuf::from("target/doc/search-index.js")
}

fn default_limit() -> usize {
    20
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index: default_index(),
            limit: default_limit(),
            max_distance: None,
            show_descriptions: true,
            highlight: true,
            crates: Vec::new(),
        }
    }
}

impl Config {
    /// Load `docidx.toml` from the working directory, falling back to the
    /// defaults when it is missing or unreadable
    pub fn load() -> Self {
        let config_path = PathBuf::from(CONFIG_FILE);

        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    warn!("{e}");
                    warn!("using default configuration");
                }
            }
        }

        Config::default()
    }

    /// Load an explicitly named config file; any failure is an error
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "limit = 5\ncrates = [\"servo_test\"]\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.limit, 5);
        assert_eq!(config.crates, vec!["servo_test"]);
        assert_eq!(config.index, default_index());
        assert!(config.show_descriptions);
        assert!(config.highlight);
        assert_eq!(config.max_distance, None);
    }

    #[test]
    fn test_invalid_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "limit = \"many\"").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.starts_with("Failed to parse"));

        let missing = Config::load_from(&dir.path().join("nope.toml")).unwrap_err();
        assert!(missing.starts_with("Failed to read"));
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(toml::from_str::<Config>("").unwrap(), Config::default());
    }
}
