//! Configuration for study forge.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use study_engine::session::{DEFAULT_QUIZ_LENGTH, DEFAULT_TEST_LENGTH};
use study_engine::StudyMode;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub study: StudyConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    pub fn load() -> Self {
        Self::config_path()
            .map(|p| Self::load_from(&p))
            .unwrap_or_default()
    }

    /// Load from `path`, falling back to defaults when missing or invalid.
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| toml::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(path) = Self::config_path() {
            self.save_to(&path)?;
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "study-forge")
            .map(|d| d.config_dir().join("config.toml"))
    }

    /// Database location: the configured override, else the data dir.
    pub fn db_path(&self) -> Option<PathBuf> {
        self.storage.db_path.clone().or_else(|| {
            directories::ProjectDirs::from("", "", "study-forge")
                .map(|d| d.data_dir().join("study-forge.db"))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyConfig {
    #[serde(default = "default_quiz_length")]
    pub quiz_length: usize,
    #[serde(default = "default_test_length")]
    pub test_length: usize,
    #[serde(default)]
    pub default_mode: StudyMode,
    #[serde(default)]
    pub shuffle: bool,
}

fn default_quiz_length() -> usize { DEFAULT_QUIZ_LENGTH }
fn default_test_length() -> usize { DEFAULT_TEST_LENGTH }

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            quiz_length: DEFAULT_QUIZ_LENGTH,
            test_length: DEFAULT_TEST_LENGTH,
            default_mode: StudyMode::Learn,
            shuffle: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String { "warn".to_string() }

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[study]\nquiz_length = 4\n").unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.study.quiz_length, 4);
        assert_eq!(config.study.test_length, DEFAULT_TEST_LENGTH);
        assert_eq!(config.study.default_mode, StudyMode::Learn);
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn test_missing_or_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Config::load_from(&dir.path().join("nope.toml"));
        assert_eq!(missing.study.quiz_length, DEFAULT_QUIZ_LENGTH);

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "study = [").unwrap();
        assert!(!Config::load_from(&bad).study.shuffle);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.study.default_mode = StudyMode::Review;
        config.storage.db_path = Some(dir.path().join("sets.db"));
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path);
        assert_eq!(loaded.study.default_mode, StudyMode::Review);
        assert_eq!(loaded.db_path(), Some(dir.path().join("sets.db")));
    }
}
