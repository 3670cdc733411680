use crate::{AppConfig, ConfigError};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

const ORG: &str = "io";
const AUTHOR: &str = "Crewboard";
const APP: &str = "Crewboard";

#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
    data_dir: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self, ConfigError> {
        let dirs = ProjectDirs::from(ORG, AUTHOR, APP).ok_or(ConfigError::MissingDirectories)?;
        Self::with_dirs(dirs.config_dir().to_path_buf(), dirs.data_dir().to_path_buf())
    }

    /// Keeps config and data under a single root, e.g. `--home` or tests.
    pub fn with_root(root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let root = root.as_ref();
        Self::with_dirs(root.join("config"), root.join("data"))
    }

    fn with_dirs(config_dir: PathBuf, data_dir: PathBuf) -> Result<Self, ConfigError> {
        fs::create_dir_all(&config_dir)?;
        fs::create_dir_all(&data_dir)?;

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            let initial = AppConfig::default();
            let content = toml::to_string_pretty(&initial)?;
            fs::write(&config_path, content)?;
            tracing::info!(path = %config_path.display(), "wrote default config");
        }

        Ok(Self {
            config_path,
            data_dir,
        })
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let content = fs::read_to_string(&self.config_path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content)?;
        Ok(())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn sounds_dir(&self) -> PathBuf {
        self.data_dir.join("sounds")
    }

    pub fn reminders_path(&self, config: &AppConfig) -> PathBuf {
        self.data_dir.join(&config.storage.reminders_file)
    }
}
