use crate::core::config::data::{path_display, Config, CONFIG_KEYS};
use crate::core::constants::{APP_NAME, APP_ORGANIZATION, APP_QUALIFIER};
use directories::ProjectDirs;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Errors that can occur when loading, editing, or saving configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    Read {
        /// Path to the configuration file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the configuration file as valid TOML.
    Parse {
        /// Path to the configuration file with invalid TOML.
        path: PathBuf,
        /// The TOML deserialization error.
        source: toml::de::Error,
    },

    /// Failed to write the configuration file.
    Write {
        path: PathBuf,
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The platform offers no configuration directory.
    NoConfigDir,

    UnknownKey(String),

    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn display_path(path: &Path) -> String {
        path_display(path)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(
                    f,
                    "Failed to read config at {}: {}",
                    Self::display_path(path),
                    source
                )
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "Failed to parse config at {}: {}",
                    Self::display_path(path),
                    source
                )
            }
            ConfigError::Write { path, source } => {
                write!(
                    f,
                    "Failed to write config at {}: {}",
                    Self::display_path(path),
                    source
                )
            }
            ConfigError::NoConfigDir => write!(f, "Could not determine a config directory"),
            ConfigError::UnknownKey(key) => {
                write!(
                    f,
                    "Unknown config key '{key}'. Available keys: {}",
                    CONFIG_KEYS.join(", ")
                )
            }
            ConfigError::InvalidValue { key, value, reason } => {
                write!(f, "Invalid value '{value}' for {key}: {reason}")
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Write { source, .. } => Some(source.as_ref()),
            ConfigError::NoConfigDir
            | ConfigError::UnknownKey(_)
            | ConfigError::InvalidValue { .. } => None,
        }
    }
}

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
}

impl Config {
    /// Load the config from the platform config directory.
    pub fn load() -> Result<Config, ConfigError> {
        Self::load_from_path(&Self::get_config_path()?)
    }

    pub fn load_from_path(config_path: &Path) -> Result<Config, ConfigError> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
                path: config_path.to_path_buf(),
                source,
            })?;
            let config: Config =
                toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: config_path.to_path_buf(),
                    source,
                })?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to_path(&Self::get_config_path()?)
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<(), ConfigError> {
        self.write_atomically(config_path)
            .map_err(|source| ConfigError::Write {
                path: config_path.to_path_buf(),
                source,
            })
    }

    fn write_atomically(
        &self,
        config_path: &Path,
    ) -> Result<(), Box<dyn StdError + Send + Sync>> {
        let parent = config_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty());

        if let Some(dir) = parent {
            fs::create_dir_all(dir)?;
        }

        let contents = toml::to_string_pretty(self)?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };

        temp_file.write_all(contents.as_bytes())?;
        temp_file.as_file_mut().sync_all()?;
        temp_file.persist(config_path)?;
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        let proj_dirs = project_dirs().ok_or(ConfigError::NoConfigDir)?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }
}
