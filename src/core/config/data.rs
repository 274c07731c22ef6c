use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::client::{ApiSettings, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use crate::core::config::io::ConfigError;
use crate::core::constants::DEFAULT_MODEL;
use crate::utils::url::normalize_base_url;

/// Where the signed-in credential is persisted between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    /// The platform keyring
    Keyring,
    /// A private TOML file under the data directory
    #[default]
    File,
    /// Nothing is persisted; sign-in lasts for one run
    Memory,
}

impl CredentialBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            CredentialBackend::Keyring => "keyring",
            CredentialBackend::File => "file",
            CredentialBackend::Memory => "memory",
        }
    }
}

impl fmt::Display for CredentialBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys accepted by `chatdesk set` and `chatdesk unset`.
pub const CONFIG_KEYS: &[&str] = &[
    "base-url",
    "timeout",
    "default-model",
    "credential-store",
];

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Backend service root, e.g. "http://localhost:8082/ai"
    pub base_url: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Model new sessions start with until the backend lists its models
    pub default_model: Option<String>,
    pub credential_store: Option<CredentialBackend>,
}

impl Config {
    pub fn base_url(&self) -> String {
        match self.base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => normalize_base_url(url),
            _ => DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn timeout(&self) -> Duration {
        match self.timeout_secs {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => DEFAULT_TIMEOUT,
        }
    }

    pub fn default_model(&self) -> &str {
        match self.default_model.as_deref().map(str::trim) {
            Some(model) if !model.is_empty() => model,
            _ => DEFAULT_MODEL,
        }
    }

    pub fn credential_backend(&self) -> CredentialBackend {
        self.credential_store.unwrap_or_default()
    }

    /// Pipeline settings. The public allow-list is not configurable: only
    /// login and register go out without a token.
    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.base_url(),
            timeout: self.timeout(),
            ..ApiSettings::default()
        }
    }

    /// Replace the base URL unless `base_url` is missing or blank. Used for
    /// the environment and command-line overrides, in that order.
    pub fn override_base_url(&mut self, base_url: Option<String>) {
        if let Some(url) = base_url.filter(|url| !url.trim().is_empty()) {
            self.base_url = Some(url.trim().to_string());
        }
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let invalid = |reason: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };
        if value.is_empty() {
            return Err(invalid("value must not be empty"));
        }

        match key {
            "base-url" => {
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    return Err(invalid("expected an http:// or https:// URL"));
                }
                self.base_url = Some(normalize_base_url(value));
            }
            "timeout" => {
                let secs = value
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or_else(|| invalid("expected a positive number of seconds"))?;
                self.timeout_secs = Some(secs);
            }
            "default-model" => self.default_model = Some(value.to_string()),
            "credential-store" => {
                let backend = <CredentialBackend as ValueEnum>::from_str(value, true)
                    .map_err(|_| invalid("expected keyring, file, or memory"))?;
                self.credential_store = Some(backend);
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn unset_value(&mut self, key: &str) -> Result<(), ConfigError> {
        match key {
            "base-url" => self.base_url = None,
            "timeout" => self.timeout_secs = None,
            "default-model" => self.default_model = None,
            "credential-store" => self.credential_store = None,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
