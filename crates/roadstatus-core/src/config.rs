//! API client configuration.
//!
//! Values are layered: built-in defaults, then the `TflApi` section of an
//! optional config file, then environment variables. CLI flags are applied by
//! the caller on top of the returned [`ApiConfig`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://api.tfl.gov.uk";

const ZERO_TIMEOUT: &str = "timeout must be at least 1 second";

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "appsettings.json";

#[derive(Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub app_id: Option<String>,
    pub app_key: Option<String>,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub max_jitter_ms: u64,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            app_id: None,
            app_key: None,
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_retries: 2,
            backoff_base_ms: 1_000,
            max_jitter_ms: 100,
            user_agent: concat!("roadstatus/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("app_id", &self.app_id)
            .field("app_key", &self.app_key.as_ref().map(|_| "[redacted]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .field("max_jitter_ms", &self.max_jitter_ms)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ApiConfig {
    /// The `(app_id, app_key)` pair, only when both are present and non-blank.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let app_id = self.app_id.as_deref().filter(|v| !v.trim().is_empty())?;
        let app_key = self.app_key.as_deref().filter(|v| !v.trim().is_empty())?;
        Some((app_id, app_key))
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.max_jitter_ms),
        )
    }
}

/// On-disk layout: `{ "TflApi": { "BaseUrl": ..., "AppId": ..., ... } }`.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(rename = "TflApi", default)]
    tfl_api: FileSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FileSection {
    base_url: Option<String>,
    app_id: Option<String>,
    app_key: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

/// Load configuration from the config file (if any) and the process environment.
///
/// The file is `path` when given, else `$ROADSTATUS_CONFIG`, else
/// [`DEFAULT_CONFIG_FILE`] if it exists in the working directory. An
/// explicitly named file must exist.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or parsed, an
/// environment override holds an invalid number, or the timeout is zero.
pub fn load_api_config(path: Option<&Path>) -> Result<ApiConfig, ConfigError> {
    let explicit = path
        .map(Path::to_path_buf)
        .or_else(|| non_blank(std::env::var("ROADSTATUS_CONFIG").ok()).map(PathBuf::from));

    let section = match explicit {
        Some(path) => Some(read_config_file(&path)?),
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_FILE);
            if fallback.is_file() {
                Some(read_config_file(fallback)?)
            } else {
                None
            }
        }
    };

    build_api_config(section, |key| std::env::var(key))
}

fn read_config_file(path: &Path) -> Result<FileSection, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_config_file(&content, path)
}

/// Parses the file body. `serde_yaml` accepts both YAML and JSON documents.
fn parse_config_file(content: &str, path: &Path) -> Result<FileSection, ConfigError> {
    if content.trim().is_empty() {
        return Ok(FileSection::default());
    }
    let file: ConfigFile = serde_yaml::from_str(content).map_err(|e| ConfigError::FileParse {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(file.tfl_api)
}

/// Build configuration from an optional file section and an env-var lookup.
///
/// Blank env values are ignored so an empty `TFL_APP_KEY=` does not erase a
/// key from the file.
fn build_api_config<F>(section: Option<FileSection>, lookup: F) -> Result<ApiConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let env = |var: &str| non_blank(lookup(var).ok());

    let parse_u64 = |var: &str| -> Result<Option<u64>, ConfigError> {
        env(var)
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map_err(|e| ConfigError::InvalidEnvVar {
                        var: var.to_string(),
                        reason: e.to_string(),
                    })
            })
            .transpose()
    };

    let parse_u32 = |var: &str| -> Result<Option<u32>, ConfigError> {
        env(var)
            .map(|raw| {
                raw.trim()
                    .parse::<u32>()
                    .map_err(|e| ConfigError::InvalidEnvVar {
                        var: var.to_string(),
                        reason: e.to_string(),
                    })
            })
            .transpose()
    };

    let mut config = ApiConfig::default();

    if let Some(section) = section {
        if let Some(base_url) = non_blank(section.base_url) {
            config.base_url = base_url;
        }
        config.app_id = non_blank(section.app_id);
        config.app_key = non_blank(section.app_key);
        if let Some(timeout_secs) = section.timeout_secs {
            if timeout_secs == 0 {
                return Err(ConfigError::InvalidFileValue {
                    key: "TimeoutSecs".to_owned(),
                    reason: ZERO_TIMEOUT.to_owned(),
                });
            }
            config.timeout_secs = timeout_secs;
        }
        if let Some(max_retries) = section.max_retries {
            config.max_retries = max_retries;
        }
    }

    if let Some(base_url) = env("TFL_BASE_URL") {
        config.base_url = base_url;
    }
    if let Some(app_id) = env("TFL_APP_ID") {
        config.app_id = Some(app_id);
    }
    if let Some(app_key) = env("TFL_APP_KEY") {
        config.app_key = Some(app_key);
    }
    if let Some(timeout_secs) = parse_u64("ROADSTATUS_TIMEOUT_SECS")? {
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar {
                var: "ROADSTATUS_TIMEOUT_SECS".to_owned(),
                reason: ZERO_TIMEOUT.to_owned(),
            });
        }
        config.timeout_secs = timeout_secs;
    }
    if let Some(max_retries) = parse_u32("ROADSTATUS_MAX_RETRIES")? {
        config.max_retries = max_retries;
    }
    if let Some(backoff_base_ms) = parse_u64("ROADSTATUS_BACKOFF_BASE_MS")? {
        config.backoff_base_ms = backoff_base_ms;
    }

    Ok(config)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
