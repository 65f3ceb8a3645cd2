//! Provider configuration.
//!
//! Loaded from `~/.config/pingone/provider.toml`; any `PINGONE_*`
//! environment variable overrides the matching file setting.

use anyhow::{Context, Result, bail};
use pingone::RetryConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_REGION: &str = "PINGONE_REGION";
pub const ENV_API_URL: &str = "PINGONE_API_URL";
pub const ENV_ACCESS_TOKEN: &str = "PINGONE_ACCESS_TOKEN";
pub const ENV_REQUEST_TIMEOUT: &str = "PINGONE_REQUEST_TIMEOUT_SECS";

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("pingone"))
}

/// Geography the tenant lives in; selects the API host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Region {
    #[default]
    NorthAmerica,
    Europe,
    AsiaPacific,
    Canada,
}

impl Region {
    pub fn api_url(&self) -> &'static str {
        match self {
            Self::NorthAmerica => "https://api.pingone.com/v1",
            Self::Europe => "https://api.pingone.eu/v1",
            Self::AsiaPacific => "https://api.pingone.asia/v1",
            Self::Canada => "https://api.pingone.ca/v1",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NorthAmerica => "NorthAmerica",
            Self::Europe => "Europe",
            Self::AsiaPacific => "AsiaPacific",
            Self::Canada => "Canada",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown region \"{0}\", expected one of: NorthAmerica, Europe, AsiaPacific, Canada")]
pub struct UnknownRegion(String);

impl FromStr for Region {
    type Err = UnknownRegion;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "northamerica" | "na" | "com" => Ok(Self::NorthAmerica),
            "europe" | "eu" => Ok(Self::Europe),
            "asiapacific" | "ap" | "asia" => Ok(Self::AsiaPacific),
            "canada" | "ca" => Ok(Self::Canada),
            _ => Err(UnknownRegion(s.to_string())),
        }
    }
}

/// `[retry]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            base_delay_ms: defaults.base_delay.as_millis() as u64,
            backoff_factor: defaults.backoff_factor,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            backoff_factor: settings.backoff_factor,
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub region: Region,

    /// Overrides the regional API URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Pre-acquired bearer token
    #[serde(default)]
    pub access_token: String,

    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub retry: RetrySettings,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            region: Region::default(),
            api_url: None,
            access_token: String::new(),
            request_timeout_secs: default_timeout(),
            retry: RetrySettings::default(),
        }
    }
}

impl ProviderConfig {
    /// Default config file location
    pub fn default_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("provider.toml"))
    }

    /// Load from the default location, then apply environment overrides.
    ///
    /// A missing file is not an error; the token may come from the environment.
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from an explicit path; `~` is expanded.
    pub fn load_from(path: &Path) -> Result<Self> {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        let path = PathBuf::from(expanded);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))?;
        log::debug!("Loaded provider config from {}", path.display());
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production)
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(region) = lookup(ENV_REGION) {
            self.region = region
                .parse()
                .with_context(|| format!("Invalid {ENV_REGION}"))?;
        }
        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.is_empty()) {
            self.api_url = Some(url);
        }
        if let Some(token) = lookup(ENV_ACCESS_TOKEN) {
            self.access_token = token;
        }
        if let Some(timeout) = lookup(ENV_REQUEST_TIMEOUT) {
            self.request_timeout_secs = timeout
                .trim()
                .parse()
                .with_context(|| format!("Invalid {ENV_REQUEST_TIMEOUT}: \"{timeout}\""))?;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.access_token.trim().is_empty() {
            bail!("access_token is empty; set it in provider.toml or {ENV_ACCESS_TOKEN}");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be positive");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if self.retry.backoff_factor < 1.0 {
            bail!("retry.backoff_factor must be at least 1.0");
        }
        if self.retry.base_delay_ms == 0 || self.retry.max_delay_ms < self.retry.base_delay_ms {
            bail!("retry delays must be positive and max_delay_ms must not be below base_delay_ms");
        }
        if let Some(url) = &self.api_url
            && !(url.starts_with("https://") || url.starts_with("http://"))
        {
            bail!("api_url must be an http(s) URL, got \"{url}\"");
        }
        Ok(())
    }

    /// API base URL: the override, or the region's URL
    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(self.region.api_url())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::from(&self.retry)
    }
}
