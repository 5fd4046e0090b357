//! Configuration module for SiteWatch.
//!
//! File locations come from environment variables with sensible defaults;
//! the system settings and the target list are YAML documents.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::scheduler::DEFAULT_RETENTION;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("can't read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("can't parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid target url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("target url '{0}' is configured more than once")]
    DuplicateUrl(String),
}

/// Locations of the files a run reads and writes.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// System settings file (default: "system.yml")
    pub system_path: PathBuf,
    /// Target list file (default: "websites.yml")
    pub targets_path: PathBuf,
    /// Persisted status file (default: "status.json")
    pub status_path: PathBuf,
    /// How long an unchecked status entry survives (default: 48h)
    pub retention: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            system_path: PathBuf::from("system.yml"),
            targets_path: PathBuf::from("websites.yml"),
            status_path: PathBuf::from("status.json"),
            retention: DEFAULT_RETENTION,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SITEWATCH_SYSTEM_CONFIG`: system settings path (default: "system.yml")
    /// - `SITEWATCH_TARGETS_CONFIG`: target list path (default: "websites.yml")
    /// - `SITEWATCH_STATUS_PATH`: status file path (default: "status.json")
    /// - `SITEWATCH_RETENTION_HOURS`: status retention window in hours,
    ///   clamped to 24..=48 (default: 48)
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(path) = env::var("SITEWATCH_SYSTEM_CONFIG") {
            cfg.system_path = PathBuf::from(path);
        }

        if let Ok(path) = env::var("SITEWATCH_TARGETS_CONFIG") {
            cfg.targets_path = PathBuf::from(path);
        }

        if let Ok(path) = env::var("SITEWATCH_STATUS_PATH") {
            cfg.status_path = PathBuf::from(path);
        }

        if let Ok(hours_str) = env::var("SITEWATCH_RETENTION_HOURS") {
            if let Some(retention) = parse_retention_hours(&hours_str) {
                cfg.retention = retention;
            }
        }

        cfg
    }
}

/// Retention window bounds in hours.
pub const RETENTION_HOURS_MIN: u64 = 24;
pub const RETENTION_HOURS_MAX: u64 = 48;

/// Parse a retention override. Zero or garbage keeps the default,
/// anything else is clamped to the supported window.
pub fn parse_retention_hours(value: &str) -> Option<Duration> {
    let hours = value.trim().parse::<u64>().ok().filter(|&h| h > 0)?;
    let secs = hours
        .clamp(RETENTION_HOURS_MIN, RETENTION_HOURS_MAX)
        .checked_mul(3600)?;
    Some(Duration::from_secs(secs))
}

/// Global settings and fallbacks shared by every target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    pub email_from: String,
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_login: String,
    #[serde(default)]
    pub smtp_password: String,
    /// Alert recipients for every target.
    #[serde(default)]
    pub send_to: Vec<String>,
    /// Daily digest recipients for every target.
    #[serde(default)]
    pub digest_to: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub skip_errors_count: u32,
    /// 0 checks every target on every run.
    #[serde(default)]
    pub check_interval_secs: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            email_from: String::new(),
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_login: String::new(),
            smtp_password: String::new(),
            send_to: Vec::new(),
            digest_to: Vec::new(),
            timeout_secs: default_timeout_secs(),
            skip_errors_count: 0,
            check_interval_secs: 0,
        }
    }
}

/// One monitored HTTP endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetConfig {
    pub url: String,
    /// Substring the response body must contain. Empty always matches.
    #[serde(default)]
    pub contains: String,
    /// Expected status code, 0 accepts any status and follows redirects.
    #[serde(default, skip_serializing_if = "is_zero_u16")]
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub check_interval_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_errors_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub send_to: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub digest_to: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl TargetConfig {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn effective_timeout(&self, system: &SystemConfig) -> Duration {
        if self.timeout_secs != 0 {
            Duration::from_secs(self.timeout_secs)
        } else {
            Duration::from_secs(system.timeout_secs)
        }
    }

    pub fn effective_interval(&self, system: &SystemConfig) -> Duration {
        if self.check_interval_secs != 0 {
            Duration::from_secs(self.check_interval_secs)
        } else {
            Duration::from_secs(system.check_interval_secs)
        }
    }

    pub fn effective_skip_errors(&self, system: &SystemConfig) -> u32 {
        self.skip_errors_count.unwrap_or(system.skip_errors_count)
    }
}

fn default_smtp_port() -> u16 {
    25
}

fn default_timeout_secs() -> u64 {
    10
}

fn is_zero_u16(v: &u16) -> bool {
    *v == 0
}

fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

/// Read and parse the system settings file.
pub fn load_system_config(path: &Path) -> Result<SystemConfig, ConfigError> {
    let content = read(path)?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Read, parse and validate the target list file.
pub fn load_targets(path: &Path) -> Result<Vec<TargetConfig>, ConfigError> {
    let content = read(path)?;
    let targets: Vec<TargetConfig> =
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    validate_targets(&targets)?;
    Ok(targets)
}

/// Targets are identified by URL, so every URL must be usable and unique.
pub fn validate_targets(targets: &[TargetConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for target in targets {
        let url = reqwest::Url::parse(&target.url).map_err(|e| ConfigError::InvalidUrl {
            url: target.url.clone(),
            reason: e.to_string(),
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl {
                url: target.url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        if !seen.insert(target.url.as_str()) {
            return Err(ConfigError::DuplicateUrl(target.url.clone()));
        }
    }

    Ok(())
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}
