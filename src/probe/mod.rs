//! Probe module for website monitoring.
//!
//! A probe is a single HTTP check; it never retries and never fails the
//! run. Every error is folded into a failed [`Outcome`].

mod http;

pub use http::*;

use crate::config::{SystemConfig, TargetConfig};

use std::time::Duration;
use thiserror::Error;

/// Probe error types. The display text becomes the outcome reason.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("transport error: timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("status code {got} instead of {expected}")]
    StatusMismatch { got: u16, expected: u16 },
    #[error("substring not found: '{0}'")]
    SubstringNotFound(String),
}

/// Probe configuration.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub url: String,
    /// Required body substring, empty always matches.
    pub contains: String,
    /// Expected status code, 0 accepts any status.
    pub expected_status: u16,
    pub timeout: Duration,
}

impl ProbeConfig {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            contains: String::new(),
            expected_status: 0,
            timeout,
        }
    }

    /// Resolve a target's probe settings against the system defaults.
    pub fn for_target(target: &TargetConfig, system: &SystemConfig) -> Self {
        Self {
            url: target.url.clone(),
            contains: target.contains.clone(),
            expected_status: target.status_code,
            timeout: target.effective_timeout(system),
        }
    }
}

/// Classified result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub success: bool,
    pub reason: String,
}

impl Outcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            reason: "OK".to_string(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: reason.into(),
        }
    }
}

/// Run a probe with the given configuration.
pub async fn run_probe(config: &ProbeConfig) -> Outcome {
    match run_http_probe(config).await {
        Ok(()) => Outcome::ok(),
        Err(e) => Outcome::failed(e.to_string()),
    }
}
