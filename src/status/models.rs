//! Persisted status types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One notification that was actually sent for a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntry {
    pub time: DateTime<Utc>,
    pub subject: String,
    pub body: String,
}

/// Health and debounce state of a single target.
///
/// The zero value is the state of a target that was never evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetState {
    /// Health as of the last evaluated check.
    pub ok: bool,
    pub consecutive_failures: u32,
    /// Set once an alert went out for the current health streak.
    pub notify_sent: bool,
    /// Unset until the first evaluated check.
    pub last_check: Option<DateTime<Utc>>,
    /// First run that saw the target, anchors the first-check phase.
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,
    /// Notifications sent since the last persistence.
    #[serde(default)]
    pub messages: Vec<MessageEntry>,
}

/// Where a target stands in its alerting cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertPhase {
    /// No alert sent for the current streak yet.
    Pending,
    NotifiedUnhealthy,
    NotifiedHealthy,
}

impl std::fmt::Display for AlertPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertPhase::Pending => write!(f, "pending"),
            AlertPhase::NotifiedUnhealthy => write!(f, "notified-unhealthy"),
            AlertPhase::NotifiedHealthy => write!(f, "notified-healthy"),
        }
    }
}

impl TargetState {
    pub fn phase(&self) -> AlertPhase {
        match (self.notify_sent, self.ok) {
            (false, _) => AlertPhase::Pending,
            (true, false) => AlertPhase::NotifiedUnhealthy,
            (true, true) => AlertPhase::NotifiedHealthy,
        }
    }

    /// Most recent sign of life, used for retention.
    pub fn activity_time(&self) -> Option<DateTime<Utc>> {
        self.last_check.or(self.first_seen)
    }
}

/// Serialized form of the whole status store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Last time the daily digest went out.
    #[serde(default)]
    pub last_digest: Option<DateTime<Utc>>,
    #[serde(default)]
    pub targets: BTreeMap<String, TargetState>,
}
