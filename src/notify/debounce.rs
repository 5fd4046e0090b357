//! Per-target debounce state machine.
//!
//! Recoveries are announced on the first healthy check after a change.
//! Failures are held back until more than `skip_errors` of them happened
//! in a row, which absorbs transient blips.

use chrono::{DateTime, Utc};

use crate::probe::Outcome;
use crate::status::{MessageEntry, TargetState};

/// A notification the state machine decided to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub subject: String,
    pub body: String,
}

/// Per-target inputs to the state machine.
#[derive(Debug, Clone, Copy)]
pub struct AlertPolicy<'a> {
    pub url: &'a str,
    pub description: &'a str,
    /// Failures tolerated before alerting, 0 alerts on the first one.
    pub skip_errors: u32,
}

/// Fold a probe outcome into a copy of the target's state.
///
/// Returns the next state and the alert to send, if any. A returned alert
/// is already recorded in the next state's message log.
pub fn apply_outcome(
    mut state: TargetState,
    policy: &AlertPolicy<'_>,
    outcome: &Outcome,
    now: DateTime<Utc>,
) -> (TargetState, Option<Alert>) {
    if outcome.success {
        state.consecutive_failures = 0;
    } else {
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
    }

    if outcome.success != state.ok {
        state.notify_sent = false;
        state.ok = outcome.success;
    }

    let eligible = !state.notify_sent
        && (outcome.success || state.consecutive_failures > policy.skip_errors);

    let alert = if eligible {
        let alert = build_alert(policy, outcome);
        state.messages.push(MessageEntry {
            time: now,
            subject: alert.subject.clone(),
            body: alert.body.clone(),
        });
        state.notify_sent = true;
        Some(alert)
    } else {
        None
    };

    state.last_check = Some(now);
    (state, alert)
}

fn build_alert(policy: &AlertPolicy<'_>, outcome: &Outcome) -> Alert {
    let subject = if outcome.success {
        format!("OK: {}", policy.url)
    } else {
        format!("ERROR: {}", policy.url)
    };

    let body = if policy.description.is_empty() {
        outcome.reason.clone()
    } else {
        format!("{}\n\n{}", outcome.reason, policy.description)
    };

    Alert { subject, body }
}
