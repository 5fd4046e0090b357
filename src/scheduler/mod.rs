//! Scheduler module: one monitoring run from first probe to saved status.

mod digest;
mod jitter;
mod retention;

pub use digest::*;
pub use jitter::*;
pub use retention::*;

use crate::config::{SystemConfig, TargetConfig};
use crate::notify::{apply_outcome, deliver, merge_recipients, AlertPolicy, Email, Mailer};
use crate::probe::{run_probe, ProbeConfig};
use crate::status::StatusStore;

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Everything a run needs, built once by the caller.
pub struct RunContext {
    pub system: SystemConfig,
    pub targets: Vec<TargetConfig>,
    pub store: StatusStore,
    pub mailer: Arc<dyn Mailer>,
    pub status_path: PathBuf,
    pub retention: Duration,
    pub clock: Clock,
}

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub checked: usize,
    pub skipped: usize,
    pub alerts: usize,
    /// Check tasks that panicked.
    pub failed_tasks: usize,
    /// Digest emails accepted by the transport, `None` if no digest was due.
    pub digest_emails: Option<usize>,
    pub persisted: bool,
}

enum CheckReport {
    Skipped,
    Checked { alerted: bool },
}

/// Runs every target check concurrently, then the digest and persistence.
pub struct Runner {
    ctx: Arc<RunContext>,
    due: DueCheck,
}

impl Runner {
    pub fn new(ctx: RunContext) -> Self {
        let first_use = (ctx.clock)();
        Self {
            ctx: Arc::new(ctx),
            due: DueCheck::new(first_use),
        }
    }

    /// Execute one full check, notify, digest and persist cycle.
    pub async fn run(&self) -> RunSummary {
        let mut summary = RunSummary::default();

        tracing::info!("Starting run with {} targets", self.ctx.targets.len());

        let mut tasks = JoinSet::new();
        for target in self.ctx.targets.iter().cloned() {
            let ctx = self.ctx.clone();
            let due = self.due;
            tasks.spawn(async move { check_target(&ctx, &due, &target).await });
        }

        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(CheckReport::Skipped) => summary.skipped += 1,
                Ok(CheckReport::Checked { alerted }) => {
                    summary.checked += 1;
                    if alerted {
                        summary.alerts += 1;
                    }
                }
                Err(e) => {
                    tracing::error!("Check task failed: {}", e);
                    summary.failed_tasks += 1;
                }
            }
        }

        let now = (self.ctx.clock)();
        if digest_due(self.ctx.store.last_digest(), now) {
            let sent = send_digest(
                &self.ctx.store,
                &self.ctx.targets,
                &self.ctx.system,
                self.ctx.mailer.as_ref(),
                now,
            )
            .await;
            summary.digest_emails = Some(sent);
        }

        let configured: HashSet<&str> =
            self.ctx.targets.iter().map(|t| t.url.as_str()).collect();
        summary.persisted = persist_status(
            &self.ctx.store,
            &self.ctx.status_path,
            now,
            self.ctx.retention,
            &configured,
        );

        tracing::info!(
            "Run finished: {} checked, {} skipped, {} alerts",
            summary.checked,
            summary.skipped,
            summary.alerts
        );

        summary
    }
}

/// Check a single target if it is due.
///
/// The state is copied out of the store, advanced without holding the
/// lock, and written back.
async fn check_target(ctx: &RunContext, due: &DueCheck, target: &TargetConfig) -> CheckReport {
    let url = target.url.as_str();
    let mut state = ctx.store.get(url);
    let now = (ctx.clock)();

    let interval = target.effective_interval(&ctx.system);
    if !due.is_due(url, interval, state.last_check, state.first_seen, now) {
        if state.last_check.is_none() && state.first_seen.is_none() {
            state.first_seen = Some(due.first_use());
            ctx.store.set(url, state);
        }
        tracing::debug!("Skip {}: not due yet", url);
        return CheckReport::Skipped;
    }

    let outcome = run_probe(&ProbeConfig::for_target(target, &ctx.system)).await;
    tracing::debug!(
        "Probe {}: success={} ({})",
        url,
        outcome.success,
        outcome.reason
    );

    let policy = AlertPolicy {
        url,
        description: &target.description,
        skip_errors: target.effective_skip_errors(&ctx.system),
    };
    let (next, alert) = apply_outcome(state, &policy, &outcome, (ctx.clock)());
    tracing::debug!(
        "{}: {} after {} consecutive failures",
        url,
        next.phase(),
        next.consecutive_failures
    );
    ctx.store.set(url, next);

    let Some(alert) = alert else {
        return CheckReport::Checked { alerted: false };
    };

    tracing::info!("Alert: {}", alert.subject);
    let email = Email {
        from: ctx.system.email_from.clone(),
        to: merge_recipients(&[ctx.system.send_to.as_slice(), target.send_to.as_slice()]),
        subject: alert.subject,
        body: alert.body,
    };
    deliver(ctx.mailer.as_ref(), &email).await;

    CheckReport::Checked { alerted: true }
}
