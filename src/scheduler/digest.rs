//! Daily digest of per-target health.
//!
//! Runs at most once per UTC calendar day. Each recipient gets one email
//! holding the sections of every target they subscribe to.

use askama::Template;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

use crate::config::{SystemConfig, TargetConfig};
use crate::notify::{deliver, merge_recipients, Email, Mailer};
use crate::status::{StatusStore, TargetState};

pub const DIGEST_SUBJECT: &str = "MONITORING STAT";

/// Summary of one target.
#[derive(Debug, Clone)]
pub struct DigestSection {
    pub url: String,
    pub state: &'static str,
    pub last_check: String,
    pub messages: Vec<DigestLine>,
}

/// One logged notification.
#[derive(Debug, Clone)]
pub struct DigestLine {
    pub time: String,
    pub subject: String,
    pub body: String,
}

#[derive(Template)]
#[template(path = "digest.txt")]
struct DigestTemplate<'a> {
    sections: &'a [DigestSection],
}

/// Whether a digest should go out: never sent, or last sent on another day.
pub fn digest_due(last_digest: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_digest {
        Some(last) => last.date_naive() != now.date_naive(),
        None => true,
    }
}

impl DigestSection {
    /// Targets seen but not checked yet are reported as PENDING.
    pub fn new(url: &str, state: &TargetState) -> Self {
        let health = match (state.last_check, state.ok) {
            (None, _) => "PENDING",
            (Some(_), true) => "OK",
            (Some(_), false) => "FAILED",
        };
        Self {
            url: url.to_string(),
            state: health,
            last_check: state
                .last_check
                .map(format_time)
                .unwrap_or_else(|| "never".to_string()),
            messages: state
                .messages
                .iter()
                .map(|m| DigestLine {
                    time: format_time(m.time),
                    subject: m.subject.clone(),
                    body: m.body.clone(),
                })
                .collect(),
        }
    }
}

/// Group target sections by recipient.
///
/// Recipients of a section are the target's digest list merged with the
/// system one; targets no longer configured go to the system list only.
pub fn compile_digest(
    store: &StatusStore,
    targets: &[TargetConfig],
    system: &SystemConfig,
) -> BTreeMap<String, Vec<DigestSection>> {
    let by_url: HashMap<&str, &TargetConfig> =
        targets.iter().map(|t| (t.url.as_str(), t)).collect();

    let mut per_recipient: BTreeMap<String, Vec<DigestSection>> = BTreeMap::new();

    store.for_each(|url, state| {
        let target_list = by_url
            .get(url)
            .map(|t| t.digest_to.as_slice())
            .unwrap_or(&[]);
        let section = DigestSection::new(url, state);

        for recipient in merge_recipients(&[system.digest_to.as_slice(), target_list]) {
            per_recipient.entry(recipient).or_default().push(section.clone());
        }
    });

    per_recipient
}

pub fn render_digest(sections: &[DigestSection]) -> Result<String, askama::Error> {
    DigestTemplate { sections }.render()
}

/// Mark the digest as sent for today, then mail it.
///
/// The dispatch time is recorded before any send so a failing relay does
/// not cause a second digest on the next run. Returns the number of emails
/// the transport accepted.
pub async fn send_digest(
    store: &StatusStore,
    targets: &[TargetConfig],
    system: &SystemConfig,
    mailer: &dyn Mailer,
    now: DateTime<Utc>,
) -> usize {
    store.set_last_digest(now);

    let per_recipient = compile_digest(store, targets, system);
    tracing::info!("Sending daily digest to {} recipients", per_recipient.len());

    let mut sent = 0;
    for (recipient, sections) in per_recipient {
        let body = match render_digest(&sections) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!("Can't render digest for {}: {}", recipient, e);
                continue;
            }
        };

        let email = Email {
            from: system.email_from.clone(),
            to: vec![recipient],
            subject: DIGEST_SUBJECT.to_string(),
            body,
        };
        if deliver(mailer, &email).await {
            sent += 1;
        }
    }

    sent
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
