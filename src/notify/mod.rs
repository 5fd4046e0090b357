//! Notification module: alert debouncing and email delivery.

mod debounce;
mod smtp;

pub use debounce::*;
pub use smtp::*;

use async_trait::async_trait;
use std::collections::BTreeSet;
use thiserror::Error;

/// Mail error types.
#[derive(Error, Debug)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("can't build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("SMTP error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("no recipients")]
    NoRecipients,
    #[error("mail transport unavailable: {0}")]
    Unavailable(String),
}

/// An outgoing plain-text email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Email transport boundary.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Stand-in used when the real transport can't be built: every send
/// fails with the reason, so checks and state keep running.
#[derive(Debug, Clone)]
pub struct UnavailableMailer {
    reason: String,
}

impl UnavailableMailer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Mailer for UnavailableMailer {
    async fn send(&self, _email: &Email) -> Result<(), MailError> {
        Err(MailError::Unavailable(self.reason.clone()))
    }
}

/// Send an email, logging the result. Delivery failures never propagate.
///
/// Returns true if the transport accepted the message.
pub async fn deliver(mailer: &dyn Mailer, email: &Email) -> bool {
    if email.to.is_empty() {
        tracing::warn!("No recipients for '{}', not sending", email.subject);
        return false;
    }

    tracing::info!("Send email '{}' to: {}", email.subject, email.to.join(", "));
    match mailer.send(email).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Can't send email '{}': {}", email.subject, e);
            false
        }
    }
}

/// Union of recipient lists without duplicates, sorted.
pub fn merge_recipients(lists: &[&[String]]) -> Vec<String> {
    lists
        .iter()
        .flat_map(|list| list.iter())
        .filter(|addr| !addr.trim().is_empty())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingMailer;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merge_recipients_dedups() {
        let first = strings(&["a", "b"]);
        let second = strings(&["b", "c"]);
        let merged = merge_recipients(&[first.as_slice(), second.as_slice()]);
        assert_eq!(merged, strings(&["a", "b", "c"]));
    }

    #[test]
    fn test_merge_recipients_skips_blank() {
        let first = strings(&["", "a"]);
        let second: Vec<String> = Vec::new();
        let merged = merge_recipients(&[first.as_slice(), second.as_slice()]);
        assert_eq!(merged, strings(&["a"]));
    }

    #[test]
    fn test_deliver_without_recipients() {
        let mailer = RecordingMailer::new();
        let email = Email {
            from: "monitor@example.com".to_string(),
            to: vec![],
            subject: "OK: http://example.com".to_string(),
            body: "OK".to_string(),
        };

        assert!(!tokio_test::block_on(deliver(&mailer, &email)));
        assert!(mailer.sent().is_empty());
    }

    #[test]
    fn test_deliver_swallows_failures() {
        let mailer = RecordingMailer::failing();
        let email = Email {
            from: "monitor@example.com".to_string(),
            to: strings(&["ops@example.com"]),
            subject: "ERROR: http://example.com".to_string(),
            body: "transport error: refused".to_string(),
        };

        assert!(!tokio_test::block_on(deliver(&mailer, &email)));
        assert_eq!(mailer.sent().len(), 1);
    }

    #[test]
    fn test_unavailable_mailer_fails_every_send() {
        let mailer = UnavailableMailer::new("no TLS backend");
        let email = Email {
            from: "monitor@example.com".to_string(),
            to: strings(&["ops@example.com"]),
            subject: "OK: http://example.com".to_string(),
            body: "OK".to_string(),
        };

        let err = tokio_test::block_on(mailer.send(&email)).unwrap_err();
        assert_eq!(err.to_string(), "mail transport unavailable: no TLS backend");
        assert!(!tokio_test::block_on(deliver(&mailer, &email)));
    }
}
