//! SMTP delivery through lettre.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{Email, MailError, Mailer};
use crate::config::SystemConfig;

/// Mailer backed by an SMTP relay. Upgrades to TLS when the server offers it.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer").finish_non_exhaustive()
    }
}

impl SmtpMailer {
    /// Build the transport. No connection is made until the first send.
    pub fn new(system: &SystemConfig) -> Result<Self, MailError> {
        let tls = TlsParameters::new(system.smtp_host.clone())?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&system.smtp_host)
            .port(system.smtp_port)
            .tls(Tls::Opportunistic(tls));

        if !system.smtp_login.is_empty() {
            builder = builder.credentials(Credentials::new(
                system.smtp_login.clone(),
                system.smtp_password.clone(),
            ));
        }

        tracing::debug!(
            "SMTP relay {}:{}",
            system.smtp_host,
            system.smtp_port
        );

        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let message = build_message(email)?;
        self.transport.send(message).await?;
        Ok(())
    }
}

/// Build a plain-text UTF-8 message with every recipient in `To:`.
pub fn build_message(email: &Email) -> Result<Message, MailError> {
    if email.to.is_empty() {
        return Err(MailError::NoRecipients);
    }

    let mut builder = Message::builder()
        .from(email.from.parse::<Mailbox>()?)
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_PLAIN);

    for to in &email.to {
        builder = builder.to(to.parse::<Mailbox>()?);
    }

    Ok(builder.body(email.body.clone())?)
}
