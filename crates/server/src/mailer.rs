//! Outbound mail: SMTP via lettre, or a log-only / in-memory outbox.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::AppConfig;

/// A message handed to the mailer.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Clone)]
pub enum Mailer {
    Smtp {
        transport: AsyncSmtpTransport<Tokio1Executor>,
        from: String,
    },
    /// No relay configured: messages are written to the log.
    Log { from: String },
    /// Messages are kept in memory for inspection.
    Memory {
        from: String,
        outbox: Arc<Mutex<Vec<OutgoingEmail>>>,
    },
}

impl Mailer {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let from = config.mail_from.clone();
        let Some(smtp) = &config.smtp else {
            tracing::warn!("SMTP_HOST not set, outgoing mail will only be logged");
            return Ok(Self::Log { from });
        };

        let mut builder = match (&smtp.username, &smtp.password) {
            (Some(user), Some(pass)) => AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
                .with_context(|| format!("SMTP relay {}", smtp.host))?
                .credentials(Credentials::new(user.clone(), pass.clone())),
            _ => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host),
        };
        if let Some(port) = smtp.port {
            builder = builder.port(port);
        }
        tracing::info!("sending mail through {}", smtp.host);
        Ok(Self::Smtp {
            transport: builder.build(),
            from,
        })
    }

    /// In-memory mailer and a handle on its outbox.
    #[cfg(test)]
    pub fn memory() -> (Self, Arc<Mutex<Vec<OutgoingEmail>>>) {
        let outbox = Arc::new(Mutex::new(Vec::new()));
        let mailer = Self::Memory {
            from: "AwareNow <no-reply@awarenow.test>".into(),
            outbox: outbox.clone(),
        };
        (mailer, outbox)
    }

    /// Whether a successful `send` means the message left the server. The
    /// log-only mailer drops every message.
    pub fn delivers(&self) -> bool {
        !matches!(self, Self::Log { .. })
    }

    fn default_from(&self) -> &str {
        match self {
            Self::Smtp { from, .. } | Self::Log { from } | Self::Memory { from, .. } => from,
        }
    }

    /// Send an HTML message. `from` overrides the configured sender.
    pub async fn send(&self, to: &str, subject: &str, html: &str, from: Option<&str>) -> Result<()> {
        let email = OutgoingEmail {
            from: from.unwrap_or(self.default_from()).to_string(),
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        };

        match self {
            Self::Smtp { transport, .. } => {
                let message = build_message(&email)?;
                transport
                    .send(message)
                    .await
                    .with_context(|| format!("sending mail to {to}"))?;
            }
            Self::Log { .. } => {
                tracing::info!(to = %email.to, subject = %email.subject, "mail (not sent)");
                tracing::debug!("{}", email.html);
            }
            Self::Memory { outbox, .. } => {
                outbox
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(email);
            }
        }
        Ok(())
    }
}

fn build_message(email: &OutgoingEmail) -> Result<Message> {
    let from: Mailbox = email
        .from
        .parse()
        .with_context(|| format!("invalid from address {:?}", email.from))?;
    let to: Mailbox = email
        .to
        .parse()
        .with_context(|| format!("invalid recipient address {:?}", email.to))?;
    Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_HTML)
        .body(email.html.clone())
        .context("building mail message")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_mailer_records_messages() {
        let (mailer, outbox) = Mailer::memory();
        mailer
            .send("ann@contoso.com", "Hello", "<p>Hi</p>", Some("IT <it@contoso.com>"))
            .await
            .unwrap();
        let sent = outbox.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "IT <it@contoso.com>");
        assert_eq!(sent[0].subject, "Hello");
    }

    #[test]
    fn only_the_log_mailer_drops_messages() {
        let (memory, _) = Mailer::memory();
        assert!(memory.delivers());
        let log = Mailer::Log {
            from: "AwareNow <no-reply@awarenow.test>".into(),
        };
        assert!(!log.delivers());
    }

    #[test]
    fn messages_need_valid_addresses() {
        let email = OutgoingEmail {
            from: "AwareNow <no-reply@awarenow.test>".into(),
            to: "not an address".into(),
            subject: "s".into(),
            html: String::new(),
        };
        assert!(build_message(&email).is_err());
        let email = OutgoingEmail {
            to: "ann@contoso.com".into(),
            ..email
        };
        assert!(build_message(&email).is_ok());
    }
}
