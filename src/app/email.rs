use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use std::time::Duration;

use crate::app::templates::{Template, TemplateData};
use crate::config::AppConfig;

/// Linear backoff base: attempt N waits N times this before the next try.
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Seam in front of the mail gateway so delivery logic can be exercised
/// without a live SMTP server.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<()>;
    async fn check(&self) -> Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let mut builder = if config.email_secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.email_host)?
                .port(config.email_port)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.email_host)
                .port(config.email_port)
        };
        if let (Some(user), Some(password)) = (&config.email_user, &config.email_password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        let from = config
            .email_from
            .parse()
            .map_err(|err| anyhow!("invalid EMAIL_FROM: {}", err))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<()> {
        let to = email
            .to
            .parse()
            .map_err(|err| anyhow!("invalid recipient address {}: {}", email.to, err))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(email.html.clone())?;

        self.transport.send(message).await?;
        Ok(())
    }

    async fn check(&self) -> Result<()> {
        if self.transport.test_connection().await? {
            Ok(())
        } else {
            Err(anyhow!("smtp connection test failed"))
        }
    }
}

/// Renders and dispatches notification emails through the configured
/// transport. When sending is disabled by configuration every `send` is a
/// no-op that returns without error.
#[derive(Clone)]
pub struct EmailService {
    transport: Arc<dyn MailTransport>,
    enabled: bool,
}

impl EmailService {
    pub fn new(transport: Arc<dyn MailTransport>, enabled: bool) -> Self {
        Self { transport, enabled }
    }

    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        template: Template,
        data: &TemplateData,
    ) -> Result<()> {
        if !self.enabled {
            tracing::info!("email sending is disabled");
            return Ok(());
        }

        let email = OutgoingEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: template.render(data),
        };
        self.transport.deliver(&email).await?;
        tracing::info!(to = to, template = template.name(), "email sent");
        Ok(())
    }

    /// Retries `send` up to `max_attempts` times with a linearly growing
    /// delay between attempts, returning the last error on exhaustion.
    pub async fn send_with_retry(
        &self,
        to: &str,
        subject: &str,
        template: Template,
        data: &TemplateData,
        max_attempts: u32,
    ) -> Result<()> {
        for attempt in 1..=max_attempts {
            match self.send(to, subject, template, data).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::warn!(error = ?err, attempt, to = to, "email attempt failed");
                    if attempt == max_attempts {
                        return Err(err);
                    }
                    tokio::time::sleep(RETRY_BASE_DELAY * attempt).await;
                }
            }
        }
        Ok(())
    }

    pub async fn check(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.transport.check().await
    }
}
