use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tokio::sync::Mutex;

use crate::{models::mail::OutgoingEmail, settings::Smtp};

#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    /// Delivers one email and returns the server's message identifier.
    async fn send(&self, email: &OutgoingEmail) -> Result<String, anyhow::Error>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    // Implicit TLS, as expected on port 465.
    pub fn new(settings: &Smtp) -> Result<Self, anyhow::Error> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();
        let from = settings.from.parse::<Mailbox>()?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, anyhow::Error> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(email.to.parse::<Mailbox>()?)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(email.html.clone())?;

        let response = self.transport.send(message).await?;
        let message_id = response.message().collect::<Vec<&str>>().join(" ");

        Ok(message_id)
    }
}

/// Used when SMTP delivery is disabled.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, anyhow::Error> {
        log::info!(
            "SMTP disabled, dropping email to {} with subject \"{}\".",
            email.to,
            email.subject
        );

        Ok(format!("local-{}", uuid::Uuid::new_v4().hyphenated()))
    }
}

/// Keeps every email in memory instead of delivering it.
#[derive(Clone, Default)]
pub struct OutboxMailer {
    outbox: Arc<Mutex<Vec<OutgoingEmail>>>,
}

impl OutboxMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<OutgoingEmail> {
        self.outbox.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, anyhow::Error> {
        let mut outbox = self.outbox.lock().await;
        outbox.push(email.clone());

        Ok(format!("outbox-{}", outbox.len()))
    }
}
