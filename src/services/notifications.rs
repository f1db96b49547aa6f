use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{RequestHandler, Service};
use crate::{repositories::mail::Mailer, settings::Notifications};

mod templates;

#[derive(Clone, Debug, PartialEq)]
pub enum NotificationRequest {
    Welcome {
        to: String,
        otp: String,
    },
    NewRegistration {
        first_name: String,
        email: String,
    },
    PasswordResetOtp {
        to: String,
        otp: String,
    },
    ForgotPassword {
        to: String,
    },
    AccountDetails {
        to: String,
        name: String,
        otp: String,
    },
    Deposit {
        from: String,
        amount: String,
        method: String,
        timestamp: String,
    },
    WithdrawalRequest {
        from: String,
        amount: String,
        method: String,
        address: String,
    },
}

/// Fire-and-forget handle to the notification service.
#[derive(Clone)]
pub struct Notifier {
    channel: mpsc::Sender<NotificationRequest>,
}

impl Notifier {
    pub fn new(channel: mpsc::Sender<NotificationRequest>) -> Self {
        Self { channel }
    }

    /// Queues a notification without waiting. A full or closed queue drops it.
    pub fn dispatch(&self, request: NotificationRequest) {
        if let Err(e) = self.channel.try_send(request) {
            log::warn!("Dropping notification: {}", e);
        }
    }
}

#[derive(Clone)]
pub struct NotificationRequestHandler {
    mailer: Arc<dyn Mailer>,
    settings: Arc<Notifications>,
}

impl NotificationRequestHandler {
    pub fn new(mailer: Arc<dyn Mailer>, settings: Notifications) -> Self {
        Self {
            mailer,
            settings: Arc::new(settings),
        }
    }
}

#[async_trait]
impl RequestHandler<NotificationRequest> for NotificationRequestHandler {
    async fn handle_request(&self, request: NotificationRequest) {
        let email = templates::render(&request, &self.settings);

        match self.mailer.send(&email).await {
            Ok(message_id) => log::info!("Message sent: {}", message_id),
            Err(e) => log::warn!(
                "Could not send \"{}\" to {}: {}",
                email.subject,
                email.to,
                e
            ),
        }
    }
}

pub struct NotificationService;

impl NotificationService {
    pub fn new() -> Self {
        NotificationService {}
    }
}

#[async_trait]
impl Service<NotificationRequest, NotificationRequestHandler> for NotificationService {}
