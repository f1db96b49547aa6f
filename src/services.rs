use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    credentials::OtpGenerator,
    repositories::{mail::Mailer, users::UserStore},
    settings::Notifications,
};

pub mod auth;
pub mod http;
pub mod notifications;
pub mod transactions;
pub mod users;

const CHANNEL_CAPACITY: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
}

impl ServiceError {
    pub fn user_not_found() -> Self {
        ServiceError::NotFound("User not found".to_string())
    }

    pub fn database(e: anyhow::Error) -> Self {
        ServiceError::Database(e.to_string())
    }
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

/// Spawns every service on the current runtime and returns the channels the
/// HTTP layer talks to.
pub fn start_services(
    store: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    otp: OtpGenerator,
    notification_settings: Notifications,
) -> http::AppState {
    let (notification_tx, mut notification_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (auth_tx, mut auth_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (user_tx, mut user_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (transaction_tx, mut transaction_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let notifier = notifications::Notifier::new(notification_tx);

    log::info!("Starting notification service.");
    let mut notification_service = notifications::NotificationService::new();
    tokio::spawn(async move {
        let handler =
            notifications::NotificationRequestHandler::new(mailer, notification_settings);
        notification_service
            .run(handler, &mut notification_rx)
            .await;
    });

    log::info!("Starting auth service.");
    let mut auth_service = auth::AuthService::new();
    let auth_handler = auth::AuthRequestHandler::new(store.clone(), otp, notifier.clone());
    tokio::spawn(async move {
        auth_service.run(auth_handler, &mut auth_rx).await;
    });

    log::info!("Starting user service.");
    let mut user_service = users::UserService::new();
    let user_handler = users::UserRequestHandler::new(store.clone());
    tokio::spawn(async move {
        user_service.run(user_handler, &mut user_rx).await;
    });

    log::info!("Starting transaction service.");
    let mut transaction_service = transactions::TransactionService::new();
    let transaction_handler = transactions::TransactionRequestHandler::new(store, notifier);
    tokio::spawn(async move {
        transaction_service
            .run(transaction_handler, &mut transaction_rx)
            .await;
    });

    http::AppState {
        auth_channel: auth_tx,
        user_channel: user_tx,
        transaction_channel: transaction_tx,
    }
}
