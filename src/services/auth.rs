use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::oneshot;
use uuid::Uuid;

use super::{
    notifications::{NotificationRequest, Notifier},
    RequestHandler, Service, ServiceError,
};
use crate::{
    credentials::{self, OtpGenerator},
    models::users::{
        default_accounts, Credentials, Registration, User, VerifyEmailRequest, KYC_UNVERIFIED,
    },
    repositories::users::UserStore,
};

pub const MIN_PASSWORD_LENGTH: usize = 6;

pub enum AuthRequest {
    Register {
        registration: Registration,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    Login {
        credentials: Credentials,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    VerifyEmail {
        request: VerifyEmailRequest,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    ResendOtp {
        email: Option<String>,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
    ResetPassword {
        email: Option<String>,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
    SendAccountDetails {
        email: Option<String>,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
}

#[derive(Clone)]
pub struct AuthRequestHandler {
    store: Arc<dyn UserStore>,
    otp: OtpGenerator,
    notifier: Notifier,
}

impl AuthRequestHandler {
    pub fn new(store: Arc<dyn UserStore>, otp: OtpGenerator, notifier: Notifier) -> Self {
        AuthRequestHandler {
            store,
            otp,
            notifier,
        }
    }

    async fn register(&self, registration: Registration) -> Result<User, ServiceError> {
        let first_name = required(registration.first_name, "First name")?;
        let last_name = required(registration.last_name, "Last name")?;
        let email = required(registration.email, "Email")?;
        let password = registration
            .password
            .filter(|password| !password.is_empty())
            .ok_or_else(|| ServiceError::Validation("Password is required".to_string()))?;
        let country = required(registration.country, "Country")?;

        if !is_valid_email(&email) {
            return Err(ServiceError::Validation("Invalid email address".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ServiceError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let existing = self
            .store
            .find_by_email(&email)
            .await
            .map_err(ServiceError::database)?;
        if existing.is_some() {
            return Err(ServiceError::Conflict("Email is already in use".to_string()));
        }

        let referrer = match non_empty(registration.referral_code) {
            Some(code) => Some(
                self.store
                    .find_by_referral_code(&code)
                    .await
                    .map_err(ServiceError::database)?
                    .ok_or_else(|| ServiceError::Validation("Invalid referral code".to_string()))?,
            ),
            None => None,
        };

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().hyphenated().to_string(),
            first_name,
            last_name,
            email,
            password: hash(password).await?,
            country,
            phone: non_empty(registration.phone),
            kyc: KYC_UNVERIFIED.to_string(),
            referral_code: credentials::generate_referral_code(),
            referred_by: referrer.as_ref().map(|referrer| referrer.id.clone()),
            accounts: default_accounts(),
            created_at: now,
            updated_at: now,
            ..Default::default()
        };

        self.store
            .insert(&user)
            .await
            .map_err(ServiceError::database)?;
        log::info!("Registered user {}.", user.id);

        // Best effort: the new user stays registered even if the referrer update fails.
        if let Some(referrer) = referrer {
            match self.store.push_referred_user(&referrer.id, &user.id).await {
                Ok(true) => {}
                Ok(false) => log::warn!(
                    "Referrer {} disappeared before {} could be linked.",
                    referrer.id,
                    user.id
                ),
                Err(e) => log::warn!(
                    "Could not link {} to referrer {}: {}",
                    user.id,
                    referrer.id,
                    e
                ),
            }
        }

        match self.otp.generate(&user.id) {
            Ok(otp) => self.notifier.dispatch(NotificationRequest::Welcome {
                to: user.email.clone(),
                otp,
            }),
            Err(e) => log::warn!("Could not generate OTP for {}: {}", user.id, e),
        }
        self.notifier.dispatch(NotificationRequest::NewRegistration {
            first_name: user.first_name.clone(),
            email: user.email.clone(),
        });

        Ok(user)
    }

    async fn login(&self, credentials: Credentials) -> Result<User, ServiceError> {
        let email = required(credentials.email, "Email")?;
        let password = credentials
            .password
            .filter(|password| !password.is_empty())
            .ok_or_else(|| ServiceError::Validation("Password is required".to_string()))?;

        let user = self
            .store
            .find_by_email(&email)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(invalid_credentials)?;

        if !verify(user.password.clone(), password).await? {
            return Err(invalid_credentials());
        }
        if user.is_disabled {
            return Err(ServiceError::Forbidden("Account is disabled".to_string()));
        }

        Ok(user)
    }

    async fn verify_email(&self, request: VerifyEmailRequest) -> Result<User, ServiceError> {
        let user = self.existing_user(request.email).await?;
        let otp = required(request.otp, "OTP")?;

        if !self.otp.verify(&user.id, &otp) {
            return Err(ServiceError::Validation("Invalid or expired OTP".to_string()));
        }

        let mut fields = Map::new();
        fields.insert("verified".to_string(), Value::Bool(true));
        fields.insert(
            "updatedAt".to_string(),
            serde_json::to_value(Utc::now()).map_err(|e| ServiceError::Internal(e.to_string()))?,
        );

        self.store
            .update_fields(&user.id, &fields)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(ServiceError::user_not_found)
    }

    async fn resend_otp(&self, email: Option<String>) -> Result<(), ServiceError> {
        let user = self.existing_user(email).await?;

        self.notifier.dispatch(NotificationRequest::PasswordResetOtp {
            otp: self.fresh_otp(&user.id)?,
            to: user.email,
        });

        Ok(())
    }

    async fn reset_password(&self, email: Option<String>) -> Result<(), ServiceError> {
        let user = self.existing_user(email).await?;

        self.notifier
            .dispatch(NotificationRequest::ForgotPassword { to: user.email });

        Ok(())
    }

    // Never echoes a password back; only the stored address receives details.
    async fn send_account_details(&self, email: Option<String>) -> Result<(), ServiceError> {
        let user = self.existing_user(email).await?;

        self.notifier.dispatch(NotificationRequest::AccountDetails {
            name: user.full_name(),
            otp: self.fresh_otp(&user.id)?,
            to: user.email,
        });

        Ok(())
    }

    async fn existing_user(&self, email: Option<String>) -> Result<User, ServiceError> {
        let email = required(email, "Email")?;

        self.store
            .find_by_email(&email)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(ServiceError::user_not_found)
    }

    fn fresh_otp(&self, user_id: &str) -> Result<String, ServiceError> {
        self.otp
            .generate(user_id)
            .map_err(|e| ServiceError::Internal(e.to_string()))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(value: Option<String>, field: &str) -> Result<String, ServiceError> {
    non_empty(value).ok_or_else(|| ServiceError::Validation(format!("{} is required", field)))
}

fn invalid_credentials() -> ServiceError {
    ServiceError::Unauthorized("Invalid credentials".to_string())
}

pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();

    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !local.contains(char::is_whitespace)
                && !domain.contains('@')
                && !domain.contains(char::is_whitespace)
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

// Argon2 is CPU bound, keep it off the async workers.
async fn hash(password: String) -> Result<String, ServiceError> {
    tokio::task::spawn_blocking(move || credentials::hash_password(&password))
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?
        .map_err(|e| ServiceError::Internal(e.to_string()))
}

async fn verify(hash: String, password: String) -> Result<bool, ServiceError> {
    tokio::task::spawn_blocking(move || credentials::verify_password(&hash, &password))
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))
}

#[async_trait]
impl RequestHandler<AuthRequest> for AuthRequestHandler {
    async fn handle_request(&self, request: AuthRequest) {
        match request {
            AuthRequest::Register {
                registration,
                response,
            } => {
                let user = self.register(registration).await;
                let _ = response.send(user);
            }
            AuthRequest::Login {
                credentials,
                response,
            } => {
                let user = self.login(credentials).await;
                let _ = response.send(user);
            }
            AuthRequest::VerifyEmail { request, response } => {
                let user = self.verify_email(request).await;
                let _ = response.send(user);
            }
            AuthRequest::ResendOtp { email, response } => {
                let result = self.resend_otp(email).await;
                let _ = response.send(result);
            }
            AuthRequest::ResetPassword { email, response } => {
                let result = self.reset_password(email).await;
                let _ = response.send(result);
            }
            AuthRequest::SendAccountDetails { email, response } => {
                let result = self.send_account_details(email).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct AuthService;

impl AuthService {
    pub fn new() -> Self {
        AuthService {}
    }
}

#[async_trait]
impl Service<AuthRequest, AuthRequestHandler> for AuthService {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::users::{MemoryUserStore, RacingUserStore};
    use tokio::sync::mpsc;

    const SECRET: &[u8] = b"auth-service-test-secret";

    fn handler() -> (
        AuthRequestHandler,
        MemoryUserStore,
        mpsc::Receiver<NotificationRequest>,
    ) {
        let store = MemoryUserStore::new();
        let (tx, rx) = mpsc::channel(64);
        let handler = AuthRequestHandler::new(
            Arc::new(store.clone()),
            OtpGenerator::new(SECRET.to_vec(), 30, 6),
            Notifier::new(tx),
        );

        (handler, store, rx)
    }

    fn registration(email: &str) -> Registration {
        Registration {
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            email: Some(email.to_string()),
            password: Some("abcdef".to_string()),
            country: Some("NG".to_string()),
            ..Default::default()
        }
    }

    fn drain(rx: &mut mpsc::Receiver<NotificationRequest>) -> Vec<NotificationRequest> {
        let mut requests = Vec::new();
        while let Ok(request) = rx.try_recv() {
            requests.push(request);
        }
        requests
    }

    #[tokio::test]
    async fn register_creates_a_zeroed_account() {
        let (handler, store, mut rx) = handler();

        let user = handler.register(registration("a@x.com")).await.unwrap();

        assert_eq!(user.balance, 0.0);
        assert_eq!(user.kyc, KYC_UNVERIFIED);
        assert!(!user.verified);
        assert!(!user.is_disabled);
        assert_eq!(user.referral_code.len(), 6);
        assert_ne!(user.password, "abcdef");
        assert!(credentials::verify_password(&user.password, "abcdef"));
        assert_eq!(store.list().await.unwrap().len(), 1);

        let notifications = drain(&mut rx);
        assert!(matches!(
            &notifications[0],
            NotificationRequest::Welcome { to, .. } if to == "a@x.com"
        ));
        assert!(matches!(
            &notifications[1],
            NotificationRequest::NewRegistration { .. }
        ));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let (handler, store, _rx) = handler();

        handler.register(registration("a@x.com")).await.unwrap();
        let second = handler.register(registration("a@x.com")).await;

        assert!(matches!(
            second,
            Err(ServiceError::Conflict(message)) if message == "Email is already in use"
        ));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn validation_runs_before_any_write() {
        let (handler, store, _rx) = handler();

        let mut missing_country = registration("a@x.com");
        missing_country.country = None;
        let mut short_password = registration("b@x.com");
        short_password.password = Some("abc".to_string());

        assert!(matches!(
            handler.register(missing_country).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            handler.register(registration("not-an-email")).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            handler.register(short_password).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn referral_links_both_users() {
        let (handler, store, _rx) = handler();
        let referrer = handler.register(registration("a@x.com")).await.unwrap();

        let mut referred = registration("b@x.com");
        referred.referral_code = Some(referrer.referral_code.clone());
        let user = handler.register(referred).await.unwrap();

        assert_eq!(user.referred_by.as_deref(), Some(referrer.id.as_str()));
        let referrer = store.find_by_id(&referrer.id).await.unwrap().unwrap();
        assert_eq!(referrer.referred_users, vec![user.id]);
    }

    #[tokio::test]
    async fn unknown_referral_code_creates_nothing() {
        let (handler, store, _rx) = handler();

        let mut referred = registration("b@x.com");
        referred.referral_code = Some("ZZZZZZ".to_string());

        assert!(matches!(
            handler.register(referred).await,
            Err(ServiceError::Validation(message)) if message == "Invalid referral code"
        ));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn login_compares_passwords() {
        let (handler, store, _rx) = handler();
        let user = handler.register(registration("a@x.com")).await.unwrap();

        let ok = handler
            .login(Credentials {
                email: Some("a@x.com".to_string()),
                password: Some("abcdef".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(ok.id, user.id);

        let wrong = handler
            .login(Credentials {
                email: Some("a@x.com".to_string()),
                password: Some("abcdeg".to_string()),
            })
            .await;
        assert!(matches!(wrong, Err(ServiceError::Unauthorized(_))));

        let mut disabled = user.clone();
        disabled.is_disabled = true;
        store.save(&disabled).await.unwrap();
        let blocked = handler
            .login(Credentials {
                email: Some("a@x.com".to_string()),
                password: Some("abcdef".to_string()),
            })
            .await;
        assert!(matches!(blocked, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn verify_email_requires_a_valid_otp() {
        let (handler, store, _rx) = handler();
        let user = handler.register(registration("a@x.com")).await.unwrap();

        let rejected = handler
            .verify_email(VerifyEmailRequest {
                email: Some("a@x.com".to_string()),
                otp: Some("not-a-code".to_string()),
            })
            .await;
        assert!(matches!(rejected, Err(ServiceError::Validation(_))));

        let otp = OtpGenerator::new(SECRET.to_vec(), 30, 6)
            .generate(&user.id)
            .unwrap();
        let verified = handler
            .verify_email(VerifyEmailRequest {
                email: Some("a@x.com".to_string()),
                otp: Some(otp),
            })
            .await
            .unwrap();
        assert!(verified.verified);
        assert!(store.find_by_id(&user.id).await.unwrap().unwrap().verified);
    }

    #[tokio::test]
    async fn otp_from_one_account_does_not_verify_another() {
        let (handler, store, mut rx) = handler();
        handler.register(registration("a@x.com")).await.unwrap();
        let other = handler.register(registration("b@x.com")).await.unwrap();

        let otp = drain(&mut rx)
            .into_iter()
            .find_map(|request| match request {
                NotificationRequest::Welcome { to, otp } if to == "a@x.com" => Some(otp),
                _ => None,
            })
            .unwrap();

        let result = handler
            .verify_email(VerifyEmailRequest {
                email: Some("b@x.com".to_string()),
                otp: Some(otp.clone()),
            })
            .await;
        assert!(matches!(
            result,
            Err(ServiceError::Validation(message)) if message == "Invalid or expired OTP"
        ));
        assert!(!store.find_by_id(&other.id).await.unwrap().unwrap().verified);

        let own = handler
            .verify_email(VerifyEmailRequest {
                email: Some("a@x.com".to_string()),
                otp: Some(otp),
            })
            .await
            .unwrap();
        assert!(own.verified);
    }

    #[tokio::test]
    async fn verification_keeps_deposits_recorded_meanwhile() {
        let inner = MemoryUserStore::new();
        let store = RacingUserStore::new(inner.clone());
        let (tx, _rx) = mpsc::channel(64);
        let handler = AuthRequestHandler::new(
            Arc::new(store.clone()),
            OtpGenerator::new(SECRET.to_vec(), 30, 6),
            Notifier::new(tx),
        );
        let user = handler.register(registration("a@x.com")).await.unwrap();
        let before = store.landed();

        let otp = OtpGenerator::new(SECRET.to_vec(), 30, 6)
            .generate(&user.id)
            .unwrap();
        let verified = handler
            .verify_email(VerifyEmailRequest {
                email: Some("a@x.com".to_string()),
                otp: Some(otp),
            })
            .await
            .unwrap();

        assert!(store.landed() > before);
        assert!(verified.verified);
        let stored = inner.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.history.len(), store.landed());
    }

    #[tokio::test]
    async fn side_channels_require_a_known_user() {
        let (handler, _store, mut rx) = handler();
        handler.register(registration("a@x.com")).await.unwrap();
        drain(&mut rx);

        assert!(matches!(
            handler.resend_otp(Some("b@x.com".to_string())).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            handler.reset_password(Some("b@x.com".to_string())).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(drain(&mut rx).is_empty());

        handler.resend_otp(Some("a@x.com".to_string())).await.unwrap();
        handler.reset_password(Some("a@x.com".to_string())).await.unwrap();
        handler
            .send_account_details(Some("a@x.com".to_string()))
            .await
            .unwrap();

        let notifications = drain(&mut rx);
        assert!(matches!(notifications[0], NotificationRequest::PasswordResetOtp { .. }));
        assert!(matches!(notifications[1], NotificationRequest::ForgotPassword { .. }));
        assert!(matches!(
            &notifications[2],
            NotificationRequest::AccountDetails { name, .. } if name == "Ada Lovelace"
        ));
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email(" first.last@sub.example.org "));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("a@@x.com"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email("a@.com"));
    }
}
