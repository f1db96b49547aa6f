use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::oneshot;

use super::{auth::is_valid_email, RequestHandler, Service, ServiceError};
use crate::{
    credentials,
    models::users::{AccountsUpdate, User, WalletAccounts},
    repositories::users::UserStore,
};

pub enum UserRequest {
    ListUsers {
        response: oneshot::Sender<Result<Vec<User>, ServiceError>>,
    },
    GetUserByEmail {
        email: String,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    DeleteUserByEmail {
        email: String,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
    UpdateProfile {
        id: String,
        fields: Map<String, Value>,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    UpdateAccounts {
        id: String,
        update: AccountsUpdate,
        response: oneshot::Sender<Result<WalletAccounts, ServiceError>>,
    },
    GetAccounts {
        id: String,
        response: oneshot::Sender<Result<WalletAccounts, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct UserRequestHandler {
    store: Arc<dyn UserStore>,
}

impl UserRequestHandler {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        UserRequestHandler { store }
    }

    async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        self.store.list().await.map_err(ServiceError::database)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, ServiceError> {
        self.store
            .find_by_email(email)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(ServiceError::user_not_found)
    }

    async fn delete_user_by_email(&self, email: &str) -> Result<(), ServiceError> {
        let deleted = self
            .store
            .delete_by_email(email)
            .await
            .map_err(ServiceError::database)?;

        match deleted {
            Some(user) => {
                log::info!("Deleted user {}.", user.id);
                Ok(())
            }
            None => Err(ServiceError::user_not_found()),
        }
    }

    /// Sets top-level fields on the stored document in place. There is no
    /// field whitelist: balances and flags can be overwritten by the caller.
    /// The identifier is immutable, passwords are hashed before storage and
    /// an email owned by another user is refused.
    async fn update_profile(
        &self,
        id: &str,
        mut fields: Map<String, Value>,
    ) -> Result<User, ServiceError> {
        let user = self.find_user(id).await?;

        fields.remove("_id");
        let password = match fields.remove("password") {
            Some(Value::String(password)) if !password.is_empty() => Some(password),
            Some(_) => {
                return Err(ServiceError::Validation(
                    "Password must be a non-empty string".to_string(),
                ))
            }
            None => None,
        };

        // Unknown keys are dropped, mistyped values are caught on a copy.
        let mut document = match serde_json::to_value(&user) {
            Ok(Value::Object(document)) => document,
            Ok(_) => Map::new(),
            Err(e) => return Err(ServiceError::Internal(e.to_string())),
        };
        fields.retain(|key, _| document.contains_key(key));
        document.extend(fields.clone());
        let merged: User = serde_json::from_value(Value::Object(document))
            .map_err(|e| ServiceError::Validation(format!("Invalid profile update: {}", e)))?;

        if merged.email != user.email {
            self.ensure_email_available(&merged.email, id).await?;
        }

        if let Some(password) = password {
            let hash = tokio::task::spawn_blocking(move || credentials::hash_password(&password))
                .await
                .map_err(|e| ServiceError::Internal(e.to_string()))?
                .map_err(|e| ServiceError::Internal(e.to_string()))?;
            fields.insert("password".to_string(), Value::String(hash));
        }
        fields.insert(
            "updatedAt".to_string(),
            serde_json::to_value(Utc::now()).map_err(|e| ServiceError::Internal(e.to_string()))?,
        );

        self.store
            .update_fields(id, &fields)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(ServiceError::user_not_found)
    }

    async fn ensure_email_available(&self, email: &str, id: &str) -> Result<(), ServiceError> {
        if !is_valid_email(email) {
            return Err(ServiceError::Validation("Invalid email address".to_string()));
        }

        let owner = self
            .store
            .find_by_email(email)
            .await
            .map_err(ServiceError::database)?;
        match owner {
            Some(owner) if owner.id != id => {
                Err(ServiceError::Conflict("Email is already in use".to_string()))
            }
            _ => Ok(()),
        }
    }

    // Read-modify-write on the whole document.
    async fn update_accounts(
        &self,
        id: &str,
        update: AccountsUpdate,
    ) -> Result<WalletAccounts, ServiceError> {
        let accounts = update
            .into_accounts()
            .map_err(|e| ServiceError::Validation(format!("Invalid account values: {}", e)))?;
        let mut user = self.find_user(id).await?;

        user.accounts.extend(accounts);
        user.updated_at = Utc::now();
        self.save(&user).await?;

        Ok(user.accounts)
    }

    async fn get_accounts(&self, id: &str) -> Result<WalletAccounts, ServiceError> {
        Ok(self.find_user(id).await?.accounts)
    }

    async fn find_user(&self, id: &str) -> Result<User, ServiceError> {
        self.store
            .find_by_id(id)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(ServiceError::user_not_found)
    }

    async fn save(&self, user: &User) -> Result<(), ServiceError> {
        let saved = self
            .store
            .save(user)
            .await
            .map_err(ServiceError::database)?;

        if saved {
            Ok(())
        } else {
            Err(ServiceError::user_not_found())
        }
    }
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::ListUsers { response } => {
                let users = self.list_users().await;
                let _ = response.send(users);
            }
            UserRequest::GetUserByEmail { email, response } => {
                let user = self.get_user_by_email(&email).await;
                let _ = response.send(user);
            }
            UserRequest::DeleteUserByEmail { email, response } => {
                let result = self.delete_user_by_email(&email).await;
                let _ = response.send(result);
            }
            UserRequest::UpdateProfile {
                id,
                fields,
                response,
            } => {
                let user = self.update_profile(&id, fields).await;
                let _ = response.send(user);
            }
            UserRequest::UpdateAccounts {
                id,
                update,
                response,
            } => {
                let accounts = self.update_accounts(&id, update).await;
                let _ = response.send(accounts);
            }
            UserRequest::GetAccounts { id, response } => {
                let accounts = self.get_accounts(&id).await;
                let _ = response.send(accounts);
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}
