use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::{
    notifications::{NotificationRequest, Notifier},
    RequestHandler, Service, ServiceError,
};
use crate::{
    models::{
        transactions::{
            display_amount, DepositRecord, NewDeposit, NewWithdrawal, WithdrawalRecord,
            WithdrawalStatus,
        },
        users::User,
    },
    repositories::users::UserStore,
};

pub enum TransactionServiceRequest {
    Deposit {
        user_id: String,
        deposit: NewDeposit,
        response: oneshot::Sender<Result<DepositRecord, ServiceError>>,
    },
    DepositHistory {
        user_id: String,
        response: oneshot::Sender<Result<Vec<DepositRecord>, ServiceError>>,
    },
    RequestWithdrawal {
        user_id: String,
        withdrawal: NewWithdrawal,
        response: oneshot::Sender<Result<WithdrawalRecord, ServiceError>>,
    },
    UpdateWithdrawalStatus {
        user_id: String,
        transaction_id: String,
        status: WithdrawalStatus,
        response: oneshot::Sender<Result<WithdrawalRecord, ServiceError>>,
    },
    WithdrawalHistory {
        user_id: String,
        response: oneshot::Sender<Result<Vec<WithdrawalRecord>, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct TransactionRequestHandler {
    store: Arc<dyn UserStore>,
    notifier: Notifier,
}

impl TransactionRequestHandler {
    pub fn new(store: Arc<dyn UserStore>, notifier: Notifier) -> Self {
        TransactionRequestHandler { store, notifier }
    }

    // No validation of amount sign, currency or duplicate submissions.
    async fn deposit(
        &self,
        user_id: &str,
        deposit: NewDeposit,
    ) -> Result<(DepositRecord, NotificationRequest), ServiceError> {
        let user = self.find_user(user_id).await?;
        let record = deposit.into_record(new_record_id());

        let appended = self
            .store
            .push_deposit(user_id, &record)
            .await
            .map_err(ServiceError::database)?;
        if !appended {
            return Err(ServiceError::user_not_found());
        }
        log::info!("Recorded deposit {} for user {}.", record.id, user_id);

        let notification = NotificationRequest::Deposit {
            from: sender_name(&user),
            amount: display_amount(&record.amount),
            method: record.currency.clone().unwrap_or_default(),
            timestamp: Utc::now().to_rfc3339(),
        };

        Ok((record, notification))
    }

    async fn deposit_history(&self, user_id: &str) -> Result<Vec<DepositRecord>, ServiceError> {
        Ok(self.find_user(user_id).await?.history)
    }

    async fn request_withdrawal(
        &self,
        user_id: &str,
        withdrawal: NewWithdrawal,
    ) -> Result<(WithdrawalRecord, NotificationRequest), ServiceError> {
        let user = self.find_user(user_id).await?;
        let record = withdrawal.into_record(new_record_id());

        let appended = self
            .store
            .push_withdrawal(user_id, &record)
            .await
            .map_err(ServiceError::database)?;
        if !appended {
            return Err(ServiceError::user_not_found());
        }
        log::info!("Recorded withdrawal request {} for user {}.", record.id, user_id);

        let notification = NotificationRequest::WithdrawalRequest {
            from: record.from.clone().unwrap_or_else(|| sender_name(&user)),
            amount: display_amount(&record.amount),
            method: record.method.clone().unwrap_or_default(),
            address: record.address.clone().unwrap_or_default(),
        };

        Ok((record, notification))
    }

    /// Sets the status of one withdrawal and writes the whole user document
    /// back. Terminal statuses are not protected: a later call overwrites an
    /// earlier decision, and concurrent updates on one user keep the last write.
    async fn update_withdrawal_status(
        &self,
        user_id: &str,
        transaction_id: &str,
        status: WithdrawalStatus,
    ) -> Result<WithdrawalRecord, ServiceError> {
        let mut user = self.find_user(user_id).await?;

        let withdrawal = user
            .withdrawals
            .iter_mut()
            .find(|withdrawal| withdrawal.id == transaction_id)
            .ok_or_else(|| ServiceError::NotFound("Transaction not found".to_string()))?;
        if withdrawal.status.is_terminal() && withdrawal.status != status {
            log::warn!(
                "Withdrawal {} of user {} changes from {:?} to {:?}.",
                transaction_id,
                user_id,
                withdrawal.status,
                status
            );
        }
        withdrawal.status = status;
        let updated = withdrawal.clone();

        user.updated_at = Utc::now();
        let saved = self
            .store
            .save(&user)
            .await
            .map_err(ServiceError::database)?;
        if !saved {
            return Err(ServiceError::user_not_found());
        }

        Ok(updated)
    }

    async fn withdrawal_history(
        &self,
        user_id: &str,
    ) -> Result<Vec<WithdrawalRecord>, ServiceError> {
        Ok(self.find_user(user_id).await?.withdrawals)
    }

    async fn find_user(&self, id: &str) -> Result<User, ServiceError> {
        self.store
            .find_by_id(id)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(ServiceError::user_not_found)
    }
}

fn new_record_id() -> String {
    Uuid::new_v4().hyphenated().to_string()
}

fn sender_name(user: &User) -> String {
    let name = user.full_name();
    if name.is_empty() {
        user.email.clone()
    } else {
        name
    }
}

#[async_trait]
impl RequestHandler<TransactionServiceRequest> for TransactionRequestHandler {
    async fn handle_request(&self, request: TransactionServiceRequest) {
        match request {
            // Notifications go out after the caller has its answer.
            TransactionServiceRequest::Deposit {
                user_id,
                deposit,
                response,
            } => match self.deposit(&user_id, deposit).await {
                Ok((record, notification)) => {
                    let _ = response.send(Ok(record));
                    self.notifier.dispatch(notification);
                }
                Err(e) => {
                    let _ = response.send(Err(e));
                }
            },
            TransactionServiceRequest::DepositHistory { user_id, response } => {
                let history = self.deposit_history(&user_id).await;
                let _ = response.send(history);
            }
            TransactionServiceRequest::RequestWithdrawal {
                user_id,
                withdrawal,
                response,
            } => match self.request_withdrawal(&user_id, withdrawal).await {
                Ok((record, notification)) => {
                    let _ = response.send(Ok(record));
                    self.notifier.dispatch(notification);
                }
                Err(e) => {
                    let _ = response.send(Err(e));
                }
            },
            TransactionServiceRequest::UpdateWithdrawalStatus {
                user_id,
                transaction_id,
                status,
                response,
            } => {
                let result = self
                    .update_withdrawal_status(&user_id, &transaction_id, status)
                    .await;
                let _ = response.send(result);
            }
            TransactionServiceRequest::WithdrawalHistory { user_id, response } => {
                let history = self.withdrawal_history(&user_id).await;
                let _ = response.send(history);
            }
        }
    }
}

pub struct TransactionService;

impl TransactionService {
    pub fn new() -> Self {
        TransactionService {}
    }
}

#[async_trait]
impl Service<TransactionServiceRequest, TransactionRequestHandler> for TransactionService {}
