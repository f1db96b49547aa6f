use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{MemoryUserStore, UserStore};
use crate::models::{
    transactions::{DepositRecord, NewDeposit, WithdrawalRecord},
    users::User,
};

/// Memory store that lands a deposit right after every `find_by_id`, so a
/// caller that writes back what it read loses that deposit.
#[derive(Clone, Default)]
pub struct RacingUserStore {
    inner: MemoryUserStore,
    deposits: Arc<AtomicUsize>,
}

impl RacingUserStore {
    pub fn new(inner: MemoryUserStore) -> Self {
        Self {
            inner,
            deposits: Arc::default(),
        }
    }

    pub fn landed(&self) -> usize {
        self.deposits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStore for RacingUserStore {
    async fn insert(&self, user: &User) -> Result<(), anyhow::Error> {
        self.inner.insert(user).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, anyhow::Error> {
        let user = self.inner.find_by_id(id).await?;

        let n = self.deposits.fetch_add(1, Ordering::SeqCst);
        let record = NewDeposit::default().into_record(format!("raced-{}", n));
        if !self.inner.push_deposit(id, &record).await? {
            self.deposits.fetch_sub(1, Ordering::SeqCst);
        }

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        let user = self.inner.find_by_email(email).await?;

        if let Some(user) = &user {
            let n = self.deposits.fetch_add(1, Ordering::SeqCst);
            let record = NewDeposit::default().into_record(format!("raced-{}", n));
            self.inner.push_deposit(&user.id, &record).await?;
        }

        Ok(user)
    }

    async fn find_by_referral_code(&self, code: &str) -> Result<Option<User>, anyhow::Error> {
        self.inner.find_by_referral_code(code).await
    }

    async fn list(&self) -> Result<Vec<User>, anyhow::Error> {
        self.inner.list().await
    }

    async fn delete_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        self.inner.delete_by_email(email).await
    }

    async fn save(&self, user: &User) -> Result<bool, anyhow::Error> {
        self.inner.save(user).await
    }

    async fn update_fields(
        &self,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Option<User>, anyhow::Error> {
        self.inner.update_fields(id, fields).await
    }

    async fn push_deposit(&self, id: &str, record: &DepositRecord) -> Result<bool, anyhow::Error> {
        self.inner.push_deposit(id, record).await
    }

    async fn push_withdrawal(
        &self,
        id: &str,
        record: &WithdrawalRecord,
    ) -> Result<bool, anyhow::Error> {
        self.inner.push_withdrawal(id, record).await
    }

    async fn push_referred_user(
        &self,
        referrer_id: &str,
        user_id: &str,
    ) -> Result<bool, anyhow::Error> {
        self.inner.push_referred_user(referrer_id, user_id).await
    }
}
