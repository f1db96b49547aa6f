use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};

use super::UserStore;
use crate::models::{
    transactions::{DepositRecord, WithdrawalRecord},
    users::User,
};

/// In-process user store. Appends run under the entry's shard lock.
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<DashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_by<F>(&self, predicate: F) -> Option<User>
    where
        F: Fn(&User) -> bool,
    {
        self.users
            .iter()
            .find(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
    }

    fn update<F>(&self, id: &str, mutate: F) -> bool
    where
        F: FnOnce(&mut User),
    {
        match self.users.get_mut(id) {
            Some(mut entry) => {
                let user = entry.value_mut();
                mutate(user);
                user.updated_at = chrono::Utc::now();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: &User) -> Result<(), anyhow::Error> {
        if self.users.contains_key(&user.id) {
            anyhow::bail!("Duplicate user id: {}", user.id);
        }
        self.users.insert(user.id.clone(), user.clone());

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, anyhow::Error> {
        Ok(self.users.get(id).map(|entry| entry.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        Ok(self.find_by(|user| user.email == email))
    }

    async fn find_by_referral_code(&self, code: &str) -> Result<Option<User>, anyhow::Error> {
        Ok(self.find_by(|user| user.referral_code == code))
    }

    async fn list(&self) -> Result<Vec<User>, anyhow::Error> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(users)
    }

    async fn delete_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        let id = self.find_by(|user| user.email == email).map(|user| user.id);

        Ok(id.and_then(|id| self.users.remove(&id)).map(|(_, user)| user))
    }

    async fn save(&self, user: &User) -> Result<bool, anyhow::Error> {
        let saved = self.update(&user.id, |stored| *stored = user.clone());

        Ok(saved)
    }

    async fn update_fields(
        &self,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Option<User>, anyhow::Error> {
        let mut entry = match self.users.get_mut(id) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        let mut document = serde_json::to_value(entry.value())?;
        if let Value::Object(stored) = &mut document {
            stored.extend(fields.iter().map(|(key, value)| (key.clone(), value.clone())));
        }
        let updated: User = serde_json::from_value(document)?;
        *entry.value_mut() = updated.clone();

        Ok(Some(updated))
    }

    async fn push_deposit(&self, id: &str, record: &DepositRecord) -> Result<bool, anyhow::Error> {
        Ok(self.update(id, |user| user.history.push(record.clone())))
    }

    async fn push_withdrawal(
        &self,
        id: &str,
        record: &WithdrawalRecord,
    ) -> Result<bool, anyhow::Error> {
        Ok(self.update(id, |user| user.withdrawals.push(record.clone())))
    }

    async fn push_referred_user(
        &self,
        referrer_id: &str,
        user_id: &str,
    ) -> Result<bool, anyhow::Error> {
        Ok(self.update(referrer_id, |user| {
            user.referred_users.push(user_id.to_string())
        }))
    }
}
