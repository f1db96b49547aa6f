use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::models::{
    transactions::{DepositRecord, WithdrawalRecord},
    users::User,
};

mod memory;
mod postgres;
#[cfg(test)]
mod racing;

pub use memory::MemoryUserStore;
pub use postgres::PostgresUserStore;
#[cfg(test)]
pub(crate) use racing::RacingUserStore;

/// Storage for user documents.
///
/// The `push_*` operations append to a single document atomically and return
/// `false` when the user does not exist. `update_fields` sets top-level fields
/// in place and leaves everything else untouched. `save` overwrites the whole
/// document, so two concurrent read-modify-write cycles on the same user keep
/// only the last write.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    async fn insert(&self, user: &User) -> Result<(), anyhow::Error>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, anyhow::Error>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error>;

    async fn find_by_referral_code(&self, code: &str) -> Result<Option<User>, anyhow::Error>;

    async fn list(&self) -> Result<Vec<User>, anyhow::Error>;

    async fn delete_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error>;

    async fn save(&self, user: &User) -> Result<bool, anyhow::Error>;

    /// Returns the updated document, or `None` when the user does not exist.
    async fn update_fields(
        &self,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Option<User>, anyhow::Error>;

    async fn push_deposit(&self, id: &str, record: &DepositRecord) -> Result<bool, anyhow::Error>;

    async fn push_withdrawal(
        &self,
        id: &str,
        record: &WithdrawalRecord,
    ) -> Result<bool, anyhow::Error>;

    async fn push_referred_user(
        &self,
        referrer_id: &str,
        user_id: &str,
    ) -> Result<bool, anyhow::Error>;
}
