use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::transactions::{DepositRecord, WithdrawalRecord};

pub type WalletAccounts = BTreeMap<String, String>;

pub const DEFAULT_WALLET_CURRENCIES: [&str; 4] = ["eth", "ltc", "btc", "usdt"];

pub const KYC_UNVERIFIED: &str = "unverified";

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub country: String,
    pub phone: Option<String>,
    pub verified: bool,
    pub is_disabled: bool,
    pub kyc: String,
    pub balance: f64,
    pub profit: f64,
    pub copytrading: f64,
    pub plan: Option<String>,
    pub plan_history: Vec<Value>,
    pub referral_bonus: f64,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub referred_users: Vec<String>,
    pub accounts: WalletAccounts,
    pub history: Vec<DepositRecord>,
    pub withdrawals: Vec<WithdrawalRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The user document as it is exposed over HTTP, without the password hash.
    pub fn redacted(&self) -> Value {
        let mut document = serde_json::to_value(self).unwrap_or_default();
        if let Value::Object(fields) = &mut document {
            fields.remove("password");
        }
        document
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

pub fn default_accounts() -> WalletAccounts {
    DEFAULT_WALLET_CURRENCIES
        .iter()
        .map(|currency| (currency.to_string(), String::new()))
        .collect()
}

// Fields are optional so that missing input is reported as a validation
// failure instead of a body rejection.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Registration {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub referral_code: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct EmailRequest {
    pub email: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyEmailRequest {
    pub email: Option<String>,
    pub otp: Option<String>,
}

/// Wallet address updates, either as a plain map or as the legacy
/// `{"values": "<json encoded map>"}` form. The legacy form is only assumed
/// when `values` is the sole key.
#[derive(Clone, Debug)]
pub enum AccountsUpdate {
    Encoded { values: String },
    Map(WalletAccounts),
}

impl<'de> Deserialize<'de> for AccountsUpdate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut accounts = WalletAccounts::deserialize(deserializer)?;

        if accounts.len() == 1 {
            if let Some(values) = accounts.remove("values") {
                return Ok(AccountsUpdate::Encoded { values });
            }
        }

        Ok(AccountsUpdate::Map(accounts))
    }
}

impl AccountsUpdate {
    pub fn into_accounts(self) -> Result<WalletAccounts, serde_json::Error> {
        match self {
            AccountsUpdate::Encoded { values } => serde_json::from_str(&values),
            AccountsUpdate::Map(accounts) => Ok(accounts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacted_document_hides_password() {
        let user = User {
            id: "u-1".to_string(),
            email: "a@x.com".to_string(),
            password: "$argon2id$secret".to_string(),
            ..Default::default()
        };

        let document = user.redacted();
        assert_eq!(document["_id"], json!("u-1"));
        assert_eq!(document["email"], json!("a@x.com"));
        assert!(document.get("password").is_none());
        assert_eq!(document["isDisabled"], json!(false));
    }

    #[test]
    fn partial_documents_fill_defaults() {
        let user: User = serde_json::from_value(json!({
            "_id": "u-2",
            "firstName": "Grace",
            "balance": 10.5
        }))
        .unwrap();

        assert_eq!(user.first_name, "Grace");
        assert_eq!(user.balance, 10.5);
        assert!(user.history.is_empty());
        assert!(user.referred_by.is_none());
    }

    #[test]
    fn accounts_update_accepts_both_shapes() {
        let encoded: AccountsUpdate =
            serde_json::from_value(json!({"values": "{\"btc\":\"bc1q\"}"})).unwrap();
        let plain: AccountsUpdate = serde_json::from_value(json!({"eth": "0xabc"})).unwrap();

        assert_eq!(encoded.into_accounts().unwrap()["btc"], "bc1q");
        assert_eq!(plain.into_accounts().unwrap()["eth"], "0xabc");
    }

    #[test]
    fn values_key_alongside_addresses_is_a_plain_map() {
        let update: AccountsUpdate =
            serde_json::from_value(json!({"values": "not json", "btc": "bc1q"})).unwrap();

        let accounts = update.into_accounts().unwrap();
        assert_eq!(accounts["values"], "not json");
        assert_eq!(accounts["btc"], "bc1q");
    }

    #[test]
    fn default_accounts_cover_supported_currencies() {
        let accounts = default_accounts();
        assert_eq!(accounts.len(), 4);
        assert!(accounts.contains_key("usdt"));
    }
}
