use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum WithdrawalStatus {
    #[serde(rename = "pending")]
    Pending,
    Approved,
    Declined,
}

impl WithdrawalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WithdrawalStatus::Pending)
    }
}

// Deposit entries are stored as submitted; amounts and dates are not validated.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DepositRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub amount: Value,
    #[serde(default)]
    pub profit: Value,
    #[serde(default)]
    pub date: Value,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewDeposit {
    pub currency: Option<String>,
    pub amount: Value,
    pub profit: Value,
    pub date: Value,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
}

impl NewDeposit {
    pub fn into_record(self, id: String) -> DepositRecord {
        DepositRecord {
            id,
            currency: self.currency,
            amount: self.amount,
            profit: self.profit,
            date: self.date,
            kind: self.kind,
            status: self.status,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct WithdrawalRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub amount: Value,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    pub status: WithdrawalStatus,
}

// Any status supplied by the client is ignored, new requests always start pending.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewWithdrawal {
    pub method: Option<String>,
    pub address: Option<String>,
    pub amount: Value,
    pub from: Option<String>,
    pub account: Option<String>,
}

impl NewWithdrawal {
    pub fn into_record(self, id: String) -> WithdrawalRecord {
        WithdrawalRecord {
            id,
            method: self.method,
            address: self.address,
            amount: self.amount,
            from: self.from,
            account: self.account,
            status: WithdrawalStatus::Pending,
        }
    }
}

/// Renders a loosely typed amount for human-facing text.
pub fn display_amount(amount: &Value) -> String {
    match amount {
        Value::String(s) => s.clone(),
        Value::Null => "0".to_string(),
        other => other.to_string(),
    }
}
