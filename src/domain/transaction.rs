//! Transaction domain entity.
//! Framework-agnostic representation of a deposit or withdrawal and its lifecycle.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a transaction.
///
/// `Init -> Pending -> {Success, Failed}`. `KafkaPublishFailed` marks a transaction
/// whose webhook update could not be published to the stream; an out-of-band job
/// picks those up, so it must stay distinguishable from `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum TransactionStatus {
    Init,
    Pending,
    Success,
    Failed,
    KafkaPublishFailed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Init => "INIT",
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::KafkaPublishFailed => "KAFKA_PUBLISH_FAILED",
        }
    }

    /// Statuses a gateway is allowed to report through a webhook.
    pub fn is_reportable(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Pending | TransactionStatus::Success | TransactionStatus::Failed
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INIT" => Ok(TransactionStatus::Init),
            "PENDING" => Ok(TransactionStatus::Pending),
            "SUCCESS" => Ok(TransactionStatus::Success),
            "FAILED" => Ok(TransactionStatus::Failed),
            "KAFKA_PUBLISH_FAILED" => Ok(TransactionStatus::KafkaPublishFailed),
            other => Err(format!("unknown transaction status '{}'", other)),
        }
    }
}

// String-typed serde keeps JSON and XML text encodings identical.
impl From<TransactionStatus> for &'static str {
    fn from(status: TransactionStatus) -> Self {
        status.as_str()
    }
}

impl TryFrom<String> for TransactionStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
        }
    }

    /// Parses the operation segment of a payment route. Case-insensitive.
    pub fn from_operation(operation: &str) -> Option<Self> {
        match operation.to_ascii_lowercase().as_str() {
            "deposit" => Some(TransactionType::Deposit),
            "withdrawal" => Some(TransactionType::Withdrawal),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "WITHDRAWAL" => Ok(TransactionType::Withdrawal),
            other => Err(format!("unknown transaction type '{}'", other)),
        }
    }
}

impl From<TransactionType> for &'static str {
    fn from(kind: TransactionType) -> Self {
        kind.as_str()
    }
}

impl TryFrom<String> for TransactionType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A persisted transaction. Only `status` and `updated_at` change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub amount: BigDecimal,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub gateway_id: i64,
    pub country_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Applies a gateway-reported status in memory. Nothing is persisted here.
    pub fn apply_webhook(&mut self, event: &WebhookEvent) {
        self.status = event.status;
        self.updated_at = event.updated_at;
    }
}

/// A transaction that has not been assigned an id by the store yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub amount: BigDecimal,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub gateway_id: i64,
    pub country_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

impl NewTransaction {
    pub fn init(request: &TransactionRequest, transaction_type: TransactionType, gateway_id: i64) -> Self {
        Self {
            amount: request.amount.clone(),
            transaction_type,
            status: TransactionStatus::Init,
            gateway_id,
            country_id: request.country_id,
            user_id: request.user_id,
            created_at: Utc::now(),
        }
    }
}

/// Inbound payment request. The transaction type comes from the route, not the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub user_id: i64,
    pub amount: BigDecimal,
    pub currency: String,
    pub country_id: i64,
}

/// Status report delivered by a gateway webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub txn_id: i64,
    pub status: TransactionStatus,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Status change applied by the consumer's bulk update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    pub id: i64,
    pub status: TransactionStatus,
}
