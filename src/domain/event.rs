//! Outbound stream event: the JSON projection of a transaction published on status
//! changes and read back by the consumer loop.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::transaction::{StatusUpdate, Transaction, TransactionStatus, TransactionType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub id: i64,
    pub amount: BigDecimal,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    pub gateway_id: i64,
    pub country_id: i64,
    pub user_id: i64,
}

impl TransactionEvent {
    pub fn from_transaction(tx: &Transaction) -> Self {
        Self {
            id: tx.id,
            amount: tx.amount.clone(),
            transaction_type: tx.transaction_type,
            status: tx.status,
            created_at: tx.created_at,
            gateway_id: tx.gateway_id,
            country_id: tx.country_id,
            user_id: tx.user_id,
        }
    }

    /// Partition key: the decimal transaction id.
    pub fn key(&self) -> String {
        self.id.to_string()
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    pub fn status_update(&self) -> StatusUpdate {
        StatusUpdate {
            id: self.id,
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample() -> Transaction {
        let now = Utc::now();
        Transaction {
            id: 42,
            amount: BigDecimal::from_str("100.50").unwrap(),
            transaction_type: TransactionType::Deposit,
            status: TransactionStatus::Success,
            gateway_id: 1,
            country_id: 2,
            user_id: 3,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_event_round_trip_preserves_id_status_amount() {
        let tx = sample();
        let payload = TransactionEvent::from_transaction(&tx).to_payload().unwrap();

        let decoded = TransactionEvent::from_payload(&payload).unwrap();

        assert_eq!(decoded.id, tx.id);
        assert_eq!(decoded.status, tx.status);
        assert_eq!(decoded.amount, tx.amount);
    }

    #[test]
    fn test_wire_field_names() {
        let event = TransactionEvent::from_transaction(&sample());
        let value: serde_json::Value = serde_json::from_slice(&event.to_payload().unwrap()).unwrap();

        for field in ["id", "amount", "type", "status", "createdAt", "gateway_id", "country_id", "user_id"] {
            assert!(value.get(field).is_some(), "missing field {}", field);
        }
        assert_eq!(value["type"], "DEPOSIT");
        assert_eq!(value["status"], "SUCCESS");
        assert_eq!(event.key(), "42");
    }

    #[test]
    fn test_malformed_payload_is_rejected() {
        assert!(TransactionEvent::from_payload(b"{\"id\": \"not-a-number\"}").is_err());
        assert!(TransactionEvent::from_payload(b"garbage").is_err());
    }
}
