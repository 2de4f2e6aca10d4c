//! Capability traits the orchestrator depends on. Postgres, Kafka and in-memory
//! adapters live in `crate::adapters`.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Gateway, NewTransaction, StatusUpdate, Transaction, TransactionStatus};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Bulk update matched {matched} of {expected} transactions")]
    PartialUpdate { expected: usize, matched: usize },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Durable record of transactions and their lifecycle status.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Inserts a transaction and returns it with the store-assigned id.
    ///
    /// Not idempotent: retrying after an ambiguous failure may create a duplicate row.
    async fn insert(&self, tx: &NewTransaction) -> RepositoryResult<Transaction>;

    async fn get_by_id(&self, id: i64) -> RepositoryResult<Transaction>;

    async fn update_status(&self, id: i64, status: TransactionStatus) -> RepositoryResult<Transaction>;

    /// Applies every update in one all-or-nothing statement.
    async fn update_bulk(&self, updates: &[StatusUpdate]) -> RepositoryResult<()>;

    async fn list_by_status(&self, status: TransactionStatus, limit: i64) -> RepositoryResult<Vec<Transaction>>;
}

#[async_trait]
pub trait GatewayRepository: Send + Sync {
    /// Gateways serving the country/currency pair, most recently created first.
    async fn find_by_country_and_currency(&self, country_id: i64, currency: &str) -> RepositoryResult<Vec<Gateway>>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Stream transport error: {0}")]
    Transport(String),
}

/// One message as read from the stream, carrying what is needed to commit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, key: &str, payload: &[u8]) -> Result<(), StreamError>;
}

#[async_trait]
pub trait EventConsumer: Send + Sync {
    /// Waits up to the consumer's bounded wait for the next message; `Ok(None)` when idle.
    async fn read(&self) -> Result<Option<StreamMessage>, StreamError>;

    /// Acknowledges every message in `messages`.
    async fn commit(&self, messages: &[StreamMessage]) -> Result<(), StreamError>;

    fn batch_size(&self) -> usize;
}

/// Side channel for stream messages that cannot be decoded.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn record(&self, message: &StreamMessage, reason: &str) -> RepositoryResult<()>;
}
