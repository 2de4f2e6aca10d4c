//! In-process adapters. Used when the service runs without a broker and by tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

use crate::domain::{
    Country, Gateway, NewTransaction, StatusUpdate, Transaction, TransactionStatus,
};
use crate::ports::{
    DeadLetterSink, EventConsumer, EventPublisher, GatewayRepository, RepositoryError,
    RepositoryResult, StreamError, StreamMessage, TransactionRepository,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// --- Transactions ---

#[derive(Default)]
struct TransactionTable {
    rows: BTreeMap<i64, Transaction>,
    next_id: i64,
}

#[derive(Default)]
pub struct InMemoryTransactionRepository {
    table: Mutex<TransactionTable>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, id: i64) -> Option<Transaction> {
        lock(&self.table).rows.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.table).rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seeds a row with a fixed id, bypassing id assignment.
    pub fn put(&self, tx: Transaction) {
        let mut table = lock(&self.table);
        table.next_id = table.next_id.max(tx.id);
        table.rows.insert(tx.id, tx);
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn insert(&self, tx: &NewTransaction) -> RepositoryResult<Transaction> {
        let mut table = lock(&self.table);
        table.next_id += 1;
        let row = Transaction {
            id: table.next_id,
            amount: tx.amount.clone(),
            transaction_type: tx.transaction_type,
            status: tx.status,
            gateway_id: tx.gateway_id,
            country_id: tx.country_id,
            user_id: tx.user_id,
            created_at: tx.created_at,
            updated_at: tx.created_at,
        };
        table.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_by_id(&self, id: i64) -> RepositoryResult<Transaction> {
        lock(&self.table)
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))
    }

    async fn update_status(&self, id: i64, status: TransactionStatus) -> RepositoryResult<Transaction> {
        let mut table = lock(&self.table);
        let row = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?;
        row.status = status;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn update_bulk(&self, updates: &[StatusUpdate]) -> RepositoryResult<()> {
        let mut table = lock(&self.table);

        let expected: HashSet<i64> = updates.iter().map(|u| u.id).collect();
        let matched = expected.iter().filter(|id| table.rows.contains_key(id)).count();
        if matched != expected.len() {
            return Err(RepositoryError::PartialUpdate {
                expected: expected.len(),
                matched,
            });
        }

        let now = Utc::now();
        for update in updates {
            if let Some(row) = table.rows.get_mut(&update.id) {
                row.status = update.status;
                row.updated_at = now;
            }
        }
        Ok(())
    }

    async fn list_by_status(&self, status: TransactionStatus, limit: i64) -> RepositoryResult<Vec<Transaction>> {
        let table = lock(&self.table);
        Ok(table
            .rows
            .values()
            .filter(|tx| tx.status == status)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }
}

// --- Gateways ---

#[derive(Default)]
struct GatewayTables {
    countries: Vec<Country>,
    gateways: Vec<Gateway>,
    links: HashSet<(i64, i64)>,
}

#[derive(Default)]
pub struct InMemoryGatewayRepository {
    tables: Mutex<GatewayTables>,
}

impl InMemoryGatewayRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_country(&self, name: &str, code: &str, currency: &str) -> i64 {
        let mut tables = lock(&self.tables);
        let id = tables.countries.len() as i64 + 1;
        let now = Utc::now();
        tables.countries.push(Country {
            id,
            name: name.to_string(),
            code: code.to_string(),
            currency: currency.to_string(),
            created_at: now,
            updated_at: now,
        });
        id
    }

    pub fn add_gateway(&self, name: &str, data_format: &str, created_at: DateTime<Utc>) -> i64 {
        let mut tables = lock(&self.tables);
        let id = tables.gateways.len() as i64 + 1;
        tables.gateways.push(Gateway {
            id,
            name: name.to_string(),
            data_format_supported: data_format.to_string(),
            created_at,
            updated_at: created_at,
        });
        id
    }

    pub fn link(&self, gateway_id: i64, country_id: i64) {
        lock(&self.tables).links.insert((gateway_id, country_id));
    }
}

#[async_trait]
impl GatewayRepository for InMemoryGatewayRepository {
    async fn find_by_country_and_currency(&self, country_id: i64, currency: &str) -> RepositoryResult<Vec<Gateway>> {
        let tables = lock(&self.tables);
        let country_matches = tables
            .countries
            .iter()
            .any(|c| c.id == country_id && c.currency.eq_ignore_ascii_case(currency));
        if !country_matches {
            return Ok(Vec::new());
        }

        let mut gateways: Vec<Gateway> = tables
            .gateways
            .iter()
            .filter(|g| tables.links.contains(&(g.id, country_id)))
            .cloned()
            .collect();
        gateways.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(gateways)
    }
}

// --- Stream ---

#[derive(Default)]
struct StreamState {
    queue: VecDeque<StreamMessage>,
    published: Vec<StreamMessage>,
    next_offset: i64,
    committed_offset: Option<i64>,
}

/// Single-partition in-process stream implementing both publisher and consumer.
pub struct InMemoryStream {
    topic: String,
    batch_size: usize,
    max_wait: Duration,
    state: Mutex<StreamState>,
    notify: Notify,
}

impl InMemoryStream {
    pub fn new(topic: impl Into<String>, batch_size: usize, max_wait: Duration) -> Self {
        Self {
            topic: topic.into(),
            batch_size: batch_size.max(1),
            max_wait,
            state: Mutex::new(StreamState::default()),
            notify: Notify::new(),
        }
    }

    /// Every message ever published, in order.
    pub fn published(&self) -> Vec<StreamMessage> {
        lock(&self.state).published.clone()
    }

    /// Next offset the group would resume from, if anything was committed.
    pub fn committed_offset(&self) -> Option<i64> {
        lock(&self.state).committed_offset
    }

    pub fn pending(&self) -> usize {
        lock(&self.state).queue.len()
    }

    fn pop(&self) -> Option<StreamMessage> {
        lock(&self.state).queue.pop_front()
    }
}

#[async_trait]
impl EventPublisher for InMemoryStream {
    async fn publish(&self, key: &str, payload: &[u8]) -> Result<(), StreamError> {
        {
            let mut state = lock(&self.state);
            let message = StreamMessage {
                topic: self.topic.clone(),
                partition: 0,
                offset: state.next_offset,
                key: Some(key.to_string()),
                payload: payload.to_vec(),
            };
            state.next_offset += 1;
            state.published.push(message.clone());
            state.queue.push_back(message);
        }
        self.notify.notify_one();
        Ok(())
    }
}

#[async_trait]
impl EventConsumer for InMemoryStream {
    async fn read(&self) -> Result<Option<StreamMessage>, StreamError> {
        if let Some(message) = self.pop() {
            return Ok(Some(message));
        }
        match tokio::time::timeout(self.max_wait, self.notify.notified()).await {
            Ok(()) => Ok(self.pop()),
            Err(_) => Ok(None),
        }
    }

    async fn commit(&self, messages: &[StreamMessage]) -> Result<(), StreamError> {
        if let Some(last) = messages.iter().map(|m| m.offset).max() {
            let mut state = lock(&self.state);
            let next = last + 1;
            state.committed_offset = Some(state.committed_offset.map_or(next, |c| c.max(next)));
        }
        Ok(())
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}

// --- Dead letters ---

#[derive(Default)]
pub struct InMemoryDeadLetters {
    entries: Mutex<Vec<(StreamMessage, String)>>,
}

impl InMemoryDeadLetters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(StreamMessage, String)> {
        lock(&self.entries).clone()
    }
}

#[async_trait]
impl DeadLetterSink for InMemoryDeadLetters {
    async fn record(&self, message: &StreamMessage, reason: &str) -> RepositoryResult<()> {
        lock(&self.entries).push((message.clone(), reason.to_string()));
        Ok(())
    }
}
