#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use paygate_core::adapters::{InMemoryGatewayRepository, InMemoryTransactionRepository};
use paygate_core::domain::{
    NewTransaction, StatusUpdate, Transaction, TransactionEvent, TransactionRequest,
    TransactionStatus, TransactionType,
};
use paygate_core::ports::{
    EventConsumer, EventPublisher, RepositoryError, RepositoryResult, StreamError, StreamMessage,
    TransactionRepository,
};
use paygate_core::services::{
    BreakerConfig, GatewaySelector, PublishBreaker, RetryPolicy, TransactionEventPublisher,
    TransactionOrchestrator,
};

/// Ordered record of side effects across fakes, e.g. `["bulk:2", "commit:2"]`.
pub type Journal = Arc<Mutex<Vec<String>>>;

fn note(journal: &Journal, entry: String) {
    journal.lock().unwrap().push(entry);
}

// --- Store ---

/// In-memory store with switchable failures and call counters.
pub struct FakeTransactionRepository {
    pub inner: InMemoryTransactionRepository,
    pub journal: Journal,
    pub failing_inserts: AtomicU32,
    pub fail_update_status: AtomicBool,
    pub fail_bulk: AtomicBool,
    pub update_status_delay: Mutex<Duration>,
    pub insert_calls: AtomicUsize,
    pub update_status_calls: AtomicUsize,
    pub bulk_calls: Mutex<Vec<Vec<StatusUpdate>>>,
}

impl FakeTransactionRepository {
    pub fn new(journal: Journal) -> Self {
        Self {
            inner: InMemoryTransactionRepository::new(),
            journal,
            failing_inserts: AtomicU32::new(0),
            fail_update_status: AtomicBool::new(false),
            fail_bulk: AtomicBool::new(false),
            update_status_delay: Mutex::new(Duration::ZERO),
            insert_calls: AtomicUsize::new(0),
            update_status_calls: AtomicUsize::new(0),
            bulk_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_next_inserts(&self, n: u32) {
        self.failing_inserts.store(n, Ordering::SeqCst);
    }

    pub fn set_update_status_delay(&self, delay: Duration) {
        *self.update_status_delay.lock().unwrap() = delay;
    }
}

#[async_trait]
impl TransactionRepository for FakeTransactionRepository {
    async fn insert(&self, tx: &NewTransaction) -> RepositoryResult<Transaction> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_inserts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_inserts.store(remaining - 1, Ordering::SeqCst);
            return Err(RepositoryError::Unavailable("insert failed".to_string()));
        }
        self.inner.insert(tx).await
    }

    async fn get_by_id(&self, id: i64) -> RepositoryResult<Transaction> {
        self.inner.get_by_id(id).await
    }

    async fn update_status(&self, id: i64, status: TransactionStatus) -> RepositoryResult<Transaction> {
        self.update_status_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.update_status_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_update_status.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("update failed".to_string()));
        }
        self.inner.update_status(id, status).await
    }

    async fn update_bulk(&self, updates: &[StatusUpdate]) -> RepositoryResult<()> {
        self.bulk_calls.lock().unwrap().push(updates.to_vec());
        note(&self.journal, format!("bulk:{}", updates.len()));
        if self.fail_bulk.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("bulk update failed".to_string()));
        }
        self.inner.update_bulk(updates).await
    }

    async fn list_by_status(&self, status: TransactionStatus, limit: i64) -> RepositoryResult<Vec<Transaction>> {
        self.inner.list_by_status(status, limit).await
    }
}

// --- Publisher ---

pub struct FakePublisher {
    pub failing: AtomicBool,
    pub delay: Mutex<Duration>,
    pub calls: AtomicUsize,
    pub delivered: Mutex<Vec<(String, Vec<u8>)>>,
}

impl FakePublisher {
    pub fn new() -> Self {
        Self {
            failing: AtomicBool::new(false),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn delivered_events(&self) -> Vec<TransactionEvent> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(_, payload)| TransactionEvent::from_payload(payload).unwrap())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for FakePublisher {
    async fn publish(&self, key: &str, payload: &[u8]) -> Result<(), StreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StreamError::Transport("broker unreachable".to_string()));
        }
        self.delivered
            .lock()
            .unwrap()
            .push((key.to_string(), payload.to_vec()));
        Ok(())
    }
}

// --- Consumer ---

/// Serves a fixed script of messages; cancels `shutdown` once the script is drained.
pub struct ScriptedConsumer {
    pub queue: Mutex<VecDeque<Result<Option<StreamMessage>, StreamError>>>,
    pub batch_size: usize,
    pub journal: Journal,
    pub commits: Mutex<Vec<Vec<i64>>>,
    pub failing_commits: AtomicU32,
    pub shutdown: CancellationToken,
}

impl ScriptedConsumer {
    pub fn new(batch_size: usize, journal: Journal, shutdown: CancellationToken) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            batch_size,
            journal,
            commits: Mutex::new(Vec::new()),
            failing_commits: AtomicU32::new(0),
            shutdown,
        }
    }

    pub fn push(&self, message: StreamMessage) {
        self.queue.lock().unwrap().push_back(Ok(Some(message)));
    }

    pub fn push_result(&self, result: Result<Option<StreamMessage>, StreamError>) {
        self.queue.lock().unwrap().push_back(result);
    }

    pub fn fail_next_commits(&self, n: u32) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    pub fn committed_offsets(&self) -> Vec<Vec<i64>> {
        self.commits.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventConsumer for ScriptedConsumer {
    async fn read(&self) -> Result<Option<StreamMessage>, StreamError> {
        let next = self.queue.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => {
                self.shutdown.cancel();
                Ok(None)
            }
        }
    }

    async fn commit(&self, messages: &[StreamMessage]) -> Result<(), StreamError> {
        note(&self.journal, format!("commit:{}", messages.len()));
        let remaining = self.failing_commits.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_commits.store(remaining - 1, Ordering::SeqCst);
            return Err(StreamError::Transport("commit rejected by broker".to_string()));
        }
        self.commits
            .lock()
            .unwrap()
            .push(messages.iter().map(|m| m.offset).collect());
        Ok(())
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}

// --- Harness ---

pub struct Harness {
    pub journal: Journal,
    pub transactions: Arc<FakeTransactionRepository>,
    pub gateways: Arc<InMemoryGatewayRepository>,
    pub publisher: Arc<FakePublisher>,
    pub consumer: Arc<ScriptedConsumer>,
    pub shutdown: CancellationToken,
    pub orchestrator: TransactionOrchestrator,
}

pub fn harness(breaker: BreakerConfig, batch_size: usize) -> Harness {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let shutdown = CancellationToken::new();
    let transactions = Arc::new(FakeTransactionRepository::new(journal.clone()));
    let gateways = Arc::new(InMemoryGatewayRepository::new());
    let publisher = Arc::new(FakePublisher::new());
    let consumer = Arc::new(ScriptedConsumer::new(batch_size, journal.clone(), shutdown.clone()));

    let orchestrator = TransactionOrchestrator::new(
        transactions.clone(),
        GatewaySelector::new(gateways.clone()),
        TransactionEventPublisher::new(publisher.clone(), PublishBreaker::new(breaker)),
        consumer.clone(),
    )
    .with_retry(RetryPolicy::new(3));

    Harness {
        journal,
        transactions,
        gateways,
        publisher,
        consumer,
        shutdown,
        orchestrator,
    }
}

pub fn default_harness() -> Harness {
    harness(BreakerConfig::default(), 1)
}

/// One country (id 1, NGN) served by an old and a new gateway; returns the newer gateway id.
pub fn seed_route(gateways: &InMemoryGatewayRepository) -> i64 {
    let country = gateways.add_country("Nigeria", "NG", "NGN");
    let old = gateways.add_gateway("legacy-pay", "application/xml", Utc::now() - ChronoDuration::days(30));
    let new = gateways.add_gateway("fast-pay", "application/json", Utc::now());
    gateways.link(old, country);
    gateways.link(new, country);
    new
}

pub fn request(amount: &str, currency: &str) -> TransactionRequest {
    TransactionRequest {
        user_id: 1,
        amount: BigDecimal::from_str(amount).unwrap(),
        currency: currency.to_string(),
        country_id: 1,
    }
}

pub fn transaction(id: i64, status: TransactionStatus) -> Transaction {
    Transaction {
        id,
        amount: BigDecimal::from_str("250.75").unwrap(),
        transaction_type: TransactionType::Deposit,
        status,
        gateway_id: 1,
        country_id: 1,
        user_id: 1,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn event_message(offset: i64, id: i64, status: TransactionStatus) -> StreamMessage {
    let event = TransactionEvent::from_transaction(&transaction(id, status));
    StreamMessage {
        topic: "transactions".to_string(),
        partition: 0,
        offset,
        key: Some(event.key()),
        payload: event.to_payload().unwrap(),
    }
}

pub fn raw_message(offset: i64, payload: &[u8]) -> StreamMessage {
    StreamMessage {
        topic: "transactions".to_string(),
        partition: 0,
        offset,
        key: None,
        payload: payload.to_vec(),
    }
}

pub fn fast_breaker(failure_threshold: u32) -> BreakerConfig {
    BreakerConfig {
        failure_threshold,
        cooldown: Duration::from_millis(50),
    }
}
