use std::sync::Arc;

use crate::domain::{
    NewTransaction, Transaction, TransactionRequest, TransactionStatus, TransactionType, WebhookEvent,
};
use crate::error::ProcessingError;
use crate::ports::{DeadLetterSink, EventConsumer, RepositoryError, TransactionRepository};
use crate::services::gateway_selector::GatewaySelector;
use crate::services::publisher::TransactionEventPublisher;
use crate::services::retry::RetryPolicy;

/// Composes gateway selection, the transaction store and the event stream into
/// the payment pipeline. Shared across request handlers behind an `Arc`; the
/// consumer loop (see `consumer_loop.rs`) runs on exactly one task.
pub struct TransactionOrchestrator {
    pub(crate) transactions: Arc<dyn TransactionRepository>,
    pub(crate) selector: GatewaySelector,
    pub(crate) publisher: TransactionEventPublisher,
    pub(crate) consumer: Arc<dyn EventConsumer>,
    pub(crate) dead_letters: Option<Arc<dyn DeadLetterSink>>,
    pub(crate) retry: RetryPolicy,
}

impl TransactionOrchestrator {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        selector: GatewaySelector,
        publisher: TransactionEventPublisher,
        consumer: Arc<dyn EventConsumer>,
    ) -> Self {
        Self {
            transactions,
            selector,
            publisher,
            consumer,
            dead_letters: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Routes undecodable stream messages to `sink` instead of failing the batch.
    pub fn with_dead_letters(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letters = Some(sink);
        self
    }

    pub fn publisher(&self) -> &TransactionEventPublisher {
        &self.publisher
    }

    /// Records a new transaction, assigns it a gateway and moves it to `PENDING`.
    pub async fn create_and_route(
        &self,
        transaction_type: TransactionType,
        request: &TransactionRequest,
    ) -> Result<Transaction, ProcessingError> {
        let gateway = self
            .selector
            .select_gateway(request.country_id, &request.currency)
            .await?;

        let new_tx = NewTransaction::init(request, transaction_type, gateway.id);
        let repo = &self.transactions;
        let pending = &new_tx;

        let created = self
            .retry
            .run("insert_transaction", move || repo.insert(pending))
            .await
            .map_err(|e| {
                tracing::error!(
                    user_id = request.user_id,
                    gateway_id = gateway.id,
                    error = %e,
                    "Could not persist transaction"
                );
                ProcessingError::Create(e)
            })?;

        // The real gateway call is stubbed; reaching this point counts as the gateway ack.
        tracing::info!(
            transaction_id = created.id,
            gateway = %gateway.name,
            transaction_type = %transaction_type,
            "Transaction handed off to gateway"
        );

        let id = created.id;
        let updated = self
            .retry
            .run("mark_pending", move || repo.update_status(id, TransactionStatus::Pending))
            .await
            .map_err(|source| {
                tracing::error!(
                    transaction_id = id,
                    error = %source,
                    "Gateway acked but status not recorded as PENDING"
                );
                ProcessingError::StatusTransition { id, source }
            })?;

        Ok(updated)
    }

    /// Applies a webhook status report by publishing it to the stream. The store is
    /// brought up to date later by the consumer loop.
    pub async fn reconcile(&self, event: &WebhookEvent) -> Result<Transaction, ProcessingError> {
        if !event.status.is_reportable() {
            return Err(ProcessingError::InvalidWebhook(format!(
                "status {} cannot be reported by a gateway",
                event.status
            )));
        }

        let mut tx = self
            .transactions
            .get_by_id(event.txn_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound(_) => ProcessingError::NotFound(event.txn_id),
                other => ProcessingError::Repository(other),
            })?;

        tx.apply_webhook(event);

        let publish_err = match self.publisher.publish_transaction(&tx).await {
            Ok(()) => return Ok(tx),
            Err(e) => e,
        };

        tracing::warn!(
            transaction_id = tx.id,
            status = %tx.status,
            error = %publish_err,
            "Publishing webhook update failed, recording KAFKA_PUBLISH_FAILED"
        );

        let repo = &self.transactions;
        let id = tx.id;
        match self
            .retry
            .run("mark_publish_failed", move || {
                repo.update_status(id, TransactionStatus::KafkaPublishFailed)
            })
            .await
        {
            Ok(_) => Err(ProcessingError::PublishFailed {
                id,
                source: publish_err,
            }),
            Err(source) => {
                tracing::error!(
                    alert = true,
                    transaction_id = id,
                    publish_error = %publish_err,
                    error = %source,
                    "Reconciliation failed: event not published and fallback status not stored"
                );
                Err(ProcessingError::Reconciliation {
                    id,
                    publish: publish_err,
                    source,
                })
            }
        }
    }
}
