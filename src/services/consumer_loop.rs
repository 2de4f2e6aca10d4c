//! Batched consume-and-commit loop draining the transaction stream into the store.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use crate::domain::{StatusUpdate, TransactionEvent};
use crate::error::ProcessingError;
use crate::ports::StreamMessage;
use crate::services::orchestrator::TransactionOrchestrator;

impl TransactionOrchestrator {
    /// Runs until `shutdown` is cancelled (returns `Ok`) or a batch cannot be applied
    /// (returns the error). Cancellation is checked once per iteration and a partially
    /// filled batch is dropped uncommitted, so those messages are redelivered.
    pub async fn consume(&self, shutdown: CancellationToken) -> Result<(), ProcessingError> {
        let batch_size = self.consumer.batch_size().max(1);
        let mut batch: Vec<StreamMessage> = Vec::with_capacity(batch_size);

        tracing::info!(batch_size, "Transaction consumer started");

        loop {
            if shutdown.is_cancelled() {
                tracing::info!(
                    uncommitted = batch.len(),
                    "Shutdown signal received, new messages won't be processed"
                );
                return Ok(());
            }

            let message = match self.consumer.read().await {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "Error reading message from stream");
                    continue;
                }
            };

            tracing::debug!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                "Message received"
            );
            batch.push(message);

            if batch.len() >= batch_size {
                if let Err(e) = self.flush_batch(&batch).await {
                    tracing::error!(error = %e, batch = batch.len(), "Stopping consumer, batch could not be applied");
                    return Err(e);
                }
                batch.clear();
            }
        }
    }

    /// Applies one batch with a single bulk update, then commits every message in it.
    pub async fn flush_batch(&self, batch: &[StreamMessage]) -> Result<(), ProcessingError> {
        let updates = self.decode_batch(batch).await?;

        if !updates.is_empty() {
            self.transactions
                .update_bulk(&updates)
                .await
                .map_err(ProcessingError::BulkUpdate)?;
        }

        match self.consumer.commit(batch).await {
            Ok(()) => tracing::info!(messages = batch.len(), updates = updates.len(), "Successfully committed batch"),
            // Store already holds the updates; the batch will be re-applied on redelivery.
            Err(e) => tracing::error!(error = %e, messages = batch.len(), "Failed to commit batch"),
        }

        Ok(())
    }

    /// Decodes every payload. Repeated ids keep their last status in stream order.
    async fn decode_batch(&self, batch: &[StreamMessage]) -> Result<Vec<StatusUpdate>, ProcessingError> {
        let mut updates: Vec<StatusUpdate> = Vec::with_capacity(batch.len());
        let mut positions: HashMap<i64, usize> = HashMap::new();

        for message in batch {
            let event = match TransactionEvent::from_payload(&message.payload) {
                Ok(event) => event,
                Err(source) => {
                    self.handle_malformed(message, source).await?;
                    continue;
                }
            };

            let update = event.status_update();
            match positions.get(&update.id) {
                Some(&index) => updates[index] = update,
                None => {
                    positions.insert(update.id, updates.len());
                    updates.push(update);
                }
            }
        }

        Ok(updates)
    }

    async fn handle_malformed(
        &self,
        message: &StreamMessage,
        source: serde_json::Error,
    ) -> Result<(), ProcessingError> {
        let Some(sink) = &self.dead_letters else {
            tracing::error!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                error = %source,
                "Failed to unmarshal stream message to transaction"
            );
            return Err(ProcessingError::Decode {
                topic: message.topic.clone(),
                partition: message.partition,
                offset: message.offset,
                source,
            });
        };

        let reason = source.to_string();
        sink.record(message, &reason)
            .await
            .map_err(ProcessingError::DeadLetter)?;

        tracing::warn!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            error = %reason,
            "Malformed stream message moved to dead letters"
        );
        Ok(())
    }
}
