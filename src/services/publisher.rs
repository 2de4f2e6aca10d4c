use std::sync::Arc;
use thiserror::Error;

use crate::domain::{Transaction, TransactionEvent};
use crate::ports::{EventPublisher, StreamError};
use crate::services::circuit_breaker::{BreakerError, BreakerState, PublishBreaker};

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Circuit breaker open, publish rejected")]
    CircuitOpen,

    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// Publishes transaction status events onto the stream, keyed by transaction id,
/// through the circuit breaker.
#[derive(Clone)]
pub struct TransactionEventPublisher {
    transport: Arc<dyn EventPublisher>,
    breaker: PublishBreaker,
}

impl TransactionEventPublisher {
    pub fn new(transport: Arc<dyn EventPublisher>, breaker: PublishBreaker) -> Self {
        Self { transport, breaker }
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    pub async fn publish_transaction(&self, tx: &Transaction) -> Result<(), PublishError> {
        let event = TransactionEvent::from_transaction(tx);
        let key = event.key();
        let payload = event.to_payload()?;

        match self.breaker.call(self.transport.publish(&key, &payload)).await {
            Ok(()) => {
                tracing::info!(transaction_id = tx.id, status = %tx.status, "Transaction event published");
                Ok(())
            }
            Err(BreakerError::Open) => Err(PublishError::CircuitOpen),
            Err(BreakerError::Inner(e)) => Err(PublishError::Stream(e)),
        }
    }
}
