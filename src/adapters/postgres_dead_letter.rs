//! Dead-letter table for stream messages the consumer could not decode.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::ports::{DeadLetterSink, RepositoryResult, StreamMessage};

#[derive(Clone)]
pub struct PostgresDeadLetterSink {
    pool: PgPool,
}

impl PostgresDeadLetterSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeadLetterSink for PostgresDeadLetterSink {
    async fn record(&self, message: &StreamMessage, reason: &str) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stream_dead_letters (topic, partition, "offset", message_key, payload, error)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&message.topic)
        .bind(message.partition)
        .bind(message.offset)
        .bind(message.key.as_deref())
        .bind(&message.payload)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
