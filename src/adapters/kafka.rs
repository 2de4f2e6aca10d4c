//! Kafka transport for the transaction topic. Compiled with the `kafka` feature.

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{Message, Offset, TopicPartitionList};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::StreamConfig;
use crate::ports::{EventConsumer, EventPublisher, StreamError, StreamMessage};

pub const CONSUMER_GROUP: &str = "transaction-consumer-group";

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

fn transport(e: impl std::fmt::Display) -> StreamError {
    StreamError::Transport(e.to_string())
}

pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
}

impl KafkaPublisher {
    pub fn new(config: &StreamConfig) -> Result<Self, StreamError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.broker_url)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(transport)?;

        Ok(Self {
            producer,
            topic: config.topic.clone(),
        })
    }
}

#[async_trait]
impl EventPublisher for KafkaPublisher {
    async fn publish(&self, key: &str, payload: &[u8]) -> Result<(), StreamError> {
        let record = FutureRecord::to(&self.topic).key(key).payload(payload);
        self.producer
            .send(record, SEND_TIMEOUT)
            .await
            .map(|(partition, offset)| {
                tracing::debug!(topic = %self.topic, partition, offset, key, "Event delivered");
            })
            .map_err(|(e, _)| transport(e))
    }
}

pub struct KafkaConsumer {
    consumer: Arc<StreamConsumer>,
    batch_size: usize,
    max_wait: Duration,
}

impl KafkaConsumer {
    /// Joins the consumer group with auto-commit off; offsets advance only via `commit`.
    pub fn new(config: &StreamConfig) -> Result<Self, StreamError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.broker_url)
            .set("group.id", CONSUMER_GROUP)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false")
            .create()
            .map_err(transport)?;

        consumer.subscribe(&[config.topic.as_str()]).map_err(transport)?;

        Ok(Self {
            consumer: Arc::new(consumer),
            batch_size: config.batch_size,
            max_wait: config.max_wait,
        })
    }
}

#[async_trait]
impl EventConsumer for KafkaConsumer {
    async fn read(&self) -> Result<Option<StreamMessage>, StreamError> {
        let message = match tokio::time::timeout(self.max_wait, self.consumer.recv()).await {
            Err(_) => return Ok(None),
            Ok(result) => result.map_err(transport)?.detach(),
        };

        Ok(Some(StreamMessage {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(|k| String::from_utf8_lossy(k).into_owned()),
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        }))
    }

    async fn commit(&self, messages: &[StreamMessage]) -> Result<(), StreamError> {
        let mut highest: HashMap<(&str, i32), i64> = HashMap::new();
        for m in messages {
            highest
                .entry((m.topic.as_str(), m.partition))
                .and_modify(|o| *o = (*o).max(m.offset))
                .or_insert(m.offset);
        }
        if highest.is_empty() {
            return Ok(());
        }

        let mut tpl = TopicPartitionList::new();
        for ((topic, partition), offset) in highest {
            tpl.add_partition_offset(topic, partition, Offset::Offset(offset + 1))
                .map_err(transport)?;
        }

        let consumer = Arc::clone(&self.consumer);
        tokio::task::spawn_blocking(move || consumer.commit(&tpl, CommitMode::Sync))
            .await
            .map_err(transport)?
            .map_err(transport)
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}
