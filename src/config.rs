use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde_json::json;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::{BreakerConfig, RetryPolicy};

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub broker_url: String,
    pub topic: String,
    pub batch_size: usize,
    pub max_wait: Duration,
    pub dead_letter: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database: DatabaseConfig,
    pub stream: StreamConfig,
    pub breaker: BreakerConfig,
    pub retry_max_attempts: u32,
    pub retry_backoff: Duration,
    pub request_timeout: Duration,
    pub webhook_secret: Option<String>,
    /// Reserved for field-level masking; only carried, never applied.
    pub cipher_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Config {
            server_port: parse_or(&var, "SERVER_PORT", 3000)?,
            database: DatabaseConfig {
                url: database_url(&var)?,
                max_connections: parse_or(&var, "DATABASE_MAX_CONNECTIONS", 5)?,
            },
            stream: StreamConfig {
                broker_url: var("KAFKA_BROKER_URL").unwrap_or_else(|| "kafka:9092".to_string()),
                topic: var("KAFKA_TOPIC").unwrap_or_else(|| "transactions".to_string()),
                batch_size: parse_batch_size(var("CONSUMER_BATCH_SIZE").as_deref()),
                max_wait: Duration::from_millis(parse_or(&var, "CONSUMER_MAX_WAIT_MS", 1000)?),
                dead_letter: parse_or(&var, "CONSUMER_DEAD_LETTER", false)?,
            },
            breaker: BreakerConfig {
                failure_threshold: parse_or(&var, "CB_FAILURE_THRESHOLD", 3)?,
                cooldown: Duration::from_secs(parse_or(&var, "CB_COOLDOWN_SECS", 30)?),
            },
            retry_max_attempts: parse_or(&var, "RETRY_MAX_ATTEMPTS", 5)?,
            retry_backoff: Duration::from_millis(parse_or(&var, "RETRY_BACKOFF_MS", 0)?),
            request_timeout: Duration::from_secs(parse_or(&var, "REQUEST_TIMEOUT_SECS", 10)?),
            webhook_secret: var("WEBHOOK_SECRET"),
            cipher_secret: var("CIPHER_SECRET"),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_max_attempts).with_backoff(self.retry_backoff)
    }

    /// Configuration with secrets and credentials masked, for printing.
    pub fn masked(&self) -> serde_json::Value {
        json!({
            "server_port": self.server_port,
            "database": {
                "url": mask_url(&self.database.url),
                "max_connections": self.database.max_connections,
            },
            "stream": {
                "broker_url": self.stream.broker_url,
                "topic": self.stream.topic,
                "batch_size": self.stream.batch_size,
                "max_wait_ms": self.stream.max_wait.as_millis() as u64,
                "dead_letter": self.stream.dead_letter,
            },
            "breaker": {
                "failure_threshold": self.breaker.failure_threshold,
                "cooldown_secs": self.breaker.cooldown.as_secs(),
            },
            "retry": {
                "max_attempts": self.retry_max_attempts,
                "backoff_ms": self.retry_backoff.as_millis() as u64,
            },
            "request_timeout_secs": self.request_timeout.as_secs(),
            "webhook_secret": self.webhook_secret.as_ref().map(|_| "****"),
            "cipher_secret": self.cipher_secret.as_ref().map(|_| "****"),
        })
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

fn database_url<F>(var: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = var("DATABASE_URL") {
        return Ok(url);
    }

    let user = var("DB_USER").context("DATABASE_URL or DB_USER must be set")?;
    let password = var("DB_PASSWORD").unwrap_or_default();
    let host = var("DB_HOST").unwrap_or_else(|| "localhost".to_string());
    let port = var("DB_PORT").unwrap_or_else(|| "5432".to_string());
    let name = var("DB_NAME").context("DATABASE_URL or DB_NAME must be set")?;

    Ok(format!("postgres://{}:{}@{}:{}/{}", user, password, host, port, name))
}

/// Missing, unparseable or zero batch sizes fall back to 1.
pub fn parse_batch_size(raw: Option<&str>) -> usize {
    raw.and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(1)
}

fn mask_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.rsplit_once('@') {
        Some((credentials, host)) => {
            let user = credentials.split(':').next().unwrap_or_default();
            format!("{}://{}:****@{}", scheme, user, host)
        }
        None => url.to_string(),
    }
}
