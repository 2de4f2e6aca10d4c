//! Process wiring: builds adapters from configuration and runs the server and consumer.

use anyhow::{Context, Result};
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::adapters::{PostgresDeadLetterSink, PostgresGatewayRepository, PostgresTransactionRepository};
use crate::config::{Config, StreamConfig};
use crate::ports::{EventConsumer, EventPublisher};
use crate::services::{GatewaySelector, PublishBreaker, TransactionEventPublisher, TransactionOrchestrator};
use crate::{create_app, db, AppState};

pub struct Services {
    pub pool: PgPool,
    pub orchestrator: Arc<TransactionOrchestrator>,
}

/// Connects to Postgres, applies migrations and assembles the orchestrator.
pub async fn build(config: &Config) -> Result<Services> {
    let pool = db::create_pool(&config.database)
        .await
        .context("failed to connect to the database")?;
    validate_database(&pool).await?;
    db::run_migrations(&pool).await.context("failed to run migrations")?;

    let (transport, consumer) = stream_transport(&config.stream)?;
    let publisher = TransactionEventPublisher::new(transport, PublishBreaker::new(config.breaker));
    let selector = GatewaySelector::new(Arc::new(PostgresGatewayRepository::new(pool.clone())));

    let mut orchestrator = TransactionOrchestrator::new(
        Arc::new(PostgresTransactionRepository::new(pool.clone())),
        selector,
        publisher,
        consumer,
    )
    .with_retry(config.retry_policy());

    if config.stream.dead_letter {
        orchestrator = orchestrator.with_dead_letters(Arc::new(PostgresDeadLetterSink::new(pool.clone())));
    }

    Ok(Services {
        pool,
        orchestrator: Arc::new(orchestrator),
    })
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .context("database is not reachable")?;
    Ok(())
}

#[cfg(feature = "kafka")]
fn stream_transport(config: &StreamConfig) -> Result<(Arc<dyn EventPublisher>, Arc<dyn EventConsumer>)> {
    use crate::adapters::kafka::{KafkaConsumer, KafkaPublisher};

    let publisher = KafkaPublisher::new(config).context("failed to create Kafka producer")?;
    let consumer = KafkaConsumer::new(config).context("failed to create Kafka consumer")?;
    tracing::info!(broker = %config.broker_url, topic = %config.topic, "Kafka transport initialized");
    let publisher: Arc<dyn EventPublisher> = Arc::new(publisher);
    let consumer: Arc<dyn EventConsumer> = Arc::new(consumer);
    Ok((publisher, consumer))
}

#[cfg(not(feature = "kafka"))]
fn stream_transport(config: &StreamConfig) -> Result<(Arc<dyn EventPublisher>, Arc<dyn EventConsumer>)> {
    use crate::adapters::InMemoryStream;

    tracing::warn!(
        broker = %config.broker_url,
        "Built without the `kafka` feature, events stay in-process and are lost on restart"
    );
    let stream = Arc::new(InMemoryStream::new(config.topic.clone(), config.batch_size, config.max_wait));
    let publisher: Arc<dyn EventPublisher> = stream.clone();
    let consumer: Arc<dyn EventConsumer> = stream;
    Ok((publisher, consumer))
}

pub fn spawn_consumer(orchestrator: Arc<TransactionOrchestrator>, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        match orchestrator.consume(shutdown).await {
            Ok(()) => tracing::info!("Transaction consumer stopped"),
            Err(e) => tracing::error!(
                error = %e,
                consistency = e.is_consistency_error(),
                "Transaction consumer terminated, stream updates are no longer applied"
            ),
        }
    })
}

/// Cancels `shutdown` on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
        tracing::info!("Shutdown signal received");
        shutdown.cancel();
    });
}

/// HTTP server plus the background consumer, until a shutdown signal arrives.
pub async fn run_server(config: Config) -> Result<()> {
    let services = build(&config).await?;
    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let consumer = spawn_consumer(services.orchestrator.clone(), shutdown.clone());

    let app = create_app(AppState {
        orchestrator: services.orchestrator,
        db: Some(services.pool),
        request_timeout: config.request_timeout,
        webhook_secret: config.webhook_secret.clone(),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", addr);

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await?;

    shutdown.cancel();
    if let Err(e) = consumer.await {
        tracing::error!(error = %e, "Consumer task panicked");
    }
    Ok(())
}

/// Consumer loop only. Returns the loop's error so the process exits non-zero.
pub async fn run_consumer(config: Config) -> Result<()> {
    let services = build(&config).await?;
    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    services.orchestrator.consume(shutdown).await?;
    Ok(())
}
