use clap::{Parser, Subcommand};

use crate::adapters::PostgresTransactionRepository;
use crate::config::Config;
use crate::domain::TransactionStatus;
use crate::ports::{RepositoryError, TransactionRepository};

#[derive(Parser)]
#[command(name = "paygate-core")]
#[command(about = "Paygate Core - payment routing and webhook reconciliation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server and the stream consumer (default)
    Serve,

    /// Run only the stream consumer
    Consume,

    /// Transaction inspection commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Print the effective configuration with secrets masked
    Config,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Show a transaction by ID
    Show {
        #[arg(value_name = "TX_ID")]
        tx_id: i64,
    },

    /// List transactions in a status, e.g. KAFKA_PUBLISH_FAILED for manual follow-up
    List {
        #[arg(long, default_value = "KAFKA_PUBLISH_FAILED")]
        status: TransactionStatus,

        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

pub async fn handle_tx_show(config: &Config, tx_id: i64) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(&config.database).await?;
    let repo = PostgresTransactionRepository::new(pool);

    match repo.get_by_id(tx_id).await {
        Ok(tx) => {
            println!("{}", serde_json::to_string_pretty(&tx)?);
            Ok(())
        }
        Err(RepositoryError::NotFound(_)) => {
            tracing::warn!("Transaction {} not found", tx_id);
            anyhow::bail!("Transaction {} not found", tx_id)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn handle_tx_list(config: &Config, status: TransactionStatus, limit: i64) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(&config.database).await?;
    let repo = PostgresTransactionRepository::new(pool);

    let transactions = repo.list_by_status(status, limit).await?;
    tracing::info!(status = %status, count = transactions.len(), "Listed transactions");

    for tx in &transactions {
        println!(
            "{}\t{}\t{}\t{}\tgateway={}\tupdated_at={}",
            tx.id, tx.transaction_type, tx.status, tx.amount, tx.gateway_id, tx.updated_at
        );
    }
    println!("✓ {} transaction(s) in {}", transactions.len(), status);
    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(&config.database).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");
    Ok(())
}

pub fn handle_config_show(config: &Config) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&config.masked())?);
    println!("✓ Configuration is valid");
    Ok(())
}
