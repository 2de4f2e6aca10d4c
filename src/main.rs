use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use paygate_core::cli::{self, Cli, Commands, DbCommands, TxCommands};
use paygate_core::config::Config;
use paygate_core::startup;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => startup::run_server(config).await,
        Commands::Consume => startup::run_consumer(config).await,
        Commands::Tx(TxCommands::Show { tx_id }) => cli::handle_tx_show(&config, tx_id).await,
        Commands::Tx(TxCommands::List { status, limit }) => cli::handle_tx_list(&config, status, limit).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_show(&config),
    }
}
