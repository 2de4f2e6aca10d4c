pub mod in_memory;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod postgres_dead_letter;
pub mod postgres_gateway_repository;
pub mod postgres_transaction_repository;

pub use in_memory::{
    InMemoryDeadLetters, InMemoryGatewayRepository, InMemoryStream, InMemoryTransactionRepository,
};
pub use postgres_dead_letter::PostgresDeadLetterSink;
pub use postgres_gateway_repository::PostgresGatewayRepository;
pub use postgres_transaction_repository::PostgresTransactionRepository;
