pub mod circuit_breaker;
pub mod consumer_loop;
pub mod gateway_selector;
pub mod orchestrator;
pub mod publisher;
pub mod retry;

pub use circuit_breaker::{BreakerConfig, BreakerState, PublishBreaker};
pub use gateway_selector::GatewaySelector;
pub use orchestrator::TransactionOrchestrator;
pub use publisher::{PublishError, TransactionEventPublisher};
pub use retry::RetryPolicy;
