pub mod event;
pub mod gateway;
pub mod transaction;

pub use event::TransactionEvent;
pub use gateway::{Country, Gateway};
pub use transaction::{
    NewTransaction, StatusUpdate, Transaction, TransactionRequest, TransactionStatus,
    TransactionType, WebhookEvent,
};
