pub mod error;
pub mod models;
pub mod services;

pub use error::LedgerError;
pub use models::*;
pub use services::ledger::{InMemoryLedger, LedgerService};
