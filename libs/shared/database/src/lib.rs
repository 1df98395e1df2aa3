pub mod document;
pub mod error;

pub use document::{DocumentStore, Transaction};
pub use error::DatabaseError;
