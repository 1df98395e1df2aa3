use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Insufficient balance for {user_id}: balance {balance:.2}, requested {requested:.2}")]
    InsufficientFunds {
        user_id: Uuid,
        balance: f64,
        requested: f64,
    },

    #[error("Invalid ledger amount: {0}")]
    InvalidAmount(f64),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds { .. } | LedgerError::InvalidAmount(_) => {
                AppError::BadRequest(err.to_string())
            }
            LedgerError::Unavailable(_) => AppError::ExternalService(err.to_string()),
        }
    }
}
