use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        AppError::ExternalService(err.to_string())
    }
}
