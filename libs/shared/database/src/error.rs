use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Document {id} not found in {collection}")]
    NotFound { collection: String, id: String },

    #[error("Document {id} already exists in {collection}")]
    DuplicateKey { collection: String, id: String },

    #[error("Unique constraint on {collection}.{field} violated by value {value}")]
    UniqueViolation {
        collection: String,
        field: String,
        value: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { .. } => AppError::NotFound(err.to_string()),
            other => AppError::Database(other.to_string()),
        }
    }
}
