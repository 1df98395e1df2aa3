use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("Daemon {name} terminated abnormally: {reason}")]
    DaemonFailed { name: String, reason: String },

    #[error("Daemon {0} is not registered")]
    UnknownDaemon(String),
}

impl From<SchedulerError> for AppError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::UnknownDaemon(_) => AppError::NotFound(err.to_string()),
            SchedulerError::DaemonFailed { .. } => AppError::Internal(err.to_string()),
        }
    }
}
