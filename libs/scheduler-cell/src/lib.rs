pub mod error;
pub mod models;
pub mod services;

pub use error::SchedulerError;
pub use models::*;
pub use services::*;
