pub mod models;
pub mod repository;
pub mod services;

pub use models::*;
pub use repository::PatientRepository;
pub use services::*;
