pub mod auth;
pub mod error;
pub mod reference;

pub use auth::{Actor, UserRole};
pub use error::AppError;
pub use reference::{Identified, Ref};
