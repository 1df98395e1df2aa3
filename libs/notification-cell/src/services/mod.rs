pub mod chat;
pub mod realtime;

pub use chat::*;
pub use realtime::*;
