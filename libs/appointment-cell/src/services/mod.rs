pub mod booking;
pub mod cancellation;
pub mod lifecycle;
pub mod mapping;
pub mod orchestrator;
pub mod pricing;
pub mod reschedule;
pub mod session;
pub mod unit_of_work;
pub mod validation;

pub use lifecycle::{ensure_transition, session_transition_allowed, LifecycleAction};
pub use mapping::to_view;
pub use orchestrator::{AppointmentService, Collaborators};
pub use session::{queue_session_fanout, session_notice, SESSION_STATUS_EVENT};
pub use unit_of_work::{Outbox, SideEffect, UnitOfWork};
