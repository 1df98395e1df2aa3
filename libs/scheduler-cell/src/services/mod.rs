pub mod cleanup;
pub mod daemon;
pub mod reminders;
pub mod session_timer;
pub mod supervisor;

pub use cleanup::CleanupDaemon;
pub use daemon::{DaemonContext, DaemonTask};
pub use reminders::{due_reminder, ReminderDaemon, ReminderKind};
pub use session_timer::SessionTimerDaemon;
pub use supervisor::{DaemonHandle, DaemonSupervisor, SupervisorHandle};
