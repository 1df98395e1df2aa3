use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use appointment_cell::AppointmentService;
use notification_cell::{ChatCollaborator, NotificationSink};
use shared_database::DocumentStore;
use shared_models::error::AppError;
use shared_utils::clock::Clock;
use shared_utils::time::OperatingTimezone;

use crate::models::TickReport;

/// A periodic background job. Each tick scans the stores and handles every
/// candidate appointment in its own transaction.
#[async_trait]
pub trait DaemonTask: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn period(&self) -> Duration;

    async fn tick(&self) -> Result<TickReport, AppError>;
}

/// What the daemons share with the orchestrator: the stores and the
/// outbound collaborators. Nothing here is daemon-private state.
#[derive(Clone)]
pub struct DaemonContext {
    pub store: DocumentStore,
    pub appointments: Arc<AppointmentService>,
    pub notifier: Arc<dyn NotificationSink>,
    pub chat: Arc<dyn ChatCollaborator>,
    pub clock: Arc<dyn Clock>,
    pub timezone: OperatingTimezone,
}
