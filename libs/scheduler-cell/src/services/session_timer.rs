use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use appointment_cell::{Appointment, AppointmentRepository, AppointmentStatus, SessionStatus};
use shared_models::auth::Actor;
use shared_models::error::AppError;

use crate::models::TickReport;
use crate::services::daemon::{DaemonContext, DaemonTask};

/// Moves overdue `ACTIVE` sessions to `WAITING_FOR_DOCTOR`. A session the
/// doctor has extended is never expired automatically.
pub struct SessionTimerDaemon {
    ctx: DaemonContext,
    period: Duration,
}

impl SessionTimerDaemon {
    pub fn new(ctx: DaemonContext, period: Duration) -> Self {
        Self { ctx, period }
    }

    async fn running_sessions(&self) -> Result<Vec<Appointment>, AppError> {
        let tx = self.ctx.store.begin().await;
        let sessions = AppointmentRepository::find(&tx, |a| {
            a.status == AppointmentStatus::Confirmed
                && matches!(
                    a.session.status,
                    Some(SessionStatus::Active) | Some(SessionStatus::ContinuedByDoctor)
                )
        })?;
        Ok(sessions)
    }

    async fn expire(&self, appointment: &Appointment, now: DateTime<Utc>) -> Result<bool, AppError> {
        if appointment.session.status != Some(SessionStatus::Active) {
            return Ok(false);
        }
        let ends_at = self.ctx.timezone.instant(appointment.date, appointment.time_range.end());
        if now <= ends_at {
            return Ok(false);
        }

        self.ctx
            .appointments
            .update_session_status(&Actor::system(), appointment.id, SessionStatus::WaitingForDoctor)
            .await?;
        info!(
            "Session of {} ran past {}; waiting for doctor",
            appointment.appointment_code, ends_at
        );
        Ok(true)
    }
}

#[async_trait]
impl DaemonTask for SessionTimerDaemon {
    fn name(&self) -> &'static str {
        "session-timer"
    }

    fn period(&self) -> Duration {
        self.period
    }

    #[instrument(skip(self))]
    async fn tick(&self) -> Result<TickReport, AppError> {
        let now = self.ctx.clock.now();
        let sessions = self.running_sessions().await?;
        debug!("{} running sessions to check", sessions.len());

        let mut report = TickReport::default();
        for appointment in &sessions {
            let outcome = self.expire(appointment, now).await;
            report.record(self.name(), &appointment.appointment_code, outcome);
        }
        Ok(report)
    }
}
