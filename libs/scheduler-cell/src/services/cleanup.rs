use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use appointment_cell::{Appointment, AppointmentRepository, AppointmentStatus, PaymentStatus};
use doctor_cell::services::SlotAllocator;
use shared_models::error::AppError;

use crate::models::TickReport;
use crate::services::daemon::{DaemonContext, DaemonTask};

/// Deletes bookings abandoned before payment and frees their slots.
pub struct CleanupDaemon {
    ctx: DaemonContext,
    period: Duration,
    grace: chrono::Duration,
}

fn is_abandoned(appointment: &Appointment, cutoff: DateTime<Utc>) -> bool {
    appointment.status == AppointmentStatus::Pending
        && appointment.payment_status == PaymentStatus::Pending
        && appointment.created_at < cutoff
}

impl CleanupDaemon {
    pub fn new(ctx: DaemonContext, period: Duration, grace: chrono::Duration) -> Self {
        Self { ctx, period, grace }
    }

    async fn abandoned(&self, cutoff: DateTime<Utc>) -> Result<Vec<Appointment>, AppError> {
        let tx = self.ctx.store.begin().await;
        let appointments = AppointmentRepository::find(&tx, |a| is_abandoned(a, cutoff))?;
        Ok(appointments)
    }

    async fn reclaim(&self, candidate: &Appointment, cutoff: DateTime<Utc>) -> Result<bool, AppError> {
        let mut tx = self.ctx.store.begin().await;
        let Some(appointment) = AppointmentRepository::get(&tx, candidate.id)? else {
            return Ok(false);
        };
        if !is_abandoned(&appointment, cutoff) {
            return Ok(false);
        }

        if let Some(slot_id) = appointment.slot_id.as_deref() {
            SlotAllocator::release(
                &mut tx,
                appointment.doctor_id,
                appointment.date,
                appointment.time_range,
                Some(slot_id),
            )?;
        }
        AppointmentRepository::delete(&mut tx, appointment.id)?;
        tx.commit();

        info!(
            "Removed abandoned appointment {} created at {}",
            appointment.appointment_code, appointment.created_at
        );
        Ok(true)
    }
}

#[async_trait]
impl DaemonTask for CleanupDaemon {
    fn name(&self) -> &'static str {
        "pending-cleanup"
    }

    fn period(&self) -> Duration {
        self.period
    }

    #[instrument(skip(self))]
    async fn tick(&self) -> Result<TickReport, AppError> {
        let cutoff = self.ctx.clock.now() - self.grace;
        let appointments = self.abandoned(cutoff).await?;
        debug!("{} abandoned bookings older than {}", appointments.len(), cutoff);

        let mut report = TickReport::default();
        for appointment in &appointments {
            let outcome = self.reclaim(appointment, cutoff).await;
            report.record(self.name(), &appointment.appointment_code, outcome);
        }
        Ok(report)
    }
}
