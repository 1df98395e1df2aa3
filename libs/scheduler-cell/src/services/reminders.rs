use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use appointment_cell::{Appointment, AppointmentRepository, AppointmentStatus, Outbox};
use notification_cell::{Notification, NotificationSeverity};
use shared_models::error::AppError;

use crate::models::TickReport;
use crate::services::daemon::{DaemonContext, DaemonTask};

/// Minutes before start at which the "starting soon" alert fires: `(4, 6]`.
pub const STARTING_SOON_WINDOW: (f64, f64) = (4.0, 6.0);
/// Minutes before start at which the "ready now" alert fires: `[-2, 0]`.
pub const READY_NOW_WINDOW: (f64, f64) = (-2.0, 0.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderKind {
    StartingSoon,
    ReadyNow,
}

impl ReminderKind {
    fn title(self) -> &'static str {
        match self {
            ReminderKind::StartingSoon => "Consultation starting soon",
            ReminderKind::ReadyNow => "Consultation ready",
        }
    }

    fn message(self, appointment: &Appointment) -> String {
        match self {
            ReminderKind::StartingSoon => format!(
                "Your {} consultation {} starts in about 5 minutes",
                appointment.consultation_type, appointment.appointment_code
            ),
            ReminderKind::ReadyNow => format!(
                "Your {} consultation {} is starting now",
                appointment.consultation_type, appointment.appointment_code
            ),
        }
    }

    fn mark_sent(self, appointment: &mut Appointment) {
        match self {
            ReminderKind::StartingSoon => appointment.reminder_sent = true,
            ReminderKind::ReadyNow => appointment.ready_reminder_sent = true,
        }
    }
}

/// The reminder owed at `minutes_until_start`, if any. Both flags are sticky.
pub fn due_reminder(minutes_until_start: f64, reminder_sent: bool, ready_sent: bool) -> Option<ReminderKind> {
    let (soon_after, soon_until) = STARTING_SOON_WINDOW;
    let (ready_from, ready_until) = READY_NOW_WINDOW;

    if !reminder_sent && minutes_until_start > soon_after && minutes_until_start <= soon_until {
        Some(ReminderKind::StartingSoon)
    } else if !ready_sent && minutes_until_start >= ready_from && minutes_until_start <= ready_until {
        Some(ReminderKind::ReadyNow)
    } else {
        None
    }
}

/// Alerts both parties shortly before and at the start of today's
/// confirmed consultations.
pub struct ReminderDaemon {
    ctx: DaemonContext,
    period: Duration,
}

impl ReminderDaemon {
    pub fn new(ctx: DaemonContext, period: Duration) -> Self {
        Self { ctx, period }
    }

    async fn todays_confirmed(&self, now: DateTime<Utc>) -> Result<Vec<Appointment>, AppError> {
        let today = self.ctx.timezone.today(now);
        let tx = self.ctx.store.begin().await;
        let appointments = AppointmentRepository::find(&tx, |a| {
            a.status == AppointmentStatus::Confirmed
                && a.date == today
                && !(a.reminder_sent && a.ready_reminder_sent)
        })?;
        Ok(appointments)
    }

    async fn remind(&self, candidate: &Appointment, now: DateTime<Utc>) -> Result<bool, AppError> {
        let starts_at = self.ctx.timezone.instant(candidate.date, candidate.time_range.start());
        let minutes_until_start = (starts_at - now).num_seconds() as f64 / 60.0;
        let Some(kind) = due_reminder(
            minutes_until_start,
            candidate.reminder_sent,
            candidate.ready_reminder_sent,
        ) else {
            return Ok(false);
        };

        let mut tx = self.ctx.store.begin().await;
        let Some(mut appointment) = AppointmentRepository::get(&tx, candidate.id)? else {
            return Ok(false);
        };
        // Re-checked under the transaction so an overlapping tick cannot send twice.
        if appointment.status != AppointmentStatus::Confirmed
            || due_reminder(
                minutes_until_start,
                appointment.reminder_sent,
                appointment.ready_reminder_sent,
            ) != Some(kind)
        {
            return Ok(false);
        }

        kind.mark_sent(&mut appointment);
        appointment.updated_at = now;
        AppointmentRepository::replace(&mut tx, &appointment)?;

        let mut outbox = Outbox::new();
        for user_id in [appointment.patient_id, appointment.doctor_id] {
            outbox.notify(
                user_id,
                Notification::new(
                    kind.title(),
                    kind.message(&appointment),
                    NotificationSeverity::Info,
                    Some(appointment.id),
                ),
            );
        }
        tx.commit();
        outbox.dispatch(self.ctx.notifier.as_ref(), self.ctx.chat.as_ref()).await;

        info!("Sent {:?} reminder for {}", kind, appointment.appointment_code);
        Ok(true)
    }
}

#[async_trait]
impl DaemonTask for ReminderDaemon {
    fn name(&self) -> &'static str {
        "reminders"
    }

    fn period(&self) -> Duration {
        self.period
    }

    #[instrument(skip(self))]
    async fn tick(&self) -> Result<TickReport, AppError> {
        let now = self.ctx.clock.now();
        let appointments = self.todays_confirmed(now).await?;
        debug!("{} confirmed appointments today awaiting reminders", appointments.len());

        let mut report = TickReport::default();
        for appointment in &appointments {
            let outcome = self.remind(appointment, now).await;
            report.record(self.name(), &appointment.appointment_code, outcome);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starting_soon_window_is_open_below_and_closed_above() {
        assert_eq!(due_reminder(6.0, false, false), Some(ReminderKind::StartingSoon));
        assert_eq!(due_reminder(5.0, false, false), Some(ReminderKind::StartingSoon));
        assert_eq!(due_reminder(4.0, false, false), None);
        assert_eq!(due_reminder(6.5, false, false), None);
    }

    #[test]
    fn test_ready_window_is_closed_on_both_ends() {
        assert_eq!(due_reminder(0.0, true, false), Some(ReminderKind::ReadyNow));
        assert_eq!(due_reminder(-2.0, true, false), Some(ReminderKind::ReadyNow));
        assert_eq!(due_reminder(-2.5, true, false), None);
        assert_eq!(due_reminder(1.0, true, false), None);
    }

    #[test]
    fn test_flags_are_sticky() {
        assert_eq!(due_reminder(5.0, true, false), None);
        assert_eq!(due_reminder(-1.0, true, true), None);
        assert_eq!(due_reminder(-1.0, false, false), Some(ReminderKind::ReadyNow));
    }
}
