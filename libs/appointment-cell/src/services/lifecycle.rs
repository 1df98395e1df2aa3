// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use notification_cell::{appointment_room, Notification, NotificationSeverity};
use shared_models::auth::Actor;
use shared_models::error::AppError;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AppointmentView, PaymentStatus, SessionStatus,
};
use crate::services::orchestrator::{ensure_doctor_side, AppointmentService};
use crate::services::pricing::full_refund;
use crate::services::session::queue_session_fanout;
use crate::services::unit_of_work::UnitOfWork;

/// Caller-driven events on the appointment status machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Approve,
    Reject,
    Cancel,
    Complete,
    ProposeReschedule,
    AcceptReschedule,
    RejectReschedule,
}

impl LifecycleAction {
    pub fn label(self) -> &'static str {
        match self {
            LifecycleAction::Approve => "approve",
            LifecycleAction::Reject => "reject",
            LifecycleAction::Cancel => "cancel",
            LifecycleAction::Complete => "complete",
            LifecycleAction::ProposeReschedule => "reschedule",
            LifecycleAction::AcceptReschedule => "accept a reschedule of",
            LifecycleAction::RejectReschedule => "reject a reschedule of",
        }
    }

    /// Statuses from which this action may be taken.
    pub fn allowed_from(self) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match self {
            LifecycleAction::Approve | LifecycleAction::Reject => &[Pending],
            LifecycleAction::Cancel => &[Pending, Confirmed, Upcoming, RescheduleRequested],
            LifecycleAction::Complete => &[Confirmed, Upcoming],
            LifecycleAction::ProposeReschedule => &[Pending, Confirmed, Upcoming, RescheduleRequested],
            LifecycleAction::AcceptReschedule | LifecycleAction::RejectReschedule => &[RescheduleRequested],
        }
    }
}

/// Validate that a status transition is allowed
pub fn ensure_transition(status: AppointmentStatus, action: LifecycleAction) -> Result<(), AppointmentError> {
    if action.allowed_from().contains(&status) {
        debug!("Transition {:?} allowed from {}", action, status);
        Ok(())
    } else {
        warn!("Invalid status transition attempted: {:?} from {}", action, status);
        Err(AppointmentError::InvalidStatusTransition {
            status,
            action: action.label(),
        })
    }
}

/// Session transitions follow `ACTIVE -> WAITING_FOR_DOCTOR -> {CONTINUED_BY_DOCTOR, ENDED}`.
/// `ACTIVE` may be re-entered and may end directly. An extension returns to
/// `WAITING_FOR_DOCTOR` when its time is up, so the doctor can extend again.
pub fn session_transition_allowed(from: Option<SessionStatus>, to: SessionStatus) -> bool {
    use SessionStatus::*;
    matches!(
        (from, to),
        (None, Active)
            | (Some(Active), Active)
            | (Some(Active), WaitingForDoctor)
            | (Some(Active), Ended)
            | (Some(WaitingForDoctor), ContinuedByDoctor)
            | (Some(WaitingForDoctor), Ended)
            | (Some(ContinuedByDoctor), WaitingForDoctor)
            | (Some(ContinuedByDoctor), Ended)
    )
}

impl AppointmentService {
    /// Doctor approval of a paid booking. The slot stays booked through completion.
    #[instrument(skip(self, actor))]
    pub async fn approve_appointment(&self, actor: &Actor, appointment_id: Uuid) -> Result<AppointmentView, AppError> {
        let mut uow = self.begin().await;
        let result = self.approve_inner(&mut uow, actor, appointment_id);
        self.finish(uow, result).await
    }

    fn approve_inner(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        appointment_id: Uuid,
    ) -> Result<AppointmentView, AppError> {
        let mut appointment = self.load(uow.tx(), appointment_id)?;
        ensure_doctor_side(actor, &appointment)?;
        ensure_transition(appointment.status, LifecycleAction::Approve)?;

        if appointment.payment_status != PaymentStatus::Paid {
            return Err(AppointmentError::PaymentRequired(appointment.payment_status).into());
        }

        appointment.status = AppointmentStatus::Confirmed;
        self.save(uow, &mut appointment)?;

        uow.outbox().notify(
            appointment.patient_id,
            Notification::new(
                "Appointment confirmed",
                format!(
                    "Your appointment on {} at {} is confirmed",
                    appointment.date, appointment.time_range
                ),
                NotificationSeverity::Success,
                Some(appointment.id),
            ),
        );

        info!("Appointment {} confirmed", appointment.appointment_code);
        self.view(uow.tx(), &appointment)
    }

    /// Doctor rejection of a pending booking; a paid booking is fully refunded.
    #[instrument(skip(self, actor, reason))]
    pub async fn reject_appointment(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        reason: Option<String>,
    ) -> Result<AppointmentView, AppError> {
        let mut uow = self.begin().await;
        let result = self.reject_inner(&mut uow, actor, appointment_id, reason).await;
        self.finish(uow, result).await
    }

    async fn reject_inner(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        appointment_id: Uuid,
        reason: Option<String>,
    ) -> Result<AppointmentView, AppError> {
        let mut appointment = self.load(uow.tx(), appointment_id)?;
        ensure_doctor_side(actor, &appointment)?;
        ensure_transition(appointment.status, LifecycleAction::Reject)?;

        if appointment.payment_status == PaymentStatus::Paid {
            let breakdown = full_refund(
                appointment.consultation_fee,
                appointment.admin_commission,
                appointment.doctor_earnings,
            );
            self.apply_refund(uow, &appointment, breakdown, true).await?;
            appointment.payment_status = PaymentStatus::Refunded;
        }

        self.release_held_slots(uow, &mut appointment)?;
        appointment.status = AppointmentStatus::Rejected;
        appointment.rejection_reason = reason;
        appointment.checkout_lock_until = None;
        self.save(uow, &mut appointment)?;

        uow.outbox().notify(
            appointment.patient_id,
            Notification::new(
                "Appointment rejected",
                rejection_message(&appointment),
                NotificationSeverity::Warning,
                Some(appointment.id),
            ),
        );

        info!("Appointment {} rejected", appointment.appointment_code);
        self.view(uow.tx(), &appointment)
    }

    /// Mark a confirmed consultation complete, ending its session if one is running.
    #[instrument(skip(self, actor))]
    pub async fn complete_appointment(&self, actor: &Actor, appointment_id: Uuid) -> Result<AppointmentView, AppError> {
        let mut uow = self.begin().await;
        let result = self.complete_inner(&mut uow, actor, appointment_id);
        self.finish(uow, result).await
    }

    fn complete_inner(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        appointment_id: Uuid,
    ) -> Result<AppointmentView, AppError> {
        let mut appointment = self.load(uow.tx(), appointment_id)?;
        ensure_doctor_side(actor, &appointment)?;
        ensure_transition(appointment.status, LifecycleAction::Complete)?;

        let session_was_running = appointment.session.status.is_some();
        self.finalize_completion(uow, &mut appointment)?;
        self.save(uow, &mut appointment)?;

        if session_was_running {
            queue_session_fanout(uow.outbox(), &appointment, SessionStatus::Ended);
        } else {
            uow.outbox().broadcast(
                appointment_room(appointment.id),
                "appointment_completed",
                serde_json::json!({ "appointment_id": appointment.id }),
            );
        }
        uow.outbox().notify(
            appointment.patient_id,
            Notification::info(
                "Consultation completed",
                format!("Your consultation {} is complete", appointment.appointment_code),
                appointment.id,
            ),
        );

        info!("Appointment {} completed", appointment.appointment_code);
        self.view(uow.tx(), &appointment)
    }

    /// Shared by explicit completion and by ending the session: the session is
    /// closed, the appointment completed and its slot released.
    pub(crate) fn finalize_completion(&self, uow: &mut UnitOfWork, appointment: &mut Appointment) -> Result<(), AppError> {
        let now = self.now();
        if appointment.session.status != Some(SessionStatus::Ended) {
            appointment.session.status = Some(SessionStatus::Ended);
            appointment.session.ended_at = Some(now);
        }
        self.release_held_slots(uow, appointment)?;
        appointment.status = AppointmentStatus::Completed;
        Ok(())
    }
}

fn rejection_message(appointment: &Appointment) -> String {
    let mut message = format!(
        "Your appointment on {} at {} was rejected",
        appointment.date, appointment.time_range
    );
    if let Some(reason) = &appointment.rejection_reason {
        message.push_str(&format!(": {}", reason));
    }
    if appointment.payment_status == PaymentStatus::Refunded {
        message.push_str(". A full refund has been issued");
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses_accept_no_action() {
        let actions = [
            LifecycleAction::Approve,
            LifecycleAction::Reject,
            LifecycleAction::Cancel,
            LifecycleAction::Complete,
            LifecycleAction::ProposeReschedule,
            LifecycleAction::AcceptReschedule,
            LifecycleAction::RejectReschedule,
        ];
        for status in [
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::Rejected,
        ] {
            for action in actions {
                assert!(ensure_transition(status, action).is_err(), "{:?} from {}", action, status);
            }
        }
    }

    #[test]
    fn test_approve_only_from_pending() {
        assert!(ensure_transition(AppointmentStatus::Pending, LifecycleAction::Approve).is_ok());
        assert!(ensure_transition(AppointmentStatus::Confirmed, LifecycleAction::Approve).is_err());
        assert!(ensure_transition(AppointmentStatus::RescheduleRequested, LifecycleAction::Approve).is_err());
    }

    #[test]
    fn test_session_partial_order() {
        use SessionStatus::*;
        assert!(session_transition_allowed(None, Active));
        assert!(!session_transition_allowed(None, WaitingForDoctor));
        assert!(session_transition_allowed(Some(Active), WaitingForDoctor));
        assert!(session_transition_allowed(Some(WaitingForDoctor), ContinuedByDoctor));
        assert!(session_transition_allowed(Some(ContinuedByDoctor), WaitingForDoctor));
        assert!(!session_transition_allowed(Some(ContinuedByDoctor), ContinuedByDoctor));
        assert!(!session_transition_allowed(Some(ContinuedByDoctor), Active));
        assert!(!session_transition_allowed(Some(WaitingForDoctor), Active));
        for to in [Active, WaitingForDoctor, ContinuedByDoctor, Ended] {
            assert!(!session_transition_allowed(Some(Ended), to));
        }
    }
}
