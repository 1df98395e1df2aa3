use tracing::{debug, info, instrument};
use uuid::Uuid;

use doctor_cell::repository::ScheduleRepository;
use doctor_cell::services::SlotAllocator;
use notification_cell::{Notification, NotificationSeverity};
use shared_models::auth::Actor;
use shared_models::error::AppError;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AppointmentView, PaymentStatus, ProposeRescheduleRequest,
    RescheduleRequest,
};
use crate::services::lifecycle::{ensure_transition, LifecycleAction};
use crate::services::orchestrator::{ensure_party, ensure_patient_side, is_patient_of, AppointmentService};
use crate::services::unit_of_work::UnitOfWork;
use crate::services::validation::{resolve_slot, validate_date_not_past, validate_reason};

impl AppointmentService {
    /// Propose a new date, time and optional slot.
    ///
    /// A patient's reschedule applies at once and sends the booking back to
    /// `pending` for re-approval; it counts against the reschedule cap. A
    /// doctor's proposal holds the new slot and waits for the patient.
    #[instrument(skip(self, actor, request))]
    pub async fn propose_reschedule(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        request: ProposeRescheduleRequest,
    ) -> Result<AppointmentView, AppError> {
        let mut uow = self.begin().await;
        let result = self.propose_reschedule_inner(&mut uow, actor, appointment_id, request);
        self.finish(uow, result).await
    }

    fn propose_reschedule_inner(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        appointment_id: Uuid,
        request: ProposeRescheduleRequest,
    ) -> Result<AppointmentView, AppError> {
        let mut appointment = self.load(uow.tx(), appointment_id)?;
        ensure_party(actor, &appointment)?;
        ensure_transition(appointment.status, LifecycleAction::ProposeReschedule)?;

        let max = self.config.booking.max_reschedule;
        if appointment.reschedule_count >= max {
            return Err(AppointmentError::RescheduleLimitReached(max).into());
        }
        validate_reason(request.reason.as_deref())?;
        validate_date_not_past(request.date, self.today())?;

        if let Some(slot_id) = request.slot_id.as_deref() {
            let schedule = ScheduleRepository::get(uow.tx(), appointment.doctor_id)?.ok_or_else(|| {
                AppointmentError::SlotNotAvailable("doctor has no schedule".to_string())
            })?;
            resolve_slot(&schedule, slot_id, request.date, request.time_range)?;
        }

        // A newer proposal replaces the outstanding one and frees what it held.
        self.release_proposed_slot(uow, &mut appointment)?;
        self.hold_slot(uow, &appointment, request.slot_id.as_deref())?;

        let now = self.now();
        if is_patient_of(actor, &appointment) {
            if request.slot_id != appointment.slot_id {
                self.release_slot(uow.tx_mut(), &appointment)?;
            }
            appointment.date = request.date;
            appointment.time_range = request.time_range;
            appointment.slot_id = request.slot_id;
            appointment.reschedule_count += 1;
            appointment.status = AppointmentStatus::Pending;
            appointment.reminder_sent = false;
            appointment.ready_reminder_sent = false;
            self.save(uow, &mut appointment)?;

            uow.outbox().notify(
                appointment.doctor_id,
                Notification::new(
                    "Appointment rescheduled",
                    format!(
                        "Appointment {} moved to {} at {} and awaits your approval",
                        appointment.appointment_code, appointment.date, appointment.time_range
                    ),
                    NotificationSeverity::Info,
                    Some(appointment.id),
                ),
            );
            info!(
                "Patient rescheduled {} ({} of {})",
                appointment.appointment_code, appointment.reschedule_count, max
            );
        } else {
            appointment.reschedule_request = Some(RescheduleRequest {
                proposed_date: request.date,
                proposed_time_range: request.time_range,
                proposed_slot_id: request.slot_id,
                requested_by: actor.role,
                requested_at: now,
                reason: request.reason,
            });
            appointment.status = AppointmentStatus::RescheduleRequested;
            self.save(uow, &mut appointment)?;

            uow.outbox().notify(
                appointment.patient_id,
                Notification::new(
                    "Reschedule requested",
                    format!(
                        "Your doctor proposed moving {} to {} at {}",
                        appointment.appointment_code, request.date, request.time_range
                    ),
                    NotificationSeverity::Warning,
                    Some(appointment.id),
                ),
            );
            info!("Reschedule proposed for {}", appointment.appointment_code);
        }

        self.view(uow.tx(), &appointment)
    }

    /// Patient accepts the doctor's proposal: the old slot is freed and the
    /// proposal becomes the booking. A paid booking returns to `confirmed`.
    #[instrument(skip(self, actor))]
    pub async fn accept_reschedule(&self, actor: &Actor, appointment_id: Uuid) -> Result<AppointmentView, AppError> {
        let mut uow = self.begin().await;
        let result = self.accept_reschedule_inner(&mut uow, actor, appointment_id);
        self.finish(uow, result).await
    }

    fn accept_reschedule_inner(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        appointment_id: Uuid,
    ) -> Result<AppointmentView, AppError> {
        let mut appointment = self.load(uow.tx(), appointment_id)?;
        ensure_patient_side(actor, &appointment)?;
        ensure_transition(appointment.status, LifecycleAction::AcceptReschedule)?;

        let proposal = appointment.reschedule_request.take().ok_or_else(|| {
            AppointmentError::ValidationError("no reschedule proposal is outstanding".to_string())
        })?;

        if proposal.proposed_slot_id != appointment.slot_id {
            self.release_slot(uow.tx_mut(), &appointment)?;
        }
        appointment.date = proposal.proposed_date;
        appointment.time_range = proposal.proposed_time_range;
        appointment.slot_id = proposal.proposed_slot_id;
        appointment.status = if appointment.payment_status == PaymentStatus::Paid {
            AppointmentStatus::Confirmed
        } else {
            AppointmentStatus::Pending
        };
        appointment.reminder_sent = false;
        appointment.ready_reminder_sent = false;
        self.save(uow, &mut appointment)?;

        uow.outbox().notify(
            appointment.doctor_id,
            Notification::new(
                "Reschedule accepted",
                format!(
                    "Appointment {} is now on {} at {}",
                    appointment.appointment_code, appointment.date, appointment.time_range
                ),
                NotificationSeverity::Success,
                Some(appointment.id),
            ),
        );

        info!("Reschedule accepted for {}", appointment.appointment_code);
        self.view(uow.tx(), &appointment)
    }

    /// Patient declines the doctor's proposal: only the proposed slot is
    /// released, the original booking stands and returns to `pending`.
    #[instrument(skip(self, actor))]
    pub async fn reject_reschedule(&self, actor: &Actor, appointment_id: Uuid) -> Result<AppointmentView, AppError> {
        let mut uow = self.begin().await;
        let result = self.reject_reschedule_inner(&mut uow, actor, appointment_id);
        self.finish(uow, result).await
    }

    fn reject_reschedule_inner(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        appointment_id: Uuid,
    ) -> Result<AppointmentView, AppError> {
        let mut appointment = self.load(uow.tx(), appointment_id)?;
        ensure_patient_side(actor, &appointment)?;
        ensure_transition(appointment.status, LifecycleAction::RejectReschedule)?;

        self.release_proposed_slot(uow, &mut appointment)?;
        appointment.status = AppointmentStatus::Pending;
        self.save(uow, &mut appointment)?;

        uow.outbox().notify(
            appointment.doctor_id,
            Notification::new(
                "Reschedule declined",
                format!(
                    "The patient kept {} on {} at {}",
                    appointment.appointment_code, appointment.date, appointment.time_range
                ),
                NotificationSeverity::Warning,
                Some(appointment.id),
            ),
        );

        info!("Reschedule rejected for {}", appointment.appointment_code);
        self.view(uow.tx(), &appointment)
    }

    /// Release the booked slot and any slot held by an outstanding proposal.
    pub(crate) fn release_held_slots(&self, uow: &mut UnitOfWork, appointment: &mut Appointment) -> Result<(), AppError> {
        self.release_proposed_slot(uow, appointment)?;
        self.release_slot(uow.tx_mut(), appointment)
    }

    /// Drop the outstanding proposal, freeing its slot unless the proposal
    /// reuses the slot the appointment already holds.
    fn release_proposed_slot(&self, uow: &mut UnitOfWork, appointment: &mut Appointment) -> Result<(), AppError> {
        let Some(proposal) = appointment.reschedule_request.take() else {
            return Ok(());
        };
        let Some(slot_id) = proposal.proposed_slot_id.as_deref() else {
            return Ok(());
        };
        if appointment.slot_id.as_deref() == Some(slot_id) {
            return Ok(());
        }

        SlotAllocator::release(
            uow.tx_mut(),
            appointment.doctor_id,
            proposal.proposed_date,
            proposal.proposed_time_range,
            Some(slot_id),
        )?;
        debug!("Released proposed slot {} of {}", slot_id, appointment.appointment_code);
        Ok(())
    }

    fn hold_slot(&self, uow: &mut UnitOfWork, appointment: &Appointment, slot_id: Option<&str>) -> Result<(), AppError> {
        let Some(slot_id) = slot_id else {
            return Ok(());
        };
        if appointment.slot_id.as_deref() == Some(slot_id) {
            return Ok(());
        }
        if !SlotAllocator::try_book(uow.tx_mut(), appointment.doctor_id, slot_id)? {
            return Err(AppointmentError::SlotNotAvailable(format!("slot {} is already booked", slot_id)).into());
        }
        Ok(())
    }
}
