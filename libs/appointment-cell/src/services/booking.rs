// libs/appointment-cell/src/services/booking.rs
use chrono::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::repository::{DoctorRepository, ScheduleRepository};
use doctor_cell::services::SlotAllocator;
use notification_cell::{Notification, NotificationSeverity};
use patient_cell::repository::PatientRepository;
use shared_models::auth::Actor;
use shared_models::error::AppError;
use shared_utils::codes::appointment_code;
use wallet_cell::{LedgerCategory, LedgerEntry};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AppointmentView, BookAppointmentRequest,
    CancellationRecord, PaymentMethod, PaymentRecord, PaymentStatus, PostConsultationChat,
    SessionState,
};
use crate::repository::AppointmentRepository;
use crate::services::mapping::to_view;
use crate::services::orchestrator::{ensure_party, AppointmentService};
use crate::services::pricing::split_fee;
use crate::services::unit_of_work::UnitOfWork;
use crate::services::validation::{resolve_slot, validate_date_not_past, validate_reason};

impl AppointmentService {
    /// Book an appointment for a patient.
    ///
    /// When the requested slot is already held by this patient's own unpaid
    /// booking and no checkout is in progress, that booking is reused with
    /// refreshed terms instead of creating a duplicate.
    #[instrument(skip(self, actor, request), fields(doctor_id = %request.doctor_id))]
    pub async fn create_appointment(
        &self,
        actor: &Actor,
        patient_id: Uuid,
        request: BookAppointmentRequest,
    ) -> Result<AppointmentView, AppError> {
        if !(actor.is_privileged() || (actor.is_patient() && actor.id == patient_id)) {
            return Err(AppointmentError::Unauthorized("patients can only book for themselves".to_string()).into());
        }

        let mut uow = self.begin().await;
        let result = self.create_appointment_inner(&mut uow, patient_id, request).await;
        self.finish(uow, result).await
    }

    async fn create_appointment_inner(
        &self,
        uow: &mut UnitOfWork,
        patient_id: Uuid,
        request: BookAppointmentRequest,
    ) -> Result<AppointmentView, AppError> {
        debug!("Booking {} consultation for patient {}", request.consultation_type, patient_id);

        validate_reason(request.reason.as_deref())?;
        validate_date_not_past(request.date, self.today())?;

        let doctor = DoctorRepository::get(uow.tx(), request.doctor_id)?
            .ok_or(AppointmentError::DoctorNotFound(request.doctor_id))?;
        let patient = PatientRepository::get(uow.tx(), patient_id)?
            .ok_or(AppointmentError::PatientNotFound(patient_id))?;

        if !doctor.is_active {
            return Err(AppointmentError::DoctorInactive.into());
        }
        let fee = doctor
            .fee_for(request.consultation_type)
            .ok_or(AppointmentError::FeeNotConfigured(request.consultation_type))?;
        let split = split_fee(fee, &self.config.commission);
        let now = self.now();
        let lock_until = now + Duration::seconds(self.config.booking.checkout_lock_ttl_seconds);

        if let Some(slot_id) = request.slot_id.as_deref() {
            let schedule = ScheduleRepository::get(uow.tx(), doctor.id)?.ok_or_else(|| {
                AppointmentError::SlotNotAvailable("doctor has no schedule".to_string())
            })?;
            let slot = resolve_slot(&schedule, slot_id, request.date, request.time_range)?;

            if slot.is_booked {
                let reusable = AppointmentRepository::find_reusable(
                    uow.tx(),
                    patient_id,
                    doctor.id,
                    slot_id,
                    request.date,
                    self.config.booking.reuse_window_hours,
                    self.timezone,
                )?;

                let Some(mut existing) = reusable else {
                    return Err(AppointmentError::SlotNotAvailable(format!("slot {} is already booked", slot_id)).into());
                };
                if existing.has_live_checkout_lock(now) {
                    warn!("Checkout already in progress for {}", existing.appointment_code);
                    return Err(AppointmentError::CheckoutInProgress.into());
                }

                existing.consultation_type = request.consultation_type;
                existing.consultation_fee = split.consultation_fee;
                existing.admin_commission = split.admin_commission;
                existing.doctor_earnings = split.doctor_earnings;
                existing.date = request.date;
                existing.time_range = request.time_range;
                existing.reason = request.reason.or(existing.reason);
                existing.checkout_lock_until = Some(lock_until);
                self.save(uow, &mut existing)?;

                info!("Reusing pending appointment {}", existing.appointment_code);
                return Ok(to_view(&existing, Some(patient.summary()), Some(doctor.summary()), now));
            }

            if !SlotAllocator::try_book(uow.tx_mut(), doctor.id, slot_id)? {
                return Err(AppointmentError::SlotNotAvailable(format!("slot {} was just taken", slot_id)).into());
            }
        }

        let appointment = Appointment {
            id: Uuid::new_v4(),
            appointment_code: appointment_code(),
            patient_id,
            doctor_id: doctor.id,
            consultation_type: request.consultation_type,
            date: request.date,
            time_range: request.time_range,
            slot_id: request.slot_id,
            reason: request.reason,
            status: AppointmentStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment: None,
            consultation_fee: split.consultation_fee,
            admin_commission: split.admin_commission,
            doctor_earnings: split.doctor_earnings,
            checkout_lock_until: Some(lock_until),
            reschedule_count: 0,
            reschedule_request: None,
            session: SessionState::default(),
            tests_needed: false,
            post_consultation_chat: PostConsultationChat::default(),
            notes: Vec::new(),
            cancellation: None,
            rejection_reason: None,
            reminder_sent: false,
            ready_reminder_sent: false,
            created_at: now,
            updated_at: now,
        };
        AppointmentRepository::insert(uow.tx_mut(), &appointment)?;

        uow.outbox().notify(
            doctor.id,
            Notification::new(
                "New appointment request",
                format!(
                    "{} booked a {} consultation on {} at {}",
                    patient.full_name(),
                    appointment.consultation_type,
                    appointment.date,
                    appointment.time_range
                ),
                NotificationSeverity::Info,
                Some(appointment.id),
            ),
        );

        info!(
            "Appointment {} created for patient {} with doctor {}",
            appointment.appointment_code, patient_id, doctor.id
        );
        Ok(to_view(&appointment, Some(patient.summary()), Some(doctor.summary()), now))
    }

    /// Issue a fresh checkout lock before a payment attempt.
    pub async fn begin_checkout(&self, actor: &Actor, appointment_id: Uuid) -> Result<AppointmentView, AppError> {
        let mut uow = self.begin().await;
        let result = self.begin_checkout_inner(&mut uow, actor, appointment_id);
        self.finish(uow, result).await
    }

    fn begin_checkout_inner(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        appointment_id: Uuid,
    ) -> Result<AppointmentView, AppError> {
        let mut appointment = self.load(uow.tx(), appointment_id)?;
        ensure_party(actor, &appointment)?;
        ensure_unpaid_pending(&appointment, "check out")?;

        let now = self.now();
        if appointment.has_live_checkout_lock(now) {
            return Err(AppointmentError::CheckoutInProgress.into());
        }
        appointment.checkout_lock_until =
            Some(now + Duration::seconds(self.config.booking.checkout_lock_ttl_seconds));
        self.save(uow, &mut appointment)?;

        debug!("Checkout lock issued for {}", appointment.appointment_code);
        self.view(uow.tx(), &appointment)
    }

    /// Settle a pending booking. The wallet method debits the patient; the
    /// doctor's earnings and the platform commission are credited either way.
    #[instrument(skip(self, actor, reference))]
    pub async fn record_payment(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        method: PaymentMethod,
        reference: Option<String>,
    ) -> Result<AppointmentView, AppError> {
        let mut uow = self.begin().await;
        let result = self
            .record_payment_inner(&mut uow, actor, appointment_id, method, reference)
            .await;
        self.finish(uow, result).await
    }

    async fn record_payment_inner(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        appointment_id: Uuid,
        method: PaymentMethod,
        reference: Option<String>,
    ) -> Result<AppointmentView, AppError> {
        let mut appointment = self.load(uow.tx(), appointment_id)?;
        ensure_party(actor, &appointment)?;
        ensure_unpaid_pending(&appointment, "pay for")?;

        let memo = format!("Consultation {}", appointment.appointment_code);
        if method == PaymentMethod::Wallet {
            uow.debit(LedgerEntry::new(
                appointment.patient_id,
                appointment.consultation_fee,
                memo.clone(),
                Some(appointment.id),
                LedgerCategory::ConsultationPayment,
            ))
            .await?;
        }
        if appointment.doctor_earnings > 0.0 {
            uow.credit(LedgerEntry::new(
                appointment.doctor_id,
                appointment.doctor_earnings,
                memo.clone(),
                Some(appointment.id),
                LedgerCategory::DoctorEarning,
            ))
            .await?;
        }
        if appointment.admin_commission > 0.0 {
            uow.credit(LedgerEntry::new(
                self.config.platform_account_id,
                appointment.admin_commission,
                memo,
                Some(appointment.id),
                LedgerCategory::PlatformCommission,
            ))
            .await?;
        }

        let now = self.now();
        appointment.payment_status = PaymentStatus::Paid;
        appointment.payment = Some(PaymentRecord {
            method,
            reference,
            paid_at: now,
        });
        appointment.checkout_lock_until = None;
        self.save(uow, &mut appointment)?;

        uow.outbox().notify(
            appointment.doctor_id,
            Notification::new(
                "Appointment paid",
                format!("Appointment {} is paid and awaiting your approval", appointment.appointment_code),
                NotificationSeverity::Info,
                Some(appointment.id),
            ),
        );
        uow.outbox().notify(
            appointment.patient_id,
            Notification::new(
                "Payment received",
                format!("Payment of {:.2} received for {}", appointment.consultation_fee, appointment.appointment_code),
                NotificationSeverity::Success,
                Some(appointment.id),
            ),
        );

        info!("Payment recorded for {} via {:?}", appointment.appointment_code, method);
        self.view(uow.tx(), &appointment)
    }

    /// A failed payment cancels the booking and frees its slot.
    pub async fn record_payment_failure(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        reason: Option<String>,
    ) -> Result<AppointmentView, AppError> {
        let mut uow = self.begin().await;
        let result = self.record_payment_failure_inner(&mut uow, actor, appointment_id, reason);
        self.finish(uow, result).await
    }

    fn record_payment_failure_inner(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        appointment_id: Uuid,
        reason: Option<String>,
    ) -> Result<AppointmentView, AppError> {
        let mut appointment = self.load(uow.tx(), appointment_id)?;
        ensure_party(actor, &appointment)?;
        ensure_unpaid_pending(&appointment, "fail payment of")?;

        self.release_slot(uow.tx_mut(), &appointment)?;

        appointment.payment_status = PaymentStatus::Failed;
        appointment.status = AppointmentStatus::Cancelled;
        appointment.checkout_lock_until = None;
        appointment.cancellation = Some(CancellationRecord {
            cancelled_by: actor.role,
            actor_id: actor.id,
            reason: reason.or_else(|| Some("Payment failed".to_string())),
            refund: None,
            cancelled_at: self.now(),
        });
        self.save(uow, &mut appointment)?;

        uow.outbox().notify(
            appointment.patient_id,
            Notification::new(
                "Payment failed",
                format!("Payment for {} failed; the booking was released", appointment.appointment_code),
                NotificationSeverity::Error,
                Some(appointment.id),
            ),
        );

        warn!("Payment failed for {}", appointment.appointment_code);
        self.view(uow.tx(), &appointment)
    }
}

fn ensure_unpaid_pending(appointment: &Appointment, action: &'static str) -> Result<(), AppError> {
    if appointment.status != AppointmentStatus::Pending {
        return Err(AppointmentError::InvalidStatusTransition {
            status: appointment.status,
            action,
        }
        .into());
    }
    if appointment.payment_status != PaymentStatus::Pending {
        return Err(AppointmentError::ValidationError(format!(
            "Payment is already {}",
            appointment.payment_status
        ))
        .into());
    }
    Ok(())
}
