use tracing::{info, instrument, warn};
use uuid::Uuid;

use notification_cell::{Notification, NotificationSeverity};
use shared_models::auth::Actor;
use shared_models::error::AppError;
use wallet_cell::{LedgerCategory, LedgerEntry};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AppointmentView, CancellationRecord, PaymentStatus,
    RefundBreakdown,
};
use crate::services::lifecycle::{ensure_transition, LifecycleAction};
use crate::services::orchestrator::{ensure_party, AppointmentService};
use crate::services::pricing::{full_refund, patient_cancellation_refund};
use crate::services::unit_of_work::UnitOfWork;

impl AppointmentService {
    /// Cancel a non-terminal appointment. A paid appointment is refunded:
    /// partially when the patient cancels, in full when the doctor or an
    /// administrator does.
    #[instrument(skip(self, actor, reason))]
    pub async fn cancel_appointment(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        reason: Option<String>,
    ) -> Result<AppointmentView, AppError> {
        let mut uow = self.begin().await;
        let result = self.cancel_inner(&mut uow, actor, appointment_id, reason).await;
        self.finish(uow, result).await
    }

    async fn cancel_inner(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        appointment_id: Uuid,
        reason: Option<String>,
    ) -> Result<AppointmentView, AppError> {
        let mut appointment = self.load(uow.tx(), appointment_id)?;
        ensure_party(actor, &appointment)?;
        ensure_transition(appointment.status, LifecycleAction::Cancel)?;

        let by_patient = actor.is_patient();
        let mut refund = None;

        if appointment.payment_status == PaymentStatus::Paid {
            let breakdown = if by_patient {
                patient_cancellation_refund(
                    appointment.consultation_fee,
                    appointment.admin_commission,
                    appointment.doctor_earnings,
                    &self.config.cancellation,
                )
            } else {
                full_refund(
                    appointment.consultation_fee,
                    appointment.admin_commission,
                    appointment.doctor_earnings,
                )
            };
            // Only doctor/admin cancellations pre-check the doctor's balance.
            self.apply_refund(uow, &appointment, breakdown, !by_patient).await?;
            appointment.payment_status = PaymentStatus::Refunded;
            refund = Some(breakdown);
        }

        self.release_held_slots(uow, &mut appointment)?;
        appointment.status = AppointmentStatus::Cancelled;
        appointment.checkout_lock_until = None;
        appointment.cancellation = Some(CancellationRecord {
            cancelled_by: actor.role,
            actor_id: actor.id,
            reason: reason.clone(),
            refund,
            cancelled_at: self.now(),
        });
        self.save(uow, &mut appointment)?;

        let mut message = format!(
            "Appointment {} on {} at {} was cancelled",
            appointment.appointment_code, appointment.date, appointment.time_range
        );
        if let Some(reason) = &reason {
            message.push_str(&format!(": {}", reason));
        }
        let counterparty = if by_patient {
            appointment.doctor_id
        } else {
            appointment.patient_id
        };
        uow.outbox().notify(
            counterparty,
            Notification::new("Appointment cancelled", message, NotificationSeverity::Warning, Some(appointment.id)),
        );
        if let Some(refund) = refund {
            uow.outbox().notify(
                appointment.patient_id,
                Notification::new(
                    "Refund issued",
                    format!("{:.2} has been refunded to your wallet", refund.patient_refund),
                    NotificationSeverity::Success,
                    Some(appointment.id),
                ),
            );
        }

        info!(
            "Appointment {} cancelled by {} ({})",
            appointment.appointment_code, actor.role, actor.id
        );
        self.view(uow.tx(), &appointment)
    }

    /// Move refund money through the ledger inside the unit of work. With
    /// `check_doctor_balance`, a doctor who cannot cover the reversal stops
    /// the whole operation before any ledger call is made.
    pub(crate) async fn apply_refund(
        &self,
        uow: &mut UnitOfWork,
        appointment: &Appointment,
        breakdown: RefundBreakdown,
        check_doctor_balance: bool,
    ) -> Result<(), AppError> {
        if check_doctor_balance && breakdown.doctor_reversal > 0.0 {
            let balance = uow.balance(appointment.doctor_id).await?;
            if balance + f64::EPSILON < breakdown.doctor_reversal {
                warn!(
                    "Doctor {} cannot cover reversal for {}: balance {:.2}",
                    appointment.doctor_id, appointment.appointment_code, balance
                );
                return Err(AppointmentError::InsufficientDoctorBalance {
                    balance,
                    required: breakdown.doctor_reversal,
                }
                .into());
            }
        }

        let memo = format!("Refund for appointment {}", appointment.appointment_code);
        move_funds(
            uow,
            appointment.doctor_id,
            breakdown.doctor_reversal,
            &memo,
            appointment.id,
            LedgerCategory::EarningReversal,
        )
        .await?;
        move_funds(
            uow,
            self.config.platform_account_id,
            breakdown.platform_reversal,
            &memo,
            appointment.id,
            LedgerCategory::CommissionReversal,
        )
        .await?;
        if breakdown.patient_refund > 0.0 {
            uow.credit(LedgerEntry::new(
                appointment.patient_id,
                breakdown.patient_refund,
                memo,
                Some(appointment.id),
                LedgerCategory::Refund,
            ))
            .await?;
        }

        Ok(())
    }
}

/// Debit a positive reversal, credit a negative one.
async fn move_funds(
    uow: &mut UnitOfWork,
    user_id: Uuid,
    reversal: f64,
    memo: &str,
    appointment_id: Uuid,
    category: LedgerCategory,
) -> Result<(), AppError> {
    if reversal > 0.0 {
        uow.debit(LedgerEntry::new(user_id, reversal, memo, Some(appointment_id), category))
            .await?;
    } else if reversal < 0.0 {
        uow.credit(LedgerEntry::new(user_id, -reversal, memo, Some(appointment_id), category))
            .await?;
    }
    Ok(())
}
