use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use doctor_cell::models::DoctorSummary;
use doctor_cell::repository::DoctorRepository;
use patient_cell::models::PatientSummary;
use patient_cell::repository::PatientRepository;
use shared_database::Transaction;
use shared_models::auth::Actor;
use shared_models::error::AppError;
use shared_models::reference::Ref;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, AppointmentView, PostConsultationChatView};
use crate::repository::AppointmentRepository;
use crate::services::orchestrator::{ensure_party, AppointmentService};

/// Map a stored appointment to its caller-facing view. Parties are
/// resolved when their summaries are known and left as bare ids otherwise.
pub fn to_view(
    appointment: &Appointment,
    patient: Option<PatientSummary>,
    doctor: Option<DoctorSummary>,
    now: DateTime<Utc>,
) -> AppointmentView {
    AppointmentView {
        id: appointment.id,
        appointment_code: appointment.appointment_code.clone(),
        patient: Ref::from_lookup(appointment.patient_id, patient),
        doctor: Ref::from_lookup(appointment.doctor_id, doctor),
        consultation_type: appointment.consultation_type,
        date: appointment.date,
        time_range: appointment.time_range,
        slot_id: appointment.slot_id.clone(),
        reason: appointment.reason.clone(),
        status: appointment.status,
        payment_status: appointment.payment_status,
        consultation_fee: appointment.consultation_fee,
        admin_commission: appointment.admin_commission,
        doctor_earnings: appointment.doctor_earnings,
        reschedule_count: appointment.reschedule_count,
        reschedule_request: appointment.reschedule_request.clone(),
        session: appointment.session.clone(),
        tests_needed: appointment.tests_needed,
        post_consultation_chat: PostConsultationChatView {
            is_active: appointment.post_consultation_chat.is_active,
            expires_at: appointment.post_consultation_chat.expires_at,
            is_open: appointment.post_consultation_chat.is_open(now),
        },
        notes: appointment.notes.clone(),
        cancellation: appointment.cancellation.clone(),
        rejection_reason: appointment.rejection_reason.clone(),
        created_at: appointment.created_at,
        updated_at: appointment.updated_at,
    }
}

impl AppointmentService {
    pub(crate) fn view(&self, tx: &Transaction, appointment: &Appointment) -> Result<AppointmentView, AppError> {
        let patient = PatientRepository::get(tx, appointment.patient_id)?.map(|p| p.summary());
        let doctor = DoctorRepository::get(tx, appointment.doctor_id)?.map(|d| d.summary());
        Ok(to_view(appointment, patient, doctor, self.now()))
    }

    pub async fn get_appointment(&self, actor: &Actor, appointment_id: Uuid) -> Result<AppointmentView, AppError> {
        debug!("Fetching appointment: {}", appointment_id);
        let tx = self.store.begin().await;
        let appointment = self.load(&tx, appointment_id)?;
        ensure_party(actor, &appointment)?;
        self.view(&tx, &appointment)
    }

    pub async fn list_patient_appointments(
        &self,
        actor: &Actor,
        patient_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<AppointmentView>, AppError> {
        if !(actor.is_privileged() || (actor.is_patient() && actor.id == patient_id)) {
            return Err(AppointmentError::Unauthorized("cannot list another patient's appointments".to_string()).into());
        }

        let tx = self.store.begin().await;
        let appointments = AppointmentRepository::find(&tx, |a| {
            a.patient_id == patient_id && status.map(|s| a.status == s).unwrap_or(true)
        })?;
        self.views(&tx, appointments)
    }

    pub async fn list_doctor_appointments(
        &self,
        actor: &Actor,
        doctor_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<AppointmentView>, AppError> {
        if !(actor.is_privileged() || (actor.is_doctor() && actor.id == doctor_id)) {
            return Err(AppointmentError::Unauthorized("cannot list another doctor's appointments".to_string()).into());
        }

        let tx = self.store.begin().await;
        let appointments = AppointmentRepository::find(&tx, |a| {
            a.doctor_id == doctor_id && status.map(|s| a.status == s).unwrap_or(true)
        })?;
        self.views(&tx, appointments)
    }

    /// Chronological views; party lookups are shared across the batch.
    fn views(&self, tx: &Transaction, mut appointments: Vec<Appointment>) -> Result<Vec<AppointmentView>, AppError> {
        appointments.sort_by_key(|a| (a.date, a.time_range.start()));

        let mut patients = std::collections::HashMap::new();
        let mut doctors = std::collections::HashMap::new();
        let now = self.now();

        let mut views = Vec::with_capacity(appointments.len());
        for appointment in &appointments {
            if !patients.contains_key(&appointment.patient_id) {
                let summary = PatientRepository::get(tx, appointment.patient_id)?.map(|p| p.summary());
                patients.insert(appointment.patient_id, summary);
            }
            if !doctors.contains_key(&appointment.doctor_id) {
                let summary = DoctorRepository::get(tx, appointment.doctor_id)?.map(|d| d.summary());
                doctors.insert(appointment.doctor_id, summary);
            }
            views.push(to_view(
                appointment,
                patients.get(&appointment.patient_id).cloned().flatten(),
                doctors.get(&appointment.doctor_id).cloned().flatten(),
                now,
            ));
        }
        Ok(views)
    }
}
