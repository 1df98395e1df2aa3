use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use doctor_cell::models::TimeSlot;
use doctor_cell::services::BookingCounter;
use shared_database::{DatabaseError, DocumentStore, Transaction};
use shared_utils::time::OperatingTimezone;

use crate::models::{Appointment, AppointmentStatus, PaymentStatus};

pub const APPOINTMENTS: &str = "appointments";

pub struct AppointmentRepository;

impl AppointmentRepository {
    pub async fn ensure_indexes(store: &DocumentStore) {
        store.ensure_unique_index(APPOINTMENTS, "appointment_code").await;
    }

    pub fn get(tx: &Transaction, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        tx.get(APPOINTMENTS, &id.to_string())
    }

    pub fn insert(tx: &mut Transaction, appointment: &Appointment) -> Result<(), DatabaseError> {
        tx.insert(APPOINTMENTS, &appointment.id.to_string(), appointment)
    }

    pub fn replace(tx: &mut Transaction, appointment: &Appointment) -> Result<(), DatabaseError> {
        tx.replace(APPOINTMENTS, &appointment.id.to_string(), appointment)
    }

    pub fn delete(tx: &mut Transaction, id: Uuid) -> Result<bool, DatabaseError> {
        tx.delete(APPOINTMENTS, &id.to_string())
    }

    pub fn find<F>(tx: &Transaction, predicate: F) -> Result<Vec<Appointment>, DatabaseError>
    where
        F: Fn(&Appointment) -> bool,
    {
        tx.find(APPOINTMENTS, predicate)
    }

    /// A pending, unpaid booking of the same patient on the same doctor slot
    /// whose date lies within `window_hours` of the requested date.
    pub fn find_reusable(
        tx: &Transaction,
        patient_id: Uuid,
        doctor_id: Uuid,
        slot_id: &str,
        date: NaiveDate,
        window_hours: i64,
        timezone: OperatingTimezone,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let requested = timezone.start_of_day(date);
        let window = Duration::hours(window_hours);

        let mut candidates = tx.find(APPOINTMENTS, |a: &Appointment| {
            a.patient_id == patient_id
                && a.doctor_id == doctor_id
                && a.slot_id.as_deref() == Some(slot_id)
                && a.status == AppointmentStatus::Pending
                && a.payment_status == PaymentStatus::Pending
                && (timezone.start_of_day(a.date) - requested).abs() <= window
        })?;

        candidates.sort_by_key(|a| a.created_at);
        Ok(candidates.pop())
    }
}

/// Counts `pending`, `confirmed` and `upcoming` appointments on a doctor slot,
/// matched by slot id with the exact time range as fallback.
pub struct ActiveBookingCounter;

impl BookingCounter for ActiveBookingCounter {
    fn count_active(
        &self,
        tx: &Transaction,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: &TimeSlot,
    ) -> Result<u32, DatabaseError> {
        let matches = tx.find(APPOINTMENTS, |a: &Appointment| {
            a.doctor_id == doctor_id
                && a.date == date
                && matches!(
                    a.status,
                    AppointmentStatus::Pending | AppointmentStatus::Confirmed | AppointmentStatus::Upcoming
                )
                && (a.slot_id.as_deref() == Some(slot.slot_id.as_str())
                    || a.time_range == slot.time_range)
        })?;
        Ok(matches.len() as u32)
    }
}
