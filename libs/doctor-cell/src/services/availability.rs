use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use shared_database::{DatabaseError, Transaction};
use shared_models::error::AppError;

use crate::models::{AvailableSlot, TimeSlot};
use crate::repository::ScheduleRepository;
use crate::services::schedule::ScheduleService;

/// Counts live bookings against a slot. Implemented by the appointment
/// store so the schedule side never depends on appointment internals.
pub trait BookingCounter: Send + Sync {
    fn count_active(
        &self,
        tx: &Transaction,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: &TimeSlot,
    ) -> Result<u32, DatabaseError>;
}

impl ScheduleService {
    /// Get available slots for a specific date
    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        counter: &dyn BookingCounter,
    ) -> Result<Vec<AvailableSlot>, AppError> {
        debug!("Computing available slots for doctor {} on {}", doctor_id, date);

        let tx = self.store().begin().await;
        let schedule = ScheduleRepository::get(&tx, doctor_id)?
            .ok_or_else(|| AppError::NotFound(format!("Schedule for doctor {} not found", doctor_id)))?;

        if !schedule.is_active {
            debug!("Schedule for doctor {} is inactive", doctor_id);
            return Ok(Vec::new());
        }

        let Some(day) = schedule.day_for_date(date).filter(|day| day.is_enabled) else {
            return Ok(Vec::new());
        };

        let block = schedule.block_for(date);
        if block.map(|b| b.is_full_day()).unwrap_or(false) {
            debug!("{} is fully blocked for doctor {}", date, doctor_id);
            return Ok(Vec::new());
        }

        let mut available = Vec::new();
        for slot in &day.slots {
            if !slot.is_enabled || block.map(|b| b.blocks(slot)).unwrap_or(false) {
                continue;
            }

            let booked_count = counter.count_active(&tx, doctor_id, date, slot)?;
            available.push(AvailableSlot {
                slot_id: slot.slot_id.clone(),
                time_range: slot.time_range,
                booked_count,
                capacity: schedule.max_patients_per_slot,
                is_available: !slot.is_booked && booked_count < schedule.max_patients_per_slot,
            });
        }

        Ok(available)
    }
}
