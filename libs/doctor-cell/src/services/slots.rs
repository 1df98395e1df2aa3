use chrono::{Datelike, NaiveDate};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{DatabaseError, Transaction};
use shared_utils::time::TimeRange;

use crate::models::DoctorSchedule;
use crate::repository::{ScheduleRepository, SCHEDULES};

/// Booked-flag flips on a doctor's schedule, always performed inside the
/// caller's transaction so they commit or roll back with the appointment write.
pub struct SlotAllocator;

impl SlotAllocator {
    /// Mark a slot booked only if it is currently unbooked. Returns `false`
    /// when another booking already holds it or the slot does not exist.
    pub fn try_book(tx: &mut Transaction, doctor_id: Uuid, slot_id: &str) -> Result<bool, DatabaseError> {
        let booked = tx.update_where(
            SCHEDULES,
            &doctor_id.to_string(),
            |schedule: &DoctorSchedule| {
                schedule
                    .find_slot(slot_id)
                    .map(|(_, slot)| !slot.is_booked)
                    .unwrap_or(false)
            },
            |schedule: &mut DoctorSchedule| {
                if let Some(slot) = schedule.find_slot_mut(slot_id) {
                    slot.is_booked = true;
                }
            },
        )?;

        if booked {
            debug!("Slot {} of doctor {} marked booked", slot_id, doctor_id);
        } else {
            warn!("Slot {} of doctor {} could not be booked", slot_id, doctor_id);
        }
        Ok(booked)
    }

    /// Clear the booked flag of the slot an appointment held. A bound slot is
    /// matched by id only, since template edits keep ids but may move times.
    /// Weekday and time range identify the slot only when no id is bound.
    /// Returns whether a booked slot was found and released.
    pub fn release(
        tx: &mut Transaction,
        doctor_id: Uuid,
        date: NaiveDate,
        time_range: TimeRange,
        slot_id: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let Some(schedule) = ScheduleRepository::get(tx, doctor_id)? else {
            debug!("No schedule for doctor {}; nothing to release", doctor_id);
            return Ok(false);
        };

        let target = match slot_id {
            Some(id) => schedule.find_slot(id).map(|(_, slot)| slot),
            None => schedule
                .day(date.weekday())
                .and_then(|day| day.slots.iter().find(|s| s.time_range == time_range)),
        }
        .filter(|slot| slot.is_booked)
        .map(|slot| slot.slot_id.clone());

        let Some(target) = target else {
            debug!(
                "No booked slot for doctor {} at {} {}",
                doctor_id, date, time_range
            );
            return Ok(false);
        };

        let released = tx.update_where(
            SCHEDULES,
            &doctor_id.to_string(),
            |schedule: &DoctorSchedule| {
                schedule
                    .find_slot(&target)
                    .map(|(_, slot)| slot.is_booked)
                    .unwrap_or(false)
            },
            |schedule: &mut DoctorSchedule| {
                if let Some(slot) = schedule.find_slot_mut(&target) {
                    slot.is_booked = false;
                }
            },
        )?;

        if released {
            debug!("Slot {} of doctor {} released", target, doctor_id);
        }
        Ok(released)
    }
}
