use chrono::{Datelike, NaiveDate};

use doctor_cell::models::{DoctorSchedule, TimeSlot};
use shared_utils::time::TimeRange;

use crate::models::AppointmentError;

pub const MAX_REASON_CHARS: usize = 500;
pub const MAX_NOTE_CHARS: usize = 2000;

pub fn validate_date_not_past(date: NaiveDate, today: NaiveDate) -> Result<(), AppointmentError> {
    if date < today {
        return Err(AppointmentError::ValidationError(format!(
            "Appointment date {} is in the past",
            date
        )));
    }
    Ok(())
}

pub fn validate_reason(reason: Option<&str>) -> Result<(), AppointmentError> {
    match reason {
        Some(text) if text.chars().count() > MAX_REASON_CHARS => Err(AppointmentError::ValidationError(
            format!("Reason must be at most {} characters", MAX_REASON_CHARS),
        )),
        _ => Ok(()),
    }
}

/// Notes are trimmed and must hold between 1 and 2000 characters.
pub fn normalize_note(text: &str) -> Result<String, AppointmentError> {
    let trimmed = text.trim();
    let length = trimmed.chars().count();
    if length == 0 || length > MAX_NOTE_CHARS {
        return Err(AppointmentError::ValidationError(format!(
            "Note must be between 1 and {} characters",
            MAX_NOTE_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

/// Resolve a requested slot against the doctor's schedule: the slot must
/// exist on the weekday of `date`, be enabled, cover exactly `time_range`,
/// and not be blocked on that date.
pub fn resolve_slot(
    schedule: &DoctorSchedule,
    slot_id: &str,
    date: NaiveDate,
    time_range: TimeRange,
) -> Result<TimeSlot, AppointmentError> {
    if !schedule.is_active {
        return Err(AppointmentError::SlotNotAvailable(
            "doctor schedule is inactive".to_string(),
        ));
    }

    let (weekday, slot) = schedule
        .find_slot(slot_id)
        .ok_or_else(|| AppointmentError::SlotNotAvailable(format!("slot {} does not exist", slot_id)))?;

    if weekday != date.weekday() {
        return Err(AppointmentError::SlotNotAvailable(format!(
            "slot {} is offered on {}, not {}",
            slot_id,
            weekday,
            date.weekday()
        )));
    }
    let day_enabled = schedule.day(weekday).map(|d| d.is_enabled).unwrap_or(false);
    if !day_enabled || !slot.is_enabled {
        return Err(AppointmentError::SlotNotAvailable(format!("slot {} is disabled", slot_id)));
    }
    if slot.time_range != time_range {
        return Err(AppointmentError::ValidationError(format!(
            "Requested time {} does not match slot {} ({})",
            time_range, slot_id, slot.time_range
        )));
    }
    if schedule.block_for(date).map(|b| b.blocks(slot)).unwrap_or(false) {
        return Err(AppointmentError::SlotNotAvailable(format!(
            "slot {} is blocked on {}",
            slot_id, date
        )));
    }

    Ok(slot.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_bounds() {
        assert!(normalize_note("   ").is_err());
        assert_eq!(normalize_note("  BP normal ").unwrap(), "BP normal");
        assert!(normalize_note(&"a".repeat(2000)).is_ok());
        assert!(normalize_note(&"a".repeat(2001)).is_err());
    }

    #[test]
    fn test_past_dates_rejected() {
        let today = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        assert!(validate_date_not_past(today, today).is_ok());
        assert!(validate_date_not_past(today.pred_opt().unwrap(), today).is_err());
    }
}
