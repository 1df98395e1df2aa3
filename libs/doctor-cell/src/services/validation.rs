use std::collections::HashSet;

use chrono::Weekday;

use shared_database::DatabaseError;
use shared_models::error::AppError;
use shared_utils::codes::slot_code;
use shared_utils::time::TimeRange;

use crate::models::{DayInput, DaySchedule, TimeSlot};
use crate::repository::SCHEDULES;

pub const MAX_SLOTS_PER_DAY: usize = 3;
pub const MIN_SLOT_MINUTES: i64 = 15;
pub const SLOT_DURATION_BOUNDS: (u32, u32) = (15, 120);
pub const BUFFER_BOUNDS: (u32, u32) = (0, 30);
pub const MAX_PATIENTS_BOUNDS: (u32, u32) = (1, 10);
pub const MAX_BLOCK_REASON_CHARS: usize = 200;

/// Check a full weekly template: seven distinct weekdays, at most three
/// non-overlapping slots of at least fifteen minutes on each enabled day.
pub fn validate_weekly(days: &[DayInput]) -> Result<(), AppError> {
    if days.len() != 7 {
        return Err(AppError::ValidationError(format!(
            "Weekly schedule must contain exactly 7 days, got {}",
            days.len()
        )));
    }

    let mut seen = HashSet::new();
    for day in days {
        if !seen.insert(day.day) {
            return Err(AppError::ValidationError(format!(
                "Duplicate entry for {}",
                day.day
            )));
        }
        if day.is_enabled {
            validate_day_slots(day)?;
        }
    }

    Ok(())
}

fn validate_day_slots(day: &DayInput) -> Result<(), AppError> {
    if day.slots.len() > MAX_SLOTS_PER_DAY {
        return Err(AppError::ValidationError(format!(
            "{} has {} slots; at most {} are allowed",
            day.day,
            day.slots.len(),
            MAX_SLOTS_PER_DAY
        )));
    }

    let mut ranges: Vec<TimeRange> = Vec::with_capacity(day.slots.len());
    for slot in &day.slots {
        let range = TimeRange::new(slot.start_time, slot.end_time)
            .map_err(|e| AppError::ValidationError(format!("{}: {}", day.day, e)))?;

        if range.duration_minutes() < MIN_SLOT_MINUTES {
            return Err(AppError::ValidationError(format!(
                "{}: slot {} is shorter than {} minutes",
                day.day, range, MIN_SLOT_MINUTES
            )));
        }

        if let Some(clash) = ranges.iter().find(|other| other.overlaps(&range)) {
            return Err(AppError::ValidationError(format!(
                "{}: slot {} overlaps {}",
                day.day, range, clash
            )));
        }
        ranges.push(range);
    }

    Ok(())
}

pub fn validate_tunable(name: &str, value: Option<u32>, bounds: (u32, u32)) -> Result<(), AppError> {
    match value {
        Some(v) if v < bounds.0 || v > bounds.1 => Err(AppError::ValidationError(format!(
            "{} must be between {} and {}, got {}",
            name, bounds.0, bounds.1, v
        ))),
        _ => Ok(()),
    }
}

pub fn validate_block_reason(reason: Option<&str>) -> Result<(), AppError> {
    match reason {
        Some(text) if text.chars().count() > MAX_BLOCK_REASON_CHARS => {
            Err(AppError::ValidationError(format!(
                "Block reason must be at most {} characters",
                MAX_BLOCK_REASON_CHARS
            )))
        }
        _ => Ok(()),
    }
}

/// Turn validated input into stored day schedules.
///
/// Supplied slot ids are kept. A slot without an id takes the id of the
/// existing slot with the same weekday and time range, if any, otherwise a
/// fresh `SLO` code. Booked flags follow the slot id so edits never free a
/// slot an appointment still holds.
pub fn build_weekly(days: &[DayInput], existing: &[DaySchedule]) -> Result<Vec<DaySchedule>, AppError> {
    let mut used_ids: HashSet<String> = HashSet::new();
    let mut weekly = Vec::with_capacity(days.len());

    for day in ordered(days) {
        let previous = existing.iter().find(|d| d.day == day.day);
        let mut slots = Vec::with_capacity(day.slots.len());

        for input in &day.slots {
            let time_range = TimeRange::new(input.start_time, input.end_time)
                .map_err(|e| AppError::ValidationError(e.to_string()))?;

            let slot_id = match &input.slot_id {
                Some(id) if !id.trim().is_empty() => id.trim().to_string(),
                _ => match previous
                    .and_then(|d| d.slots.iter().find(|s| s.time_range == time_range))
                    .map(|s| s.slot_id.clone())
                    .filter(|id| !used_ids.contains(id))
                {
                    Some(id) => id,
                    None => fresh_slot_id(&used_ids, existing)?,
                },
            };

            if !used_ids.insert(slot_id.clone()) {
                return Err(AppError::ValidationError(format!(
                    "Slot id {} is used more than once",
                    slot_id
                )));
            }

            let is_booked = existing
                .iter()
                .flat_map(|d| d.slots.iter())
                .any(|s| s.slot_id == slot_id && s.is_booked);

            slots.push(TimeSlot {
                slot_id,
                time_range,
                is_enabled: input.is_enabled.unwrap_or(true),
                is_booked,
            });
        }

        slots.sort_by_key(|slot| slot.time_range.start());
        weekly.push(DaySchedule {
            day: day.day,
            is_enabled: day.is_enabled,
            slots,
        });
    }

    Ok(weekly)
}

fn ordered(days: &[DayInput]) -> Vec<&DayInput> {
    let mut sorted: Vec<&DayInput> = days.iter().collect();
    sorted.sort_by_key(|day| day.day.num_days_from_monday());
    sorted
}

/// A new `SLO` code. A collision with an id already in the schedule is a
/// unique violation, not retried.
fn fresh_slot_id(used: &HashSet<String>, existing: &[DaySchedule]) -> Result<String, AppError> {
    let candidate = slot_code();
    if slot_id_taken(&candidate, used, existing) {
        return Err(DatabaseError::UniqueViolation {
            collection: SCHEDULES.to_string(),
            field: "slot_id".to_string(),
            value: candidate,
        }
        .into());
    }
    Ok(candidate)
}

fn slot_id_taken(candidate: &str, used: &HashSet<String>, existing: &[DaySchedule]) -> bool {
    used.contains(candidate)
        || existing
            .iter()
            .flat_map(|d| d.slots.iter())
            .any(|s| s.slot_id == candidate)
}

pub fn full_week() -> [Weekday; 7] {
    [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ]
}
