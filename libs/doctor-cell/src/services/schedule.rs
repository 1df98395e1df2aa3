use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::DocumentStore;
use shared_models::auth::Actor;
use shared_models::error::AppError;
use shared_utils::clock::Clock;
use shared_utils::time::OperatingTimezone;

use crate::models::{
    BlockDateRequest, BlockedDate, CreateScheduleRequest, DoctorSchedule, UpdateScheduleRequest,
    DEFAULT_BUFFER_MINUTES, DEFAULT_MAX_PATIENTS_PER_SLOT, DEFAULT_SLOT_DURATION_MINUTES,
};
use crate::repository::{DoctorRepository, ScheduleRepository};
use crate::services::doctor::ensure_self_or_admin;
use crate::services::validation::{
    build_weekly, validate_block_reason, validate_tunable, validate_weekly, BUFFER_BOUNDS,
    MAX_PATIENTS_BOUNDS, SLOT_DURATION_BOUNDS,
};

pub struct ScheduleService {
    store: DocumentStore,
    clock: Arc<dyn Clock>,
    timezone: OperatingTimezone,
}

impl ScheduleService {
    pub fn new(store: DocumentStore, clock: Arc<dyn Clock>, timezone: OperatingTimezone) -> Self {
        Self {
            store,
            clock,
            timezone,
        }
    }

    pub(crate) fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Create the weekly schedule for a doctor. A doctor has at most one.
    #[instrument(skip(self, actor, request))]
    pub async fn create_schedule(
        &self,
        actor: &Actor,
        doctor_id: Uuid,
        request: CreateScheduleRequest,
    ) -> Result<DoctorSchedule, AppError> {
        ensure_self_or_admin(actor, doctor_id)?;
        debug!("Creating schedule for doctor: {}", doctor_id);

        validate_weekly(&request.weekly)?;
        validate_tunable("slot_duration_minutes", request.slot_duration_minutes, SLOT_DURATION_BOUNDS)?;
        validate_tunable("buffer_minutes", request.buffer_minutes, BUFFER_BOUNDS)?;
        validate_tunable("max_patients_per_slot", request.max_patients_per_slot, MAX_PATIENTS_BOUNDS)?;

        let mut tx = self.store.begin().await;

        if DoctorRepository::get(&tx, doctor_id)?.is_none() {
            return Err(AppError::NotFound(format!("Doctor {} not found", doctor_id)));
        }
        if ScheduleRepository::get(&tx, doctor_id)?.is_some() {
            return Err(AppError::BadRequest(format!(
                "Schedule already exists for doctor {}",
                doctor_id
            )));
        }

        let now = self.clock.now();
        let schedule = DoctorSchedule {
            doctor_id,
            weekly: build_weekly(&request.weekly, &[])?,
            blocked_dates: Vec::new(),
            slot_duration_minutes: request
                .slot_duration_minutes
                .unwrap_or(DEFAULT_SLOT_DURATION_MINUTES),
            buffer_minutes: request.buffer_minutes.unwrap_or(DEFAULT_BUFFER_MINUTES),
            max_patients_per_slot: request
                .max_patients_per_slot
                .unwrap_or(DEFAULT_MAX_PATIENTS_PER_SLOT),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        ScheduleRepository::insert(&mut tx, &schedule)?;
        tx.commit();

        info!("Schedule created for doctor {}", doctor_id);
        Ok(schedule)
    }

    /// Apply the supplied fields, re-validating each one.
    #[instrument(skip(self, actor, request))]
    pub async fn update_schedule(
        &self,
        actor: &Actor,
        doctor_id: Uuid,
        request: UpdateScheduleRequest,
    ) -> Result<DoctorSchedule, AppError> {
        ensure_self_or_admin(actor, doctor_id)?;

        if let Some(weekly) = &request.weekly {
            validate_weekly(weekly)?;
        }
        validate_tunable("slot_duration_minutes", request.slot_duration_minutes, SLOT_DURATION_BOUNDS)?;
        validate_tunable("buffer_minutes", request.buffer_minutes, BUFFER_BOUNDS)?;
        validate_tunable("max_patients_per_slot", request.max_patients_per_slot, MAX_PATIENTS_BOUNDS)?;

        let mut tx = self.store.begin().await;
        let mut schedule = load(&tx, doctor_id)?;

        if let Some(weekly) = &request.weekly {
            schedule.weekly = build_weekly(weekly, &schedule.weekly)?;
        }
        if let Some(duration) = request.slot_duration_minutes {
            schedule.slot_duration_minutes = duration;
        }
        if let Some(buffer) = request.buffer_minutes {
            schedule.buffer_minutes = buffer;
        }
        if let Some(max) = request.max_patients_per_slot {
            schedule.max_patients_per_slot = max;
        }
        if let Some(is_active) = request.is_active {
            schedule.is_active = is_active;
        }
        schedule.updated_at = self.clock.now();

        ScheduleRepository::replace(&mut tx, &schedule)?;
        tx.commit();

        info!("Schedule updated for doctor {}", doctor_id);
        Ok(schedule)
    }

    pub async fn get_schedule(&self, doctor_id: Uuid) -> Result<DoctorSchedule, AppError> {
        let tx = self.store.begin().await;
        load(&tx, doctor_id)
    }

    /// Soft delete; the schedule stays on record but offers no slots.
    pub async fn deactivate_schedule(&self, actor: &Actor, doctor_id: Uuid) -> Result<DoctorSchedule, AppError> {
        ensure_self_or_admin(actor, doctor_id)?;

        let mut tx = self.store.begin().await;
        let mut schedule = load(&tx, doctor_id)?;
        schedule.is_active = false;
        schedule.updated_at = self.clock.now();
        ScheduleRepository::replace(&mut tx, &schedule)?;
        tx.commit();

        info!("Schedule deactivated for doctor {}", doctor_id);
        Ok(schedule)
    }

    /// Block a whole day, or only the slots starting at the given times.
    /// A second block on the same date is merged into the first.
    #[instrument(skip(self, actor, request), fields(date = %request.date))]
    pub async fn block_date(
        &self,
        actor: &Actor,
        doctor_id: Uuid,
        request: BlockDateRequest,
    ) -> Result<DoctorSchedule, AppError> {
        ensure_self_or_admin(actor, doctor_id)?;

        let today = self.timezone.today(self.clock.now());
        if request.date < today {
            return Err(AppError::BadRequest(format!(
                "Cannot block past date {}",
                request.date
            )));
        }
        validate_block_reason(request.reason.as_deref())?;

        let mut tx = self.store.begin().await;
        let mut schedule = load(&tx, doctor_id)?;

        match schedule
            .blocked_dates
            .iter_mut()
            .find(|block| block.date == request.date)
        {
            Some(existing) => {
                merge_block(existing, request);
                debug!("Merged block on {} for doctor {}", existing.date, doctor_id);
            }
            None => schedule.blocked_dates.push(BlockedDate {
                date: request.date,
                reason: request.reason,
                slot_start_times: request.slot_start_times,
            }),
        }
        schedule.blocked_dates.sort_by_key(|block| block.date);
        schedule.updated_at = self.clock.now();

        ScheduleRepository::replace(&mut tx, &schedule)?;
        tx.commit();
        Ok(schedule)
    }

    pub async fn unblock_date(
        &self,
        actor: &Actor,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<DoctorSchedule, AppError> {
        ensure_self_or_admin(actor, doctor_id)?;

        let mut tx = self.store.begin().await;
        let mut schedule = load(&tx, doctor_id)?;

        let before = schedule.blocked_dates.len();
        schedule.blocked_dates.retain(|block| block.date != date);
        if schedule.blocked_dates.len() == before {
            warn!("No block on {} for doctor {}", date, doctor_id);
            return Err(AppError::NotFound(format!("No block on {}", date)));
        }
        schedule.updated_at = self.clock.now();

        ScheduleRepository::replace(&mut tx, &schedule)?;
        tx.commit();
        Ok(schedule)
    }
}

fn load(tx: &shared_database::Transaction, doctor_id: Uuid) -> Result<DoctorSchedule, AppError> {
    ScheduleRepository::get(tx, doctor_id)?
        .ok_or_else(|| AppError::NotFound(format!("Schedule for doctor {} not found", doctor_id)))
}

/// A full-day block absorbs any partial one; otherwise the slot lists are unioned.
fn merge_block(existing: &mut BlockedDate, request: BlockDateRequest) {
    if request.reason.is_some() {
        existing.reason = request.reason;
    }

    if existing.is_full_day() {
        return;
    }
    if request.slot_start_times.is_empty() {
        existing.slot_start_times.clear();
        return;
    }
    for start in request.slot_start_times {
        if !existing.slot_start_times.contains(&start) {
            existing.slot_start_times.push(start);
        }
    }
    existing.slot_start_times.sort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn block(times: &[(u32, u32)], reason: &str) -> BlockedDate {
        BlockedDate {
            date: NaiveDate::from_ymd_opt(2030, 1, 8).unwrap(),
            reason: Some(reason.to_string()),
            slot_start_times: times
                .iter()
                .map(|(h, m)| NaiveTime::from_hms_opt(*h, *m, 0).unwrap())
                .collect(),
        }
    }

    fn request(times: &[(u32, u32)], reason: &str) -> BlockDateRequest {
        let b = block(times, reason);
        BlockDateRequest {
            date: b.date,
            reason: b.reason,
            slot_start_times: b.slot_start_times,
        }
    }

    #[test]
    fn test_partial_blocks_union() {
        let mut existing = block(&[(9, 0)], "clinic");
        merge_block(&mut existing, request(&[(10, 0), (9, 0)], "training"));
        assert_eq!(existing.slot_start_times.len(), 2);
        assert_eq!(existing.reason.as_deref(), Some("training"));
    }

    #[test]
    fn test_full_day_block_dominates() {
        let mut existing = block(&[(9, 0)], "clinic");
        merge_block(&mut existing, request(&[], "holiday"));
        assert!(existing.is_full_day());

        merge_block(&mut existing, request(&[(11, 0)], "holiday"));
        assert!(existing.is_full_day());
    }
}
