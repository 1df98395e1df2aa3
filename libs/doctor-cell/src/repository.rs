use uuid::Uuid;

use shared_database::{DatabaseError, Transaction};

use crate::models::{Doctor, DoctorSchedule};

pub const DOCTORS: &str = "doctors";
pub const SCHEDULES: &str = "doctor_schedules";

pub struct DoctorRepository;

impl DoctorRepository {
    pub fn get(tx: &Transaction, doctor_id: Uuid) -> Result<Option<Doctor>, DatabaseError> {
        tx.get(DOCTORS, &doctor_id.to_string())
    }

    pub fn insert(tx: &mut Transaction, doctor: &Doctor) -> Result<(), DatabaseError> {
        tx.insert(DOCTORS, &doctor.id.to_string(), doctor)
    }

    pub fn replace(tx: &mut Transaction, doctor: &Doctor) -> Result<(), DatabaseError> {
        tx.replace(DOCTORS, &doctor.id.to_string(), doctor)
    }
}

/// Schedules are keyed by doctor id; there is at most one per doctor.
pub struct ScheduleRepository;

impl ScheduleRepository {
    pub fn get(tx: &Transaction, doctor_id: Uuid) -> Result<Option<DoctorSchedule>, DatabaseError> {
        tx.get(SCHEDULES, &doctor_id.to_string())
    }

    pub fn insert(tx: &mut Transaction, schedule: &DoctorSchedule) -> Result<(), DatabaseError> {
        tx.insert(SCHEDULES, &schedule.doctor_id.to_string(), schedule)
    }

    pub fn replace(tx: &mut Transaction, schedule: &DoctorSchedule) -> Result<(), DatabaseError> {
        tx.replace(SCHEDULES, &schedule.doctor_id.to_string(), schedule)
    }
}
