use uuid::Uuid;

use shared_database::{DatabaseError, Transaction};

use crate::models::Patient;

pub const PATIENTS: &str = "patients";

pub struct PatientRepository;

impl PatientRepository {
    pub fn get(tx: &Transaction, patient_id: Uuid) -> Result<Option<Patient>, DatabaseError> {
        tx.get(PATIENTS, &patient_id.to_string())
    }

    pub fn insert(tx: &mut Transaction, patient: &Patient) -> Result<(), DatabaseError> {
        tx.insert(PATIENTS, &patient.id.to_string(), patient)
    }
}
