use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::DocumentStore;
use shared_models::error::AppError;

use crate::models::{CreatePatientRequest, Patient};
use crate::repository::{PatientRepository, PATIENTS};

pub struct PatientService {
    store: DocumentStore,
}

impl PatientService {
    pub async fn new(store: DocumentStore) -> Self {
        store.ensure_unique_index(PATIENTS, "email").await;
        Self { store }
    }

    pub async fn create_patient(&self, request: CreatePatientRequest) -> Result<Patient, AppError> {
        debug!("Creating new patient profile for: {}", request.email);

        if request.first_name.trim().is_empty() || request.email.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Patient name and email are required".to_string(),
            ));
        }

        let now = Utc::now();
        let patient = Patient {
            id: Uuid::new_v4(),
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            email: request.email.trim().to_lowercase(),
            phone_number: request.phone_number,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await;
        PatientRepository::insert(&mut tx, &patient).map_err(|e| match e {
            shared_database::DatabaseError::UniqueViolation { .. } => {
                AppError::Conflict(format!("Patient with email {} already exists", patient.email))
            }
            other => other.into(),
        })?;
        tx.commit();

        info!("Patient profile created with ID: {}", patient.id);
        Ok(patient)
    }

    pub async fn get_patient(&self, patient_id: Uuid) -> Result<Patient, AppError> {
        let tx = self.store.begin().await;
        PatientRepository::get(&tx, patient_id)?
            .ok_or_else(|| AppError::NotFound(format!("Patient {} not found", patient_id)))
    }
}
