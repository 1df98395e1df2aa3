use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_database::{DatabaseError, DocumentStore};
use shared_models::auth::Actor;
use shared_models::error::AppError;
use shared_utils::clock::Clock;

use crate::models::{CreateDoctorRequest, Doctor, UpdateFeesRequest};
use crate::repository::{DoctorRepository, DOCTORS};

pub struct DoctorService {
    store: DocumentStore,
    clock: Arc<dyn Clock>,
}

impl DoctorService {
    pub async fn new(store: DocumentStore, clock: Arc<dyn Clock>) -> Self {
        store.ensure_unique_index(DOCTORS, "email").await;
        Self { store, clock }
    }

    /// Create a new doctor profile
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create_doctor(&self, request: CreateDoctorRequest) -> Result<Doctor, AppError> {
        debug!("Creating new doctor profile for: {}", request.email);

        if request.first_name.trim().is_empty() || request.email.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Doctor name and email are required".to_string(),
            ));
        }
        validate_fee(request.video_fee)?;
        validate_fee(request.chat_fee)?;

        let now = self.clock.now();
        let doctor = Doctor {
            id: Uuid::new_v4(),
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            email: request.email.trim().to_lowercase(),
            specialty: request.specialty,
            is_active: true,
            video_fee: request.video_fee,
            chat_fee: request.chat_fee,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await;
        DoctorRepository::insert(&mut tx, &doctor).map_err(|e| match e {
            DatabaseError::UniqueViolation { .. } => {
                AppError::Conflict(format!("Doctor with email {} already exists", doctor.email))
            }
            other => other.into(),
        })?;
        tx.commit();

        info!("Doctor profile created with ID: {}", doctor.id);
        Ok(doctor)
    }

    /// Get doctor by ID
    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, AppError> {
        debug!("Fetching doctor profile: {}", doctor_id);
        let tx = self.store.begin().await;
        DoctorRepository::get(&tx, doctor_id)?
            .ok_or_else(|| AppError::NotFound(format!("Doctor {} not found", doctor_id)))
    }

    pub async fn update_fees(
        &self,
        actor: &Actor,
        doctor_id: Uuid,
        request: UpdateFeesRequest,
    ) -> Result<Doctor, AppError> {
        ensure_self_or_admin(actor, doctor_id)?;
        validate_fee(request.video_fee)?;
        validate_fee(request.chat_fee)?;

        self.modify(doctor_id, |doctor| {
            if request.video_fee.is_some() {
                doctor.video_fee = request.video_fee;
            }
            if request.chat_fee.is_some() {
                doctor.chat_fee = request.chat_fee;
            }
        })
        .await
    }

    /// Inactive doctors stay visible but cannot be booked.
    pub async fn set_active(&self, actor: &Actor, doctor_id: Uuid, is_active: bool) -> Result<Doctor, AppError> {
        ensure_self_or_admin(actor, doctor_id)?;
        let doctor = self.modify(doctor_id, |doctor| doctor.is_active = is_active).await?;
        info!("Doctor {} active flag set to {}", doctor_id, is_active);
        Ok(doctor)
    }

    async fn modify<F>(&self, doctor_id: Uuid, apply: F) -> Result<Doctor, AppError>
    where
        F: FnOnce(&mut Doctor),
    {
        let mut tx = self.store.begin().await;
        let mut doctor = DoctorRepository::get(&tx, doctor_id)?
            .ok_or_else(|| AppError::NotFound(format!("Doctor {} not found", doctor_id)))?;

        apply(&mut doctor);
        doctor.updated_at = self.clock.now();

        DoctorRepository::replace(&mut tx, &doctor)?;
        tx.commit();
        Ok(doctor)
    }
}

pub(crate) fn ensure_self_or_admin(actor: &Actor, doctor_id: Uuid) -> Result<(), AppError> {
    if actor.is_privileged() || (actor.is_doctor() && actor.id == doctor_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the doctor or an administrator can manage this profile".to_string(),
        ))
    }
}

fn validate_fee(fee: Option<f64>) -> Result<(), AppError> {
    match fee {
        Some(amount) if !amount.is_finite() || amount < 0.0 => Err(AppError::ValidationError(
            format!("Consultation fee must be a non-negative amount, got {}", amount),
        )),
        _ => Ok(()),
    }
}
