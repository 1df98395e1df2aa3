use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use doctor_cell::services::SlotAllocator;
use notification_cell::{ChatCollaborator, NotificationSink};
use shared_config::AppConfig;
use shared_database::{DocumentStore, Transaction};
use shared_models::auth::{Actor, UserRole};
use shared_models::error::AppError;
use shared_utils::clock::Clock;
use shared_utils::time::OperatingTimezone;
use wallet_cell::LedgerService;

use crate::models::{Appointment, AppointmentError};
use crate::repository::AppointmentRepository;
use crate::services::unit_of_work::UnitOfWork;

/// Collaborators the orchestrator drives but does not own.
#[derive(Clone)]
pub struct Collaborators {
    pub ledger: Arc<dyn LedgerService>,
    pub notifier: Arc<dyn NotificationSink>,
    pub chat: Arc<dyn ChatCollaborator>,
    pub clock: Arc<dyn Clock>,
}

/// The appointment orchestrator. Every mutating operation runs inside one
/// [`UnitOfWork`]: store writes and ledger calls commit or roll back
/// together, and notifications leave only after commit.
pub struct AppointmentService {
    pub(crate) store: DocumentStore,
    pub(crate) ledger: Arc<dyn LedgerService>,
    pub(crate) notifier: Arc<dyn NotificationSink>,
    pub(crate) chat: Arc<dyn ChatCollaborator>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: Arc<AppConfig>,
    pub(crate) timezone: OperatingTimezone,
}

impl AppointmentService {
    pub async fn new(store: DocumentStore, config: Arc<AppConfig>, collaborators: Collaborators) -> Self {
        AppointmentRepository::ensure_indexes(&store).await;
        let timezone = OperatingTimezone::from_offset_minutes(config.operating_utc_offset_minutes);

        Self {
            store,
            ledger: collaborators.ledger,
            notifier: collaborators.notifier,
            chat: collaborators.chat,
            clock: collaborators.clock,
            config,
            timezone,
        }
    }

    pub fn timezone(&self) -> OperatingTimezone {
        self.timezone
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn today(&self) -> NaiveDate {
        self.timezone.today(self.now())
    }

    pub(crate) async fn begin(&self) -> UnitOfWork {
        UnitOfWork::new(self.store.begin().await, Arc::clone(&self.ledger))
    }

    /// Commit and dispatch on success, compensate and roll back on failure.
    pub(crate) async fn finish<T>(&self, uow: UnitOfWork, result: Result<T, AppError>) -> Result<T, AppError> {
        match result {
            Ok(value) => {
                let outbox = uow.commit();
                outbox.dispatch(self.notifier.as_ref(), self.chat.as_ref()).await;
                Ok(value)
            }
            Err(e) => {
                warn!("Rolling back appointment operation: {}", e);
                uow.rollback().await;
                Err(e)
            }
        }
    }

    pub(crate) fn load(&self, tx: &Transaction, id: Uuid) -> Result<Appointment, AppError> {
        AppointmentRepository::get(tx, id)?.ok_or_else(|| AppointmentError::NotFound(id).into())
    }

    pub(crate) fn save(&self, uow: &mut UnitOfWork, appointment: &mut Appointment) -> Result<(), AppError> {
        appointment.updated_at = self.now();
        AppointmentRepository::replace(uow.tx_mut(), appointment)?;
        Ok(())
    }

    /// Free the slot an appointment holds, located by its current date and
    /// time. Appointments booked without a slot never touch the schedule.
    pub(crate) fn release_slot(&self, tx: &mut Transaction, appointment: &Appointment) -> Result<(), AppError> {
        let Some(slot_id) = appointment.slot_id.as_deref() else {
            return Ok(());
        };
        let released = SlotAllocator::release(
            tx,
            appointment.doctor_id,
            appointment.date,
            appointment.time_range,
            Some(slot_id),
        )?;
        if !released {
            debug!(
                "Slot {} for appointment {} was already free",
                slot_id, appointment.appointment_code
            );
        }
        Ok(())
    }
}

pub(crate) fn ensure_party(actor: &Actor, appointment: &Appointment) -> Result<(), AppError> {
    if actor.is_privileged() || appointment.is_party(actor.id) {
        Ok(())
    } else {
        Err(AppointmentError::Unauthorized("not a party to this appointment".to_string()).into())
    }
}

pub(crate) fn is_treating_doctor(actor: &Actor, appointment: &Appointment) -> bool {
    actor.is_doctor() && actor.id == appointment.doctor_id
}

pub(crate) fn is_patient_of(actor: &Actor, appointment: &Appointment) -> bool {
    actor.is_patient() && actor.id == appointment.patient_id
}

/// The treating doctor, or an administrator or the system acting for them.
pub(crate) fn ensure_doctor_side(actor: &Actor, appointment: &Appointment) -> Result<(), AppError> {
    if is_treating_doctor(actor, appointment) || actor.is_privileged() {
        Ok(())
    } else {
        Err(AppointmentError::Unauthorized("only the treating doctor can do this".to_string()).into())
    }
}

pub(crate) fn ensure_patient_side(actor: &Actor, appointment: &Appointment) -> Result<(), AppError> {
    if is_patient_of(actor, appointment) || actor.role == UserRole::Admin {
        Ok(())
    } else {
        Err(AppointmentError::Unauthorized("only the patient can do this".to_string()).into())
    }
}
