// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use doctor_cell::models::{ConsultationType, DoctorSummary};
use patient_cell::models::PatientSummary;
use shared_models::auth::UserRole;
use shared_models::error::AppError;
use shared_models::reference::Ref;
use shared_utils::time::TimeRange;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub appointment_code: String,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub consultation_type: ConsultationType,
    pub date: NaiveDate,
    pub time_range: TimeRange,
    pub slot_id: Option<String>,
    pub reason: Option<String>,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    pub payment: Option<PaymentRecord>,
    pub consultation_fee: f64,
    pub admin_commission: f64,
    pub doctor_earnings: f64,
    pub checkout_lock_until: Option<DateTime<Utc>>,
    pub reschedule_count: u32,
    pub reschedule_request: Option<RescheduleRequest>,
    pub session: SessionState,
    pub tests_needed: bool,
    pub post_consultation_chat: PostConsultationChat,
    pub notes: Vec<ClinicalNote>,
    pub cancellation: Option<CancellationRecord>,
    pub rejection_reason: Option<String>,
    pub reminder_sent: bool,
    pub ready_reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }

    /// A live checkout lock blocks a second concurrent payment attempt.
    pub fn has_live_checkout_lock(&self, now: DateTime<Utc>) -> bool {
        self.checkout_lock_until.map(|until| until > now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Upcoming,
    RescheduleRequested,
    Completed,
    Cancelled,
    Rejected,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Upcoming => write!(f, "upcoming"),
            AppointmentStatus::RescheduleRequested => write!(f, "reschedule_requested"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Refunded => write!(f, "refunded"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Wallet,
    Gateway,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRecord {
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub paid_at: DateTime<Utc>,
}

// ==============================================================================
// SESSION MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    WaitingForDoctor,
    ContinuedByDoctor,
    Ended,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "ACTIVE"),
            SessionStatus::WaitingForDoctor => write!(f, "WAITING_FOR_DOCTOR"),
            SessionStatus::ContinuedByDoctor => write!(f, "CONTINUED_BY_DOCTOR"),
            SessionStatus::Ended => write!(f, "ENDED"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    pub status: Option<SessionStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub extension_count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PostConsultationChat {
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PostConsultationChat {
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map(|at| at > now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClinicalNote {
    pub id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// RESCHEDULE / CANCELLATION RECORDS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RescheduleRequest {
    pub proposed_date: NaiveDate,
    pub proposed_time_range: TimeRange,
    pub proposed_slot_id: Option<String>,
    pub requested_by: UserRole,
    pub requested_at: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Ledger movements of a refund. `doctor_reversal` and `platform_reversal`
/// are the amounts taken back from the recorded earnings and commission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RefundBreakdown {
    pub patient_refund: f64,
    pub doctor_reversal: f64,
    pub platform_reversal: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancellationRecord {
    pub cancelled_by: UserRole,
    pub actor_id: Uuid,
    pub reason: Option<String>,
    pub refund: Option<RefundBreakdown>,
    pub cancelled_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub consultation_type: ConsultationType,
    pub date: NaiveDate,
    pub time_range: TimeRange,
    pub slot_id: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposeRescheduleRequest {
    pub date: NaiveDate,
    pub time_range: TimeRange,
    pub slot_id: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostConsultationChatView {
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_open: bool,
}

/// Appointment as returned to callers, with party fields normalized to `Ref`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentView {
    pub id: Uuid,
    pub appointment_code: String,
    pub patient: Ref<PatientSummary>,
    pub doctor: Ref<DoctorSummary>,
    pub consultation_type: ConsultationType,
    pub date: NaiveDate,
    pub time_range: TimeRange,
    pub slot_id: Option<String>,
    pub reason: Option<String>,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    pub consultation_fee: f64,
    pub admin_commission: f64,
    pub doctor_earnings: f64,
    pub reschedule_count: u32,
    pub reschedule_request: Option<RescheduleRequest>,
    pub session: SessionState,
    pub tests_needed: bool,
    pub post_consultation_chat: PostConsultationChatView,
    pub notes: Vec<ClinicalNote>,
    pub cancellation: Option<CancellationRecord>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// ERROR HANDLING
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppointmentError {
    #[error("Appointment {0} not found")]
    NotFound(Uuid),

    #[error("Doctor {0} not found")]
    DoctorNotFound(Uuid),

    #[error("Patient {0} not found")]
    PatientNotFound(Uuid),

    #[error("Doctor is not accepting appointments")]
    DoctorInactive,

    #[error("Doctor has no {0} consultation fee configured")]
    FeeNotConfigured(ConsultationType),

    #[error("Appointment slot not available: {0}")]
    SlotNotAvailable(String),

    #[error("Cannot {action} an appointment in status {status}")]
    InvalidStatusTransition {
        status: AppointmentStatus,
        action: &'static str,
    },

    #[error("Payment is {0}; this action requires a paid appointment")]
    PaymentRequired(PaymentStatus),

    #[error("Another payment attempt is in progress for this appointment")]
    CheckoutInProgress,

    #[error("Reschedule limit of {0} reached")]
    RescheduleLimitReached(u32),

    #[error("Session has ended; no further changes are allowed")]
    SessionEnded,

    #[error("Session cannot move from {from} to {to}")]
    InvalidSessionTransition { from: String, to: SessionStatus },

    #[error("Doctor balance {balance:.2} cannot cover reversal of {required:.2}")]
    InsufficientDoctorBalance { balance: f64, required: f64 },

    #[error("Unauthorized access to appointment: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        let message = err.to_string();
        match err {
            AppointmentError::NotFound(_)
            | AppointmentError::DoctorNotFound(_)
            | AppointmentError::PatientNotFound(_) => AppError::NotFound(message),
            AppointmentError::CheckoutInProgress => AppError::Conflict(message),
            AppointmentError::Unauthorized(_) => AppError::Forbidden(message),
            AppointmentError::ValidationError(_) => AppError::ValidationError(message),
            _ => AppError::BadRequest(message),
        }
    }
}
