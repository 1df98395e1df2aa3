use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::reference::Identified;
use shared_utils::time::TimeRange;

pub const DEFAULT_SLOT_DURATION_MINUTES: u32 = 30;
pub const DEFAULT_BUFFER_MINUTES: u32 = 0;
pub const DEFAULT_MAX_PATIENTS_PER_SLOT: u32 = 1;

// ==============================================================================
// DOCTOR PROFILE
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationType {
    Video,
    Chat,
}

impl std::fmt::Display for ConsultationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsultationType::Video => write!(f, "video"),
            ConsultationType::Chat => write!(f, "chat"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub specialty: String,
    pub is_active: bool,
    pub video_fee: Option<f64>,
    pub chat_fee: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// The configured fee for a consultation type; unset and zero fees are both `None`.
    pub fn fee_for(&self, consultation_type: ConsultationType) -> Option<f64> {
        let fee = match consultation_type {
            ConsultationType::Video => self.video_fee,
            ConsultationType::Chat => self.chat_fee,
        };
        fee.filter(|amount| amount.is_finite() && *amount > 0.0)
    }

    pub fn summary(&self) -> DoctorSummary {
        DoctorSummary {
            id: self.id,
            full_name: self.full_name(),
            specialty: self.specialty.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorSummary {
    pub id: Uuid,
    pub full_name: String,
    pub specialty: String,
}

impl Identified for DoctorSummary {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub specialty: String,
    pub video_fee: Option<f64>,
    pub chat_fee: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFeesRequest {
    pub video_fee: Option<f64>,
    pub chat_fee: Option<f64>,
}

// ==============================================================================
// WEEKLY SCHEDULE
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeSlot {
    pub slot_id: String,
    pub time_range: TimeRange,
    pub is_enabled: bool,
    pub is_booked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaySchedule {
    pub day: Weekday,
    pub is_enabled: bool,
    pub slots: Vec<TimeSlot>,
}

/// A date-level block. An empty `slot_start_times` blocks the whole day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockedDate {
    pub date: NaiveDate,
    pub reason: Option<String>,
    #[serde(default)]
    pub slot_start_times: Vec<NaiveTime>,
}

impl BlockedDate {
    pub fn is_full_day(&self) -> bool {
        self.slot_start_times.is_empty()
    }

    pub fn blocks(&self, slot: &TimeSlot) -> bool {
        self.is_full_day() || self.slot_start_times.contains(&slot.time_range.start())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorSchedule {
    pub doctor_id: Uuid,
    pub weekly: Vec<DaySchedule>,
    #[serde(default)]
    pub blocked_dates: Vec<BlockedDate>,
    pub slot_duration_minutes: u32,
    pub buffer_minutes: u32,
    pub max_patients_per_slot: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DoctorSchedule {
    pub fn day(&self, weekday: Weekday) -> Option<&DaySchedule> {
        self.weekly.iter().find(|day| day.day == weekday)
    }

    pub fn day_for_date(&self, date: NaiveDate) -> Option<&DaySchedule> {
        self.day(date.weekday())
    }

    pub fn block_for(&self, date: NaiveDate) -> Option<&BlockedDate> {
        self.blocked_dates.iter().find(|block| block.date == date)
    }

    pub fn find_slot(&self, slot_id: &str) -> Option<(Weekday, &TimeSlot)> {
        self.weekly.iter().find_map(|day| {
            day.slots
                .iter()
                .find(|slot| slot.slot_id == slot_id)
                .map(|slot| (day.day, slot))
        })
    }

    pub fn find_slot_mut(&mut self, slot_id: &str) -> Option<&mut TimeSlot> {
        self.weekly
            .iter_mut()
            .flat_map(|day| day.slots.iter_mut())
            .find(|slot| slot.slot_id == slot_id)
    }
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotInput {
    pub slot_id: Option<String>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayInput {
    pub day: Weekday,
    pub is_enabled: bool,
    #[serde(default)]
    pub slots: Vec<SlotInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScheduleRequest {
    pub weekly: Vec<DayInput>,
    pub slot_duration_minutes: Option<u32>,
    pub buffer_minutes: Option<u32>,
    pub max_patients_per_slot: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateScheduleRequest {
    pub weekly: Option<Vec<DayInput>>,
    pub slot_duration_minutes: Option<u32>,
    pub buffer_minutes: Option<u32>,
    pub max_patients_per_slot: Option<u32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDateRequest {
    pub date: NaiveDate,
    pub reason: Option<String>,
    #[serde(default)]
    pub slot_start_times: Vec<NaiveTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailableSlot {
    pub slot_id: String,
    pub time_range: TimeRange,
    pub booked_count: u32,
    pub capacity: u32,
    pub is_available: bool,
}
