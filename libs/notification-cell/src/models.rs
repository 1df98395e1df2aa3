use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationSeverity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub severity: NotificationSeverity,
    pub appointment_id: Option<Uuid>,
}

impl Notification {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        severity: NotificationSeverity,
        appointment_id: Option<Uuid>,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
            appointment_id,
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>, appointment_id: Uuid) -> Self {
        Self::new(title, message, NotificationSeverity::Info, Some(appointment_id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification: Notification,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Push payload delivered on a user channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPush {
    pub user_id: Uuid,
    pub notification: Notification,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomEvent {
    pub room: String,
    pub event: String,
    pub payload: serde_json::Value,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemNotice {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Room shared by both parties of an appointment.
pub fn appointment_room(appointment_id: Uuid) -> String {
    appointment_id.to_string()
}
