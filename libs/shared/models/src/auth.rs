use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Patient,
    Doctor,
    Admin,
    System,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Patient => write!(f, "patient"),
            UserRole::Doctor => write!(f, "doctor"),
            UserRole::Admin => write!(f, "admin"),
            UserRole::System => write!(f, "system"),
        }
    }
}

/// The already-authenticated caller of an operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: UserRole,
}

impl Actor {
    pub fn new(id: Uuid, role: UserRole) -> Self {
        Self { id, role }
    }

    pub fn patient(id: Uuid) -> Self {
        Self::new(id, UserRole::Patient)
    }

    pub fn doctor(id: Uuid) -> Self {
        Self::new(id, UserRole::Doctor)
    }

    pub fn admin(id: Uuid) -> Self {
        Self::new(id, UserRole::Admin)
    }

    /// Background daemons and payment webhooks act as the system.
    pub fn system() -> Self {
        Self::new(Uuid::nil(), UserRole::System)
    }

    pub fn is_doctor(&self) -> bool {
        self.role == UserRole::Doctor
    }

    pub fn is_patient(&self) -> bool {
        self.role == UserRole::Patient
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::System)
    }
}
