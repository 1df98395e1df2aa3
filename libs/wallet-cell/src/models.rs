// libs/wallet-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LedgerCategory {
    ConsultationPayment,
    DoctorEarning,
    PlatformCommission,
    Refund,
    EarningReversal,
    CommissionReversal,
    Compensation,
}

impl fmt::Display for LedgerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LedgerCategory::ConsultationPayment => "consultation_payment",
            LedgerCategory::DoctorEarning => "doctor_earning",
            LedgerCategory::PlatformCommission => "platform_commission",
            LedgerCategory::Refund => "refund",
            LedgerCategory::EarningReversal => "earning_reversal",
            LedgerCategory::CommissionReversal => "commission_reversal",
            LedgerCategory::Compensation => "compensation",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerDirection {
    Credit,
    Debit,
}

impl LedgerDirection {
    pub fn reversed(self) -> Self {
        match self {
            LedgerDirection::Credit => LedgerDirection::Debit,
            LedgerDirection::Debit => LedgerDirection::Credit,
        }
    }
}

/// Arguments of a single credit or debit call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub user_id: Uuid,
    pub amount: f64,
    pub memo: String,
    pub appointment_id: Option<Uuid>,
    pub category: LedgerCategory,
}

impl LedgerEntry {
    pub fn new(
        user_id: Uuid,
        amount: f64,
        memo: impl Into<String>,
        appointment_id: Option<Uuid>,
        category: LedgerCategory,
    ) -> Self {
        Self {
            user_id,
            amount,
            memo: memo.into(),
            appointment_id,
            category,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerTransaction {
    pub id: Uuid,
    pub direction: LedgerDirection,
    pub entry: LedgerEntry,
    pub balance_after: f64,
    pub created_at: DateTime<Utc>,
}
