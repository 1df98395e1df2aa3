// libs/appointment-cell/src/services/pricing.rs
use shared_config::{CancellationPolicy, CommissionPolicy};
use shared_utils::codes::{percent_of, round_money};

use crate::models::RefundBreakdown;

/// Fee split fixed when an appointment is created or reused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeSplit {
    pub consultation_fee: f64,
    pub admin_commission: f64,
    pub doctor_earnings: f64,
}

pub fn split_fee(fee: f64, policy: &CommissionPolicy) -> FeeSplit {
    let consultation_fee = round_money(fee);
    let admin_commission = percent_of(consultation_fee, policy.admin_commission_percent);
    FeeSplit {
        consultation_fee,
        admin_commission,
        doctor_earnings: round_money(consultation_fee - admin_commission),
    }
}

/// Patient-initiated cancellation of a paid appointment. Reversals are taken
/// against the recorded commission and earnings, so a change to the global
/// percentages after booking does not alter what was originally paid out.
/// A negative reversal means the party is owed money back.
pub fn patient_cancellation_refund(
    fee: f64,
    recorded_commission: f64,
    recorded_earnings: f64,
    policy: &CancellationPolicy,
) -> RefundBreakdown {
    let retained_by_doctor = percent_of(fee, policy.user_cancel_doctor_commission);
    let retained_by_platform = percent_of(fee, policy.user_cancel_admin_commission);

    RefundBreakdown {
        patient_refund: percent_of(fee, policy.user_cancel_refund_percent),
        doctor_reversal: round_money(recorded_earnings - retained_by_doctor),
        platform_reversal: round_money(recorded_commission - retained_by_platform),
    }
}

/// Doctor- or admin-initiated cancellation and rejection: everything goes back.
pub fn full_refund(fee: f64, recorded_commission: f64, recorded_earnings: f64) -> RefundBreakdown {
    RefundBreakdown {
        patient_refund: round_money(fee),
        doctor_reversal: round_money(recorded_earnings),
        platform_reversal: round_money(recorded_commission),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_split_is_twenty_eighty() {
        let split = split_fee(500.0, &CommissionPolicy::default());
        assert_eq!(split.admin_commission, 100.0);
        assert_eq!(split.doctor_earnings, 400.0);
    }

    #[test]
    fn test_split_rounds_to_cents() {
        let split = split_fee(333.33, &CommissionPolicy::default());
        assert_eq!(split.admin_commission, 66.67);
        assert_eq!(split.doctor_earnings, 266.66);
    }

    #[test]
    fn test_patient_cancellation_uses_recorded_amounts() {
        let refund = patient_cancellation_refund(500.0, 100.0, 400.0, &CancellationPolicy::default());
        assert_eq!(refund.patient_refund, 350.0);
        assert_eq!(refund.doctor_reversal, 300.0);
        assert_eq!(refund.platform_reversal, 50.0);

        // Booked under a 10% commission; current policy does not matter.
        let refund = patient_cancellation_refund(500.0, 50.0, 450.0, &CancellationPolicy::default());
        assert_eq!(refund.doctor_reversal, 350.0);
        assert_eq!(refund.platform_reversal, 0.0);
    }

    #[test]
    fn test_full_refund_returns_everything() {
        let refund = full_refund(500.0, 100.0, 400.0);
        assert_eq!(refund.patient_refund, 500.0);
        assert_eq!(refund.doctor_reversal, 400.0);
        assert_eq!(refund.platform_reversal, 100.0);
    }
}
