use std::env;
use std::str::FromStr;

use tracing::warn;
use uuid::Uuid;

/// Fee split applied when an appointment is created or reused.
#[derive(Debug, Clone)]
pub struct CommissionPolicy {
    pub admin_commission_percent: f64,
}

impl Default for CommissionPolicy {
    fn default() -> Self {
        Self {
            admin_commission_percent: 20.0,
        }
    }
}

/// Percentages applied when the patient cancels a paid appointment.
#[derive(Debug, Clone)]
pub struct CancellationPolicy {
    pub user_cancel_refund_percent: f64,
    pub user_cancel_doctor_commission: f64,
    pub user_cancel_admin_commission: f64,
}

impl Default for CancellationPolicy {
    fn default() -> Self {
        Self {
            user_cancel_refund_percent: 70.0,
            user_cancel_doctor_commission: 20.0,
            user_cancel_admin_commission: 10.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BookingPolicy {
    pub max_reschedule: u32,
    pub checkout_lock_ttl_seconds: i64,
    pub reuse_window_hours: i64,
    pub post_consultation_chat_hours: i64,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            max_reschedule: 3,
            checkout_lock_ttl_seconds: 180,
            reuse_window_hours: 12,
            post_consultation_chat_hours: 24,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub session_timer_interval_seconds: u64,
    pub reminder_interval_seconds: u64,
    pub cleanup_interval_seconds: u64,
    pub pending_grace_minutes: i64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            session_timer_interval_seconds: 30,
            reminder_interval_seconds: 60,
            cleanup_interval_seconds: 300,
            pending_grace_minutes: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub platform_account_id: Uuid,
    pub operating_utc_offset_minutes: i32,
    pub commission: CommissionPolicy,
    pub cancellation: CancellationPolicy,
    pub booking: BookingPolicy,
    pub daemons: DaemonConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            platform_account_id: Uuid::nil(),
            operating_utc_offset_minutes: 330,
            commission: CommissionPolicy::default(),
            cancellation: CancellationPolicy::default(),
            booking: BookingPolicy::default(),
            daemons: DaemonConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            platform_account_id: env_or("PLATFORM_ACCOUNT_ID", defaults.platform_account_id),
            operating_utc_offset_minutes: env_or(
                "OPERATING_UTC_OFFSET_MINUTES",
                defaults.operating_utc_offset_minutes,
            ),
            commission: CommissionPolicy {
                admin_commission_percent: env_or(
                    "ADMIN_COMMISSION_PERCENT",
                    defaults.commission.admin_commission_percent,
                ),
            },
            cancellation: CancellationPolicy {
                user_cancel_refund_percent: env_or(
                    "USER_CANCEL_REFUND_PERCENT",
                    defaults.cancellation.user_cancel_refund_percent,
                ),
                user_cancel_doctor_commission: env_or(
                    "USER_CANCEL_DOCTOR_COMMISSION",
                    defaults.cancellation.user_cancel_doctor_commission,
                ),
                user_cancel_admin_commission: env_or(
                    "USER_CANCEL_ADMIN_COMMISSION",
                    defaults.cancellation.user_cancel_admin_commission,
                ),
            },
            booking: BookingPolicy {
                max_reschedule: env_or("MAX_RESCHEDULE", defaults.booking.max_reschedule),
                checkout_lock_ttl_seconds: env_or(
                    "CHECKOUT_LOCK_TTL_SECONDS",
                    defaults.booking.checkout_lock_ttl_seconds,
                ),
                reuse_window_hours: env_or("REUSE_WINDOW_HOURS", defaults.booking.reuse_window_hours),
                post_consultation_chat_hours: env_or(
                    "POST_CONSULTATION_CHAT_HOURS",
                    defaults.booking.post_consultation_chat_hours,
                ),
            },
            daemons: DaemonConfig {
                session_timer_interval_seconds: env_interval(
                    "SESSION_TIMER_INTERVAL_SECONDS",
                    defaults.daemons.session_timer_interval_seconds,
                ),
                reminder_interval_seconds: env_interval(
                    "REMINDER_INTERVAL_SECONDS",
                    defaults.daemons.reminder_interval_seconds,
                ),
                cleanup_interval_seconds: env_interval(
                    "CLEANUP_INTERVAL_SECONDS",
                    defaults.daemons.cleanup_interval_seconds,
                ),
                pending_grace_minutes: env_or(
                    "PENDING_GRACE_MINUTES",
                    defaults.daemons.pending_grace_minutes,
                ),
            },
        };

        if !config.is_configured() {
            warn!("Application not fully configured - PLATFORM_ACCOUNT_ID is unset");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.platform_account_id.is_nil()
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default {:?}", key, raw, default);
            default
        }),
        Err(_) => {
            warn!("{} not set, using default {:?}", key, default);
            default
        }
    }
}

/// Daemon periods must be at least one second.
fn env_interval(key: &str, default: u64) -> u64 {
    let value = env_or(key, default);
    if value == 0 {
        warn!("{} must be at least 1 second, using default {}", key, default);
        return default;
    }
    value
}
