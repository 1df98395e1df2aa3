use rand::Rng;

pub const APPOINTMENT_CODE_PREFIX: &str = "APP";
pub const SLOT_CODE_PREFIX: &str = "SLO";

/// Human-facing short code: prefix followed by six random digits.
/// Collisions are left to the store's unique index.
pub fn generate_short_code(prefix: &str) -> String {
    let number: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{}{:06}", prefix, number)
}

pub fn appointment_code() -> String {
    generate_short_code(APPOINTMENT_CODE_PREFIX)
}

pub fn slot_code() -> String {
    generate_short_code(SLOT_CODE_PREFIX)
}

pub fn round_money(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

pub fn percent_of(amount: f64, percent: f64) -> f64 {
    round_money(amount * percent / 100.0)
}
