use std::fmt::Display;

use serde::Serialize;
use tracing::warn;

/// Outcome counters of a single daemon tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub scanned: usize,
    pub updated: usize,
    pub failed: usize,
}

impl TickReport {
    /// Fold one appointment's outcome into the report. Failures are logged
    /// and counted so the rest of the batch still runs.
    pub fn record<E: Display>(&mut self, daemon: &str, appointment_code: &str, outcome: Result<bool, E>) {
        self.scanned += 1;
        match outcome {
            Ok(true) => self.updated += 1,
            Ok(false) => {}
            Err(e) => {
                self.failed += 1;
                warn!("{} failed on appointment {}: {}", daemon, appointment_code, e);
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        self.updated == 0 && self.failed == 0
    }
}
