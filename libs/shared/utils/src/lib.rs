pub mod clock;
pub mod codes;
pub mod test_utils;
pub mod time;

pub use clock::{Clock, ManualClock, SystemClock};
pub use time::{OperatingTimezone, TimeRange, TimeRangeError};
