pub mod availability;
pub mod doctor;
pub mod schedule;
pub mod slots;
pub mod validation;

pub use availability::BookingCounter;
pub use doctor::DoctorService;
pub use schedule::ScheduleService;
pub use slots::SlotAllocator;
