pub mod coordinator;
pub mod transitions;
pub mod types;

pub use coordinator::AppointmentCoordinator;
pub use transitions::{allowed_targets, check_transition, QueueMove};
pub use types::{
    Appointment, AppointmentStatus, Booking, BookingRequest, DepartmentQueues,
    DepartmentReconcileReport, EvictedMember, NewAppointment, QueuePosition, QueueStatus,
    ReconcileReport,
};
