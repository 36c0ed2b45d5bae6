//! Per-department appointment queues.
//!
//! Each (hospital, department) pair owns a pending and a confirmed queue,
//! both ordered by appointment id. The [`lifecycle::AppointmentCoordinator`]
//! keeps queue membership in step with the authoritative appointment record
//! and answers "where do I stand" from the confirmed queue.

pub mod config;
pub mod display;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod parser;
pub mod queue;
pub mod records;
pub mod replay;
pub mod web;

pub use error::{ConfigError, LifecycleError, RecordError, StoreError};
pub use lifecycle::{Appointment, AppointmentCoordinator, AppointmentStatus, BookingRequest};
pub use queue::{MemoryQueueStore, QueueKey, QueueKind, QueueStore};
pub use records::{MemoryRecordStore, RecordStore};
