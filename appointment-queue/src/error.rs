use thiserror::Error;

use crate::lifecycle::{Appointment, AppointmentStatus};

/// Failures of the queue store backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("queue store unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the authoritative appointment record store.
#[derive(Debug, Clone, Error)]
pub enum RecordError {
    #[error("appointment {0} not found")]
    NotFound(u64),

    #[error("department {department_id} does not belong to hospital {hospital_id}")]
    UnknownDepartment { hospital_id: u64, department_id: u64 },

    #[error("department {department_id} is already registered to hospital {owner}")]
    DepartmentOwned { department_id: u64, owner: u64 },

    #[error("appointment status changed concurrently, now {current}")]
    StatusChanged { current: AppointmentStatus },

    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported queue store address '{0}'")]
    UnsupportedQueueStore(String),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Everything the lifecycle coordinator can surface to a caller.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("invalid status transition from {from} to {to}")]
    IllegalTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("appointment {0} not found")]
    NotFound(u64),

    #[error("department {department_id} not found for hospital {hospital_id}")]
    UnknownDepartment { hospital_id: u64, department_id: u64 },

    #[error("department {department_id} is registered to another hospital")]
    DepartmentOwned { department_id: u64 },

    #[error("appointment {appointment_id} does not belong to hospital {caller_hospital_id}")]
    Forbidden {
        appointment_id: u64,
        caller_hospital_id: u64,
    },

    #[error("appointment {appointment_id} changed concurrently (now {current})")]
    Conflict {
        appointment_id: u64,
        current: AppointmentStatus,
    },

    #[error("appointment {appointment_id} is {status} but its queue entry is inconsistent: {detail}")]
    Inconsistent {
        appointment_id: u64,
        status: AppointmentStatus,
        detail: String,
    },

    #[error("appointment {} updated to {} but queue move failed: {}", .appointment.id, .appointment.status, .source)]
    QueueMoveFailed {
        appointment: Box<Appointment>,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Records(RecordError),
}

impl From<RecordError> for LifecycleError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NotFound(id) => LifecycleError::NotFound(id),
            RecordError::UnknownDepartment { hospital_id, department_id } => {
                LifecycleError::UnknownDepartment { hospital_id, department_id }
            }
            RecordError::DepartmentOwned { department_id, .. } => {
                LifecycleError::DepartmentOwned { department_id }
            }
            other => LifecycleError::Records(other),
        }
    }
}

impl LifecycleError {
    /// Stable machine-readable reason.
    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::MissingField(_) => "MISSING_FIELD",
            LifecycleError::InvalidStatus(_) => "INVALID_STATUS",
            LifecycleError::IllegalTransition { .. } => "INVALID_TRANSITION",
            LifecycleError::NotFound(_) => "APPOINTMENT_NOT_FOUND",
            LifecycleError::UnknownDepartment { .. } => "DEPARTMENT_NOT_FOUND",
            LifecycleError::DepartmentOwned { .. } => "DEPARTMENT_TAKEN",
            LifecycleError::Forbidden { .. } => "FORBIDDEN",
            LifecycleError::Conflict { .. } => "CONFLICT",
            LifecycleError::Inconsistent { .. } => "QUEUE_ENTRY_MISSING",
            LifecycleError::QueueMoveFailed { .. } => "QUEUE_MOVE_FAILED",
            LifecycleError::Store(_) => "QUEUE_STORE_UNAVAILABLE",
            LifecycleError::Records(_) => "RECORD_STORE_UNAVAILABLE",
        }
    }

    /// Infrastructure failures the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LifecycleError::Store(_)
                | LifecycleError::Records(_)
                | LifecycleError::QueueMoveFailed { .. }
        )
    }
}

pub type Result<T, E = LifecycleError> = std::result::Result<T, E>;
