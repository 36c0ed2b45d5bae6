use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;
use crate::queue::QueueKind;

/// Appointment status. `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    #[serde(alias = "Scheduled")]
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "Pending",
            AppointmentStatus::Confirmed => "Confirmed",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    /// The queue an appointment in this status must occupy, if any.
    pub fn queue(&self) -> Option<QueueKind> {
        match self {
            AppointmentStatus::Pending => Some(QueueKind::Pending),
            AppointmentStatus::Confirmed => Some(QueueKind::Confirmed),
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => None,
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Pending" | "Scheduled" => Ok(AppointmentStatus::Pending),
            "Confirmed" => Ok(AppointmentStatus::Confirmed),
            "Completed" => Ok(AppointmentStatus::Completed),
            "Cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(LifecycleError::InvalidStatus(other.to_string())),
        }
    }
}

/// Authoritative appointment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: u64,
    pub patient_id: u64,
    pub hospital_id: u64,
    pub department_id: u64,
    pub title: String,
    pub time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated fields for a new record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAppointment {
    pub patient_id: u64,
    pub hospital_id: u64,
    pub department_id: u64,
    pub title: String,
    pub time: DateTime<Utc>,
}

/// Booking input as it arrives from a caller; any field may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub patient_id: Option<u64>,
    pub hospital_id: Option<u64>,
    pub department_id: Option<u64>,
    pub title: Option<String>,
    pub time: Option<DateTime<Utc>>,
}

impl BookingRequest {
    pub fn validate(self) -> Result<NewAppointment, LifecycleError> {
        let patient_id = self.patient_id.ok_or(LifecycleError::MissingField("patientId"))?;
        let hospital_id = self.hospital_id.ok_or(LifecycleError::MissingField("hospitalId"))?;
        let department_id = self
            .department_id
            .ok_or(LifecycleError::MissingField("departmentId"))?;
        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(LifecycleError::MissingField("title"))?;
        let time = self.time.ok_or(LifecycleError::MissingField("time"))?;

        Ok(NewAppointment { patient_id, hospital_id, department_id, title, time })
    }
}

/// Result of a booking. `queued` is false when the record exists but the
/// pending-queue insert failed and needs reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct Booking {
    pub appointment: Appointment,
    pub queued: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuePosition {
    pub user_position: usize,
    pub people_ahead: usize,
    pub total_queue_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub status: AppointmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<QueuePosition>,
}

/// What a repair pass changed for a single appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub appointment_id: u64,
    pub status: AppointmentStatus,
    pub inserted: Option<QueueKind>,
    pub removed: Vec<QueueKind>,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        self.inserted.is_some() || !self.removed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvictedMember {
    pub queue: QueueKind,
    pub appointment_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentReconcileReport {
    pub hospital_id: u64,
    pub department_id: u64,
    pub repaired: Vec<ReconcileReport>,
    pub evicted: Vec<EvictedMember>,
}

/// Fresh read of both queues of one department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentQueues {
    pub hospital_id: u64,
    pub department_id: u64,
    pub pending: Vec<u64>,
    pub confirmed: Vec<u64>,
}
