use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::error::RecordError;
use crate::lifecycle::{Appointment, AppointmentStatus, NewAppointment};

/// Authoritative storage of appointment records and the hospital/department
/// ownership they are validated against.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records that `department_id` belongs to `hospital_id`. Returns true if newly registered.
    async fn register_department(&self, hospital_id: u64, department_id: u64) -> Result<bool, RecordError>;

    /// Creates a `Pending` record with a freshly assigned, monotonically increasing id.
    /// Rejects a department that does not belong to the given hospital.
    async fn create_appointment(&self, fields: NewAppointment) -> Result<Appointment, RecordError>;

    async fn get_appointment(&self, id: u64) -> Result<Appointment, RecordError>;

    /// Compare-and-set status write: fails with `StatusChanged` unless the
    /// record is still in `expected`.
    async fn set_appointment_status(
        &self,
        id: u64,
        expected: AppointmentStatus,
        status: AppointmentStatus,
    ) -> Result<Appointment, RecordError>;

    async fn list_by_hospital(&self, hospital_id: u64) -> Result<Vec<Appointment>, RecordError>;

    async fn list_by_patient(&self, patient_id: u64) -> Result<Vec<Appointment>, RecordError>;

    async fn list_by_department(
        &self,
        hospital_id: u64,
        department_id: u64,
    ) -> Result<Vec<Appointment>, RecordError>;
}

/// In-process record store.
pub struct MemoryRecordStore {
    next_id: AtomicU64,
    appointments: DashMap<u64, Appointment>,
    // department id -> owning hospital id
    departments: DashMap<u64, u64>,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::with_first_id(1)
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts id assignment at `first_id`.
    pub fn with_first_id(first_id: u64) -> Self {
        Self {
            next_id: AtomicU64::new(first_id),
            appointments: DashMap::new(),
            departments: DashMap::new(),
        }
    }

    fn collect_sorted<F>(&self, keep: F) -> Vec<Appointment>
    where
        F: Fn(&Appointment) -> bool,
    {
        let mut out: Vec<Appointment> = self
            .appointments
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        out.sort_by_key(|a| a.id);
        out
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn register_department(&self, hospital_id: u64, department_id: u64) -> Result<bool, RecordError> {
        match self.departments.entry(department_id) {
            Entry::Vacant(slot) => {
                slot.insert(hospital_id);
                Ok(true)
            }
            Entry::Occupied(slot) if *slot.get() == hospital_id => Ok(false),
            Entry::Occupied(slot) => Err(RecordError::DepartmentOwned {
                department_id,
                owner: *slot.get(),
            }),
        }
    }

    async fn create_appointment(&self, fields: NewAppointment) -> Result<Appointment, RecordError> {
        let owner = self.departments.get(&fields.department_id).map(|h| *h);
        if owner != Some(fields.hospital_id) {
            return Err(RecordError::UnknownDepartment {
                hospital_id: fields.hospital_id,
                department_id: fields.department_id,
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let appointment = Appointment {
            id,
            patient_id: fields.patient_id,
            hospital_id: fields.hospital_id,
            department_id: fields.department_id,
            title: fields.title,
            time: fields.time,
            status: AppointmentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.appointments.insert(id, appointment.clone());
        debug!(id, "appointment record created");
        Ok(appointment)
    }

    async fn get_appointment(&self, id: u64) -> Result<Appointment, RecordError> {
        self.appointments
            .get(&id)
            .map(|a| a.clone())
            .ok_or(RecordError::NotFound(id))
    }

    async fn set_appointment_status(
        &self,
        id: u64,
        expected: AppointmentStatus,
        status: AppointmentStatus,
    ) -> Result<Appointment, RecordError> {
        let mut record = self.appointments.get_mut(&id).ok_or(RecordError::NotFound(id))?;
        if record.status != expected {
            return Err(RecordError::StatusChanged { current: record.status });
        }
        record.status = status;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn list_by_hospital(&self, hospital_id: u64) -> Result<Vec<Appointment>, RecordError> {
        Ok(self.collect_sorted(|a| a.hospital_id == hospital_id))
    }

    async fn list_by_patient(&self, patient_id: u64) -> Result<Vec<Appointment>, RecordError> {
        Ok(self.collect_sorted(|a| a.patient_id == patient_id))
    }

    async fn list_by_department(
        &self,
        hospital_id: u64,
        department_id: u64,
    ) -> Result<Vec<Appointment>, RecordError> {
        Ok(self.collect_sorted(|a| a.hospital_id == hospital_id && a.department_id == department_id))
    }
}
