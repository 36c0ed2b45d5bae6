use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use super::transitions::{check_transition, QueueMove};
use super::types::{
    Appointment, AppointmentStatus, Booking, BookingRequest, DepartmentQueues,
    DepartmentReconcileReport, EvictedMember, QueuePosition, QueueStatus, ReconcileReport,
};
use crate::error::{LifecycleError, RecordError, Result};
use crate::queue::{QueueKey, QueueKind, QueueStore};
use crate::records::RecordStore;

/// Owns the appointment state machine and every queue membership change.
///
/// The record write and the queue move are a best-effort sequential pair:
/// the record is always written first, and queue operations are idempotent
/// so a repeated or repaired call converges on the same end state.
#[derive(Clone)]
pub struct AppointmentCoordinator {
    records: Arc<dyn RecordStore>,
    queues: Arc<dyn QueueStore>,
}

fn queue_key(appointment: &Appointment, kind: QueueKind) -> QueueKey {
    QueueKey::new(appointment.hospital_id, appointment.department_id, kind)
}

impl AppointmentCoordinator {
    pub fn new(records: Arc<dyn RecordStore>, queues: Arc<dyn QueueStore>) -> Self {
        Self { records, queues }
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    pub fn queues(&self) -> &Arc<dyn QueueStore> {
        &self.queues
    }

    /// Creates a `Pending` record, then enqueues it in its department's pending queue.
    ///
    /// A failed queue insert does not fail the booking: the record already
    /// exists, so the booking is reported with `queued: false` and left for
    /// reconciliation.
    #[instrument(skip(self, request))]
    pub async fn book_appointment(&self, request: BookingRequest) -> Result<Booking> {
        let fields = request.validate()?;
        let appointment = self.records.create_appointment(fields).await?;

        let key = queue_key(&appointment, QueueKind::Pending);
        let queued = match self.queues.insert(&key, appointment.id, appointment.id).await {
            Ok(_) => {
                self.settle(&appointment).await;
                true
            }
            Err(e) => {
                warn!(
                    appointment_id = appointment.id,
                    %key,
                    error = %e,
                    "appointment booked but not queued; reconcile to repair"
                );
                false
            }
        };

        info!(
            appointment_id = appointment.id,
            hospital_id = appointment.hospital_id,
            department_id = appointment.department_id,
            queued,
            "appointment booked"
        );
        Ok(Booking { appointment, queued })
    }

    /// Applies a status change requested by `caller_hospital_id`.
    ///
    /// Rejections (not found, forbidden, invalid status, illegal transition,
    /// lost race) leave the record untouched. Only a repeat of the current
    /// status touches the queues, and then only to repair them.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        appointment_id: u64,
        requested_status: &str,
        caller_hospital_id: u64,
    ) -> Result<Appointment> {
        let current = self.authorized(appointment_id, caller_hospital_id).await?;
        let target: AppointmentStatus = requested_status.parse()?;
        if target == current.status && target != AppointmentStatus::Pending {
            return self.repeat_status(current).await;
        }
        check_transition(current.status, target)?;

        let updated = self
            .records
            .set_appointment_status(appointment_id, current.status, target)
            .await
            .map_err(|e| match e {
                RecordError::StatusChanged { current } => {
                    warn!(appointment_id, %current, %target, "lost status transition race");
                    LifecycleError::Conflict { appointment_id, current }
                }
                other => other.into(),
            })?;

        let mv = QueueMove::for_transition(current.status, target);
        if let Err(source) = self.apply_move(&updated, &mv).await {
            error!(
                appointment_id,
                from = %current.status,
                to = %target,
                error = %source,
                "status persisted but queue move failed; reconcile to repair"
            );
            return Err(LifecycleError::QueueMoveFailed {
                appointment: Box::new(updated),
                source,
            });
        }

        self.settle(&updated).await;

        info!(appointment_id, from = %current.status, to = %target, "appointment status updated");
        Ok(updated)
    }

    /// A repeat of the transition that produced the record's current status.
    /// The earlier attempt may have failed halfway through its queue move, so
    /// membership is brought in line with the record first. A repeated
    /// `Confirmed` then succeeds without further effect; a repeated terminal
    /// status is still rejected.
    async fn repeat_status(&self, current: Appointment) -> Result<Appointment> {
        let report = self.reconcile_record(&current).await?;
        self.settle(&current).await;

        if current.status.is_terminal() {
            warn!(
                appointment_id = current.id,
                status = %current.status,
                repaired = report.changed(),
                "repeated terminal transition rejected"
            );
            return Err(LifecycleError::IllegalTransition {
                from: current.status,
                to: current.status,
            });
        }

        debug!(
            appointment_id = current.id,
            status = %current.status,
            repaired = report.changed(),
            "repeated status update"
        );
        Ok(current)
    }

    /// Re-reads the record after a queue write. If another transition landed
    /// in between, our write may have re-added a stale entry, so membership is
    /// reconciled against the newer status. The repair writes can be stale in
    /// turn, so this repeats until the status read before a round of writes
    /// is still current after it. Statuses only move forward, which bounds
    /// the number of rounds.
    async fn settle(&self, written: &Appointment) {
        let mut applied = written.status;
        for _ in 0..AppointmentStatus::ALL.len() {
            let latest = match self.records.get_appointment(written.id).await {
                Ok(latest) if latest.status == applied => return,
                Ok(latest) => latest,
                Err(e) => {
                    warn!(appointment_id = written.id, error = %e, "could not re-check queue membership");
                    return;
                }
            };
            debug!(
                appointment_id = written.id,
                applied = %applied,
                latest = %latest.status,
                "status moved on during queue write"
            );
            if let Err(e) = self.reconcile_record(&latest).await {
                warn!(appointment_id = written.id, error = %e, "could not re-check queue membership");
                return;
            }
            applied = latest.status;
        }
        warn!(appointment_id = written.id, "queue membership still settling; reconcile to repair");
    }

    async fn apply_move(
        &self,
        appointment: &Appointment,
        mv: &QueueMove,
    ) -> std::result::Result<(), crate::error::StoreError> {
        for kind in &mv.remove {
            self.queues.remove(&queue_key(appointment, *kind), appointment.id).await?;
        }
        if let Some(kind) = mv.insert {
            // Score stays the id so confirmation keeps booking order.
            self.queues
                .insert(&queue_key(appointment, kind), appointment.id, appointment.id)
                .await?;
        }
        Ok(())
    }

    /// Reports the appointment's status, plus its place in the confirmed
    /// queue when it is `Confirmed`.
    #[instrument(skip(self))]
    pub async fn check_queue_status(&self, appointment_id: u64) -> Result<QueueStatus> {
        let appointment = self.records.get_appointment(appointment_id).await?;
        if appointment.status != AppointmentStatus::Confirmed {
            return Ok(QueueStatus { status: appointment.status, queue: None });
        }

        let key = queue_key(&appointment, QueueKind::Confirmed);
        let rank = match self.queues.rank(&key, appointment_id).await? {
            Some(rank) => rank,
            None => {
                error!(appointment_id, %key, "confirmed appointment missing from confirmed queue");
                return Err(LifecycleError::Inconsistent {
                    appointment_id,
                    status: appointment.status,
                    detail: format!("not a member of {key}"),
                });
            }
        };
        let total_queue_length = self.queues.cardinality(&key).await?;

        Ok(QueueStatus {
            status: appointment.status,
            queue: Some(QueuePosition {
                user_position: rank + 1,
                people_ahead: rank,
                total_queue_length,
            }),
        })
    }

    /// Brings the appointment's queue membership back in line with its record.
    #[instrument(skip(self))]
    pub async fn reconcile_appointment(
        &self,
        appointment_id: u64,
        caller_hospital_id: u64,
    ) -> Result<ReconcileReport> {
        let appointment = self.authorized(appointment_id, caller_hospital_id).await?;
        self.reconcile_record(&appointment).await
    }

    async fn reconcile_record(&self, appointment: &Appointment) -> Result<ReconcileReport> {
        let expected = appointment.status.queue();
        let mut report = ReconcileReport {
            appointment_id: appointment.id,
            status: appointment.status,
            inserted: None,
            removed: Vec::new(),
        };

        for kind in QueueKind::ALL {
            let key = queue_key(appointment, kind);
            if Some(kind) == expected {
                if self.queues.insert(&key, appointment.id, appointment.id).await? {
                    report.inserted = Some(kind);
                }
            } else if self.queues.remove(&key, appointment.id).await? {
                report.removed.push(kind);
            }
        }

        if report.changed() {
            info!(
                appointment_id = appointment.id,
                status = %appointment.status,
                inserted = ?report.inserted,
                removed = ?report.removed,
                "queue membership repaired"
            );
        }
        Ok(report)
    }

    /// Repairs every appointment of a department and evicts queue members
    /// that have no record there.
    #[instrument(skip(self))]
    pub async fn reconcile_department(
        &self,
        hospital_id: u64,
        department_id: u64,
    ) -> Result<DepartmentReconcileReport> {
        let appointments = self.records.list_by_department(hospital_id, department_id).await?;

        let mut repaired = Vec::new();
        for appointment in &appointments {
            let report = self.reconcile_record(appointment).await?;
            if report.changed() {
                repaired.push(report);
            }
        }

        let known: HashSet<u64> = appointments.iter().map(|a| a.id).collect();
        let mut evicted = Vec::new();
        for kind in QueueKind::ALL {
            let key = QueueKey::new(hospital_id, department_id, kind);
            for member in self.queues.members(&key).await? {
                if !known.contains(&member) && self.queues.remove(&key, member).await? {
                    warn!(%key, member, "evicted queue member without a record");
                    evicted.push(EvictedMember { queue: kind, appointment_id: member });
                }
            }
        }

        info!(
            hospital_id,
            department_id,
            repaired = repaired.len(),
            evicted = evicted.len(),
            "department reconciled"
        );
        Ok(DepartmentReconcileReport { hospital_id, department_id, repaired, evicted })
    }

    /// Fresh ordered view of a department's two queues.
    pub async fn queue_snapshot(&self, hospital_id: u64, department_id: u64) -> Result<DepartmentQueues> {
        let pending = self.queues.members(&QueueKey::pending(hospital_id, department_id)).await?;
        let confirmed = self.queues.members(&QueueKey::confirmed(hospital_id, department_id)).await?;
        Ok(DepartmentQueues { hospital_id, department_id, pending, confirmed })
    }

    pub async fn register_department(&self, hospital_id: u64, department_id: u64) -> Result<bool> {
        let added = self.records.register_department(hospital_id, department_id).await?;
        if added {
            info!(hospital_id, department_id, "department registered");
        }
        Ok(added)
    }

    pub async fn list_hospital_appointments(&self, hospital_id: u64) -> Result<Vec<Appointment>> {
        Ok(self.records.list_by_hospital(hospital_id).await?)
    }

    pub async fn list_patient_appointments(&self, patient_id: u64) -> Result<Vec<Appointment>> {
        Ok(self.records.list_by_patient(patient_id).await?)
    }

    async fn authorized(&self, appointment_id: u64, caller_hospital_id: u64) -> Result<Appointment> {
        let appointment = self.records.get_appointment(appointment_id).await?;
        if appointment.hospital_id != caller_hospital_id {
            warn!(
                appointment_id,
                owner = appointment.hospital_id,
                caller_hospital_id,
                "cross-hospital access rejected"
            );
            return Err(LifecycleError::Forbidden { appointment_id, caller_hospital_id });
        }
        Ok(appointment)
    }
}
