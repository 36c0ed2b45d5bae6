use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::lifecycle::{AppointmentCoordinator, DepartmentQueues, QueuePosition};
use crate::parser::{EventLog, ReplayEvent, RowIssue};
use crate::queue::MemoryQueueStore;
use crate::records::MemoryRecordStore;

/// Final state after replaying an event log.
#[derive(Debug, Default)]
pub struct ReplayOutcome {
    pub applied: usize,
    pub issues: Vec<RowIssue>,
    pub departments: Vec<DepartmentQueues>,
    /// (appointment id, position) for every confirmed appointment, department by department.
    pub positions: Vec<(u64, QueuePosition)>,
}

/// Replays `log` against fresh in-memory stores. Departments are registered
/// to the first hospital that books into them.
pub async fn replay(log: EventLog) -> Result<ReplayOutcome> {
    let coordinator = AppointmentCoordinator::new(
        Arc::new(MemoryRecordStore::new()),
        Arc::new(MemoryQueueStore::new()),
    );

    let mut outcome = ReplayOutcome { issues: log.rejected, ..Default::default() };
    let mut seen_departments = BTreeSet::new();

    for event in log.events {
        let line = event.line();
        let result = match event {
            ReplayEvent::Book { request, .. } => {
                if let (Some(h), Some(d)) = (request.hospital_id, request.department_id) {
                    if !seen_departments.contains(&(h, d)) {
                        match coordinator.register_department(h, d).await {
                            Ok(_) => {
                                seen_departments.insert((h, d));
                            }
                            // the booking below is rejected for the same reason
                            Err(e) => debug!(line, error = %e, "department not registered"),
                        }
                    }
                }
                coordinator.book_appointment(request).await.map(|b| {
                    debug!(line, appointment_id = b.appointment.id, "replayed booking");
                })
            }
            ReplayEvent::Status { appointment_id, hospital_id, status, .. } => coordinator
                .update_status(appointment_id, &status, hospital_id)
                .await
                .map(|_| ()),
        };

        match result {
            Ok(()) => outcome.applied += 1,
            Err(e) => {
                warn!(line, error = %e, "replay event rejected");
                outcome.issues.push(RowIssue { line, message: e.to_string() });
            }
        }
    }

    outcome.issues.sort_by_key(|issue| issue.line);

    for (hospital_id, department_id) in seen_departments {
        let snapshot = coordinator.queue_snapshot(hospital_id, department_id).await?;
        for id in &snapshot.confirmed {
            if let Some(position) = coordinator.check_queue_status(*id).await?.queue {
                outcome.positions.push((*id, position));
            }
        }
        outcome.departments.push(snapshot);
    }

    Ok(outcome)
}
