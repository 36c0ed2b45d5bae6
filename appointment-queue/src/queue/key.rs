use std::fmt;

use serde::{Deserialize, Serialize};

/// The two waiting lines every department owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    Pending,
    Confirmed,
}

impl QueueKind {
    pub const ALL: [QueueKind; 2] = [QueueKind::Pending, QueueKind::Confirmed];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueKind::Pending => "pending",
            QueueKind::Confirmed => "confirmed",
        }
    }
}

/// Names one ordered collection: (hospital, department, kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueKey {
    pub hospital_id: u64,
    pub department_id: u64,
    pub kind: QueueKind,
}

impl QueueKey {
    pub fn new(hospital_id: u64, department_id: u64, kind: QueueKind) -> Self {
        Self { hospital_id, department_id, kind }
    }

    pub fn pending(hospital_id: u64, department_id: u64) -> Self {
        Self::new(hospital_id, department_id, QueueKind::Pending)
    }

    pub fn confirmed(hospital_id: u64, department_id: u64) -> Self {
        Self::new(hospital_id, department_id, QueueKind::Confirmed)
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "queue:{}:{}:{}",
            self.hospital_id,
            self.department_id,
            self.kind.as_str()
        )
    }
}
