//! Persistence seams for attendance records and the active roster.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::StoreError;
use crate::model::attendance::{AttendanceRecord, Snapshot};
use crate::model::employee::Employee;

#[cfg(test)]
pub mod memory;
pub mod mysql;

/// Condition a write must satisfy to be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// The stored arrival/departure must still equal the snapshot.
    Matches(Snapshot),
    Unconditional,
}

#[derive(Debug, Clone)]
pub struct RecordWrite {
    pub record: AttendanceRecord,
    pub precondition: Precondition,
}

impl RecordWrite {
    pub fn guarded(record: AttendanceRecord, based_on: &AttendanceRecord) -> Self {
        Self {
            record,
            precondition: Precondition::Matches(based_on.snapshot()),
        }
    }

    pub fn unconditional(record: AttendanceRecord) -> Self {
        Self {
            record,
            precondition: Precondition::Unconditional,
        }
    }
}

/// Supplies the employees currently eligible for attendance tracking.
#[async_trait]
pub trait RosterProvider: Send + Sync {
    async fn list_active_employees(&self) -> Result<Vec<Employee>, StoreError>;
}

/// Durable attendance storage keyed by `(employee_id, date)`.
///
/// Implementations must apply each write atomically per key: a
/// `Precondition::Matches` write either lands in full or fails with
/// `StoreError::Conflict`, never as a read followed by a separate write.
/// Records returned here carry persisted fields only; derived fields are
/// recomputed by the presence engine.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn get_records(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, StoreError>;

    /// Records with `from <= date <= to`.
    async fn get_records_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;

    /// Insert synthesized defaults, skipping keys that already exist.
    /// Returns the number of rows inserted.
    async fn insert_defaults(&self, records: &[AttendanceRecord]) -> Result<u64, StoreError>;

    async fn upsert_record(&self, write: RecordWrite) -> Result<AttendanceRecord, StoreError>;

    /// Applies each write independently; one result per write, in order.
    async fn upsert_bulk(
        &self,
        writes: Vec<RecordWrite>,
    ) -> Vec<Result<AttendanceRecord, StoreError>> {
        let mut results = Vec::with_capacity(writes.len());
        for write in writes {
            results.push(self.upsert_record(write).await);
        }
        results
    }
}
