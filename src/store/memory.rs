//! In-process roster and attendance storage used by the test suites.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::StoreError;
use crate::model::attendance::AttendanceRecord;
use crate::model::employee::Employee;
use crate::store::{AttendanceStore, Precondition, RecordWrite, RosterProvider};

#[derive(Default)]
pub struct InMemoryAttendanceStore {
    rows: Mutex<BTreeMap<(NaiveDate, u64), AttendanceRecord>>,
    reads: AtomicUsize,
}

impl InMemoryAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get_records*` calls served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn row(&self, employee_id: u64, date: NaiveDate) -> Option<AttendanceRecord> {
        self.lock().get(&(date, employee_id)).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<(NaiveDate, u64), AttendanceRecord>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persisted(record: &AttendanceRecord) -> AttendanceRecord {
        AttendanceRecord {
            worked_seconds: None,
            lateness_seconds: None,
            ..record.clone()
        }
    }
}

#[async_trait]
impl AttendanceStore for InMemoryAttendanceStore {
    async fn get_records(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.get_records_between(date, date).await
    }

    async fn get_records_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if from > to {
            return Ok(Vec::new());
        }
        Ok(self
            .lock()
            .range((from, u64::MIN)..=(to, u64::MAX))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn insert_defaults(&self, records: &[AttendanceRecord]) -> Result<u64, StoreError> {
        let mut rows = self.lock();
        let mut inserted = 0;
        for record in records {
            rows.entry((record.date, record.employee_id)).or_insert_with(|| {
                inserted += 1;
                Self::persisted(record)
            });
        }
        Ok(inserted)
    }

    async fn upsert_record(&self, write: RecordWrite) -> Result<AttendanceRecord, StoreError> {
        let key = (write.record.date, write.record.employee_id);
        let mut rows = self.lock();

        if let Precondition::Matches(expected) = write.precondition {
            let current = rows.get(&key).map(AttendanceRecord::snapshot);
            if current != Some(expected) {
                return Err(StoreError::Conflict {
                    employee_id: write.record.employee_id,
                    date: write.record.date,
                });
            }
        }

        rows.insert(key, Self::persisted(&write.record));
        Ok(write.record)
    }
}

pub struct StaticRoster {
    employees: Mutex<Vec<Employee>>,
}

impl StaticRoster {
    pub fn new(employees: Vec<Employee>) -> Self {
        Self {
            employees: Mutex::new(employees),
        }
    }

    pub fn hire(&self, employee: Employee) {
        self.employees
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(employee);
    }
}

#[async_trait]
impl RosterProvider for StaticRoster {
    async fn list_active_employees(&self) -> Result<Vec<Employee>, StoreError> {
        Ok(self
            .employees
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::AttendanceStatus;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    #[actix_web::test]
    async fn guarded_write_conflicts_when_row_moved_on() {
        let store = InMemoryAttendanceStore::new();
        let base = AttendanceRecord::absent(1, day());
        store.insert_defaults(&[base.clone()]).await.unwrap();

        let mut arrived = base.clone();
        arrived.arrival_time = day().and_hms_opt(9, 0, 0);
        arrived.status = AttendanceStatus::Present;
        store
            .upsert_record(RecordWrite::guarded(arrived.clone(), &base))
            .await
            .unwrap();

        let mut late = base.clone();
        late.arrival_time = day().and_hms_opt(9, 30, 0);
        late.status = AttendanceStatus::Late;
        let err = store
            .upsert_record(RecordWrite::guarded(late, &base))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict { employee_id: 1, .. }));
        assert_eq!(store.row(1, day()), Some(arrived));
    }

    #[actix_web::test]
    async fn guarded_write_on_missing_row_conflicts() {
        let store = InMemoryAttendanceStore::new();
        let base = AttendanceRecord::absent(1, day());
        let err = store
            .upsert_record(RecordWrite::guarded(base.clone(), &base))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[actix_web::test]
    async fn insert_defaults_skips_existing_rows() {
        let store = InMemoryAttendanceStore::new();
        let mut present = AttendanceRecord::absent(1, day());
        present.arrival_time = day().and_hms_opt(8, 0, 0);
        present.status = AttendanceStatus::Present;
        store
            .upsert_record(RecordWrite::unconditional(present.clone()))
            .await
            .unwrap();

        let inserted = store
            .insert_defaults(&[AttendanceRecord::absent(1, day()), AttendanceRecord::absent(2, day())])
            .await
            .unwrap();

        assert_eq!(inserted, 1);
        assert_eq!(store.row(1, day()), Some(present));
    }
}
