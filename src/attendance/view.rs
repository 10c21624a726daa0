//! Per-date materialized attendance views.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::NaiveDate;
use moka::future::Cache;

use crate::model::attendance::AttendanceRecord;

/// Complete record set for one date, keyed by employee.
#[derive(Debug, Default)]
pub struct DayView {
    order: Vec<u64>,
    records: RwLock<BTreeMap<u64, AttendanceRecord>>,
}

impl DayView {
    /// Keeps `records` order for later reads.
    pub fn new(records: Vec<AttendanceRecord>) -> Self {
        let order = records.iter().map(|record| record.employee_id).collect();
        let records = records
            .into_iter()
            .map(|record| (record.employee_id, record))
            .collect();
        Self {
            order,
            records: RwLock::new(records),
        }
    }

    pub fn records(&self) -> Vec<AttendanceRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        self.order
            .iter()
            .filter_map(|employee_id| records.get(employee_id).cloned())
            .collect()
    }

    pub fn get(&self, employee_id: u64) -> Option<AttendanceRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&employee_id)
            .cloned()
    }

    /// Replace the record of an employee already in the view.
    fn replace(&self, record: &AttendanceRecord) -> bool {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        match records.get_mut(&record.employee_id) {
            Some(slot) => {
                *slot = record.clone();
                true
            }
            None => false,
        }
    }
}

#[derive(Clone)]
pub struct DayViewCache {
    views: Cache<NaiveDate, Arc<DayView>>,
}

impl DayViewCache {
    pub fn new(max_capacity: u64, time_to_live: Duration) -> Self {
        Self {
            views: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(time_to_live)
                .build(),
        }
    }

    /// Cached view of `date`, built from `load` on a miss.
    ///
    /// Concurrent misses for one date share a single `load`. A failed load
    /// is reported to every waiter and nothing is cached.
    pub async fn get_or_load<F, E>(&self, date: NaiveDate, load: F) -> Result<Arc<DayView>, Arc<E>>
    where
        F: Future<Output = Result<Vec<AttendanceRecord>, E>>,
        E: Send + Sync + 'static,
    {
        self.views
            .try_get_with(date, async move {
                load.await.map(|records| Arc::new(DayView::new(records)))
            })
            .await
    }

    /// Mirror a persisted mutation into the cached baseline of its date.
    ///
    /// Returns false when the date is not cached or the employee is not part
    /// of the cached view; the next read materializes from storage anyway.
    pub async fn apply(&self, record: &AttendanceRecord) -> bool {
        match self.views.get(&record.date).await {
            Some(view) => view.replace(record),
            None => false,
        }
    }

    pub async fn invalidate(&self, date: NaiveDate) {
        self.views.invalidate(&date).await;
    }
}
