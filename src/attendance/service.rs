use std::future::Future;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::attendance::aggregation::{
    PeriodKind, PeriodReport, PeriodStats, build_report, compute_stats, filter_by_period,
};
use crate::attendance::engine::PresenceEngine;
use crate::attendance::view::{DayView, DayViewCache};
use crate::error::{AttendanceError, StoreError};
use crate::model::attendance::AttendanceRecord;
use crate::model::employee::Employee;
use crate::store::{AttendanceStore, RecordWrite, RosterProvider};

/// One administrative presence correction.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PresenceToggle {
    #[schema(example = 1)]
    pub employee_id: u64,
    #[schema(example = "2024-06-10", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = true)]
    pub present: bool,
    /// Arrival to record when marking present; defaults to the expected start.
    #[schema(value_type = Option<String>, format = "date-time", nullable = true)]
    #[serde(default)]
    pub arrival_time: Option<NaiveDateTime>,
}

#[derive(Debug)]
pub struct ToggleOutcome {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub result: Result<AttendanceRecord, AttendanceError>,
}

/// Narrows period statistics.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsFilter {
    pub employee_id: Option<u64>,
}

impl StatsFilter {
    fn matches(&self, record: &AttendanceRecord) -> bool {
        self.employee_id
            .is_none_or(|employee_id| record.employee_id == employee_id)
    }
}

/// Attendance operations over the roster, the store and the per-date views.
pub struct AttendanceService {
    engine: PresenceEngine,
    roster: Arc<dyn RosterProvider>,
    store: Arc<dyn AttendanceStore>,
    views: DayViewCache,
}

impl AttendanceService {
    pub fn new(
        engine: PresenceEngine,
        roster: Arc<dyn RosterProvider>,
        store: Arc<dyn AttendanceStore>,
        views: DayViewCache,
    ) -> Self {
        Self {
            engine,
            roster,
            store,
            views,
        }
    }

    pub fn engine(&self) -> &PresenceEngine {
        &self.engine
    }

    pub async fn roster(&self) -> Result<Vec<Employee>, AttendanceError> {
        Ok(self.roster.list_active_employees().await?)
    }

    /// One record per active employee for `date`.
    #[instrument(skip(self))]
    pub async fn get_daily_view(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        Ok(self.view(date).await?.records())
    }

    /// Drop the cached view of `date` and rebuild it from storage.
    ///
    /// Never fails: if the backend is unavailable the date is simply left
    /// uncached and the next read materializes it again.
    #[instrument(skip(self))]
    pub async fn refresh(&self, date: NaiveDate) {
        self.views.invalidate(date).await;
        match self.view(date).await {
            Ok(view) => info!(%date, records = view.records().len(), "Attendance view refreshed"),
            Err(e) => warn!(error = %e, %date, "Attendance view refresh deferred"),
        }
    }

    #[instrument(skip(self))]
    pub async fn record_arrival(
        &self,
        employee_id: u64,
        date: NaiveDate,
        at: NaiveDateTime,
    ) -> Result<AttendanceRecord, AttendanceError> {
        self.retry_on_conflict(date, move || async move {
            let current = self.current_record(employee_id, date).await?;
            let next = self.engine.apply_arrival(&current, at)?;
            self.persist(RecordWrite::guarded(next, &current)).await
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn record_departure(
        &self,
        employee_id: u64,
        date: NaiveDate,
        at: NaiveDateTime,
    ) -> Result<AttendanceRecord, AttendanceError> {
        self.retry_on_conflict(date, move || async move {
            let current = self.current_record(employee_id, date).await?;
            let next = self.engine.apply_departure(&current, at)?;
            self.persist(RecordWrite::guarded(next, &current)).await
        })
        .await
    }

    /// Apply administrative corrections entry by entry.
    ///
    /// Outcomes are returned in input order; a failed entry never affects the
    /// others and nothing is rolled back. Writes for distinct employee days
    /// go to the store as one batch; a repeated employee day flushes the
    /// batch first so it is planned against the earlier entry's result.
    #[instrument(skip(self, entries), fields(entries = entries.len()))]
    pub async fn bulk_toggle_presence(&self, entries: Vec<PresenceToggle>) -> Vec<ToggleOutcome> {
        let mut results: Vec<Option<Result<AttendanceRecord, AttendanceError>>> =
            entries.iter().map(|_| None).collect();
        let mut batch: Vec<(usize, RecordWrite)> = Vec::new();

        for (index, entry) in entries.iter().enumerate() {
            let repeats_queued_day = batch.iter().any(|(queued, _)| {
                entries[*queued].employee_id == entry.employee_id
                    && entries[*queued].date == entry.date
            });
            if repeats_queued_day {
                self.flush_toggles(&entries, std::mem::take(&mut batch), &mut results)
                    .await;
            }

            match self.plan_toggle(entry).await {
                Ok(write) => batch.push((index, write)),
                Err(e) => results[index] = Some(Err(e)),
            }
        }
        self.flush_toggles(&entries, batch, &mut results).await;

        entries
            .iter()
            .zip(results)
            .map(|(entry, result)| ToggleOutcome {
                employee_id: entry.employee_id,
                date: entry.date,
                result: result.unwrap_or_else(|| {
                    Err(AttendanceError::Store {
                        source: StoreError::Corrupt {
                            reason: "presence toggle was not processed".to_string(),
                        },
                    })
                }),
            })
            .collect()
    }

    #[instrument(skip(self))]
    pub async fn get_period_stats(
        &self,
        kind: PeriodKind,
        reference: NaiveDate,
        filter: &StatsFilter,
    ) -> Result<PeriodStats, AttendanceError> {
        let records = self.period_records(kind, reference).await?;
        Ok(compute_stats(
            filter_by_period(&records, kind, reference)
                .into_iter()
                .filter(|record| filter.matches(record)),
        ))
    }

    #[instrument(skip(self))]
    pub async fn get_period_report(
        &self,
        kind: PeriodKind,
        reference: NaiveDate,
        filter: &StatsFilter,
    ) -> Result<PeriodReport, AttendanceError> {
        let records = self.period_records(kind, reference).await?;
        let selected: Vec<&AttendanceRecord> = filter_by_period(&records, kind, reference)
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect();
        Ok(build_report(selected.iter().copied()))
    }

    /// Persisted history of one employee between two dates, inclusive.
    #[instrument(skip(self))]
    pub async fn employee_history(
        &self,
        employee_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        if from > to {
            return Ok(Vec::new());
        }
        Ok(self
            .store
            .get_records_between(from, to)
            .await?
            .into_iter()
            .filter(|record| record.employee_id == employee_id)
            .map(|record| self.engine.derive(record))
            .collect())
    }

    /// Cached view of `date`, loading it once even under concurrent first reads.
    async fn view(&self, date: NaiveDate) -> Result<Arc<DayView>, AttendanceError> {
        self.views
            .get_or_load(date, self.load(date))
            .await
            .map_err(|shared| StoreError::unshare(shared).into())
    }

    async fn load(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, StoreError> {
        let roster = self.roster.list_active_employees().await?;
        let existing = self.store.get_records(date).await?;
        let records = self.engine.ensure_daily_records(date, &roster, &existing);

        let defaults: Vec<AttendanceRecord> = records
            .iter()
            .filter(|record| {
                !existing
                    .iter()
                    .any(|stored| stored.employee_id == record.employee_id)
            })
            .cloned()
            .collect();
        if !defaults.is_empty() {
            match self.store.insert_defaults(&defaults).await {
                Ok(inserted) => debug!(%date, inserted, "Synthesized absent defaults"),
                Err(e) => warn!(error = %e, %date, "Failed to persist absent defaults"),
            }
        }

        Ok(records)
    }

    async fn current_record(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<AttendanceRecord, AttendanceError> {
        if let Some(record) = self.view(date).await?.get(employee_id) {
            return Ok(record);
        }

        // Possibly hired after the view was built.
        debug!(employee_id, %date, "Employee missing from cached view, reloading");
        self.views.invalidate(date).await;
        self.view(date)
            .await?
            .get(employee_id)
            .ok_or(AttendanceError::UnknownEmployee { employee_id, date })
    }

    async fn persist(&self, write: RecordWrite) -> Result<AttendanceRecord, AttendanceError> {
        let saved = self.store.upsert_record(write).await?;
        Ok(self.mirror(saved).await)
    }

    async fn mirror(&self, saved: AttendanceRecord) -> AttendanceRecord {
        let record = self.engine.derive(saved);
        self.views.apply(&record).await;
        record
    }

    /// `present` writes are guarded even when the cached view already shows an
    /// arrival, so the store confirms it; `absent` always overwrites.
    async fn plan_toggle(&self, entry: &PresenceToggle) -> Result<RecordWrite, AttendanceError> {
        let current = self.current_record(entry.employee_id, entry.date).await?;
        let next = self
            .engine
            .apply_toggle(&current, entry.present, entry.arrival_time)?;

        Ok(if entry.present {
            RecordWrite::guarded(next, &current)
        } else {
            RecordWrite::unconditional(next)
        })
    }

    async fn flush_toggles(
        &self,
        entries: &[PresenceToggle],
        batch: Vec<(usize, RecordWrite)>,
        results: &mut [Option<Result<AttendanceRecord, AttendanceError>>],
    ) {
        if batch.is_empty() {
            return;
        }
        let (indices, writes): (Vec<usize>, Vec<RecordWrite>) = batch.into_iter().unzip();

        let mut written = self.store.upsert_bulk(writes).await.into_iter();
        for index in indices {
            let entry = &entries[index];
            let result = match written.next() {
                Some(Ok(saved)) => Ok(self.mirror(saved).await),
                Some(Err(StoreError::Conflict { .. })) => {
                    warn!(employee_id = entry.employee_id, date = %entry.date, "Presence toggle lost a race, retrying");
                    self.refresh(entry.date).await;
                    self.toggle_once(entry).await
                }
                Some(Err(e)) => Err(e.into()),
                None => Err(AttendanceError::Store {
                    source: StoreError::Corrupt {
                        reason: "bulk upsert returned fewer results than writes".to_string(),
                    },
                }),
            };
            results[index] = Some(result);
        }
    }

    async fn toggle_once(&self, entry: &PresenceToggle) -> Result<AttendanceRecord, AttendanceError> {
        let write = self.plan_toggle(entry).await?;
        self.persist(write).await
    }

    async fn period_records(
        &self,
        kind: PeriodKind,
        reference: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        let (from, to) = kind.bounds(reference);
        Ok(self
            .store
            .get_records_between(from, to)
            .await?
            .into_iter()
            .map(|record| self.engine.derive(record))
            .collect())
    }

    /// Runs `op`; on a lost race refreshes `date` and runs it exactly once more.
    async fn retry_on_conflict<T, F, Fut>(&self, date: NaiveDate, mut op: F) -> Result<T, AttendanceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttendanceError>>,
    {
        match op().await {
            Err(AttendanceError::PersistenceConflict { employee_id, .. }) => {
                warn!(employee_id, %date, "Attendance update lost a race, retrying");
                self.refresh(date).await;
                op().await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;
    use chrono::{Duration, NaiveTime};

    use super::*;
    use crate::model::attendance::AttendanceStatus;
    use crate::model::shift_policy::ShiftPolicy;
    use crate::store::memory::{InMemoryAttendanceStore, StaticRoster};

    const A: u64 = 1;
    const B: u64 = 2;
    const C: u64 = 3;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        day().and_hms_opt(h, m, 0).unwrap()
    }

    fn employee(id: u64) -> Employee {
        Employee {
            id,
            employee_code: format!("EMP-{id:03}"),
            display_name: format!("Employee {id}"),
        }
    }

    struct Fixture {
        service: AttendanceService,
        store: Arc<InMemoryAttendanceStore>,
        roster: Arc<StaticRoster>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryAttendanceStore::new());
        let roster = Arc::new(StaticRoster::new(vec![employee(A), employee(B), employee(C)]));
        let engine = PresenceEngine::new(ShiftPolicy::new(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            Duration::minutes(5),
        ));
        let service = AttendanceService::new(
            engine,
            roster.clone(),
            store.clone(),
            DayViewCache::new(32, StdDuration::from_secs(3600)),
        );
        Fixture {
            service,
            store,
            roster,
        }
    }

    fn status_of(records: &[AttendanceRecord], employee_id: u64) -> AttendanceStatus {
        records
            .iter()
            .find(|r| r.employee_id == employee_id)
            .map(|r| r.status)
            .unwrap()
    }

    #[actix_web::test]
    async fn daily_scenario_from_absent_to_departed() {
        let Fixture { service, .. } = fixture();

        let view = service.get_daily_view(day()).await.unwrap();
        assert_eq!(view.len(), 3);
        assert!(view.iter().all(|r| r.status == AttendanceStatus::Absent));

        let a = service.record_arrival(A, day(), at(8, 58)).await.unwrap();
        assert_eq!(a.status, AttendanceStatus::Present);

        let b = service.record_arrival(B, day(), at(9, 10)).await.unwrap();
        assert_eq!(b.status, AttendanceStatus::Late);

        let a = service.record_departure(A, day(), at(17, 0)).await.unwrap();
        assert_eq!(a.status, AttendanceStatus::Departed);
        assert_eq!(
            a.worked_duration(),
            Some(Duration::hours(8) + Duration::minutes(2))
        );

        let view = service.get_daily_view(day()).await.unwrap();
        let stats = compute_stats(&view);
        assert_eq!(
            stats,
            PeriodStats {
                total: 3,
                present_like_count: 1,
                late_count: 1,
                absent_count: 1,
                departed_count: 1,
            }
        );
    }

    #[actix_web::test]
    async fn materialization_persists_defaults_once() {
        let Fixture { service, store, .. } = fixture();

        service.get_daily_view(day()).await.unwrap();
        service.get_daily_view(day()).await.unwrap();

        assert_eq!(store.reads(), 1);
        assert_eq!(store.row(C, day()), Some(AttendanceRecord::absent(C, day())));
    }

    #[actix_web::test]
    async fn mutations_are_visible_without_a_round_trip() {
        let Fixture { service, store, .. } = fixture();
        service.get_daily_view(day()).await.unwrap();

        service.record_arrival(A, day(), at(8, 0)).await.unwrap();
        let view = service.get_daily_view(day()).await.unwrap();

        assert_eq!(status_of(&view, A), AttendanceStatus::Present);
        assert_eq!(store.reads(), 1);
    }

    #[actix_web::test]
    async fn second_arrival_is_rejected_and_record_unchanged() {
        let Fixture { service, store, .. } = fixture();
        let first = service.record_arrival(A, day(), at(8, 58)).await.unwrap();

        let err = service.record_arrival(A, day(), at(9, 30)).await.unwrap_err();

        assert!(matches!(err, AttendanceError::AlreadyArrived { employee_id: A, .. }));
        let view = service.get_daily_view(day()).await.unwrap();
        assert_eq!(view.iter().find(|r| r.employee_id == A), Some(&first));
        assert_eq!(store.row(A, day()).unwrap().arrival_time, Some(at(8, 58)));
    }

    #[actix_web::test]
    async fn arrival_race_from_another_session_resolves_to_already_arrived() {
        let Fixture { service, store, .. } = fixture();
        service.get_daily_view(day()).await.unwrap();

        // Another session checks A in behind this instance's cached view.
        let mut elsewhere = AttendanceRecord::absent(A, day());
        elsewhere.arrival_time = Some(at(8, 45));
        elsewhere.status = AttendanceStatus::Present;
        store
            .upsert_record(RecordWrite::unconditional(elsewhere))
            .await
            .unwrap();

        let err = service.record_arrival(A, day(), at(8, 50)).await.unwrap_err();

        assert!(matches!(err, AttendanceError::AlreadyArrived { .. }));
        assert_eq!(store.row(A, day()).unwrap().arrival_time, Some(at(8, 45)));
        let view = service.get_daily_view(day()).await.unwrap();
        assert_eq!(
            view.iter().find(|r| r.employee_id == A).unwrap().arrival_time,
            Some(at(8, 45))
        );
    }

    #[actix_web::test]
    async fn departure_errors_leave_records_untouched() {
        let Fixture { service, store, .. } = fixture();

        let err = service.record_departure(A, day(), at(17, 0)).await.unwrap_err();
        assert!(matches!(err, AttendanceError::NoArrival { .. }));

        service.record_arrival(A, day(), at(9, 0)).await.unwrap();
        let err = service.record_departure(A, day(), at(8, 0)).await.unwrap_err();
        assert!(matches!(err, AttendanceError::InvalidTimestampOrder { .. }));
        assert_eq!(store.row(A, day()).unwrap().departure_time, None);

        service.record_departure(A, day(), at(17, 0)).await.unwrap();
        let err = service.record_departure(A, day(), at(18, 0)).await.unwrap_err();
        assert!(matches!(err, AttendanceError::AlreadyDeparted { .. }));
        assert_eq!(store.row(A, day()).unwrap().departure_time, Some(at(17, 0)));
    }

    #[actix_web::test]
    async fn unknown_employee_is_rejected() {
        let Fixture { service, .. } = fixture();
        let err = service.record_arrival(42, day(), at(9, 0)).await.unwrap_err();
        assert!(matches!(err, AttendanceError::UnknownEmployee { employee_id: 42, .. }));
    }

    #[actix_web::test]
    async fn bulk_toggle_reports_each_entry_independently() {
        let Fixture { service, store, .. } = fixture();
        service.record_arrival(A, day(), at(9, 30)).await.unwrap();
        service.record_departure(A, day(), at(17, 0)).await.unwrap();

        let outcomes = service
            .bulk_toggle_presence(vec![
                PresenceToggle {
                    employee_id: A,
                    date: day(),
                    present: false,
                    arrival_time: None,
                },
                PresenceToggle {
                    employee_id: 42,
                    date: day(),
                    present: true,
                    arrival_time: None,
                },
                PresenceToggle {
                    employee_id: B,
                    date: day(),
                    present: true,
                    arrival_time: None,
                },
            ])
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(
            outcomes[0].result.as_ref().unwrap(),
            &AttendanceRecord::absent(A, day())
        );
        assert!(matches!(
            outcomes[1].result,
            Err(AttendanceError::UnknownEmployee { employee_id: 42, .. })
        ));
        let b = outcomes[2].result.as_ref().unwrap();
        assert_eq!(b.status, AttendanceStatus::Present);
        assert_eq!(b.arrival_time, Some(at(9, 0)));

        assert_eq!(store.row(A, day()), Some(AttendanceRecord::absent(A, day())));
        assert_eq!(store.row(B, day()).unwrap().arrival_time, Some(at(9, 0)));
    }

    #[actix_web::test]
    async fn bulk_toggle_absent_is_idempotent() {
        let Fixture { service, .. } = fixture();
        service.record_arrival(C, day(), at(8, 0)).await.unwrap();
        let entry = PresenceToggle {
            employee_id: C,
            date: day(),
            present: false,
            arrival_time: None,
        };

        let first = service.bulk_toggle_presence(vec![entry.clone()]).await;
        let second = service.bulk_toggle_presence(vec![entry]).await;

        let expected = AttendanceRecord::absent(C, day());
        assert_eq!(first[0].result.as_ref().unwrap(), &expected);
        assert_eq!(second[0].result.as_ref().unwrap(), &expected);
    }

    #[actix_web::test]
    async fn bulk_toggle_retries_after_a_lost_race() {
        let Fixture { service, store, .. } = fixture();
        service.get_daily_view(day()).await.unwrap();

        let mut elsewhere = AttendanceRecord::absent(B, day());
        elsewhere.arrival_time = Some(at(9, 20));
        elsewhere.status = AttendanceStatus::Late;
        store
            .upsert_record(RecordWrite::unconditional(elsewhere))
            .await
            .unwrap();

        let outcomes = service
            .bulk_toggle_presence(vec![PresenceToggle {
                employee_id: B,
                date: day(),
                present: true,
                arrival_time: None,
            }])
            .await;

        let b = outcomes[0].result.as_ref().unwrap();
        assert_eq!(b.status, AttendanceStatus::Late);
        assert_eq!(b.arrival_time, Some(at(9, 20)));
    }

    #[actix_web::test]
    async fn bulk_toggle_absent_overwrites_an_arrival_missing_from_the_view() {
        let Fixture { service, store, .. } = fixture();
        service.get_daily_view(day()).await.unwrap();

        let mut elsewhere = AttendanceRecord::absent(A, day());
        elsewhere.arrival_time = Some(at(8, 45));
        store
            .upsert_record(RecordWrite::unconditional(elsewhere))
            .await
            .unwrap();

        let outcomes = service
            .bulk_toggle_presence(vec![PresenceToggle {
                employee_id: A,
                date: day(),
                present: false,
                arrival_time: None,
            }])
            .await;

        assert_eq!(
            outcomes[0].result.as_ref().unwrap(),
            &AttendanceRecord::absent(A, day())
        );
        assert_eq!(store.row(A, day()), Some(AttendanceRecord::absent(A, day())));
    }

    #[actix_web::test]
    async fn bulk_toggle_present_is_confirmed_by_the_store() {
        let Fixture { service, store, .. } = fixture();
        service.record_arrival(A, day(), at(8, 45)).await.unwrap();

        // Reset elsewhere; the cached view still shows the 08:45 arrival.
        store
            .upsert_record(RecordWrite::unconditional(AttendanceRecord::absent(A, day())))
            .await
            .unwrap();

        let outcomes = service
            .bulk_toggle_presence(vec![PresenceToggle {
                employee_id: A,
                date: day(),
                present: true,
                arrival_time: None,
            }])
            .await;

        let a = outcomes[0].result.as_ref().unwrap();
        assert_eq!(a.status, AttendanceStatus::Present);
        assert_eq!(a.arrival_time, Some(at(9, 0)));
        assert_eq!(store.row(A, day()).unwrap().arrival_time, Some(at(9, 0)));
    }

    #[actix_web::test]
    async fn bulk_toggle_applies_repeated_entries_in_order() {
        let Fixture { service, store, .. } = fixture();
        let toggle = |employee_id, present| PresenceToggle {
            employee_id,
            date: day(),
            present,
            arrival_time: None,
        };

        let outcomes = service
            .bulk_toggle_presence(vec![toggle(A, true), toggle(A, false), toggle(B, true)])
            .await;

        let first = outcomes[0].result.as_ref().unwrap();
        assert_eq!(first.status, AttendanceStatus::Present);
        assert_eq!(
            outcomes[1].result.as_ref().unwrap(),
            &AttendanceRecord::absent(A, day())
        );
        assert_eq!(
            outcomes[2].result.as_ref().unwrap().status,
            AttendanceStatus::Present
        );

        assert_eq!(store.row(A, day()), Some(AttendanceRecord::absent(A, day())));
        let view = service.get_daily_view(day()).await.unwrap();
        assert_eq!(status_of(&view, A), AttendanceStatus::Absent);
        assert_eq!(status_of(&view, B), AttendanceStatus::Present);
    }

    /// Yields before every read so concurrent requests interleave.
    struct YieldingReads(Arc<InMemoryAttendanceStore>);

    #[async_trait]
    impl AttendanceStore for YieldingReads {
        async fn get_records(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, StoreError> {
            self.get_records_between(date, date).await
        }

        async fn get_records_between(
            &self,
            from: NaiveDate,
            to: NaiveDate,
        ) -> Result<Vec<AttendanceRecord>, StoreError> {
            actix_web::rt::task::yield_now().await;
            self.0.get_records_between(from, to).await
        }

        async fn insert_defaults(&self, records: &[AttendanceRecord]) -> Result<u64, StoreError> {
            self.0.insert_defaults(records).await
        }

        async fn upsert_record(&self, write: RecordWrite) -> Result<AttendanceRecord, StoreError> {
            self.0.upsert_record(write).await
        }
    }

    #[actix_web::test]
    async fn concurrent_first_reads_share_one_view() {
        let store = Arc::new(InMemoryAttendanceStore::new());
        let service = AttendanceService::new(
            PresenceEngine::new(ShiftPolicy::new(
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                Duration::minutes(5),
            )),
            Arc::new(StaticRoster::new(vec![employee(A), employee(B)])),
            Arc::new(YieldingReads(store.clone())),
            DayViewCache::new(32, StdDuration::from_secs(3600)),
        );

        let (arrival, _) = futures::join!(
            service.record_arrival(A, day(), at(8, 50)),
            service.get_daily_view(day())
        );
        arrival.unwrap();

        assert_eq!(store.reads(), 1);
        let view = service.get_daily_view(day()).await.unwrap();
        assert_eq!(status_of(&view, A), AttendanceStatus::Present);
    }

    #[actix_web::test]
    async fn employee_hired_after_the_view_was_built_can_arrive() {
        let Fixture { service, roster, .. } = fixture();
        service.get_daily_view(day()).await.unwrap();
        roster.hire(employee(4));

        let record = service.record_arrival(4, day(), at(8, 55)).await.unwrap();

        assert_eq!(record.status, AttendanceStatus::Present);
        let view = service.get_daily_view(day()).await.unwrap();
        assert_eq!(view.len(), 4);
        assert_eq!(status_of(&view, 4), AttendanceStatus::Present);
    }

    #[actix_web::test]
    async fn refresh_picks_up_roster_and_backend_changes() {
        let Fixture {
            service,
            store,
            roster,
        } = fixture();
        service.get_daily_view(day()).await.unwrap();

        roster.hire(employee(4));
        let mut elsewhere = AttendanceRecord::absent(C, day());
        elsewhere.arrival_time = Some(at(8, 30));
        store
            .upsert_record(RecordWrite::unconditional(elsewhere))
            .await
            .unwrap();

        assert_eq!(service.get_daily_view(day()).await.unwrap().len(), 3);

        service.refresh(day()).await;
        let view = service.get_daily_view(day()).await.unwrap();

        assert_eq!(view.len(), 4);
        assert_eq!(status_of(&view, C), AttendanceStatus::Present);
        assert_eq!(status_of(&view, 4), AttendanceStatus::Absent);
    }

    #[actix_web::test]
    async fn views_are_kept_per_date() {
        let Fixture { service, .. } = fixture();
        let next_day = day().succ_opt().unwrap();

        service.record_arrival(A, day(), at(8, 0)).await.unwrap();
        let tomorrow = service.get_daily_view(next_day).await.unwrap();

        assert!(tomorrow.iter().all(|r| r.date == next_day));
        assert_eq!(status_of(&tomorrow, A), AttendanceStatus::Absent);
    }

    #[actix_web::test]
    async fn period_stats_and_report_cover_the_week() {
        let Fixture { service, .. } = fixture();
        let monday = day();
        let tuesday = monday.succ_opt().unwrap();

        service.get_daily_view(monday).await.unwrap();
        service.get_daily_view(tuesday).await.unwrap();
        service.record_arrival(A, monday, at(8, 50)).await.unwrap();
        service.record_departure(A, monday, at(17, 0)).await.unwrap();
        service
            .record_arrival(A, tuesday, tuesday.and_hms_opt(9, 30, 0).unwrap())
            .await
            .unwrap();

        let all = service
            .get_period_stats(PeriodKind::Week, tuesday, &StatsFilter::default())
            .await
            .unwrap();
        assert_eq!(all.total, 6);
        assert_eq!(all.departed_count, 1);
        assert_eq!(all.late_count, 1);
        assert_eq!(all.absent_count, 4);

        let only_a = StatsFilter {
            employee_id: Some(A),
        };
        let report = service
            .get_period_report(PeriodKind::Week, monday, &only_a)
            .await
            .unwrap();
        assert_eq!(report.stats.total, 2);
        assert_eq!(report.attendance_rate, 1.0);
        assert_eq!(report.late_arrivals, 1);

        let day_stats = service
            .get_period_stats(PeriodKind::Day, monday, &StatsFilter::default())
            .await
            .unwrap();
        assert_eq!(day_stats.total, 3);
    }

    #[actix_web::test]
    async fn employee_history_is_derived_and_bounded() {
        let Fixture { service, .. } = fixture();
        service.record_arrival(B, day(), at(9, 10)).await.unwrap();

        let history = service
            .employee_history(B, day() - Duration::days(7), day())
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].lateness_seconds, Some(600));

        let reversed = service
            .employee_history(B, day(), day() - Duration::days(7))
            .await
            .unwrap();
        assert!(reversed.is_empty());
    }
}
