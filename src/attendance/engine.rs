//! Per-day attendance state and its transitions.
//!
//! Every transition takes the current record by reference and returns the
//! next one, so a rejected transition can never leave a half-updated record.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime, SubsecRound};

use crate::error::AttendanceError;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::employee::Employee;
use crate::model::shift_policy::ShiftPolicy;

#[derive(Debug, Clone)]
pub struct PresenceEngine {
    policy: ShiftPolicy,
}

impl PresenceEngine {
    pub fn new(policy: ShiftPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ShiftPolicy {
        &self.policy
    }

    /// One record per roster employee for `date`, in roster order.
    ///
    /// Existing records are kept as they are (re-derived); employees without
    /// one get an `Absent` default. Records for other dates or for employees
    /// no longer on the roster are left out.
    pub fn ensure_daily_records(
        &self,
        date: NaiveDate,
        roster: &[Employee],
        existing: &[AttendanceRecord],
    ) -> Vec<AttendanceRecord> {
        let by_employee: HashMap<u64, &AttendanceRecord> = existing
            .iter()
            .filter(|record| record.date == date)
            .map(|record| (record.employee_id, record))
            .collect();

        let mut seen = HashSet::with_capacity(roster.len());
        roster
            .iter()
            .filter(|employee| seen.insert(employee.id))
            .map(|employee| match by_employee.get(&employee.id) {
                Some(record) => self.derive((*record).clone()),
                None => AttendanceRecord::absent(employee.id, date),
            })
            .collect()
    }

    /// Recompute status, worked time and lateness from the timestamps.
    pub fn derive(&self, mut record: AttendanceRecord) -> AttendanceRecord {
        record.status = match (record.arrival_time, record.departure_time) {
            (None, _) => AttendanceStatus::Absent,
            (Some(_), Some(_)) => AttendanceStatus::Departed,
            (Some(arrival), None) => self.policy.classify(record.date, arrival),
        };

        // A departure without an arrival cannot be represented.
        if record.arrival_time.is_none() {
            record.departure_time = None;
        }

        record.lateness_seconds = record
            .arrival_time
            .and_then(|arrival| self.policy.lateness(record.date, arrival))
            .map(|lateness| lateness.num_seconds());

        record.worked_seconds = match (record.arrival_time, record.departure_time) {
            (Some(arrival), Some(departure)) => Some((departure - arrival).num_seconds()),
            _ => None,
        };

        record
    }

    pub fn apply_arrival(
        &self,
        current: &AttendanceRecord,
        at: NaiveDateTime,
    ) -> Result<AttendanceRecord, AttendanceError> {
        if current.has_arrived() {
            return Err(AttendanceError::AlreadyArrived {
                employee_id: current.employee_id,
                date: current.date,
            });
        }
        // Stored as DATETIME, whole seconds.
        let at = at.trunc_subsecs(0);
        self.ensure_same_day(current, at)?;

        let mut next = current.clone();
        next.arrival_time = Some(at);
        next.departure_time = None;
        Ok(self.derive(next))
    }

    pub fn apply_departure(
        &self,
        current: &AttendanceRecord,
        at: NaiveDateTime,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let Some(arrival) = current.arrival_time else {
            return Err(AttendanceError::NoArrival {
                employee_id: current.employee_id,
                date: current.date,
            });
        };
        if current.departure_time.is_some() {
            return Err(AttendanceError::AlreadyDeparted {
                employee_id: current.employee_id,
                date: current.date,
            });
        }
        let at = at.trunc_subsecs(0);
        self.ensure_same_day(current, at)?;
        if at < arrival {
            return Err(AttendanceError::InvalidTimestampOrder {
                employee_id: current.employee_id,
                arrival,
                departure: at,
            });
        }

        let mut next = current.clone();
        next.departure_time = Some(at);
        Ok(self.derive(next))
    }

    /// Administrative correction.
    ///
    /// `present == false` clears the day back to `Absent`. `present == true`
    /// synthesizes an arrival (at `arrival`, or the expected start) when none
    /// exists and is a no-op otherwise.
    pub fn apply_toggle(
        &self,
        current: &AttendanceRecord,
        present: bool,
        arrival: Option<NaiveDateTime>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        if !present {
            return Ok(AttendanceRecord::absent(current.employee_id, current.date));
        }
        if current.has_arrived() {
            return Ok(self.derive(current.clone()));
        }

        let at = arrival.unwrap_or_else(|| self.policy.expected_start_on(current.date));
        self.apply_arrival(current, at)
    }

    fn ensure_same_day(
        &self,
        current: &AttendanceRecord,
        at: NaiveDateTime,
    ) -> Result<(), AttendanceError> {
        if at.date() != current.date {
            return Err(AttendanceError::TimestampOutsideDay {
                employee_id: current.employee_id,
                date: current.date,
                at,
            });
        }
        Ok(())
    }
}
