use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::model::attendance::AttendanceStatus;

/// Expected start of the working day plus the grace window before an
/// arrival counts as late.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftPolicy {
    pub start: NaiveTime,
    pub grace: Duration,
}

impl ShiftPolicy {
    pub fn new(start: NaiveTime, grace: Duration) -> Self {
        Self { start, grace }
    }

    pub fn expected_start_on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.start)
    }

    /// Last instant on `date` that still counts as on time.
    pub fn threshold_on(&self, date: NaiveDate) -> NaiveDateTime {
        self.expected_start_on(date) + self.grace
    }

    pub fn classify(&self, date: NaiveDate, arrival: NaiveDateTime) -> AttendanceStatus {
        if arrival <= self.threshold_on(date) {
            AttendanceStatus::Present
        } else {
            AttendanceStatus::Late
        }
    }

    /// Time past the expected start, for late arrivals only.
    pub fn lateness(&self, date: NaiveDate, arrival: NaiveDateTime) -> Option<Duration> {
        match self.classify(date, arrival) {
            AttendanceStatus::Late => Some(arrival - self.expected_start_on(date)),
            _ => None,
        }
    }
}
