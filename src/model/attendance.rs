use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    AsRefStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    Absent,
    Present,
    Late,
    Departed,
}

/// Arrival/departure pair a conditional write is based on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub arrival_time: Option<NaiveDateTime>,
    pub departure_time: Option<NaiveDateTime>,
}

/// One employee's attendance for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "employee_id": 1,
        "date": "2024-06-10",
        "status": "late",
        "arrival_time": "2024-06-10T09:10:00",
        "departure_time": null,
        "worked_seconds": null,
        "lateness_seconds": 600
    })
)]
pub struct AttendanceRecord {
    #[schema(example = 1)]
    pub employee_id: u64,

    #[schema(example = "2024-06-10", value_type = String, format = "date")]
    pub date: NaiveDate,

    pub status: AttendanceStatus,

    #[schema(value_type = Option<String>, format = "date-time", nullable = true)]
    pub arrival_time: Option<NaiveDateTime>,

    #[schema(value_type = Option<String>, format = "date-time", nullable = true)]
    pub departure_time: Option<NaiveDateTime>,

    /// Seconds between arrival and departure, once both are known.
    #[schema(example = 28920, nullable = true)]
    pub worked_seconds: Option<i64>,

    /// Seconds past the expected start, only for arrivals after the grace window.
    #[schema(example = 600, nullable = true)]
    pub lateness_seconds: Option<i64>,
}

impl AttendanceRecord {
    /// Default record for an employee with no event yet on `date`.
    pub fn absent(employee_id: u64, date: NaiveDate) -> Self {
        Self {
            employee_id,
            date,
            status: AttendanceStatus::Absent,
            arrival_time: None,
            departure_time: None,
            worked_seconds: None,
            lateness_seconds: None,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            arrival_time: self.arrival_time,
            departure_time: self.departure_time,
        }
    }

    pub fn worked_duration(&self) -> Option<Duration> {
        self.worked_seconds.map(Duration::seconds)
    }

    pub fn lateness(&self) -> Option<Duration> {
        self.lateness_seconds.map(Duration::seconds)
    }

    pub fn has_arrived(&self) -> bool {
        self.arrival_time.is_some()
    }
}
