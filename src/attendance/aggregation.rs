//! Period filtering and statistics over already-fetched records.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::attendance::{AttendanceRecord, AttendanceStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    Day,
    /// ISO 8601 week (Monday to Sunday, numbered by ISO week-year).
    Week,
    Month,
}

impl PeriodKind {
    pub fn contains(&self, reference: NaiveDate, date: NaiveDate) -> bool {
        match self {
            PeriodKind::Day => date == reference,
            PeriodKind::Week => date.iso_week() == reference.iso_week(),
            PeriodKind::Month => date.year() == reference.year() && date.month() == reference.month(),
        }
    }

    /// Inclusive date range covering the period that contains `reference`.
    pub fn bounds(&self, reference: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            PeriodKind::Day => (reference, reference),
            PeriodKind::Week => {
                let monday = reference
                    - Duration::days(i64::from(reference.weekday().num_days_from_monday()));
                (monday, monday + Duration::days(6))
            }
            PeriodKind::Month => {
                let first = reference - Duration::days(i64::from(reference.day0()));
                // Overshoots short months; callers filter with `contains`.
                (first, first + Duration::days(30))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PeriodStats {
    #[schema(example = 3)]
    pub total: u64,
    /// Present plus Departed (a departure closes a present day).
    #[schema(example = 1)]
    pub present_like_count: u64,
    #[schema(example = 1)]
    pub late_count: u64,
    #[schema(example = 1)]
    pub absent_count: u64,
    #[schema(example = 1)]
    pub departed_count: u64,
}

impl PeriodStats {
    /// Records where the employee showed up at all.
    pub fn attended(&self) -> u64 {
        self.present_like_count + self.late_count
    }

    pub fn attendance_rate(&self) -> f64 {
        ratio(self.attended(), self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChartPoint {
    #[schema(example = "Present")]
    pub label: String,
    #[schema(example = 1)]
    pub value: u64,
}

/// Dashboard payload for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PeriodReport {
    pub stats: PeriodStats,
    #[schema(example = 0.6667)]
    pub attendance_rate: f64,
    #[schema(example = 0.5)]
    pub punctuality_rate: f64,
    /// Records that arrived after the grace window, including ones since departed.
    #[schema(example = 1)]
    pub late_arrivals: u64,
    #[schema(example = 28920)]
    pub total_worked_seconds: i64,
    pub series: Vec<ChartPoint>,
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

pub fn filter_by_period(
    records: &[AttendanceRecord],
    kind: PeriodKind,
    reference: NaiveDate,
) -> Vec<&AttendanceRecord> {
    records
        .iter()
        .filter(|record| kind.contains(reference, record.date))
        .collect()
}

pub fn compute_stats<'a, I>(records: I) -> PeriodStats
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    records
        .into_iter()
        .fold(PeriodStats::default(), |mut stats, record| {
            stats.total += 1;
            match record.status {
                AttendanceStatus::Present => stats.present_like_count += 1,
                AttendanceStatus::Late => stats.late_count += 1,
                AttendanceStatus::Absent => stats.absent_count += 1,
                AttendanceStatus::Departed => {
                    stats.present_like_count += 1;
                    stats.departed_count += 1;
                }
            }
            stats
        })
}

/// Always `Present`, `Late`, `Absent`, in that order.
pub fn to_chart_series(stats: &PeriodStats) -> Vec<ChartPoint> {
    [
        ("Present", stats.present_like_count),
        ("Late", stats.late_count),
        ("Absent", stats.absent_count),
    ]
    .into_iter()
    .map(|(label, value)| ChartPoint {
        label: label.to_string(),
        value,
    })
    .collect()
}

pub fn build_report<'a, I>(records: I) -> PeriodReport
where
    I: IntoIterator<Item = &'a AttendanceRecord> + Clone,
{
    let stats = compute_stats(records.clone());
    let (late_arrivals, total_worked_seconds) =
        records.into_iter().fold((0u64, 0i64), |(late, worked), record| {
            let arrived_late =
                record.status == AttendanceStatus::Late || record.lateness().is_some();
            (
                late + u64::from(arrived_late),
                worked + record.worked_duration().map_or(0, |d| d.num_seconds().max(0)),
            )
        });

    // Lateness survives departure, so punctuality is measured on arrivals.
    let attended = stats.attended();
    PeriodReport {
        stats,
        attendance_rate: stats.attendance_rate(),
        punctuality_rate: ratio(attended.saturating_sub(late_arrivals), attended),
        late_arrivals,
        total_worked_seconds,
        series: to_chart_series(&stats),
    }
}
