use crate::attendance::aggregation::{PeriodKind, PeriodReport, PeriodStats, compute_stats};
use crate::attendance::service::{AttendanceService, PresenceToggle, StatsFilter, ToggleOutcome};
use crate::auth::auth::AuthUser;
use crate::model::attendance::AttendanceRecord;
use crate::model::employee::Employee;
use actix_web::{HttpResponse, Responder, web};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct AttendanceEventRequest {
    #[schema(example = 1)]
    pub employee_id: u64,
    /// Attendance day; defaults to the timestamp's date.
    #[schema(example = "2024-06-10", value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    #[schema(example = "2024-06-10T08:58:00", value_type = String, format = "date-time")]
    pub timestamp: NaiveDateTime,
}

#[derive(Deserialize)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct StatsQuery {
    pub period: PeriodKind,
    pub date: Option<NaiveDate>,
    pub employee_id: Option<u64>,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Deserialize, ToSchema)]
pub struct BulkToggleRequest {
    pub entries: Vec<PresenceToggle>,
}

#[derive(Serialize, ToSchema)]
pub struct DailyViewEntry {
    /// Roster details; null when the employee left the roster after the view was built.
    #[schema(nullable = true)]
    pub employee: Option<Employee>,
    pub record: AttendanceRecord,
}

#[derive(Serialize, ToSchema)]
pub struct DailyViewResponse {
    #[schema(example = "2024-06-10", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "2024-06-10T09:05:00", value_type = String, format = "date-time")]
    pub late_after: NaiveDateTime,
    pub stats: PeriodStats,
    pub data: Vec<DailyViewEntry>,
}

#[derive(Serialize, ToSchema)]
pub struct ToggleResultResponse {
    #[schema(example = 1)]
    pub employee_id: u64,
    #[schema(example = "2024-06-10", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = true)]
    pub ok: bool,
    #[schema(nullable = true)]
    pub record: Option<AttendanceRecord>,
    #[schema(example = "employee 42 is not on the active roster for 2024-06-10", nullable = true)]
    pub message: Option<String>,
}

impl From<ToggleOutcome> for ToggleResultResponse {
    fn from(outcome: ToggleOutcome) -> Self {
        let (record, message) = match outcome.result {
            Ok(record) => (Some(record), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            employee_id: outcome.employee_id,
            date: outcome.date,
            ok: record.is_some(),
            record,
            message,
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance",
    responses(
        (status = 200, description = "Checked in successfully", body = Object, example = json!({
            "message": "Checked in successfully"
        })),
        (status = 400, description = "Already checked in today", body = Object, example = json!({
            "message": "employee 1 has already arrived on 2024-06-10"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Concurrent update, retry"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let now = Local::now().naive_local();

    let record = service.record_arrival(employee_id, now.date(), now).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Checked in successfully",
        "record": record
    })))
}

/// Check-out endpoint
#[utoipa::path(
    put,
    path = "/api/attendance",
    responses(
        (status = 200, description = "Checked out successfully", body = Object, example = json!({
            "message": "Checked out successfully"
        })),
        (status = 400, description = "No active check-in found for today", body = Object, example = json!({
            "message": "employee 1 has no arrival on 2024-06-10"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Concurrent update, retry"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let now = Local::now().naive_local();

    let record = service.record_departure(employee_id, now.date(), now).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Checked out successfully",
        "record": record
    })))
}

/// Record an arrival on behalf of an employee (HR/Admin)
#[utoipa::path(
    post,
    path = "/api/attendance/arrival",
    request_body = AttendanceEventRequest,
    responses(
        (status = 200, description = "Arrival recorded", body = AttendanceRecord),
        (status = 400, description = "Already arrived or timestamp outside the day"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not on the active roster"),
        (status = 409, description = "Concurrent update, retry")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn record_arrival(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    payload: web::Json<AttendanceEventRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let date = payload.date.unwrap_or_else(|| payload.timestamp.date());
    let record = service
        .record_arrival(payload.employee_id, date, payload.timestamp)
        .await?;

    info!(acted_by = auth.user_id, employee_id = payload.employee_id, %date, "Arrival recorded");
    Ok(HttpResponse::Ok().json(record))
}

/// Record a departure on behalf of an employee (HR/Admin)
#[utoipa::path(
    post,
    path = "/api/attendance/departure",
    request_body = AttendanceEventRequest,
    responses(
        (status = 200, description = "Departure recorded", body = AttendanceRecord),
        (status = 400, description = "No arrival, already departed, or departure before arrival"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not on the active roster"),
        (status = 409, description = "Concurrent update, retry")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn record_departure(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    payload: web::Json<AttendanceEventRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let date = payload.date.unwrap_or_else(|| payload.timestamp.date());
    let record = service
        .record_departure(payload.employee_id, date, payload.timestamp)
        .await?;

    info!(acted_by = auth.user_id, employee_id = payload.employee_id, %date, "Departure recorded");
    Ok(HttpResponse::Ok().json(record))
}

/// Daily attendance view, one entry per active employee
#[utoipa::path(
    get,
    path = "/api/attendance/daily",
    params(
        ("date", Query, description = "Attendance day (YYYY-MM-DD), defaults to today")
    ),
    responses(
        (status = 200, description = "Daily view", body = DailyViewResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn daily_view(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    query: web::Query<DateQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let date = query.date.unwrap_or_else(today);
    let records = service.get_daily_view(date).await?;

    // Resolve employee ids only here, at the presentation edge.
    let mut roster: HashMap<u64, Employee> = service
        .roster()
        .await?
        .into_iter()
        .map(|employee| (employee.id, employee))
        .collect();

    let stats = compute_stats(&records);
    let data = records
        .into_iter()
        .map(|record| DailyViewEntry {
            employee: roster.remove(&record.employee_id),
            record,
        })
        .collect();

    Ok(HttpResponse::Ok().json(DailyViewResponse {
        date,
        late_after: service.engine().policy().threshold_on(date),
        stats,
        data,
    }))
}

/// Apply presence corrections (HR/Admin)
#[utoipa::path(
    post,
    path = "/api/attendance/bulk-toggle",
    request_body = BulkToggleRequest,
    responses(
        (status = 200, description = "Per-entry outcomes", body = [ToggleResultResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn bulk_toggle(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    payload: web::Json<BulkToggleRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let outcomes = service
        .bulk_toggle_presence(payload.into_inner().entries)
        .await;
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(acted_by = auth.user_id, user = %auth.username, entries = outcomes.len(), failed, "Presence corrections applied");

    let body: Vec<ToggleResultResponse> = outcomes.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// Rebuild the cached daily view from storage (HR/Admin)
#[utoipa::path(
    post,
    path = "/api/attendance/refresh",
    params(
        ("date", Query, description = "Attendance day (YYYY-MM-DD), defaults to today")
    ),
    responses(
        (status = 200, description = "View refreshed", body = Object, example = json!({
            "message": "Attendance view refreshed"
        })),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn refresh(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    query: web::Query<DateQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let date = query.date.unwrap_or_else(today);
    service.refresh(date).await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Attendance view refreshed",
        "date": date
    })))
}

/// Period statistics for dashboards and reports
#[utoipa::path(
    get,
    path = "/api/attendance/stats",
    params(
        ("period" = PeriodKind, Query, description = "day, week (ISO) or month"),
        ("date", Query, description = "Reference day (YYYY-MM-DD), defaults to today"),
        ("employee_id", Query, description = "Restrict to one employee")
    ),
    responses(
        (status = 200, description = "Period report", body = PeriodReport),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn period_stats(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    query: web::Query<StatsQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let reference = query.date.unwrap_or_else(today);
    let filter = StatsFilter {
        employee_id: query.employee_id,
    };
    let report = service
        .get_period_report(query.period, reference, &filter)
        .await?;

    Ok(HttpResponse::Ok().json(report))
}

/// Attendance history of one employee
#[utoipa::path(
    get,
    path = "/api/attendance/employee/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID"),
        ("from", Query, description = "First day (YYYY-MM-DD)"),
        ("to", Query, description = "Last day (YYYY-MM-DD)")
    ),
    responses(
        (status = 200, description = "Attendance records", body = [AttendanceRecord]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn employee_history(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
    query: web::Query<HistoryQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_hr(employee_id)?;

    let records = service
        .employee_history(employee_id, query.from, query.to)
        .await?;

    Ok(HttpResponse::Ok().json(records))
}

/// Raw status counts for a period, without rates or chart series
#[utoipa::path(
    get,
    path = "/api/attendance/stats/summary",
    params(
        ("period" = PeriodKind, Query, description = "day, week (ISO) or month"),
        ("date", Query, description = "Reference day (YYYY-MM-DD), defaults to today"),
        ("employee_id", Query, description = "Restrict to one employee")
    ),
    responses(
        (status = 200, description = "Period counts", body = PeriodStats),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn period_summary(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    query: web::Query<StatsQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let reference = query.date.unwrap_or_else(today);
    let filter = StatsFilter {
        employee_id: query.employee_id,
    };
    let stats = service
        .get_period_stats(query.period, reference, &filter)
        .await?;

    Ok(HttpResponse::Ok().json(stats))
}
