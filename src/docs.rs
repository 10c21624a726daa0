use crate::api::attendance::{
    AttendanceEventRequest, BulkToggleRequest, DailyViewEntry, DailyViewResponse,
    ToggleResultResponse,
};
use crate::attendance::aggregation::{ChartPoint, PeriodKind, PeriodReport, PeriodStats};
use crate::attendance::service::PresenceToggle;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::employee::Employee;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Attendance API",
        version = "0.1.0",
        description = r#"
## Attendance & Presence

Daily presence tracking for the active employee roster.

### 🔹 Key Features
- **Daily view**
  - One record per active employee and day, absent until an arrival is recorded
- **Arrival / departure**
  - Self check-in and check-out, or HR entries with explicit timestamps
  - Arrivals after the grace window are marked late
- **Presence corrections**
  - Bulk present/absent toggles with a per-entry outcome
- **Statistics**
  - Day, ISO week and month counts with attendance and punctuality rates

### 🔐 Security
All endpoints require a **JWT Bearer** access token.
Team-wide views and corrections are limited to **Admin** and **HR**.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::record_arrival,
        crate::api::attendance::record_departure,
        crate::api::attendance::daily_view,
        crate::api::attendance::bulk_toggle,
        crate::api::attendance::refresh,
        crate::api::attendance::period_stats,
        crate::api::attendance::period_summary,
        crate::api::attendance::employee_history
    ),
    components(
        schemas(
            AttendanceStatus,
            AttendanceRecord,
            Employee,
            AttendanceEventRequest,
            PresenceToggle,
            BulkToggleRequest,
            ToggleResultResponse,
            DailyViewEntry,
            DailyViewResponse,
            PeriodKind,
            PeriodStats,
            PeriodReport,
            ChartPoint
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Attendance management APIs"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
