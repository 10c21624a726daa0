use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::{NaiveDate, NaiveDateTime};
use derive_more::{Display, Error};
use serde_json::json;
use std::sync::Arc;

/// Failures reported by the roster and attendance backends.
#[derive(Debug, Display, Error)]
pub enum StoreError {
    /// The row changed since it was read; the conditional write was not applied.
    #[display(fmt = "attendance row for employee {} on {} changed concurrently", employee_id, date)]
    Conflict { employee_id: u64, date: NaiveDate },

    #[display(fmt = "database error: {}", source)]
    Database { source: sqlx::Error },

    #[display(fmt = "stored attendance row is invalid: {}", reason)]
    Corrupt { reason: String },

    /// A failure reported to every request waiting on the same view load.
    #[display(fmt = "{}", source)]
    Shared { source: Arc<StoreError> },
}

impl StoreError {
    /// Take back sole ownership when possible, otherwise wrap the shared error.
    pub fn unshare(shared: Arc<StoreError>) -> Self {
        Arc::try_unwrap(shared).unwrap_or_else(|source| StoreError::Shared { source })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(source: sqlx::Error) -> Self {
        StoreError::Database { source }
    }
}

#[derive(Debug, Display, Error)]
pub enum AttendanceError {
    #[display(fmt = "employee {} has already arrived on {}", employee_id, date)]
    AlreadyArrived { employee_id: u64, date: NaiveDate },

    #[display(fmt = "employee {} has no arrival on {}", employee_id, date)]
    NoArrival { employee_id: u64, date: NaiveDate },

    #[display(fmt = "employee {} has already departed on {}", employee_id, date)]
    AlreadyDeparted { employee_id: u64, date: NaiveDate },

    #[display(
        fmt = "departure {} for employee {} is before arrival {}",
        departure,
        employee_id,
        arrival
    )]
    InvalidTimestampOrder {
        employee_id: u64,
        arrival: NaiveDateTime,
        departure: NaiveDateTime,
    },

    #[display(fmt = "timestamp {} is not on attendance date {}", at, date)]
    TimestampOutsideDay {
        employee_id: u64,
        date: NaiveDate,
        at: NaiveDateTime,
    },

    #[display(fmt = "employee {} is not on the active roster for {}", employee_id, date)]
    UnknownEmployee { employee_id: u64, date: NaiveDate },

    #[display(fmt = "attendance for employee {} on {} was updated by another session", employee_id, date)]
    PersistenceConflict { employee_id: u64, date: NaiveDate },

    #[display(fmt = "attendance backend failure: {}", source)]
    Store { source: StoreError },
}

impl From<StoreError> for AttendanceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { employee_id, date } => {
                AttendanceError::PersistenceConflict { employee_id, date }
            }
            source => AttendanceError::Store { source },
        }
    }
}

impl ResponseError for AttendanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::AlreadyArrived { .. }
            | AttendanceError::NoArrival { .. }
            | AttendanceError::AlreadyDeparted { .. }
            | AttendanceError::InvalidTimestampOrder { .. }
            | AttendanceError::TimestampOutsideDay { .. } => StatusCode::BAD_REQUEST,
            AttendanceError::UnknownEmployee { .. } => StatusCode::NOT_FOUND,
            AttendanceError::PersistenceConflict { .. } => StatusCode::CONFLICT,
            AttendanceError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AttendanceError::Store { source } => {
                tracing::error!(error = %source, "Attendance backend failure");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({ "message": message }))
    }
}

/// Rejections from the bearer-token guard and the role checks.
#[derive(Debug, Display, Error)]
pub enum AuthError {
    #[display(fmt = "Missing Authorization header")]
    MissingHeader,

    #[display(fmt = "Authorization header must be 'Bearer <token>'")]
    MalformedHeader,

    #[display(fmt = "Invalid or expired token")]
    InvalidToken,

    #[display(fmt = "Invalid role {}", role)]
    UnknownRole { role: u8 },

    #[display(fmt = "Missing token")]
    Unauthenticated,

    #[display(fmt = "HR/Admin only")]
    Forbidden,

    #[display(fmt = "No employee profile")]
    NoEmployeeProfile,

    #[display(fmt = "App config missing")]
    Misconfigured,
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Forbidden | AuthError::NoEmployeeProfile => StatusCode::FORBIDDEN,
            AuthError::Misconfigured => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AuthError::Misconfigured => {
                tracing::error!("Config is not registered as app data");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({ "message": message }))
    }
}
