//! MySQL-backed roster and attendance storage.
//!
//! Expected `attendance` table:
//!
//! ```sql
//! CREATE TABLE attendance (
//!     id          BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
//!     employee_id BIGINT UNSIGNED NOT NULL,
//!     date        DATE NOT NULL,
//!     status      VARCHAR(16) NOT NULL DEFAULT 'absent',
//!     check_in    DATETIME NULL,
//!     check_out   DATETIME NULL,
//!     UNIQUE KEY uq_attendance_employee_date (employee_id, date)
//! );
//! ```

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{FromRow, MySqlPool};
use tracing::{debug, error};

use crate::error::StoreError;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::employee::Employee;
use crate::store::{AttendanceStore, Precondition, RecordWrite, RosterProvider};

const SELECT_ATTENDANCE: &str = r#"
    SELECT employee_id, date, status, check_in, check_out
    FROM attendance
"#;

#[derive(FromRow)]
struct AttendanceRow {
    employee_id: u64,
    date: NaiveDate,
    status: String,
    check_in: Option<NaiveDateTime>,
    check_out: Option<NaiveDateTime>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = StoreError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let status = AttendanceStatus::from_str(&row.status).map_err(|_| StoreError::Corrupt {
            reason: format!(
                "unknown status '{}' for employee {} on {}",
                row.status, row.employee_id, row.date
            ),
        })?;

        Ok(AttendanceRecord {
            employee_id: row.employee_id,
            date: row.date,
            status,
            arrival_time: row.check_in,
            departure_time: row.check_out,
            worked_seconds: None,
            lateness_seconds: None,
        })
    }
}

fn is_duplicate_key(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23000"),
        _ => false,
    }
}

pub struct MySqlAttendanceStore {
    pool: MySqlPool,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    fn rows_to_records(rows: Vec<AttendanceRow>) -> Result<Vec<AttendanceRecord>, StoreError> {
        rows.into_iter().map(AttendanceRecord::try_from).collect()
    }
}

#[async_trait]
impl AttendanceStore for MySqlAttendanceStore {
    async fn get_records(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, StoreError> {
        let sql = format!("{SELECT_ATTENDANCE} WHERE date = ? ORDER BY employee_id");
        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(date)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, %date, "Failed to fetch attendance");
                StoreError::from(e)
            })?;

        Self::rows_to_records(rows)
    }

    async fn get_records_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let sql =
            format!("{SELECT_ATTENDANCE} WHERE date BETWEEN ? AND ? ORDER BY date, employee_id");
        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, %from, %to, "Failed to fetch attendance range");
                StoreError::from(e)
            })?;

        Self::rows_to_records(rows)
    }

    async fn insert_defaults(&self, records: &[AttendanceRecord]) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["(?, ?, ?)"; records.len()].join(", ");
        let sql = format!(
            "INSERT IGNORE INTO attendance (employee_id, date, status) VALUES {placeholders}"
        );

        let mut query = sqlx::query(&sql);
        for record in records {
            query = query
                .bind(record.employee_id)
                .bind(record.date)
                .bind(record.status.as_ref());
        }

        let inserted = query.execute(&self.pool).await?.rows_affected();
        debug!(inserted, requested = records.len(), "Inserted default attendance rows");
        Ok(inserted)
    }

    async fn upsert_record(&self, write: RecordWrite) -> Result<AttendanceRecord, StoreError> {
        let record = write.record;

        match write.precondition {
            Precondition::Matches(expected) => {
                // Null-safe comparison so the check and the write are one statement.
                let result = sqlx::query(
                    r#"
                    UPDATE attendance
                    SET status = ?, check_in = ?, check_out = ?
                    WHERE employee_id = ?
                    AND date = ?
                    AND check_in <=> ?
                    AND check_out <=> ?
                    "#,
                )
                .bind(record.status.as_ref())
                .bind(record.arrival_time)
                .bind(record.departure_time)
                .bind(record.employee_id)
                .bind(record.date)
                .bind(expected.arrival_time)
                .bind(expected.departure_time)
                .execute(&self.pool)
                .await?;

                // sqlx negotiates CLIENT_FOUND_ROWS: an unchanged matching row still counts.
                if result.rows_affected() == 0 {
                    return Err(StoreError::Conflict {
                        employee_id: record.employee_id,
                        date: record.date,
                    });
                }
            }
            Precondition::Unconditional => {
                sqlx::query(
                    r#"
                    INSERT INTO attendance (employee_id, date, status, check_in, check_out)
                    VALUES (?, ?, ?, ?, ?)
                    ON DUPLICATE KEY UPDATE
                        status = VALUES(status),
                        check_in = VALUES(check_in),
                        check_out = VALUES(check_out)
                    "#,
                )
                .bind(record.employee_id)
                .bind(record.date)
                .bind(record.status.as_ref())
                .bind(record.arrival_time)
                .bind(record.departure_time)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    if is_duplicate_key(&e) {
                        StoreError::Conflict {
                            employee_id: record.employee_id,
                            date: record.date,
                        }
                    } else {
                        StoreError::from(e)
                    }
                })?;
            }
        }

        Ok(record)
    }
}

pub struct MySqlRoster {
    pool: MySqlPool,
}

impl MySqlRoster {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RosterProvider for MySqlRoster {
    async fn list_active_employees(&self) -> Result<Vec<Employee>, StoreError> {
        sqlx::query_as::<_, Employee>(
            r#"
            SELECT
                id,
                employee_code,
                CONCAT_WS(' ', first_name, last_name) AS display_name
            FROM employees
            WHERE status = 'active'
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch active roster");
            StoreError::from(e)
        })
    }
}
