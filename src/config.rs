use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result, anyhow};
use chrono::{Duration, NaiveTime};
use dotenvy::dotenv;

use crate::model::shift_policy::ShiftPolicy;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub server_addr: String,

    // Rate limiting, 0 disables
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub log_dir: String,

    // Shift policy
    pub shift_start: NaiveTime,
    pub shift_grace_minutes: i64,

    // Per-date attendance views
    pub day_cache_capacity: u64,
    pub day_cache_ttl_secs: u64,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parsed_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key} has invalid value '{raw}': {e}")),
        Err(_) => Ok(default),
    }
}

fn parse_shift_start(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S"))
        .with_context(|| format!("SHIFT_START has invalid value '{raw}', expected HH:MM"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let shift_start =
            parse_shift_start(&env::var("SHIFT_START").unwrap_or_else(|_| "09:00".to_string()))?;
        let shift_grace_minutes = parsed_or("SHIFT_GRACE_MINUTES", 5i64)?;
        if shift_grace_minutes < 0 {
            return Err(anyhow!("SHIFT_GRACE_MINUTES must not be negative"));
        }

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            db_max_connections: parsed_or("DB_MAX_CONNECTIONS", 10)?,
            jwt_secret: required("JWT_SECRET")?,

            rate_protected_per_min: parsed_or("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),

            shift_start,
            shift_grace_minutes,

            day_cache_capacity: parsed_or("DAY_CACHE_CAPACITY", 366)?,
            day_cache_ttl_secs: parsed_or("DAY_CACHE_TTL_SECS", 86400)?, // 24h
        })
    }

    pub fn shift_policy(&self) -> ShiftPolicy {
        ShiftPolicy::new(self.shift_start, Duration::minutes(self.shift_grace_minutes))
    }

    pub fn day_cache_ttl(&self) -> StdDuration {
        StdDuration::from_secs(self.day_cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_start_accepts_minutes_and_seconds() {
        assert_eq!(
            parse_shift_start("08:30").unwrap(),
            NaiveTime::from_hms_opt(8, 30, 0).unwrap()
        );
        assert_eq!(
            parse_shift_start(" 08:30:15 ").unwrap(),
            NaiveTime::from_hms_opt(8, 30, 15).unwrap()
        );
        assert!(parse_shift_start("half past eight").is_err());
    }

    #[test]
    fn missing_numeric_values_fall_back_to_defaults() {
        assert_eq!(
            parsed_or("HRM_ATTENDANCE_TEST_UNSET_KEY", 42u64).unwrap(),
            42
        );
    }
}
