//! Cron schedules evaluated in a job's time zone.
//!
//! Both classic 5-field crontab (`MIN HOUR DOM MON DOW`) and the 6/7-field
//! form with leading seconds are accepted; 5-field expressions fire at second
//! zero.

use std::str::FromStr;

use chrono::Utc;
use chrono_tz::Tz;

use crate::error::ValidationError;
use crate::time::Timestamp;

/// A parsed, validated cron expression.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: cron::Schedule,
}

impl CronSchedule {
    /// Parse and validate an expression.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidSchedule`] for malformed expressions
    /// and for expressions that can never fire.
    pub fn parse(expression: &str) -> Result<Self, ValidationError> {
        let trimmed = expression.trim();
        let normalized = match trimmed.split_whitespace().count() {
            5 => format!("0 {trimmed}"),
            _ => trimmed.to_string(),
        };
        let schedule =
            cron::Schedule::from_str(&normalized).map_err(|err| ValidationError::InvalidSchedule {
                expression: expression.to_string(),
                reason: err.to_string(),
            })?;
        if schedule.upcoming(Utc).next().is_none() {
            return Err(ValidationError::InvalidSchedule {
                expression: expression.to_string(),
                reason: "expression has no future occurrence".to_string(),
            });
        }
        Ok(Self {
            expression: expression.to_string(),
            schedule,
        })
    }

    /// The expression as written by the user.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First occurrence strictly after `after`, computed in `tz`.
    #[must_use]
    pub fn next_after(&self, after: Timestamp, tz: Tz) -> Option<Timestamp> {
        self.schedule
            .after(&after.with_timezone(&tz))
            .next()
            .map(|next| next.with_timezone(&Utc))
    }
}

/// Parse an IANA time-zone name.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidTimezone`] for unknown names.
pub fn parse_timezone(name: &str) -> Result<Tz, ValidationError> {
    name.parse::<Tz>()
        .map_err(|_| ValidationError::InvalidTimezone(name.to_string()))
}
