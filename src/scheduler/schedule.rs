//! Declarative schedule expressions
//!
//! Fetch and publish windows are configured as 5-field cron expressions
//! (`minute hour day-of-month month day-of-week`), evaluated in UTC.
//! [`CronSchedule`] validates an expression once at configuration time and
//! can compute upcoming firings for logging. The timer backend receives the
//! expression through [`CronSchedule::job_expression`].
//!
//! Parsing goes through `croner` with the same options the job scheduler
//! uses (seconds field required, day-of-month AND day-of-week), so a
//! schedule that validates here fires exactly when `next_after` says.

use chrono::{DateTime, Utc};
use croner::Cron;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{SchedulerError, SchedulerResult};

/// A validated 5-field cron expression
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CronSchedule {
    expression: String,
    cron: Cron,
}

impl CronSchedule {
    /// Parse and validate a 5-field cron expression
    pub fn parse(expression: &str) -> SchedulerResult<Self> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(SchedulerError::invalid_schedule(
                expression,
                format!("expected 5 fields, found {}", fields.len()),
            ));
        }

        let expression = fields.join(" ");
        let cron = job_cron(&format!("0 {expression}"))
            .map_err(|e| SchedulerError::invalid_schedule(&expression, e.to_string()))?;

        Ok(Self { expression, cron })
    }

    /// The normalized 5-field expression
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Expression handed to the timer backend, which expects a seconds field
    pub fn job_expression(&self) -> String {
        format!("0 {}", self.expression)
    }

    /// Whether the schedule fires at `at` (second precision)
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        self.cron.is_time_matching(&at).unwrap_or(false)
    }

    /// First firing strictly after `after`, if the pattern can fire at all
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.cron.find_next_occurrence(&after, false).ok()
    }
}

/// Parse a 6-field pattern the way `tokio-cron-scheduler` does
fn job_cron(pattern: &str) -> Result<Cron, croner::errors::CronError> {
    Cron::new(pattern)
        .with_seconds_required()
        .with_dom_and_dow()
        .parse()
}

impl PartialEq for CronSchedule {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

impl Eq for CronSchedule {}

impl FromStr for CronSchedule {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CronSchedule {
    type Error = SchedulerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CronSchedule> for String {
    fn from(schedule: CronSchedule) -> Self {
        schedule.expression
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}
