//! Error types for the scheduler module

use std::fmt;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug)]
pub enum SchedulerError {
    /// Cron expression could not be parsed
    InvalidSchedule {
        expression: String,
        reason: String,
    },

    /// Source name not present in the configuration
    UnknownSource {
        name: String,
    },

    /// Registering a job with the timer backend failed
    JobRegistrationFailed {
        source_name: String,
        reason: String,
    },

    /// Starting or stopping the timer backend failed
    TriggerExecutionFailed {
        reason: String,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSchedule { expression, reason } => {
                write!(f, "Invalid schedule '{}': {}", expression, reason)
            }
            Self::UnknownSource { name } => {
                write!(f, "Unknown source '{}'", name)
            }
            Self::JobRegistrationFailed {
                source_name,
                reason,
            } => {
                write!(
                    f,
                    "Failed to register job for source '{}': {}",
                    source_name, reason
                )
            }
            Self::TriggerExecutionFailed { reason } => {
                write!(f, "Trigger execution failed: {}", reason)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl From<tokio_cron_scheduler::JobSchedulerError> for SchedulerError {
    fn from(err: tokio_cron_scheduler::JobSchedulerError) -> Self {
        Self::TriggerExecutionFailed {
            reason: err.to_string(),
        }
    }
}

impl SchedulerError {
    /// Create an invalid schedule error
    pub fn invalid_schedule(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchedule {
            expression: expression.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown source error
    pub fn unknown_source(name: impl Into<String>) -> Self {
        Self::UnknownSource { name: name.into() }
    }

    /// Create a job registration error
    pub fn job_registration(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::JobRegistrationFailed {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Configuration mistakes are never fixed by retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::TriggerExecutionFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = SchedulerError::invalid_schedule("* *", "expected 5 fields, found 2");
        assert_eq!(
            err.to_string(),
            "Invalid schedule '* *': expected 5 fields, found 2"
        );

        let err = SchedulerError::unknown_source("nobody");
        assert_eq!(err.to_string(), "Unknown source 'nobody'");
    }

    #[test]
    fn test_recoverability() {
        assert!(!SchedulerError::invalid_schedule("x", "bad").is_recoverable());
        assert!(SchedulerError::TriggerExecutionFailed {
            reason: "shutdown".into()
        }
        .is_recoverable());
    }
}
