use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Environment configuration error: {message}")]
    Environment { message: String },

    #[error("Pipeline configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Report validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Langbase error: {0}")]
    Langbase(#[from] LangbaseError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Pre-run problems with the pipeline input. No step is scheduled when one of
/// these is raised.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("No research steps were defined")]
    NoSteps,

    #[error("Duplicate step id: {step_id}")]
    DuplicateStep { step_id: String },

    #[error("Step {step_id} has an empty question template")]
    EmptyQuestion { step_id: String },

    #[error("Step {step_id} depends on {dependency}, which is not an earlier step")]
    UnknownDependency { step_id: String, dependency: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid qualification signal {name}: {reason}")]
    InvalidSignal { name: String, reason: String },

    #[error("Duplicate qualification signal: {name}")]
    DuplicateSignal { name: String },
}

/// Errors raised by the external research capability.
///
/// `Transient` and `Timeout` are retried by the step executor. `Permanent`
/// carries the raw diagnostic from the capability as its display text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapabilityError {
    #[error("Transient capability failure: {message}")]
    Transient { message: String },

    #[error("{message}")]
    Permanent { message: String },

    #[error("Capability call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl CapabilityError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CapabilityError::Transient { .. } | CapabilityError::Timeout { .. }
        )
    }
}

/// Invariant breaches detected while assembling a report. These indicate a bug
/// and are never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Matched signal {name} is not defined by the selling product")]
    UndefinedSignal { name: String },

    #[error("Matched signal {name} appears more than once")]
    DuplicateMatch { name: String },

    #[error("Step {step_id} was recorded more than once")]
    DuplicateStep { step_id: String },

    #[error("Step order mismatch: expected {expected:?}, got {actual:?}")]
    StepOrder {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Step {step_id} is keyed under a result for {result_step_id}")]
    StepKeyMismatch {
        step_id: String,
        result_step_id: String,
    },

    #[error("Step {step_id} is inconsistent: {message}")]
    InconsistentStep { step_id: String, message: String },

    #[error("Fit score {score} is outside [0, 1]")]
    ScoreOutOfRange { score: f64 },

    #[error("Inconsistent timing: {message}")]
    Timing { message: String },
}

/// Malformed output from a fuzzy extraction. Always recovered locally.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionError {
    #[error("No structured content found: {message}")]
    NoContent { message: String },

    #[error("Malformed record: {message}")]
    Malformed { message: String },

    #[error("Unknown signal referenced: {name}")]
    UnknownSignal { name: String },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Report not found: {report_id}")]
    ReportNotFound { report_id: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Langbase API errors
#[derive(Debug, Error)]
pub enum LangbaseError {
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<LangbaseError> for CapabilityError {
    fn from(err: LangbaseError) -> Self {
        match err {
            LangbaseError::Api { status, message } if status == 429 || status >= 500 => {
                CapabilityError::Transient {
                    message: format!("{} - {}", status, message),
                }
            }
            // Context-size overflows and auth problems will not improve on retry.
            LangbaseError::Api { message, .. } => CapabilityError::Permanent { message },
            LangbaseError::Timeout { timeout_ms } => CapabilityError::Timeout { timeout_ms },
            LangbaseError::InvalidResponse { message } => CapabilityError::Transient { message },
            LangbaseError::Http(e) => CapabilityError::Transient {
                message: e.to_string(),
            },
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for Langbase operations
pub type LangbaseResult<T> = Result<T, LangbaseError>;

/// Result type alias for research capability calls
pub type CapabilityResult<T> = Result<T, CapabilityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Environment {
            message: "missing key".to_string(),
        };
        assert_eq!(err.to_string(), "Environment configuration error: missing key");

        let err = AppError::Internal {
            message: "unexpected".to_string(),
        };
        assert_eq!(err.to_string(), "Internal error: unexpected");
    }

    #[test]
    fn test_configuration_error_display() {
        assert_eq!(
            ConfigurationError::NoSteps.to_string(),
            "No research steps were defined"
        );

        let err = ConfigurationError::UnknownDependency {
            step_id: "step_2".to_string(),
            dependency: "step_9".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Step step_2 depends on step_9, which is not an earlier step"
        );
    }

    #[test]
    fn test_permanent_capability_error_preserves_raw_message() {
        let raw = "This model's maximum context length is 128000 tokens";
        let err = CapabilityError::Permanent {
            message: raw.to_string(),
        };
        assert_eq!(err.to_string(), raw);
        assert!(!err.is_transient());
    }

    #[test]
    fn test_capability_error_transience() {
        assert!(CapabilityError::Timeout { timeout_ms: 10 }.is_transient());
        assert!(CapabilityError::Transient {
            message: "rate limited".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_langbase_error_classification() {
        let rate_limited: CapabilityError = LangbaseError::Api {
            status: 429,
            message: "slow down".to_string(),
        }
        .into();
        assert!(rate_limited.is_transient());

        let server: CapabilityError = LangbaseError::Api {
            status: 503,
            message: "unavailable".to_string(),
        }
        .into();
        assert!(server.is_transient());

        let too_long: CapabilityError = LangbaseError::Api {
            status: 400,
            message: "context_length_exceeded".to_string(),
        }
        .into();
        assert_eq!(
            too_long,
            CapabilityError::Permanent {
                message: "context_length_exceeded".to_string()
            }
        );

        let timeout: CapabilityError = LangbaseError::Timeout { timeout_ms: 5000 }.into();
        assert_eq!(timeout, CapabilityError::Timeout { timeout_ms: 5000 });
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::UndefinedSignal {
            name: "Ghost".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Matched signal Ghost is not defined by the selling product"
        );
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::ReportNotFound {
            report_id: "rep-123".to_string(),
        };
        assert_eq!(err.to_string(), "Report not found: rep-123");

        let err = StorageError::Migration {
            message: "version mismatch".to_string(),
        };
        assert_eq!(err.to_string(), "Migration failed: version mismatch");
    }

    #[test]
    fn test_error_conversions_to_app_error() {
        let app_err: AppError = ValidationError::Timing {
            message: "negative".to_string(),
        }
        .into();
        assert!(matches!(app_err, AppError::Validation(_)));

        let app_err: AppError = ConfigurationError::NoSteps.into();
        assert!(matches!(app_err, AppError::Configuration(_)));

        let app_err: AppError = LangbaseError::Timeout { timeout_ms: 1000 }.into();
        assert!(matches!(app_err, AppError::Langbase(_)));
    }
}
