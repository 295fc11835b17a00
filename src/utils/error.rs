use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeederError {
    #[error("Validation error on {field} = {value}: {reason}")]
    Validation {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{service} is unavailable: circuit breaker is open")]
    DownstreamUnavailable { service: String },

    #[error("{service} timed out during {operation}")]
    DownstreamTimeout { service: String, operation: String },

    #[error("{service} rejected the request with status {status}: {body}")]
    DownstreamRejected {
        service: String,
        status: u16,
        body: String,
    },

    #[error("{service} could not be reached: {message}")]
    DownstreamTransport { service: String, message: String },

    #[error("No unused {kind} found after {attempts} attempts")]
    UniquenessExhausted { kind: String, attempts: usize },

    #[error("None of the {requested} requested customers could be created")]
    NoCustomersCreated { requested: usize },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Worker task failed: {message}")]
    Task { message: String },

    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Zip operation failed: {0}")]
    Zip(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, SeederError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Configuration,
    Downstream,
    Generation,
    Export,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl SeederError {
    pub fn validation(field: &str, value: impl ToString, reason: impl Into<String>) -> Self {
        SeederError::Validation {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SeederError::Validation { .. } => ErrorCategory::Validation,
            SeederError::Config { .. } | SeederError::Toml(_) => ErrorCategory::Configuration,
            SeederError::DownstreamUnavailable { .. }
            | SeederError::DownstreamTimeout { .. }
            | SeederError::DownstreamRejected { .. }
            | SeederError::DownstreamTransport { .. } => ErrorCategory::Downstream,
            SeederError::UniquenessExhausted { .. }
            | SeederError::NoCustomersCreated { .. }
            | SeederError::Cancelled => ErrorCategory::Generation,
            SeederError::Csv(_) | SeederError::Zip(_) => ErrorCategory::Export,
            SeederError::Io(_) | SeederError::Serialization(_) | SeederError::Task { .. } => {
                ErrorCategory::System
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SeederError::UniquenessExhausted { .. } | SeederError::Cancelled => ErrorSeverity::Low,
            SeederError::DownstreamUnavailable { .. }
            | SeederError::DownstreamTimeout { .. }
            | SeederError::DownstreamTransport { .. } => ErrorSeverity::Medium,
            SeederError::Validation { .. }
            | SeederError::Config { .. }
            | SeederError::Toml(_)
            | SeederError::DownstreamRejected { .. }
            | SeederError::NoCustomersCreated { .. }
            | SeederError::Csv(_)
            | SeederError::Zip(_)
            | SeederError::Serialization(_) => ErrorSeverity::High,
            SeederError::Io(_) | SeederError::Task { .. } => ErrorSeverity::Critical,
        }
    }

    /// Transient failures worth another attempt. An open breaker is not one of
    /// them: the caller should fail fast until the cool-down elapses.
    pub fn is_retryable(&self) -> bool {
        match self {
            SeederError::DownstreamTimeout { .. } | SeederError::DownstreamTransport { .. } => true,
            SeederError::DownstreamRejected { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            SeederError::Validation { field, reason, .. } => {
                format!("Invalid value for '{}': {}", field, reason)
            }
            SeederError::DownstreamUnavailable { service } => {
                format!("{} is temporarily unavailable", service)
            }
            SeederError::DownstreamTimeout { service, .. } => {
                format!("{} did not answer in time", service)
            }
            SeederError::NoCustomersCreated { .. } => {
                "No customers could be created, dataset generation aborted".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Validation => {
                "Customer count must be 1-50000; account bounds must be 1-10 with min <= max"
            }
            ErrorCategory::Configuration => "Check the settings file and environment variables",
            ErrorCategory::Downstream => {
                "Verify the customer and account services are running and reachable"
            }
            ErrorCategory::Generation => "Check the downstream services and retry the run",
            ErrorCategory::Export => "Check the output directory and retry the export",
            ErrorCategory::System => "Inspect the logs for details",
        }
    }
}

/// Structured failure body printed by every top-level operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub error: String,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub suggestion: String,
}

impl From<&SeederError> for ErrorPayload {
    fn from(err: &SeederError) -> Self {
        Self {
            error: err.user_friendly_message(),
            category: err.category(),
            severity: err.severity(),
            suggestion: err.recovery_suggestion().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_retry_only_on_server_errors() {
        let server = SeederError::DownstreamRejected {
            service: "customer-service".to_string(),
            status: 503,
            body: String::new(),
        };
        let client = SeederError::DownstreamRejected {
            service: "customer-service".to_string(),
            status: 400,
            body: "duplicate email".to_string(),
        };

        assert!(server.is_retryable());
        assert!(!client.is_retryable());
    }

    #[test]
    fn test_transport_failures_are_retryable() {
        let timeout = SeederError::DownstreamTimeout {
            service: "customer-service".to_string(),
            operation: "create".to_string(),
        };
        let refused = SeederError::DownstreamTransport {
            service: "customer-service".to_string(),
            message: "connection refused".to_string(),
        };

        assert!(timeout.is_retryable());
        assert!(refused.is_retryable());
        assert_eq!(refused.severity(), ErrorSeverity::Medium);
    }

    #[test]
    fn test_open_breaker_is_not_retryable() {
        let err = SeederError::DownstreamUnavailable {
            service: "account-service".to_string(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.category(), ErrorCategory::Downstream);
    }

    #[test]
    fn test_error_payload_carries_category() {
        let err = SeederError::validation("count", 0, "must be between 1 and 50000");
        let payload = ErrorPayload::from(&err);

        assert_eq!(payload.category, ErrorCategory::Validation);
        assert_eq!(payload.severity, ErrorSeverity::High);
        assert!(payload.error.contains("count"));
    }
}
