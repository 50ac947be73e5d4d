use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Validation errors (never retried, never routed through a breaker)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Key already present on create
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Circuit breaker rejected the call without invoking the operation
    #[error("Circuit breaker is open for '{name}'")]
    CircuitOpen { name: String },

    /// Retry budget exhausted
    #[error("Operation '{operation}' failed after {attempts} attempts: {last_error}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        last_error: Box<AppError>,
    },

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Cooperative cancellation
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(String),

    /// Network errors
    #[error("Network error: {0}")]
    Network(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored data failed integrity checks
    #[error("Data corruption detected: {0}")]
    Corruption(String),

    /// System resources above the configured ceiling
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Pre-flight check failed
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// A successful call returned a result of the wrong shape
    #[error("Malformed result: {reason}")]
    MalformedResult { reason: String, missing: Vec<String> },

    /// A recovery strategy could not produce a result
    #[error("Recovery failed: {0}")]
    Recovery(String),

    /// Operator action required
    #[error("Manual intervention required for '{component}': {message}")]
    ManualIntervention { component: String, message: String },

    /// Original failure plus the failure of its recovery
    #[error("Escalated error [{correlation_id}]: {original}; recovery failed: {recovery}")]
    Escalated {
        original: Box<AppError>,
        recovery: Box<AppError>,
        correlation_id: String,
    },

    /// Generic failure reported by a wrapped operation
    #[error("Operation failed: {0}")]
    Operation(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::CircuitOpen { .. } => "CIRCUIT_OPEN",
            AppError::RetryExhausted { .. } => "RETRY_EXHAUSTED",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::Cancelled(_) => "CANCELLED",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Network(_) => "NETWORK_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Corruption(_) => "DATA_CORRUPTION",
            AppError::ResourceExhausted(_) => "RESOURCE_EXHAUSTED",
            AppError::PreconditionFailed(_) => "PRECONDITION_FAILED",
            AppError::MalformedResult { .. } => "MALFORMED_RESULT",
            AppError::Recovery(_) => "RECOVERY_FAILED",
            AppError::ManualIntervention { .. } => "MANUAL_INTERVENTION_REQUIRED",
            AppError::Escalated { .. } => "ESCALATED",
            AppError::Operation(_) => "OPERATION_FAILED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Variant name, recorded as the error "name" in error records
    pub fn name(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "ValidationError",
            AppError::Configuration(_) => "ConfigurationError",
            AppError::NotFound(_) => "NotFoundError",
            AppError::Conflict(_) => "ConflictError",
            AppError::CircuitOpen { .. } => "CircuitOpenError",
            AppError::RetryExhausted { .. } => "RetryExhaustedError",
            AppError::Timeout(_) => "TimeoutError",
            AppError::Cancelled(_) => "CancelledError",
            AppError::Database(_) => "DatabaseError",
            AppError::Network(_) => "NetworkError",
            AppError::Io(_) => "IoError",
            AppError::Serialization(_) => "SerializationError",
            AppError::Corruption(_) => "CorruptionError",
            AppError::ResourceExhausted(_) => "ResourceExhaustedError",
            AppError::PreconditionFailed(_) => "PreconditionError",
            AppError::MalformedResult { .. } => "MalformedResultError",
            AppError::Recovery(_) => "RecoveryError",
            AppError::ManualIntervention { .. } => "ManualInterventionError",
            AppError::Escalated { .. } => "EscalatedError",
            AppError::Operation(_) => "OperationError",
            AppError::Internal(_) => "InternalError",
        }
    }

    /// The underlying error behind retry exhaustion and escalation wrappers
    pub fn root(&self) -> &AppError {
        match self {
            AppError::RetryExhausted { last_error, .. } => last_error.root(),
            AppError::Escalated { original, .. } => original.root(),
            other => other,
        }
    }

    /// Text scanned by the severity and strategy tables: the root error's
    /// code and message, with operation and field identifiers left out.
    pub fn classification_text(&self) -> String {
        let root = self.root();
        let message = match root {
            AppError::CircuitOpen { .. } => "circuit breaker is open".to_string(),
            AppError::Timeout(_) => "operation timed out".to_string(),
            AppError::Cancelled(_) => "operation cancelled".to_string(),
            AppError::ManualIntervention { message, .. } => message.clone(),
            other => other.to_string(),
        };
        format!("{} {}", root.error_code(), message).to_lowercase()
    }

    /// Whether this is a validation failure
    pub fn is_validation(&self) -> bool {
        matches!(self.root(), AppError::Validation(_))
    }

    /// Errors caused by the request itself rather than the dependency.
    /// They never count against a circuit breaker and skip recovery.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self.root(),
            AppError::Validation(_) | AppError::Conflict(_) | AppError::NotFound(_)
        )
    }

    /// Chain of wrapped errors, outermost first
    pub fn chain(&self) -> Vec<String> {
        let mut chain = vec![self.to_string()];
        match self {
            AppError::RetryExhausted { last_error, .. } => chain.extend(last_error.chain()),
            AppError::Escalated {
                original, recovery, ..
            } => {
                chain.extend(original.chain());
                chain.extend(recovery.chain());
            }
            _ => {}
        }
        chain
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from sled::Error
impl From<sled::Error> for AppError {
    fn from(err: sled::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
