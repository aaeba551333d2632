//! Error types module
//!
//! All errors raised by the explorer, the metadata store and the signing layer are
//! unified under `AppError`. Storage drivers have their own `StorageError` (in
//! `stowage-storage`) which converts into `AppError` at the explorer boundary.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like resource limits
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "DATABASE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O failure: {0}")]
    Io(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage policy not allowed: {0}")]
    PolicyNotAllowed(String),

    #[error("User group not allowed: {0}")]
    GroupNotAllowed(String),

    #[error("Object already exists: {0}")]
    ObjectExists(String),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("File extension not allowed: {0}")]
    ExtensionNotAllowed(String),

    #[error("File too large: {size} bytes exceeds policy limit of {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Insufficient capacity: {available} bytes available, {required} bytes required")]
    InsufficientCapacity { available: u64, required: u64 },

    #[error("Upload canceled: {0}")]
    UploadCanceled(String),

    #[error("Upload transfer failed: {0}")]
    Transfer(String),

    #[error("Invalid signature: {0}")]
    SignInvalid(String),

    #[error("Signature expired")]
    SignExpired,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, sensitive, log_level).
fn app_error_static_metadata(err: &AppError) -> (u16, &'static str, bool, bool, LogLevel) {
    match err {
        AppError::Database(_) => (500, "DATABASE_ERROR", true, true, LogLevel::Error),
        AppError::Storage(_) => (500, "STORAGE_ERROR", true, true, LogLevel::Error),
        AppError::Io(_) => (500, "IO_FAILED", true, true, LogLevel::Error),
        AppError::InvalidInput(_) => (400, "INVALID_INPUT", false, false, LogLevel::Debug),
        AppError::NotFound(_) => (404, "NOT_FOUND", false, false, LogLevel::Debug),
        AppError::PolicyNotAllowed(_) => (403, "POLICY_NOT_ALLOWED", false, false, LogLevel::Warn),
        AppError::GroupNotAllowed(_) => (403, "GROUP_NOT_ALLOWED", false, false, LogLevel::Warn),
        AppError::ObjectExists(_) => (409, "OBJECT_EXISTS", false, false, LogLevel::Debug),
        AppError::InvalidFileName(_) => (400, "INVALID_FILE_NAME", false, false, LogLevel::Debug),
        AppError::ExtensionNotAllowed(_) => {
            (400, "EXTENSION_NOT_ALLOWED", false, false, LogLevel::Debug)
        }
        AppError::FileTooLarge { .. } => (413, "FILE_TOO_LARGE", false, false, LogLevel::Debug),
        AppError::InsufficientCapacity { .. } => {
            (507, "INSUFFICIENT_CAPACITY", false, false, LogLevel::Warn)
        }
        AppError::UploadCanceled(_) => (499, "UPLOAD_CANCELED", true, false, LogLevel::Warn),
        AppError::Transfer(_) => (400, "TRANSFER_FAILED", true, false, LogLevel::Warn),
        AppError::SignInvalid(_) => (403, "SIGN_INVALID", false, false, LogLevel::Debug),
        AppError::SignExpired => (403, "SIGN_EXPIRED", false, false, LogLevel::Debug),
        AppError::Unauthorized(_) => (401, "UNAUTHORIZED", false, false, LogLevel::Debug),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => {
            (500, "INTERNAL_ERROR", true, true, LogLevel::Error)
        }
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::Io(_) => "Io",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::PolicyNotAllowed(_) => "PolicyNotAllowed",
            AppError::GroupNotAllowed(_) => "GroupNotAllowed",
            AppError::ObjectExists(_) => "ObjectExists",
            AppError::InvalidFileName(_) => "InvalidFileName",
            AppError::ExtensionNotAllowed(_) => "ExtensionNotAllowed",
            AppError::FileTooLarge { .. } => "FileTooLarge",
            AppError::InsufficientCapacity { .. } => "InsufficientCapacity",
            AppError::UploadCanceled(_) => "UploadCanceled",
            AppError::Transfer(_) => "Transfer",
            AppError::SignInvalid(_) => "SignInvalid",
            AppError::SignExpired => "SignExpired",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).3
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).4
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Io(_) => "Failed to read or write file content".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}
