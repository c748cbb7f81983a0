//! Error types for the backend library.

use thiserror::Error;

/// Boxed error produced by a concrete execution handle.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for backend operations.
#[derive(Error, Debug)]
pub enum BackendError {
    /// A backend name was registered twice.
    #[error("Backend '{0}' is already registered")]
    DuplicateRegistration(String),

    /// Lookup of a backend name that was never registered.
    #[error("Unknown backend: '{0}'")]
    UnknownBackend(String),

    /// The backend's capability flag for this operation is false.
    #[error("Backend '{backend}' does not support {operation}")]
    UnsupportedOperation { backend: String, operation: String },

    /// The host field kind has no column mapping in this dialect.
    #[error("No column type mapping for field '{field}' of kind {kind}")]
    NoTypeMapping { field: String, kind: String },

    /// An update assignment is not of the form `col = expr`.
    #[error("Invalid update assignment: {0:?}")]
    InvalidAssignment(String),

    /// Catalog query failed while introspecting a table.
    #[error("{operation} failed for table {table}")]
    Introspection {
        operation: String,
        table: String,
        #[source]
        source: Box<BackendError>,
    },

    /// Template rendering error (unknown or unterminated placeholder).
    #[error("Template error: {0}")]
    Template(String),

    /// Error returned by the underlying execution handle.
    #[error("Driver error: {0}")]
    Driver(#[source] DriverError),

    /// MySQL driver error.
    #[cfg(feature = "mysql")]
    #[error("MySQL error: {0}")]
    Mysql(#[from] mysql_async::Error),

    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BackendError {
    /// Create an UnsupportedOperation error.
    pub fn unsupported(backend: impl Into<String>, operation: impl Into<String>) -> Self {
        BackendError::UnsupportedOperation {
            backend: backend.into(),
            operation: operation.into(),
        }
    }

    /// Create a NoTypeMapping error.
    pub fn no_type_mapping(field: impl Into<String>, kind: impl std::fmt::Display) -> Self {
        BackendError::NoTypeMapping {
            field: field.into(),
            kind: kind.to_string(),
        }
    }

    /// Wrap a catalog failure with the operation and table it happened in.
    pub fn introspection(
        operation: impl Into<String>,
        table: impl Into<String>,
        source: BackendError,
    ) -> Self {
        BackendError::Introspection {
            operation: operation.into(),
            table: table.into(),
            source: Box::new(source),
        }
    }

    /// Wrap an arbitrary driver error.
    pub fn driver(err: impl Into<DriverError>) -> Self {
        BackendError::Driver(err.into())
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            BackendError::Config(_) | BackendError::Yaml(_) | BackendError::Io(_) => 2,
            BackendError::UnknownBackend(_) | BackendError::DuplicateRegistration(_) => 3,
            BackendError::NoTypeMapping { .. } | BackendError::InvalidAssignment(_) => 4,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_introspection_preserves_cause() {
        let cause = BackendError::driver("connection reset");
        let err = BackendError::introspection("fetch columns", "orders", cause);

        let detailed = err.format_detailed();
        assert!(detailed.contains("fetch columns failed for table orders"));
        assert!(detailed.contains("connection reset"));

        match err {
            BackendError::Introspection { source, .. } => {
                assert!(matches!(*source, BackendError::Driver(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(BackendError::Config("x".into()).exit_code(), 2);
        assert_eq!(BackendError::UnknownBackend("x".into()).exit_code(), 3);
        assert_eq!(BackendError::InvalidAssignment("x".into()).exit_code(), 4);
        assert_eq!(BackendError::unsupported("clickhouse", "update").exit_code(), 1);
    }
}
