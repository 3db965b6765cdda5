//! Error types for the reconciliation library.

use thiserror::Error;

use crate::core::Engine;

/// Main error type for verification operations.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure to open or keep a database session.
    #[error("{engine} connection error: {message}")]
    Connectivity { engine: Engine, message: String },

    /// Table list or foreign-key metadata could not be read.
    #[error("Catalog query failed: {0}")]
    Catalog(String),

    /// A catalog-supplied name that cannot be quoted safely.
    #[error("Invalid identifier: {0}")]
    Identifier(String),

    /// A query scoped to a single table failed.
    #[error("Query failed ({context}): {message}")]
    Query { context: String, message: String },

    /// A timestamp-like column held a value that could not be parsed.
    #[error("Cannot parse value {value:?} of column '{column}' as a timestamp")]
    Normalize { column: String, value: String },

    /// A single query exceeded the configured timeout.
    #[error("Query timed out after {seconds}s ({context})")]
    Timeout { context: String, seconds: u64 },

    /// The whole run exceeded its deadline.
    #[error("Verification run exceeded its deadline")]
    DeadlineExceeded,

    /// Run was cancelled (SIGINT, etc.)
    #[error("Verification cancelled")]
    Cancelled,

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

impl VerifyError {
    /// Create a Connectivity error for the given engine.
    pub fn connectivity(engine: Engine, message: impl ToString) -> Self {
        VerifyError::Connectivity {
            engine,
            message: message.to_string(),
        }
    }

    /// Create a Query error with context about where it occurred.
    pub fn query(context: impl Into<String>, message: impl ToString) -> Self {
        VerifyError::Query {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Whether a retry with backoff may succeed.
    ///
    /// Only session-level failures qualify. SQL errors (missing column,
    /// syntax) and logical outcomes are never retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, VerifyError::Connectivity { .. })
    }

    /// Whether this error must terminate the whole run rather than
    /// being folded into a single table's report.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            VerifyError::Config(_)
                | VerifyError::Connectivity { .. }
                | VerifyError::Catalog(_)
                | VerifyError::DeadlineExceeded
                | VerifyError::Cancelled
        )
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            VerifyError::Config(_) | VerifyError::Yaml(_) | VerifyError::Json(_) => 1,
            VerifyError::Connectivity { .. } => 3,
            VerifyError::Catalog(_) => 4,
            VerifyError::Timeout { .. } | VerifyError::DeadlineExceeded => 5,
            VerifyError::Cancelled => 6,
            VerifyError::Io(_) => 7,
            VerifyError::Identifier(_)
            | VerifyError::Query { .. }
            | VerifyError::Normalize { .. } => 8,
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

/// Result type alias for verification operations.
pub type Result<T> = std::result::Result<T, VerifyError>;
