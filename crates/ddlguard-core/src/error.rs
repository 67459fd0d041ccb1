//! Error types for the safe-operation engine.

use crate::operation::OperationKind;
use thiserror::Error;

/// A statement rejected by the database.
///
/// This is the typed failure the host connection raises for any DDL statement
/// or capability probe. The engine never rewrites it: when a validation phase
/// fails, the same value reaches the caller inside [`SafetyError::ValidationFailed`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StatementError {
    /// The SQL (or statement description) that failed.
    pub statement: String,
    /// The database error message.
    pub message: String,
    /// SQLSTATE code, when the driver reports one.
    pub code: Option<String>,
}

impl StatementError {
    /// Create a statement error without an SQLSTATE code.
    pub fn new(statement: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            message: message.into(),
            code: None,
        }
    }

    /// Attach an SQLSTATE code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Errors raised while planning or executing a safe operation.
#[derive(Debug, Error)]
pub enum SafetyError {
    /// Unsupported option combination. Raised before any DDL runs.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An option key the operation does not recognize.
    #[error("unknown option `{key}` for {kind}")]
    UnknownOption {
        /// The operation the option was passed to.
        kind: OperationKind,
        /// The offending key.
        key: String,
    },

    /// An option with a value of the wrong shape.
    #[error("invalid value for option `{key}` of {kind}: {reason}")]
    InvalidOption {
        /// The operation the option was passed to.
        kind: OperationKind,
        /// The offending key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The validation phase was rejected by the database.
    ///
    /// The unvalidated object has already been removed when this is returned.
    #[error("validation of {object} failed: {source}")]
    ValidationFailed {
        /// The constraint or object being validated.
        object: String,
        /// The original database error.
        #[source]
        source: StatementError,
    },

    /// Removing the unvalidated object after a failed validation also failed.
    #[error("removal of {object} after failed validation failed: {source} (validation error: {validation})")]
    CompensationFailed {
        /// The constraint or object being removed.
        object: String,
        /// The error raised by the compensating removal.
        #[source]
        source: StatementError,
        /// The validation error that triggered the removal.
        validation: StatementError,
    },

    /// A non-validation phase failed.
    #[error("statement failed: {0}")]
    Statement(#[from] StatementError),

    /// The operation has no reverse phases.
    #[error("{0} cannot be reversed")]
    Irreversible(String),
}

impl SafetyError {
    /// The database error at the root of this failure, if any.
    ///
    /// For a failed compensation this is the compensation error, since it
    /// supersedes the validation failure.
    pub fn statement_error(&self) -> Option<&StatementError> {
        match self {
            SafetyError::ValidationFailed { source, .. } => Some(source),
            SafetyError::CompensationFailed { source, .. } => Some(source),
            SafetyError::Statement(source) => Some(source),
            _ => None,
        }
    }

    /// Whether the error was raised before touching the database.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SafetyError::Configuration(_)
                | SafetyError::UnknownOption { .. }
                | SafetyError::InvalidOption { .. }
        )
    }
}
