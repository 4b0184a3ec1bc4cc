//! Client error types.
//!
//! Errors fall into two families. Logic errors report misuse of the driver
//! or of the resource graph: a missing attachment, a call in the wrong
//! state, a type mismatch. Server errors report that the transport returned
//! a failed status vector and carry that vector for inspection.

use std::fmt;

use ibpp_protocol::{ProtocolError, StatusVector};
use ibpp_types::{NativeType, TypeError};
use thiserror::Error;

use crate::transport::Interpreter;

/// A failed server call.
///
/// The diagnostic text is rendered on first use and cached in the status
/// vector.
#[derive(Clone)]
pub struct ServerError {
    /// Driver operation that issued the call.
    pub operation: &'static str,
    /// SQL code (e.g. `-803`).
    pub sql_code: i32,
    /// Engine error code from the status vector.
    pub engine_code: i64,
    /// Raw status vector.
    pub status: StatusVector,
    interpreter: Interpreter,
}

impl ServerError {
    /// Wrap `status`, keeping the transport's message catalogue for rendering.
    #[must_use]
    pub fn new(operation: &'static str, status: StatusVector, interpreter: Interpreter) -> Self {
        Self {
            operation,
            sql_code: status.sql_code(&*interpreter),
            engine_code: status.engine_code(),
            status,
            interpreter,
        }
    }

    /// Rendered SQL and engine diagnostics.
    #[must_use]
    pub fn message(&self) -> &str {
        self.status.error_message(&*self.interpreter)
    }
}

impl fmt::Debug for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerError")
            .field("operation", &self.operation)
            .field("sql_code", &self.sql_code)
            .field("engine_code", &self.engine_code)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.message())
    }
}

impl std::error::Error for ServerError {}

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Misuse of the driver not covered by a more specific kind.
    #[error("{context}: {message}")]
    Logic {
        /// Operation that was refused.
        context: &'static str,
        /// What was wrong.
        message: String,
    },

    /// A native type was paired with a column that cannot hold it.
    #[error("{context}: incompatible types, {sql_type} column and {native} value")]
    WrongType {
        /// Operation that was refused.
        context: &'static str,
        /// Wire type of the column.
        sql_type: &'static str,
        /// Native type written or requested.
        native: NativeType,
    },

    /// Numeric conversion would not fit the target.
    #[error("{context}: out of range numeric conversion to {target_type}")]
    OutOfRange {
        /// Operation that was refused.
        context: &'static str,
        /// Target type name.
        target_type: &'static str,
    },

    /// Any other value conversion failure.
    #[error("{context}: {source}")]
    Type {
        /// Operation that was refused.
        context: &'static str,
        /// Underlying conversion error.
        #[source]
        source: TypeError,
    },

    /// An information item was absent from a server response.
    #[error("information item {tag} not found in server response")]
    FieldNotFound {
        /// Item tag.
        tag: u8,
    },

    /// No column has the requested name or alias.
    #[error("could not find column named '{0}'")]
    ColumnNotFound(String),

    /// The database is not attached.
    #[error("{context}: database is not connected")]
    NotConnected {
        /// Operation that was refused.
        context: &'static str,
    },

    /// The transaction is already started.
    #[error("{context}: transaction is already started")]
    AlreadyStarted {
        /// Operation that was refused.
        context: &'static str,
    },

    /// The transaction is not started.
    #[error("{context}: transaction is not started")]
    NotStarted {
        /// Operation that was refused.
        context: &'static str,
    },

    /// A transaction was started while one of its databases was detached.
    #[error("transaction start: all attached databases must be connected")]
    NotAllAttachedConnected,

    /// Some input parameters were neither set nor nulled.
    #[error("{context}: all parameters must be specified ({missing} missing)")]
    MissingParameters {
        /// Operation that was refused.
        context: &'static str,
        /// Number of untouched parameters.
        missing: usize,
    },

    /// The blob is already open.
    #[error("{context}: blob is already open")]
    AlreadyOpen {
        /// Operation that was refused.
        context: &'static str,
    },

    /// Array bounds may only be narrowed.
    #[error("invalid bounds [{low}:{high}] for dimension {dimension}; bounds can only be narrowed")]
    InvalidBounds {
        /// Zero-based dimension.
        dimension: usize,
        /// Requested lower bound.
        low: i32,
        /// Requested upper bound.
        high: i32,
    },

    /// Array data does not match the described slice.
    #[error("wrong count of array elements: slice holds {expected}, got {actual}")]
    ElementCountMismatch {
        /// Elements in the described slice.
        expected: usize,
        /// Elements supplied.
        actual: usize,
    },

    /// The event buffer would exceed the protocol limit.
    #[error("event buffer overflow: {needed} bytes exceeds the {limit} byte limit")]
    BufferOverflow {
        /// Size the buffer would reach.
        needed: usize,
        /// Protocol ceiling.
        limit: usize,
    },

    /// The server's on-disk structure or dialect is not supported.
    #[error("unsupported server: {0}")]
    UnsupportedServer(String),

    /// A resource key is stale or belongs to a different client.
    #[error("{0} handle is stale or unknown")]
    InvalidHandle(&'static str),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed wire buffer.
    #[error("protocol error: {0}")]
    Protocol(ProtocolError),

    /// The server rejected a call.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// The server rejected a statement at prepare time.
    #[error("prepare failed for `{sql}`: {source}")]
    PrepareFailed {
        /// Statement text.
        sql: String,
        /// Server diagnostics.
        #[source]
        source: ServerError,
    },
}

impl Error {
    /// Build a [`Error::Logic`].
    pub(crate) fn logic(context: &'static str, message: impl Into<String>) -> Self {
        Self::Logic {
            context,
            message: message.into(),
        }
    }

    /// Attach an operation name to a conversion error.
    pub(crate) fn from_type(context: &'static str, err: TypeError) -> Self {
        match err {
            TypeError::WrongType { sql_type, native } => Self::WrongType {
                context,
                sql_type,
                native,
            },
            TypeError::OutOfRange { target_type } => Self::OutOfRange {
                context,
                target_type,
            },
            source => Self::Type { context, source },
        }
    }

    /// Check if this error reports driver or caller misuse.
    #[must_use]
    pub fn is_logic_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Check if this error carries a server status vector.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Server(_) | Self::PrepareFailed { .. })
    }

    /// Server diagnostics, if any.
    #[must_use]
    pub fn server_error(&self) -> Option<&ServerError> {
        match self {
            Self::Server(e) | Self::PrepareFailed { source: e, .. } => Some(e),
            _ => None,
        }
    }

    /// SQL code of a server error.
    #[must_use]
    pub fn sql_code(&self) -> Option<i32> {
        self.server_error().map(|e| e.sql_code)
    }

    /// Engine code of a server error.
    #[must_use]
    pub fn engine_code(&self) -> Option<i64> {
        self.server_error().map(|e| e.engine_code)
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::FieldNotFound { tag, .. } => Self::FieldNotFound { tag },
            ProtocolError::EventBufferOverflow { needed, limit } => {
                Self::BufferOverflow { needed, limit }
            }
            other => Self::Protocol(other),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use ibpp_protocol::{StatusInterpreter, STATUS_LEN};

    struct Catalogue;

    impl StatusInterpreter for Catalogue {
        fn sql_code(&self, _status: &[i64; STATUS_LEN]) -> i32 {
            -803
        }

        fn sql_message(&self, sql_code: i32) -> String {
            format!("violation ({sql_code})")
        }

        fn engine_messages(&self, _status: &[i64; STATUS_LEN]) -> Vec<String> {
            vec!["duplicate value in unique index".into()]
        }
    }

    #[test]
    fn test_server_error_renders_status() {
        let err = ServerError::new(
            "Statement::Execute",
            StatusVector::error(335_544_665),
            Arc::new(Catalogue),
        );
        assert_eq!(err.sql_code, -803);
        assert_eq!(err.engine_code, 335_544_665);
        assert!(err.message().contains("duplicate value"));
        assert!(err.to_string().starts_with("Statement::Execute: "));
    }

    #[test]
    fn test_server_error_renders_on_first_use() {
        let err = ServerError::new(
            "Blob::Write",
            StatusVector::error(335_544_665),
            Arc::new(Catalogue),
        );
        assert_eq!(err.status.cached_message(), None);

        let first = err.message().as_ptr();
        assert!(err.status.cached_message().is_some());
        assert_eq!(err.message().as_ptr(), first);
        assert!(err.message().starts_with("SQL Message : -803"));
    }

    #[test]
    fn test_error_families() {
        let server: Error =
            ServerError::new("Transaction::Start", StatusVector::error(1), Arc::new(Catalogue)).into();
        assert!(server.is_server_error());
        assert_eq!(server.sql_code(), Some(-803));

        let logic = Error::logic("Blob::Read", "No Blob is open.");
        assert!(logic.is_logic_error());
        assert_eq!(logic.sql_code(), None);
        assert_eq!(logic.to_string(), "Blob::Read: No Blob is open.");
    }

    #[test]
    fn test_type_errors_keep_their_kind() {
        let err = Error::from_type(
            "Row::Set",
            TypeError::WrongType {
                sql_type: "SQL_LONG",
                native: NativeType::Date,
            },
        );
        assert!(matches!(err, Error::WrongType { sql_type: "SQL_LONG", .. }));

        let err = Error::from_type("Row::Set", TypeError::OutOfRange { target_type: "int16" });
        assert!(matches!(err, Error::OutOfRange { target_type: "int16", .. }));
    }

    #[test]
    fn test_missing_field_maps_to_field_not_found() {
        let err: Error = ProtocolError::FieldNotFound { tag: 32, subtag: None }.into();
        assert!(matches!(err, Error::FieldNotFound { tag: 32 }));
    }
}
