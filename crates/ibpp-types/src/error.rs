//! Type conversion error types.

use thiserror::Error;

use crate::value::NativeType;

/// Errors that can occur during type conversion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TypeError {
    /// Value is null when non-null was expected.
    #[error("unexpected null value")]
    UnexpectedNull,

    /// A value of one native type was asked for as another.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type name.
        expected: &'static str,
        /// Actual type name.
        actual: &'static str,
    },

    /// The column's wire type cannot hold or produce the native type.
    #[error("incompatible types: {sql_type} column and {native} value")]
    WrongType {
        /// Wire type name of the column.
        sql_type: &'static str,
        /// Native type that was written or requested.
        native: NativeType,
    },

    /// Value is out of range for target type.
    #[error("out of range numeric conversion to {target_type}")]
    OutOfRange {
        /// Target type name.
        target_type: &'static str,
    },

    /// Invalid date/time value.
    #[error("invalid date/time: {0}")]
    InvalidDateTime(String),

    /// NUMERIC scale outside the supported 0..=18 decimal places.
    #[error("unsupported numeric scale {0}")]
    InvalidScale(i16),

    /// A fixed-size value does not fit its column.
    #[error("length mismatch: column holds {expected} bytes, value has {actual}")]
    LengthMismatch {
        /// Column width.
        expected: usize,
        /// Value width.
        actual: usize,
    },

    /// Buffer too small for value.
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes needed.
        needed: usize,
        /// Bytes available.
        available: usize,
    },
}
