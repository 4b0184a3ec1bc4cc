//! SQL value representation.

use std::fmt;

use ibpp_protocol::{BlrType, Quad, SqlType};

use crate::datetime::{Date, Time, Timestamp};
use crate::dbkey::DbKey;

/// The native side of a conversion.
///
/// Every read or write names the Rust-side type it works with; the
/// column's wire type decides whether the pairing is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeType {
    /// `bool`.
    Bool,
    /// `String`.
    String,
    /// Raw bytes.
    Bytes,
    /// `i16`.
    Int16,
    /// `i32`.
    Int32,
    /// `i64`.
    Int64,
    /// `f32`.
    Float,
    /// `f64`.
    Double,
    /// [`Timestamp`].
    Timestamp,
    /// [`Date`].
    Date,
    /// [`Time`].
    Time,
    /// [`DbKey`].
    DbKey,
    /// Blob id.
    Blob,
    /// Array id.
    Array,
}

impl NativeType {
    /// Name used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float => "float",
            Self::Double => "double",
            Self::Timestamp => "timestamp",
            Self::Date => "date",
            Self::Time => "time",
            Self::DbKey => "dbkey",
            Self::Blob => "blob",
            Self::Array => "array",
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Logical SQL data type of a column, as callers see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDataType {
    /// ARRAY.
    Array,
    /// BLOB.
    Blob,
    /// DATE.
    Date,
    /// TIME.
    Time,
    /// TIMESTAMP.
    Timestamp,
    /// CHAR or VARCHAR.
    String,
    /// SMALLINT.
    Smallint,
    /// INTEGER.
    Integer,
    /// BIGINT or NUMERIC(18, x).
    Largeint,
    /// FLOAT.
    Float,
    /// DOUBLE PRECISION.
    Double,
}

impl From<SqlType> for SqlDataType {
    fn from(t: SqlType) -> Self {
        match t {
            SqlType::Text | SqlType::Varying => Self::String,
            SqlType::Short => Self::Smallint,
            SqlType::Long => Self::Integer,
            SqlType::Int64 => Self::Largeint,
            SqlType::Float => Self::Float,
            SqlType::Double => Self::Double,
            SqlType::Timestamp => Self::Timestamp,
            SqlType::Date => Self::Date,
            SqlType::Time => Self::Time,
            SqlType::Blob => Self::Blob,
            SqlType::Array => Self::Array,
        }
    }
}

impl From<BlrType> for SqlDataType {
    fn from(t: BlrType) -> Self {
        match t {
            BlrType::Text | BlrType::Varying | BlrType::CString => Self::String,
            BlrType::Short => Self::Smallint,
            BlrType::Long => Self::Integer,
            BlrType::Int64 => Self::Largeint,
            BlrType::Float => Self::Float,
            BlrType::Double => Self::Double,
            BlrType::Timestamp => Self::Timestamp,
            BlrType::SqlDate => Self::Date,
            BlrType::SqlTime => Self::Time,
        }
    }
}

/// A native value read from or written to a cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Text.
    String(String),
    /// Raw bytes of a text column.
    Bytes(Vec<u8>),
    /// 16-bit integer.
    Int16(i16),
    /// 32-bit integer.
    Int32(i32),
    /// 64-bit integer.
    Int64(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Date and time.
    Timestamp(Timestamp),
    /// Date.
    Date(Date),
    /// Time of day.
    Time(Time),
    /// Row locator.
    DbKey(DbKey),
    /// Blob id.
    Blob(Quad),
    /// Array id.
    Array(Quad),
}

impl Value {
    /// Check if the value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Native type of a non-null value.
    #[must_use]
    pub fn native_type(&self) -> Option<NativeType> {
        Some(match self {
            Self::Null => return None,
            Self::Bool(_) => NativeType::Bool,
            Self::String(_) => NativeType::String,
            Self::Bytes(_) => NativeType::Bytes,
            Self::Int16(_) => NativeType::Int16,
            Self::Int32(_) => NativeType::Int32,
            Self::Int64(_) => NativeType::Int64,
            Self::Float(_) => NativeType::Float,
            Self::Double(_) => NativeType::Double,
            Self::Timestamp(_) => NativeType::Timestamp,
            Self::Date(_) => NativeType::Date,
            Self::Time(_) => NativeType::Time,
            Self::DbKey(_) => NativeType::DbKey,
            Self::Blob(_) => NativeType::Blob,
            Self::Array(_) => NativeType::Array,
        })
    }

    /// Name of the value's type, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.native_type().map_or("null", NativeType::name)
    }

    /// Get the value as an i64, if it is an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(v) => Some(*v),
            Self::Int32(v) => Some(i64::from(*v)),
            Self::Int16(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Get the value as an f64, if it is a float.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Float(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    /// Get the value as a string slice, if it is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }
}

/// Id stored in a BLOB column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlobRef(pub Quad);

/// Id stored in an ARRAY column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ArrayRef(pub Quad);
