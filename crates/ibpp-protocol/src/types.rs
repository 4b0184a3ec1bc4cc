//! Wire data types.
//!
//! Column descriptors report their type as a numeric code whose lowest bit
//! flags nullability. The driver supports a closed set of codes; anything
//! else is rejected when a descriptor is built.

use crate::error::ProtocolError;
use crate::info::stmt;

/// Wire type of a column or parameter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    /// Fixed-length text (CHAR).
    Text,
    /// Variable-length text (VARCHAR), 2-byte length prefix.
    Varying,
    /// 16-bit integer, possibly NUMERIC with a scale.
    Short,
    /// 32-bit integer, possibly NUMERIC with a scale.
    Long,
    /// 64-bit integer, possibly NUMERIC with a scale.
    Int64,
    /// 32-bit float.
    Float,
    /// 64-bit float, possibly NUMERIC with a scale in dialect 1.
    Double,
    /// Date and time.
    Timestamp,
    /// Date only.
    Date,
    /// Time only.
    Time,
    /// Blob id.
    Blob,
    /// Array id.
    Array,
}

impl SqlType {
    /// Nullability bit in a raw type code.
    pub const NULLABLE: i16 = 1;

    /// Wire code without the nullability bit.
    #[must_use]
    pub const fn code(self) -> i16 {
        match self {
            Self::Text => 452,
            Self::Varying => 448,
            Self::Short => 500,
            Self::Long => 496,
            Self::Int64 => 580,
            Self::Float => 482,
            Self::Double => 480,
            Self::Timestamp => 510,
            Self::Date => 570,
            Self::Time => 560,
            Self::Blob => 520,
            Self::Array => 540,
        }
    }

    /// Wire code with the nullability bit set as requested.
    #[must_use]
    pub const fn code_with_null(self, nullable: bool) -> i16 {
        if nullable {
            self.code() | Self::NULLABLE
        } else {
            self.code()
        }
    }

    /// Split a raw code into a type and its nullability flag.
    pub fn from_code(raw: i16) -> Result<(Self, bool), ProtocolError> {
        let nullable = raw & Self::NULLABLE != 0;
        let ty = match raw & !Self::NULLABLE {
            452 => Self::Text,
            448 => Self::Varying,
            500 => Self::Short,
            496 => Self::Long,
            580 => Self::Int64,
            482 => Self::Float,
            480 => Self::Double,
            510 => Self::Timestamp,
            570 => Self::Date,
            560 => Self::Time,
            520 => Self::Blob,
            540 => Self::Array,
            _ => return Err(ProtocolError::UnknownSqlType(raw)),
        };
        Ok((ty, nullable))
    }

    /// Size of the data area for a slot of this type with declared length `len`.
    #[must_use]
    pub const fn storage_size(self, len: usize) -> usize {
        match self {
            Self::Text => len,
            Self::Varying => len + 2,
            Self::Short => 2,
            Self::Long | Self::Float | Self::Date | Self::Time => 4,
            Self::Int64 | Self::Double | Self::Timestamp | Self::Blob | Self::Array => 8,
        }
    }

    /// Upper-case name used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Text => "SQL_TEXT",
            Self::Varying => "SQL_VARYING",
            Self::Short => "SQL_SHORT",
            Self::Long => "SQL_LONG",
            Self::Int64 => "SQL_INT64",
            Self::Float => "SQL_FLOAT",
            Self::Double => "SQL_DOUBLE",
            Self::Timestamp => "SQL_TIMESTAMP",
            Self::Date => "SQL_TYPE_DATE",
            Self::Time => "SQL_TYPE_TIME",
            Self::Blob => "SQL_BLOB",
            Self::Array => "SQL_ARRAY",
        }
    }
}

/// Element type of an array column, as reported by bounds lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlrType {
    /// Fixed-length text.
    Text = 14,
    /// Variable-length text.
    Varying = 37,
    /// Null-terminated text.
    CString = 40,
    /// 16-bit integer.
    Short = 7,
    /// 32-bit integer.
    Long = 8,
    /// 64-bit integer.
    Int64 = 16,
    /// 32-bit float.
    Float = 10,
    /// 64-bit float.
    Double = 27,
    /// Date and time.
    Timestamp = 35,
    /// Date only.
    SqlDate = 12,
    /// Time only.
    SqlTime = 13,
}

impl BlrType {
    /// Create from a raw BLR code.
    pub fn from_u8(value: u8) -> Result<Self, ProtocolError> {
        match value {
            14 => Ok(Self::Text),
            37 => Ok(Self::Varying),
            40 => Ok(Self::CString),
            7 => Ok(Self::Short),
            8 => Ok(Self::Long),
            16 => Ok(Self::Int64),
            10 => Ok(Self::Float),
            27 => Ok(Self::Double),
            35 => Ok(Self::Timestamp),
            12 => Ok(Self::SqlDate),
            13 => Ok(Self::SqlTime),
            _ => Err(ProtocolError::UnknownBlrType(value)),
        }
    }

    /// Bytes one element occupies in a slice buffer, given the declared length.
    #[must_use]
    pub const fn element_size(self, len: usize) -> usize {
        match self {
            Self::Varying => len + 2,
            Self::CString => len + 1,
            _ => len,
        }
    }
}

/// Kind of a prepared statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatementType {
    /// Not prepared, or not yet classified.
    #[default]
    Unknown,
    /// Recognized by the server but not handled by the driver.
    Unsupported,
    /// SELECT.
    Select,
    /// INSERT.
    Insert,
    /// UPDATE.
    Update,
    /// DELETE.
    Delete,
    /// Data definition.
    Ddl,
    /// EXECUTE PROCEDURE.
    ExecProcedure,
    /// SELECT ... FOR UPDATE.
    SelectUpdate,
    /// SET GENERATOR.
    SetGenerator,
    /// SAVEPOINT.
    SavePoint,
}

impl StatementType {
    /// Map the server's statement type code.
    #[must_use]
    pub fn from_code(code: i64) -> Self {
        match code {
            stmt::SELECT => Self::Select,
            stmt::INSERT => Self::Insert,
            stmt::UPDATE => Self::Update,
            stmt::DELETE => Self::Delete,
            stmt::DDL => Self::Ddl,
            stmt::EXEC_PROCEDURE => Self::ExecProcedure,
            stmt::SELECT_FOR_UPD => Self::SelectUpdate,
            stmt::SET_GENERATOR => Self::SetGenerator,
            stmt::SAVEPOINT => Self::SavePoint,
            stmt::GET_SEGMENT
            | stmt::PUT_SEGMENT
            | stmt::START_TRANS
            | stmt::COMMIT
            | stmt::ROLLBACK => Self::Unsupported,
            _ => Self::Unknown,
        }
    }

    /// Whether execution opens a cursor.
    #[must_use]
    pub const fn returns_cursor(self) -> bool {
        matches!(self, Self::Select | Self::SelectUpdate)
    }
}
