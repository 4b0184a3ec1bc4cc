//! Cell layouts.
//!
//! A cell is the native-format storage behind one column, parameter or
//! array element. Its layout depends on the wire type:
//!
//! | Kind | Bytes |
//! |------|-------|
//! | `Text` | declared length, right-padded with spaces |
//! | `Varying` | 2-byte little-endian length, then up to declared length bytes |
//! | `CString` | NUL-terminated text (array elements only) |
//! | `Short` / `Long` / `Int64` | 2 / 4 / 8 bytes, little-endian |
//! | `Float` / `Double` | 4 / 8 bytes, IEEE 754 |
//! | `Date` / `Time` | 4 bytes |
//! | `Timestamp` | date word then time word |
//! | `Blob` / `Array` | 8-byte id |

use ibpp_protocol::{ArrayDesc, BlrType, SqlType};

use crate::error::TypeError;

/// Powers of ten for NUMERIC scales 0 through 18.
pub const DSCALES: [f64; 19] = [
    1.0, 1E1, 1E2, 1E3, 1E4, 1E5, 1E6, 1E7, 1E8, 1E9, 1E10, 1E11, 1E12, 1E13, 1E14, 1E15, 1E16,
    1E17, 1E18,
];

/// Multiplier turning a NUMERIC value into its stored integer.
///
/// Scales are zero or negative; `-2` means two decimal places.
pub fn scale_multiplier(scale: i16) -> Result<f64, TypeError> {
    usize::try_from(-i32::from(scale))
        .ok()
        .and_then(|idx| DSCALES.get(idx).copied())
        .ok_or(TypeError::InvalidScale(scale))
}

/// Storage layout of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    /// Fixed-width, space padded text.
    Text,
    /// Length-prefixed text.
    Varying,
    /// NUL-terminated text.
    CString,
    /// 16-bit integer.
    Short,
    /// 32-bit integer.
    Long,
    /// 64-bit integer.
    Int64,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// Date and time.
    Timestamp,
    /// Date.
    Date,
    /// Time of day.
    Time,
    /// Blob id.
    Blob,
    /// Array id.
    Array,
}

impl CellKind {
    /// Wire type name used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Text => "SQL_TEXT",
            Self::Varying => "SQL_VARYING",
            Self::CString => "SQL_CSTRING",
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

impl From<SqlType> for CellKind {
    fn from(t: SqlType) -> Self {
        match t {
            SqlType::Text => Self::Text,
            SqlType::Varying => Self::Varying,
            SqlType::Short => Self::Short,
            SqlType::Long => Self::Long,
            SqlType::Int64 => Self::Int64,
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

/// Everything needed to convert one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    /// Storage layout.
    pub kind: CellKind,
    /// Declared length; for text kinds, the maximum number of characters.
    pub length: usize,
    /// Bytes the cell occupies.
    pub size: usize,
    /// NUMERIC scale (zero or negative).
    pub scale: i16,
}

impl TypeInfo {
    /// Layout of a column or parameter.
    #[must_use]
    pub fn column(sql_type: SqlType, length: u16, scale: i16) -> Self {
        let length = usize::from(length);
        Self {
            kind: sql_type.into(),
            length,
            size: sql_type.storage_size(length),
            scale,
        }
    }

    /// Layout of one element of an array slice.
    ///
    /// Variable-length elements travel as NUL-terminated strings inside a
    /// chunk two bytes wider than the declared length.
    #[must_use]
    pub fn element(desc: &ArrayDesc) -> Self {
        let kind = match desc.dtype {
            BlrType::Text => CellKind::Text,
            BlrType::Varying | BlrType::CString => CellKind::CString,
            BlrType::Short => CellKind::Short,
            BlrType::Long => CellKind::Long,
            BlrType::Int64 => CellKind::Int64,
            BlrType::Float => CellKind::Float,
            BlrType::Double => CellKind::Double,
            BlrType::Timestamp => CellKind::Timestamp,
            BlrType::SqlDate => CellKind::Date,
            BlrType::SqlTime => CellKind::Time,
        };
        Self {
            kind,
            length: usize::from(desc.length),
            size: desc.element_size(),
            scale: i16::from(desc.scale),
        }
    }

    /// A freshly initialized cell: text filled with spaces, everything
    /// else zeroed.
    #[must_use]
    pub fn blank(&self) -> Vec<u8> {
        let mut cell = vec![0u8; self.size];
        match self.kind {
            CellKind::Text => cell.fill(b' '),
            CellKind::Varying => cell[2..].fill(b' '),
            _ => {}
        }
        cell
    }

    pub(crate) fn check_cell(&self, available: usize) -> Result<(), TypeError> {
        if available < self.size {
            Err(TypeError::BufferTooSmall {
                needed: self.size,
                available,
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ibpp_protocol::ArrayBound;

    #[test]
    fn test_scale_multiplier_range() {
        assert_eq!(scale_multiplier(0).unwrap(), 1.0);
        assert_eq!(scale_multiplier(-2).unwrap(), 100.0);
        assert_eq!(scale_multiplier(-18).unwrap(), 1E18);
        assert_eq!(scale_multiplier(-19), Err(TypeError::InvalidScale(-19)));
        assert_eq!(scale_multiplier(1), Err(TypeError::InvalidScale(1)));
    }

    #[test]
    fn test_blank_cells() {
        assert_eq!(TypeInfo::column(SqlType::Text, 3, 0).blank(), b"   ");
        assert_eq!(TypeInfo::column(SqlType::Varying, 2, 0).blank(), b"\0\0  ");
        assert_eq!(TypeInfo::column(SqlType::Int64, 8, -2).blank(), vec![0u8; 8]);
    }

    #[test]
    fn test_varying_array_elements_are_cstrings() {
        let desc = ArrayDesc {
            dtype: BlrType::Varying,
            scale: 0,
            length: 10,
            field_name: "TAGS".into(),
            relation_name: "T".into(),
            bounds: vec![ArrayBound::new(1, 4)],
        };
        let info = TypeInfo::element(&desc);
        assert_eq!(info.kind, CellKind::CString);
        assert_eq!(info.length, 10);
        assert_eq!(info.size, 12);
    }
}
