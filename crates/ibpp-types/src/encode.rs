//! Writing native values into cells.
//!
//! Each wire type accepts a fixed set of native types. Integer columns
//! also accept floating point input, which is treated as a NUMERIC value:
//! it is multiplied by `10^-scale` and rounded half up before being stored.
//! Narrowing that would not fit the column fails with
//! [`TypeError::OutOfRange`]; nothing is silently truncated.

use crate::cell::{scale_multiplier, CellKind, TypeInfo};
use crate::error::TypeError;
use crate::value::Value;

/// Store `value` into `cell` according to `info`.
///
/// NULL is not a cell value; callers flip the null indicator instead and
/// get [`TypeError::UnexpectedNull`] here.
pub fn encode_value(info: &TypeInfo, value: &Value, cell: &mut [u8]) -> Result<(), TypeError> {
    info.check_cell(cell.len())?;
    let cell = &mut cell[..info.size];
    let native = value.native_type().ok_or(TypeError::UnexpectedNull)?;
    let wrong = || TypeError::WrongType {
        sql_type: info.kind.name(),
        native,
    };

    match info.kind {
        CellKind::Text => match value {
            Value::String(s) => put_fixed(cell, s.as_bytes()),
            Value::Bytes(b) => put_fixed(cell, b),
            Value::Bool(b) => put_fixed(cell, bool_char(*b)),
            Value::DbKey(key) => {
                if key.len() != cell.len() {
                    return Err(TypeError::LengthMismatch {
                        expected: cell.len(),
                        actual: key.len(),
                    });
                }
                cell.copy_from_slice(key.as_bytes());
            }
            _ => return Err(wrong()),
        },
        CellKind::Varying => match value {
            Value::String(s) => put_varying(cell, info.length, s.as_bytes()),
            Value::Bytes(b) => put_varying(cell, info.length, b),
            Value::Bool(b) => put_varying(cell, info.length, bool_char(*b)),
            _ => return Err(wrong()),
        },
        CellKind::CString => match value {
            Value::String(s) => put_cstring(cell, info.length, s.as_bytes()),
            Value::Bytes(b) => put_cstring(cell, info.length, b),
            Value::Bool(b) => put_cstring(cell, info.length, bool_char(*b)),
            _ => return Err(wrong()),
        },
        CellKind::Short => {
            let v = integer_input(info, value).ok_or_else(wrong)??;
            let v = i16::try_from(v).map_err(|_| TypeError::OutOfRange {
                target_type: "int16",
            })?;
            cell.copy_from_slice(&v.to_le_bytes());
        }
        CellKind::Long => {
            let v = integer_input(info, value).ok_or_else(wrong)??;
            let v = i32::try_from(v).map_err(|_| TypeError::OutOfRange {
                target_type: "int32",
            })?;
            cell.copy_from_slice(&v.to_le_bytes());
        }
        CellKind::Int64 => {
            let v = integer_input(info, value).ok_or_else(wrong)??;
            cell.copy_from_slice(&v.to_le_bytes());
        }
        CellKind::Float => match value {
            Value::Float(v) if info.scale == 0 => cell.copy_from_slice(&v.to_le_bytes()),
            _ => return Err(wrong()),
        },
        CellKind::Double => match value {
            Value::Double(v) => {
                let v = if info.scale != 0 {
                    let m = scale_multiplier(info.scale)?;
                    (v * m + 0.5).floor() / m
                } else {
                    *v
                };
                cell.copy_from_slice(&v.to_le_bytes());
            }
            _ => return Err(wrong()),
        },
        CellKind::Timestamp => match value {
            Value::Timestamp(ts) => {
                let (date, time) = ts.to_wire();
                cell[..4].copy_from_slice(&date.to_le_bytes());
                cell[4..].copy_from_slice(&time.to_le_bytes());
            }
            _ => return Err(wrong()),
        },
        CellKind::Date => match value {
            Value::Date(d) => cell.copy_from_slice(&d.to_wire().to_le_bytes()),
            _ => return Err(wrong()),
        },
        CellKind::Time => match value {
            Value::Time(t) => cell.copy_from_slice(&t.to_wire().to_le_bytes()),
            _ => return Err(wrong()),
        },
        CellKind::Blob => match value {
            Value::Blob(id) => cell.copy_from_slice(id.as_bytes()),
            _ => return Err(wrong()),
        },
        CellKind::Array => match value {
            Value::Array(id) => cell.copy_from_slice(id.as_bytes()),
            _ => return Err(wrong()),
        },
    }
    Ok(())
}

/// Integer to store for an integer-typed cell, or `None` when the native
/// type is not accepted at all.
fn integer_input(info: &TypeInfo, value: &Value) -> Option<Result<i64, TypeError>> {
    match value {
        Value::Bool(b) => Some(Ok(i64::from(*b))),
        Value::Int16(v) => Some(Ok(i64::from(*v))),
        Value::Int32(v) => Some(Ok(i64::from(*v))),
        Value::Int64(v) => Some(Ok(*v)),
        Value::Float(v) => Some(scaled(f64::from(*v), info.scale)),
        Value::Double(v) => Some(scaled(*v, info.scale)),
        _ => None,
    }
}

/// `floor(v * 10^-scale + 0.5)`, checked against the 64-bit range.
pub fn scaled(v: f64, scale: i16) -> Result<i64, TypeError> {
    let r = (v * scale_multiplier(scale)? + 0.5).floor();
    // 2^63 is exactly representable; anything at or past it overflows.
    if r.is_finite() && r >= -9_223_372_036_854_775_808.0 && r < 9_223_372_036_854_775_808.0 {
        Ok(r as i64)
    } else {
        Err(TypeError::OutOfRange {
            target_type: "int64",
        })
    }
}

fn bool_char(b: bool) -> &'static [u8] {
    if b { b"T" } else { b"F" }
}

fn put_fixed(cell: &mut [u8], src: &[u8]) {
    let n = src.len().min(cell.len());
    cell[..n].copy_from_slice(&src[..n]);
    cell[n..].fill(b' ');
}

fn put_varying(cell: &mut [u8], max: usize, src: &[u8]) {
    let n = src.len().min(max).min(cell.len().saturating_sub(2));
    // n never exceeds a declared length, which fits in 16 bits.
    cell[..2].copy_from_slice(&(n as u16).to_le_bytes());
    cell[2..2 + n].copy_from_slice(&src[..n]);
}

fn put_cstring(cell: &mut [u8], max: usize, src: &[u8]) {
    let n = src.len().min(max).min(cell.len().saturating_sub(1));
    cell[..n].copy_from_slice(&src[..n]);
    cell[n..].fill(0);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::datetime::{Date, Timestamp};
    use crate::value::NativeType;
    use crate::dbkey::DbKey;
    use ibpp_protocol::SqlType;

    fn info(t: SqlType, len: u16, scale: i16) -> TypeInfo {
        TypeInfo::column(t, len, scale)
    }

    #[test]
    fn test_text_pads_with_spaces() {
        let i = info(SqlType::Text, 6, 0);
        let mut cell = i.blank();
        encode_value(&i, &Value::String("abc".into()), &mut cell).unwrap();
        assert_eq!(cell, b"abc   ");

        encode_value(&i, &Value::String("abcdefgh".into()), &mut cell).unwrap();
        assert_eq!(cell, b"abcdef");
    }

    #[test]
    fn test_varying_is_length_prefixed_and_capped() {
        let i = info(SqlType::Varying, 4, 0);
        let mut cell = i.blank();
        encode_value(&i, &Value::String("hello".into()), &mut cell).unwrap();
        assert_eq!(&cell[..2], &4u16.to_le_bytes());
        assert_eq!(&cell[2..], b"hell");
    }

    #[test]
    fn test_bool_to_text_writes_letter() {
        let i = info(SqlType::Text, 3, 0);
        let mut cell = i.blank();
        encode_value(&i, &Value::Bool(true), &mut cell).unwrap();
        assert_eq!(cell, b"T  ");
    }

    #[test]
    fn test_short_narrowing_rejected() {
        let i = info(SqlType::Short, 2, 0);
        let mut cell = i.blank();
        let err = encode_value(&i, &Value::Int64(40_000), &mut cell).unwrap_err();
        assert_eq!(err, TypeError::OutOfRange { target_type: "int16" });
        let err = encode_value(&i, &Value::Int32(-40_000), &mut cell).unwrap_err();
        assert_eq!(err, TypeError::OutOfRange { target_type: "int16" });
        encode_value(&i, &Value::Int64(-32_768), &mut cell).unwrap();
        assert_eq!(cell, (-32_768i16).to_le_bytes());
    }

    #[test]
    fn test_numeric_scaling_rounds_half_up() {
        let i = info(SqlType::Long, 4, -2);
        let mut cell = i.blank();
        encode_value(&i, &Value::Double(12.125), &mut cell).unwrap();
        assert_eq!(i32::from_le_bytes(cell.clone().try_into().unwrap()), 1213);
        encode_value(&i, &Value::Double(-1.125), &mut cell).unwrap();
        // -112.5 + 0.5 floors to -112
        assert_eq!(i32::from_le_bytes(cell.try_into().unwrap()), -112);
    }

    #[test]
    fn test_scaled_double_overflowing_int64() {
        assert!(scaled(1E30, 0).is_err());
        assert!(scaled(f64::NAN, 0).is_err());
        assert_eq!(scaled(1.0, -18).unwrap(), 1_000_000_000_000_000_000);
    }

    #[test]
    fn test_float_column_rejects_double() {
        let i = info(SqlType::Float, 4, 0);
        let mut cell = i.blank();
        let err = encode_value(&i, &Value::Double(1.0), &mut cell).unwrap_err();
        assert!(matches!(
            err,
            TypeError::WrongType {
                sql_type: "SQL_FLOAT",
                native: NativeType::Double
            }
        ));
    }

    #[test]
    fn test_date_column_rejects_timestamp() {
        let i = info(SqlType::Date, 4, 0);
        let mut cell = i.blank();
        let ts = Timestamp::from(Date::new(2020, 1, 1).unwrap());
        assert!(encode_value(&i, &Value::Timestamp(ts), &mut cell).is_err());
        encode_value(&i, &Value::Date(ts.date()), &mut cell).unwrap();
    }

    #[test]
    fn test_dbkey_width_must_match() {
        let i = info(SqlType::Text, 8, 0);
        let mut cell = i.blank();
        let err = encode_value(&i, &Value::DbKey(DbKey::new(vec![1; 4])), &mut cell).unwrap_err();
        assert_eq!(err, TypeError::LengthMismatch { expected: 8, actual: 4 });
        encode_value(&i, &Value::DbKey(DbKey::new(vec![7; 8])), &mut cell).unwrap();
        assert_eq!(cell, vec![7; 8]);
    }

    #[test]
    fn test_null_is_not_encoded() {
        let i = info(SqlType::Long, 4, 0);
        let mut cell = i.blank();
        assert_eq!(
            encode_value(&i, &Value::Null, &mut cell),
            Err(TypeError::UnexpectedNull)
        );
    }

    #[test]
    fn test_short_buffer_rejected() {
        let i = info(SqlType::Int64, 8, 0);
        let mut cell = [0u8; 4];
        assert_eq!(
            encode_value(&i, &Value::Int64(1), &mut cell),
            Err(TypeError::BufferTooSmall { needed: 8, available: 4 })
        );
    }
}
