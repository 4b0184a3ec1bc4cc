//! Reading native values out of cells.
//!
//! The reverse of [`encode`](crate::encode): integer cells can be read as
//! any integer width (narrowing is range checked), as `bool`, or as a
//! floating point NUMERIC value divided by `10^-scale`. Text cells are
//! returned verbatim; fixed-width text keeps its padding.

use ibpp_protocol::Quad;

use crate::cell::{scale_multiplier, CellKind, TypeInfo};
use crate::datetime::{Date, Time, Timestamp};
use crate::dbkey::DbKey;
use crate::error::TypeError;
use crate::value::{NativeType, Value};

/// Read the value of `cell` as `target`.
///
/// Null indicators are not visible here; callers check them first.
pub fn decode_value(info: &TypeInfo, cell: &[u8], target: NativeType) -> Result<Value, TypeError> {
    info.check_cell(cell.len())?;
    let cell = &cell[..info.size];
    let wrong = TypeError::WrongType {
        sql_type: info.kind.name(),
        native: target,
    };

    match info.kind {
        CellKind::Text => match target {
            NativeType::String => Ok(Value::String(String::from_utf8_lossy(cell).into_owned())),
            NativeType::Bytes => Ok(Value::Bytes(cell.to_vec())),
            NativeType::Bool => Ok(Value::Bool(truthy(cell))),
            NativeType::DbKey => Ok(Value::DbKey(DbKey::new(cell))),
            _ => Err(wrong),
        },
        CellKind::Varying => text_value(varying_slice(cell, info.length), target).ok_or(wrong),
        CellKind::CString => text_value(cstring_slice(cell, info.length), target).ok_or(wrong),
        CellKind::Short | CellKind::Long | CellKind::Int64 => {
            let raw = read_integer(info.kind, cell);
            integer_value(raw, info.scale, target).ok_or(wrong)?
        }
        CellKind::Float => match target {
            NativeType::Float => Ok(Value::Float(f32::from_le_bytes(word(cell)))),
            _ => Err(wrong),
        },
        CellKind::Double => match target {
            NativeType::Double => {
                let v = f64::from_le_bytes(dword(cell));
                if info.scale != 0 {
                    let m = scale_multiplier(info.scale)?;
                    Ok(Value::Double((v * m + 0.5).floor() / m))
                } else {
                    Ok(Value::Double(v))
                }
            }
            _ => Err(wrong),
        },
        CellKind::Timestamp => match target {
            NativeType::Timestamp => {
                let date = i32::from_le_bytes(word(&cell[..4]));
                let time = u32::from_le_bytes(word(&cell[4..]));
                Ok(Value::Timestamp(Timestamp::from_wire(date, time)?))
            }
            _ => Err(wrong),
        },
        CellKind::Date => match target {
            NativeType::Date => Ok(Value::Date(Date::from_wire(i32::from_le_bytes(word(cell)))?)),
            _ => Err(wrong),
        },
        CellKind::Time => match target {
            NativeType::Time => Ok(Value::Time(Time::from_wire(u32::from_le_bytes(word(cell)))?)),
            _ => Err(wrong),
        },
        CellKind::Blob => match target {
            NativeType::Blob => Ok(Value::Blob(Quad(dword(cell)))),
            _ => Err(wrong),
        },
        CellKind::Array => match target {
            NativeType::Array => Ok(Value::Array(Quad(dword(cell)))),
            _ => Err(wrong),
        },
    }
}

/// Text-like targets of a text cell, `None` when `target` is not one.
fn text_value(bytes: &[u8], target: NativeType) -> Option<Value> {
    match target {
        NativeType::String => Some(Value::String(String::from_utf8_lossy(bytes).into_owned())),
        NativeType::Bytes => Some(Value::Bytes(bytes.to_vec())),
        NativeType::Bool => Some(Value::Bool(truthy(bytes))),
        _ => None,
    }
}

/// Text reads as true when it starts with `t`, `y` (any case) or `1`.
fn truthy(bytes: &[u8]) -> bool {
    matches!(bytes.first(), Some(b't' | b'T' | b'y' | b'Y' | b'1'))
}

fn varying_slice(cell: &[u8], max: usize) -> &[u8] {
    let declared = i16::from_le_bytes([cell[0], cell[1]]).max(0) as usize;
    let n = declared.min(max).min(cell.len() - 2);
    &cell[2..2 + n]
}

fn cstring_slice(cell: &[u8], max: usize) -> &[u8] {
    let n = cell.iter().position(|&b| b == 0).unwrap_or(cell.len()).min(max);
    &cell[..n]
}

fn read_integer(kind: CellKind, cell: &[u8]) -> i64 {
    match kind {
        CellKind::Short => i64::from(i16::from_le_bytes([cell[0], cell[1]])),
        CellKind::Long => i64::from(i32::from_le_bytes(word(cell))),
        _ => i64::from_le_bytes(dword(cell)),
    }
}

fn integer_value(raw: i64, scale: i16, target: NativeType) -> Option<Result<Value, TypeError>> {
    let out_of_range = |target_type| TypeError::OutOfRange { target_type };
    Some(match target {
        NativeType::Bool => Ok(Value::Bool(raw != 0)),
        NativeType::Int16 => i16::try_from(raw)
            .map(Value::Int16)
            .map_err(|_| out_of_range("int16")),
        NativeType::Int32 => i32::try_from(raw)
            .map(Value::Int32)
            .map_err(|_| out_of_range("int32")),
        NativeType::Int64 => Ok(Value::Int64(raw)),
        NativeType::Float => {
            scale_multiplier(scale).map(|m| Value::Float((raw as f64 / m) as f32))
        }
        NativeType::Double => scale_multiplier(scale).map(|m| Value::Double(raw as f64 / m)),
        _ => return None,
    })
}

fn word(bytes: &[u8]) -> [u8; 4] {
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

fn dword(bytes: &[u8]) -> [u8; 8] {
    [
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::encode::encode_value;
    use ibpp_protocol::SqlType;

    fn info(t: SqlType, len: u16, scale: i16) -> TypeInfo {
        TypeInfo::column(t, len, scale)
    }

    #[test]
    fn test_fixed_text_returned_verbatim() {
        let i = info(SqlType::Text, 5, 0);
        let v = decode_value(&i, b"ab   ", NativeType::String).unwrap();
        assert_eq!(v, Value::String("ab   ".into()));
    }

    #[test]
    fn test_varying_length_is_capped() {
        let i = info(SqlType::Varying, 3, 0);
        let mut cell = vec![9, 0];
        cell.extend_from_slice(b"abc");
        let v = decode_value(&i, &cell, NativeType::String).unwrap();
        assert_eq!(v, Value::String("abc".into()));
    }

    #[test]
    fn test_text_truthiness() {
        let i = info(SqlType::Text, 1, 0);
        for c in [b"t", b"T", b"y", b"Y", b"1"] {
            assert_eq!(decode_value(&i, c, NativeType::Bool).unwrap(), Value::Bool(true));
        }
        for c in [b"f", b"N", b"0", b" "] {
            assert_eq!(decode_value(&i, c, NativeType::Bool).unwrap(), Value::Bool(false));
        }
    }

    #[test]
    fn test_integer_widening_and_narrowing() {
        let i = info(SqlType::Int64, 8, 0);
        let cell = 70_000i64.to_le_bytes();
        assert_eq!(
            decode_value(&i, &cell, NativeType::Int32).unwrap(),
            Value::Int32(70_000)
        );
        assert_eq!(
            decode_value(&i, &cell, NativeType::Int16),
            Err(TypeError::OutOfRange { target_type: "int16" })
        );

        let s = info(SqlType::Short, 2, 0);
        assert_eq!(
            decode_value(&s, &(-5i16).to_le_bytes(), NativeType::Int64).unwrap(),
            Value::Int64(-5)
        );
    }

    #[test]
    fn test_numeric_divides_by_scale() {
        let i = info(SqlType::Long, 4, -3);
        let cell = 12_345i32.to_le_bytes();
        assert_eq!(
            decode_value(&i, &cell, NativeType::Double).unwrap(),
            Value::Double(12.345)
        );
    }

    #[test]
    fn test_numeric_round_trip() {
        let i = info(SqlType::Int64, 8, -4);
        let mut cell = i.blank();
        encode_value(&i, &Value::Double(-98.7654), &mut cell).unwrap();
        let v = decode_value(&i, &cell, NativeType::Double)
            .unwrap()
            .as_f64()
            .unwrap();
        assert!((v - -98.7654).abs() < 1E-4);
    }

    #[test]
    fn test_float_cell_only_reads_as_float() {
        let i = info(SqlType::Float, 4, 0);
        let cell = 1.5f32.to_le_bytes();
        assert_eq!(decode_value(&i, &cell, NativeType::Float).unwrap(), Value::Float(1.5));
        assert!(matches!(
            decode_value(&i, &cell, NativeType::Double),
            Err(TypeError::WrongType { .. })
        ));
    }

    #[test]
    fn test_temporal_round_trip() {
        let i = info(SqlType::Timestamp, 8, 0);
        let ts = Timestamp::from_parts(1999, 12, 31, 23, 59, 59, 9999).unwrap();
        let mut cell = i.blank();
        encode_value(&i, &Value::Timestamp(ts), &mut cell).unwrap();
        assert_eq!(
            decode_value(&i, &cell, NativeType::Timestamp).unwrap(),
            Value::Timestamp(ts)
        );
    }

    #[test]
    fn test_blob_id_round_trip() {
        let i = info(SqlType::Blob, 8, 0);
        let id = Quad::from_parts(0x81, 42);
        let mut cell = i.blank();
        encode_value(&i, &Value::Blob(id), &mut cell).unwrap();
        assert_eq!(decode_value(&i, &cell, NativeType::Blob).unwrap(), Value::Blob(id));
        assert!(decode_value(&i, &cell, NativeType::Array).is_err());
    }
}
