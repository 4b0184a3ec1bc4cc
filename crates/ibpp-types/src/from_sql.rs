//! Trait for converting from SQL values to Rust types.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::datetime::{Date, Time, Timestamp};
use crate::dbkey::DbKey;
use crate::error::TypeError;
use crate::value::{ArrayRef, BlobRef, NativeType, Value};

/// Trait for types that can be read from a cell.
///
/// [`NATIVE`](FromSql::NATIVE) tells the cell decoder which conversion to
/// run; the resulting [`Value`] is then unpacked by
/// [`from_sql`](FromSql::from_sql).
pub trait FromSql: Sized {
    /// Native type requested from the decoder.
    const NATIVE: NativeType;

    /// Convert from a SQL value to this type.
    fn from_sql(value: &Value) -> Result<Self, TypeError>;

    /// Convert from an optional SQL value.
    ///
    /// Returns `None` if the value is NULL.
    fn from_sql_nullable(value: &Value) -> Result<Option<Self>, TypeError> {
        if value.is_null() {
            Ok(None)
        } else {
            Self::from_sql(value).map(Some)
        }
    }
}

fn mismatch(expected: &'static str, value: &Value) -> TypeError {
    match value {
        Value::Null => TypeError::UnexpectedNull,
        _ => TypeError::TypeMismatch {
            expected,
            actual: value.type_name(),
        },
    }
}

macro_rules! from_sql_direct {
    ($ty:ty, $native:ident, $name:literal, |$v:ident| $conv:expr) => {
        impl FromSql for $ty {
            const NATIVE: NativeType = NativeType::$native;

            fn from_sql(value: &Value) -> Result<Self, TypeError> {
                match value {
                    Value::$native($v) => Ok($conv),
                    _ => Err(mismatch($name, value)),
                }
            }
        }
    };
}

from_sql_direct!(bool, Bool, "bool", |v| *v);
from_sql_direct!(f32, Float, "f32", |v| *v);
from_sql_direct!(f64, Double, "f64", |v| *v);
from_sql_direct!(Date, Date, "Date", |v| *v);
from_sql_direct!(Time, Time, "Time", |v| *v);
from_sql_direct!(Timestamp, Timestamp, "Timestamp", |v| *v);
from_sql_direct!(String, String, "String", |v| v.clone());
from_sql_direct!(Vec<u8>, Bytes, "Vec<u8>", |v| v.clone());
from_sql_direct!(DbKey, DbKey, "DbKey", |v| v.clone());

impl FromSql for i16 {
    const NATIVE: NativeType = NativeType::Int16;

    fn from_sql(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Int16(v) => Ok(*v),
            _ => Err(mismatch("i16", value)),
        }
    }
}

impl FromSql for i32 {
    const NATIVE: NativeType = NativeType::Int32;

    fn from_sql(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Int32(v) => Ok(*v),
            Value::Int16(v) => Ok(i32::from(*v)),
            _ => Err(mismatch("i32", value)),
        }
    }
}

impl FromSql for i64 {
    const NATIVE: NativeType = NativeType::Int64;

    fn from_sql(value: &Value) -> Result<Self, TypeError> {
        value.as_i64().ok_or_else(|| mismatch("i64", value))
    }
}

impl FromSql for BlobRef {
    const NATIVE: NativeType = NativeType::Blob;

    fn from_sql(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Blob(id) => Ok(Self(*id)),
            _ => Err(mismatch("BlobRef", value)),
        }
    }
}

impl FromSql for ArrayRef {
    const NATIVE: NativeType = NativeType::Array;

    fn from_sql(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Array(id) => Ok(Self(*id)),
            _ => Err(mismatch("ArrayRef", value)),
        }
    }
}

impl FromSql for NaiveDate {
    const NATIVE: NativeType = NativeType::Date;

    fn from_sql(value: &Value) -> Result<Self, TypeError> {
        Date::from_sql(value).map(Into::into)
    }
}

impl FromSql for NaiveTime {
    const NATIVE: NativeType = NativeType::Time;

    fn from_sql(value: &Value) -> Result<Self, TypeError> {
        Time::from_sql(value).map(Into::into)
    }
}

impl FromSql for NaiveDateTime {
    const NATIVE: NativeType = NativeType::Timestamp;

    fn from_sql(value: &Value) -> Result<Self, TypeError> {
        Timestamp::from_sql(value).map(Into::into)
    }
}

impl<T: FromSql> FromSql for Option<T> {
    const NATIVE: NativeType = T::NATIVE;

    fn from_sql(value: &Value) -> Result<Self, TypeError> {
        T::from_sql_nullable(value)
    }
}
