//! Trait for converting Rust types to SQL values.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::datetime::{Date, Time, Timestamp};
use crate::dbkey::DbKey;
use crate::error::TypeError;
use crate::value::{ArrayRef, BlobRef, NativeType, Value};

/// Trait for types that can be written to a cell.
pub trait ToSql {
    /// Native type this value is written as.
    const NATIVE: NativeType;

    /// Convert this value to a SQL value.
    fn to_sql(&self) -> Result<Value, TypeError>;
}

macro_rules! to_sql_copy {
    ($ty:ty, $native:ident) => {
        impl ToSql for $ty {
            const NATIVE: NativeType = NativeType::$native;

            fn to_sql(&self) -> Result<Value, TypeError> {
                Ok(Value::$native(*self))
            }
        }
    };
}

to_sql_copy!(bool, Bool);
to_sql_copy!(i16, Int16);
to_sql_copy!(i32, Int32);
to_sql_copy!(i64, Int64);
to_sql_copy!(f32, Float);
to_sql_copy!(f64, Double);
to_sql_copy!(Date, Date);
to_sql_copy!(Time, Time);
to_sql_copy!(Timestamp, Timestamp);

impl ToSql for str {
    const NATIVE: NativeType = NativeType::String;

    fn to_sql(&self) -> Result<Value, TypeError> {
        Ok(Value::String(self.to_owned()))
    }
}

impl ToSql for String {
    const NATIVE: NativeType = NativeType::String;

    fn to_sql(&self) -> Result<Value, TypeError> {
        Ok(Value::String(self.clone()))
    }
}

impl ToSql for [u8] {
    const NATIVE: NativeType = NativeType::Bytes;

    fn to_sql(&self) -> Result<Value, TypeError> {
        Ok(Value::Bytes(self.to_vec()))
    }
}

impl ToSql for Vec<u8> {
    const NATIVE: NativeType = NativeType::Bytes;

    fn to_sql(&self) -> Result<Value, TypeError> {
        Ok(Value::Bytes(self.clone()))
    }
}

impl ToSql for DbKey {
    const NATIVE: NativeType = NativeType::DbKey;

    fn to_sql(&self) -> Result<Value, TypeError> {
        Ok(Value::DbKey(self.clone()))
    }
}

impl ToSql for BlobRef {
    const NATIVE: NativeType = NativeType::Blob;

    fn to_sql(&self) -> Result<Value, TypeError> {
        Ok(Value::Blob(self.0))
    }
}

impl ToSql for ArrayRef {
    const NATIVE: NativeType = NativeType::Array;

    fn to_sql(&self) -> Result<Value, TypeError> {
        Ok(Value::Array(self.0))
    }
}

impl ToSql for NaiveDate {
    const NATIVE: NativeType = NativeType::Date;

    fn to_sql(&self) -> Result<Value, TypeError> {
        Date::try_from(*self).map(Value::Date)
    }
}

impl ToSql for NaiveTime {
    const NATIVE: NativeType = NativeType::Time;

    fn to_sql(&self) -> Result<Value, TypeError> {
        Ok(Value::Time(Time::from(*self)))
    }
}

impl ToSql for NaiveDateTime {
    const NATIVE: NativeType = NativeType::Timestamp;

    fn to_sql(&self) -> Result<Value, TypeError> {
        Timestamp::try_from(*self).map(Value::Timestamp)
    }
}

impl<T: ToSql> ToSql for Option<T> {
    const NATIVE: NativeType = T::NATIVE;

    fn to_sql(&self) -> Result<Value, TypeError> {
        match self {
            Some(v) => v.to_sql(),
            None => Ok(Value::Null),
        }
    }
}

impl<T: ToSql + ?Sized> ToSql for &T {
    const NATIVE: NativeType = T::NATIVE;

    fn to_sql(&self) -> Result<Value, TypeError> {
        (**self).to_sql()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_option_none_is_null() {
        let none: Option<i32> = None;
        assert!(none.to_sql().unwrap().is_null());
        assert_eq!(Some(42i32).to_sql().unwrap(), Value::Int32(42));
    }

    #[test]
    fn test_string_like() {
        assert_eq!("abc".to_sql().unwrap(), Value::String("abc".into()));
        assert_eq!(<&str as ToSql>::NATIVE, NativeType::String);
    }

    #[test]
    fn test_chrono_out_of_range_rejected() {
        let far = NaiveDate::from_ymd_opt(10_000, 1, 1).unwrap();
        assert!(matches!(far.to_sql(), Err(TypeError::InvalidDateTime(_))));
    }
}
