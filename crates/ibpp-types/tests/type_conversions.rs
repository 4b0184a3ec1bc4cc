//! Cell conversion properties.
//!
//! Covers:
//! - round trips for every wire type
//! - NUMERIC scaling precision
//! - narrowing rejection
//! - calendar range boundaries

#![allow(clippy::unwrap_used, clippy::expect_used)]

use ibpp_protocol::{Quad, SqlType};
use ibpp_types::{
    Date, FromSql, NativeType, Time, Timestamp, ToSql, TypeError, TypeInfo, Value, decode_value,
    dtoi, encode_value, itod, MAX_DATE, MIN_DATE,
};
use proptest::prelude::*;

fn write_read<T: ToSql + FromSql>(info: &TypeInfo, v: &T) -> Result<T, TypeError> {
    let mut cell = info.blank();
    encode_value(info, &v.to_sql()?, &mut cell)?;
    T::from_sql(&decode_value(info, &cell, <T as FromSql>::NATIVE)?)
}

// ============================================================================
// Round Trips
// ============================================================================

mod round_trip {
    use super::*;

    proptest! {
        #[test]
        fn short_holds_any_i16(v in any::<i16>()) {
            let info = TypeInfo::column(SqlType::Short, 2, 0);
            prop_assert_eq!(write_read(&info, &v).unwrap(), v);
        }

        #[test]
        fn long_holds_any_i32(v in any::<i32>()) {
            let info = TypeInfo::column(SqlType::Long, 4, 0);
            prop_assert_eq!(write_read(&info, &v).unwrap(), v);
        }

        #[test]
        fn int64_holds_any_i64(v in any::<i64>()) {
            let info = TypeInfo::column(SqlType::Int64, 8, 0);
            prop_assert_eq!(write_read(&info, &v).unwrap(), v);
        }

        #[test]
        fn double_holds_any_finite_f64(v in proptest::num::f64::NORMAL) {
            let info = TypeInfo::column(SqlType::Double, 8, 0);
            prop_assert_eq!(write_read(&info, &v).unwrap(), v);
        }

        #[test]
        fn varying_holds_ascii_within_width(s in "[ -~]{0,32}") {
            let info = TypeInfo::column(SqlType::Varying, 32, 0);
            prop_assert_eq!(write_read(&info, &s).unwrap(), s);
        }

        #[test]
        fn text_pads_to_width(s in "[a-z]{0,16}") {
            let info = TypeInfo::column(SqlType::Text, 16, 0);
            let back: String = write_read(&info, &s).unwrap();
            prop_assert_eq!(back.len(), 16);
            prop_assert_eq!(back.trim_end(), s.as_str());
        }

        #[test]
        fn date_holds_full_calendar(days in MIN_DATE..=MAX_DATE) {
            let info = TypeInfo::column(SqlType::Date, 4, 0);
            let d = Date::from_days(days).unwrap();
            prop_assert_eq!(write_read(&info, &d).unwrap(), d);
        }

        #[test]
        fn day_numbers_match_calendar(days in MIN_DATE..=MAX_DATE) {
            let (y, m, d) = itod(days).unwrap();
            prop_assert_eq!(dtoi(y, m, d), Some(days));
        }

        #[test]
        fn time_holds_every_tick(h in 0u32..24, m in 0u32..60, s in 0u32..60, t in 0u32..10_000) {
            let info = TypeInfo::column(SqlType::Time, 4, 0);
            let time = Time::new(h, m, s, t).unwrap();
            prop_assert_eq!(write_read(&info, &time).unwrap(), time);
        }
    }

    #[test]
    fn test_timestamp_extremes() {
        let info = TypeInfo::column(SqlType::Timestamp, 8, 0);
        for ts in [
            Timestamp::from_parts(1, 1, 1, 0, 0, 0, 0).unwrap(),
            Timestamp::from_parts(9999, 12, 31, 23, 59, 59, 9999).unwrap(),
        ] {
            assert_eq!(write_read(&info, &ts).unwrap(), ts);
        }
    }

    #[test]
    fn test_blob_and_array_ids_are_distinct_kinds() {
        let blob = TypeInfo::column(SqlType::Blob, 8, 0);
        let id = Quad::from_parts(1, 2);
        let mut cell = blob.blank();
        encode_value(&blob, &Value::Blob(id), &mut cell).unwrap();
        let err = encode_value(&blob, &Value::Array(id), &mut cell).unwrap_err();
        assert!(matches!(
            err,
            TypeError::WrongType {
                native: NativeType::Array,
                ..
            }
        ));
    }
}

// ============================================================================
// NUMERIC Scaling
// ============================================================================

mod numeric {
    use super::*;

    proptest! {
        #[test]
        fn scaled_round_trip_within_one_unit(v in -9.0e6f64..9.0e6, scale in 0i16..=4) {
            let info = TypeInfo::column(SqlType::Int64, 8, -scale);
            let back: f64 = write_read(&info, &v).unwrap();
            let unit = 10f64.powi(-i32::from(scale));
            prop_assert!((back - v).abs() <= unit, "{} -> {} (unit {})", v, back, unit);
        }

        #[test]
        fn scaled_integers_are_exact(raw in -999_999i32..999_999, scale in 0i16..=6) {
            let info = TypeInfo::column(SqlType::Long, 4, -scale);
            let mut cell = info.blank();
            encode_value(&info, &Value::Int32(raw), &mut cell).unwrap();
            // Integers are stored as-is, not multiplied by the scale.
            prop_assert_eq!(i32::from_le_bytes(cell.try_into().unwrap()), raw);
        }
    }

    #[test]
    fn test_double_column_rounds_to_scale() {
        let info = TypeInfo::column(SqlType::Double, 8, -2);
        let back: f64 = write_read(&info, &2.5f64).unwrap();
        assert_eq!(back, 2.5);
        let back: f64 = write_read(&info, &0.125f64).unwrap();
        assert_eq!(back, 0.13);
    }

    #[test]
    fn test_scale_beyond_table_rejected() {
        let info = TypeInfo::column(SqlType::Int64, 8, -19);
        assert_eq!(write_read(&info, &1.0f64), Err(TypeError::InvalidScale(-19)));
    }
}

// ============================================================================
// Narrowing
// ============================================================================

mod narrowing {
    use super::*;

    proptest! {
        #[test]
        fn short_rejects_wide_values(v in prop_oneof![i64::MIN..-32_768i64, 32_768i64..i64::MAX]) {
            let info = TypeInfo::column(SqlType::Short, 2, 0);
            let mut cell = info.blank();
            let err = encode_value(&info, &Value::Int64(v), &mut cell).unwrap_err();
            prop_assert_eq!(err, TypeError::OutOfRange { target_type: "int16" });
            // The cell is untouched.
            prop_assert_eq!(cell, vec![0u8; 2]);
        }

        #[test]
        fn int64_cell_read_as_i32_checks_range(v in any::<i64>()) {
            let info = TypeInfo::column(SqlType::Int64, 8, 0);
            let cell = v.to_le_bytes();
            let got = decode_value(&info, &cell, NativeType::Int32);
            if i32::try_from(v).is_ok() {
                prop_assert!(got.is_ok());
            } else {
                prop_assert_eq!(got, Err(TypeError::OutOfRange { target_type: "int32" }));
            }
        }
    }
}

// ============================================================================
// Mismatched Pairings
// ============================================================================

mod mismatches {
    use super::*;

    #[test]
    fn test_time_into_timestamp_column_rejected() {
        let info = TypeInfo::column(SqlType::Timestamp, 8, 0);
        let mut cell = info.blank();
        let err = encode_value(&info, &Value::Time(Time::MIDNIGHT), &mut cell).unwrap_err();
        assert_eq!(
            err,
            TypeError::WrongType {
                sql_type: "SQL_TIMESTAMP",
                native: NativeType::Time
            }
        );
    }

    #[test]
    fn test_string_from_integer_column_rejected() {
        let info = TypeInfo::column(SqlType::Long, 4, 0);
        let err = decode_value(&info, &[0; 4], NativeType::String).unwrap_err();
        assert!(matches!(err, TypeError::WrongType { .. }));
    }

    #[test]
    fn test_bool_from_integer_column() {
        let info = TypeInfo::column(SqlType::Short, 2, 0);
        assert_eq!(
            decode_value(&info, &3i16.to_le_bytes(), NativeType::Bool).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            decode_value(&info, &0i16.to_le_bytes(), NativeType::Bool).unwrap(),
            Value::Bool(false)
        );
    }
}
