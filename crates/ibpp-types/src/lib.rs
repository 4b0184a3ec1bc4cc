//! # ibpp-types
//!
//! Firebird/InterBase to Rust type mappings and conversions.
//!
//! This crate converts between native Rust values and the cells behind
//! result columns, statement parameters and array elements. Conversions
//! are driven by a [`TypeInfo`] (wire layout, declared length, NUMERIC
//! scale) and a [`NativeType`] naming the Rust side.
//!
//! ## Type Mappings
//!
//! | Wire Type | Rust Type |
//! |-----------|-----------|
//! | `CHAR`/`VARCHAR` | `String`, `Vec<u8>`, `bool`, [`DbKey`] |
//! | `SMALLINT` | `i16` |
//! | `INTEGER` | `i32` |
//! | `BIGINT` | `i64` |
//! | `NUMERIC(p, s)` | `f64` / `f32` (scaled), or the raw integer |
//! | `FLOAT` | `f32` |
//! | `DOUBLE PRECISION` | `f64` |
//! | `DATE` | [`Date`], `chrono::NaiveDate` |
//! | `TIME` | [`Time`], `chrono::NaiveTime` |
//! | `TIMESTAMP` | [`Timestamp`], `chrono::NaiveDateTime` |
//! | `BLOB` | [`BlobRef`] |
//! | `ARRAY` | [`ArrayRef`] |
//!
//! ## Example
//!
//! ```rust
//! use ibpp_protocol::SqlType;
//! use ibpp_types::{NativeType, TypeInfo, Value, decode_value, encode_value};
//!
//! // NUMERIC(9, 2) stored in a 32-bit integer
//! let info = TypeInfo::column(SqlType::Long, 4, -2);
//! let mut cell = info.blank();
//! encode_value(&info, &Value::Double(19.99), &mut cell).unwrap();
//! assert_eq!(i32::from_le_bytes(cell.clone().try_into().unwrap()), 1999);
//!
//! let back = decode_value(&info, &cell, NativeType::Int32).unwrap();
//! assert_eq!(back, Value::Int32(1999));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cell;
pub mod datetime;
pub mod dbkey;
pub mod decode;
pub mod encode;
pub mod error;
pub mod from_sql;
pub mod to_sql;
pub mod value;

pub use cell::{scale_multiplier, CellKind, TypeInfo, DSCALES};
pub use datetime::{dtoi, itod, itot, ttoi, Date, Time, Timestamp, MAX_DATE, MIN_DATE};
pub use dbkey::DbKey;
pub use decode::decode_value;
pub use encode::encode_value;
pub use error::TypeError;
pub use from_sql::FromSql;
pub use to_sql::ToSql;
pub use value::{ArrayRef, BlobRef, NativeType, SqlDataType, Value};
