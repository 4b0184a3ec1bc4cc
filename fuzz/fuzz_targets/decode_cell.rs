#![no_main]

use arbitrary::Arbitrary;
use ibpp_protocol::SqlType;
use ibpp_types::{NativeType, TypeInfo, decode_value};
use libfuzzer_sys::fuzz_target;

const TARGETS: [NativeType; 14] = [
    NativeType::Bool,
    NativeType::String,
    NativeType::Bytes,
    NativeType::Int16,
    NativeType::Int32,
    NativeType::Int64,
    NativeType::Float,
    NativeType::Double,
    NativeType::Timestamp,
    NativeType::Date,
    NativeType::Time,
    NativeType::DbKey,
    NativeType::Blob,
    NativeType::Array,
];

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    sql_type: i16,
    length: u16,
    scale: i16,
    target: u8,
    cell: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let Ok((sql_type, _)) = SqlType::from_code(input.sql_type) else {
        return;
    };
    let info = TypeInfo::column(sql_type, input.length, input.scale);
    let target = TARGETS[usize::from(input.target) % TARGETS.len()];
    let _ = decode_value(&info, &input.cell, target);
});
