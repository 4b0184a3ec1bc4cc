#![no_main]

use arbitrary::Arbitrary;
use ibpp_protocol::{Dpb, LengthPrefix, ParamBlock, Spb, Tpb};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    DpbStr(u8, String),
    DpbI16(u8, i16),
    DpbI32(u8, i32),
    DpbBool(u8, bool),
    TpbFlag(u8),
    TpbTable(String),
    SpbOpcode(u8),
    SpbString(u8, bool, String),
    SpbQuad(u8, i32),
    Reset,
}

fuzz_target!(|ops: Vec<Op>| {
    let mut dpb = ParamBlock::<Dpb>::new();
    let mut tpb = ParamBlock::<Tpb>::new();
    let mut spb = ParamBlock::<Spb>::new();
    for op in ops {
        match op {
            Op::DpbStr(tag, s) => {
                let _ = dpb.insert_str(tag, &s);
            }
            Op::DpbI16(tag, v) => dpb.insert_i16(tag, v),
            Op::DpbI32(tag, v) => dpb.insert_i32(tag, v),
            Op::DpbBool(tag, v) => dpb.insert_bool(tag, v),
            Op::TpbFlag(flag) => tpb.insert(flag),
            Op::TpbTable(table) => {
                let _ = tpb.insert_str(&table);
            }
            Op::SpbOpcode(opcode) => spb.insert(opcode),
            Op::SpbString(tag, wide, s) => {
                let prefix = if wide { LengthPrefix::Word } else { LengthPrefix::Byte };
                let _ = spb.insert_string(tag, prefix, &s);
            }
            Op::SpbQuad(tag, v) => spb.insert_quad(tag, v),
            Op::Reset => {
                dpb.reset();
                tpb.reset();
                spb.reset();
            }
        }
        assert!(dpb.len() <= dpb.capacity());
    }
});
