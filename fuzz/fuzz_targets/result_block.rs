#![no_main]

use ibpp_protocol::ResultBlock;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Walk every entry and query every tag; none of it may panic.
    let block = ResultBlock::new(data.to_vec());
    for _ in block.entries() {}
    for tag in 0..=u8::MAX {
        let _ = block.get_value(tag);
        let _ = block.get_count_value(tag);
        let _ = block.get_bool(tag);
        let _ = block.get_string(tag);
        let _ = block.get_subvalue(tag, 1);
    }
});
