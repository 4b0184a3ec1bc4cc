#![no_main]

use arbitrary::Arbitrary;
use ibpp_protocol::EventBlock;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    names: Vec<String>,
    notification: Vec<u8>,
    remove: Option<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let mut block = EventBlock::new();
    for name in &input.names {
        let _ = block.push(name);
    }
    // A notification is a server buffer of unknown shape.
    block.overwrite_from(&input.notification);
    let _ = block.entries().count();
    let _ = block.names();
    if let Some(index) = input.remove {
        let _ = block.remove(usize::from(index));
        let _ = block.entries().count();
    }
});
