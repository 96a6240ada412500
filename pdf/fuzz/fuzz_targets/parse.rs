#![no_main]
use libfuzzer_sys::fuzz_target;
use pdf_model::object::{ObjectTable, PlainRef};

fn harness(data: &[u8]) {
    let mut table = ObjectTable::new();
    if let Ok(r) = table.insert_raw(data) {
        if let Ok(p) = table.get(r) {
            let _ = p.to_bytes();
        }
    }
    let _ = table.get(PlainRef::new(1, 0));
}

fuzz_target!(|data: &[u8]| {
    let _ = harness(data);
});
