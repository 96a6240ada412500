#![no_main]
use libfuzzer_sys::fuzz_target;
use pdf_model::content::{Content, Operation};
use pdf_model::object::NoResolve;

fn harness(data: &[u8]) {
    if let Ok(content) = Content::parse(data, &NoResolve) {
        for op in &content.operations {
            if let Operation::InlineImage(image) = op {
                let _ = image.decoded(&NoResolve);
            }
        }
        let _ = content.to_bytes();
    }
}

fuzz_target!(|data: &[u8]| {
    let _ = harness(data);
});
