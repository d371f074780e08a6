#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // JaCoCo XML parser must not panic on any input.
    let _ = deltacov::parsers::jacoco::parse(data);
});
