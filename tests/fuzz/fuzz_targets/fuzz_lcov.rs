#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // LCOV parser must not panic on any input.
    if let Ok(coverage) = deltacov::parsers::lcov::parse(data) {
        let _ = coverage.counters();
    }
});
