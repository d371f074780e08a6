#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Diff parser must not panic on any input, and whatever it accepts must
    // index cleanly.
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(files) = deltacov::diff::parse_diff(s) {
            let index = deltacov::index::ModifiedLinesIndex::build(&files);
            let _ = index.total_lines();
        }
    }
});
