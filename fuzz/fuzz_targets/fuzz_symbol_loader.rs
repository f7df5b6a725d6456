#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Malformed JSON is fine; a panic while expanding links is not.
    if let Ok(symbols) = axis_config::parse_symbols(data) {
        let out = axis_core::links::extract_links(&symbols);
        let _ = axis_core::links::format_table(&out.links);
    }
});
