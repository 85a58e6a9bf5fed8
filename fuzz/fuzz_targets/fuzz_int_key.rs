#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = eshop_api::query::parse_int_prefix(s);
        let _ = eshop_api::query::coerce_number(s);
    }
});
