#![no_main]
use camtrap_query::query::{Attribute, parse_typed};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (u8, &str)| {
    let (which, raw) = input;
    if raw.len() > 4096 { return; }
    let attr = Attribute::ALL[usize::from(which) % Attribute::ALL.len()];
    if let Ok(list) = parse_typed(attr, raw) {
        assert!(!list.is_empty());
    }
});
