#![no_main]
use camtrap_query::query::Operator;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|s: &str| {
    if let Ok(op) = s.parse::<Operator>() {
        assert_eq!(op.symbol().parse::<Operator>().ok(), Some(op));
    }
});
