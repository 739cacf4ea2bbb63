#![no_main]
use camtrap_query::records::{CsvOptions, LoadReport, read_deployments, read_media, read_observations};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 16384 { return; }
    let opts = CsvOptions { skip_errors: true, ..CsvOptions::default() };
    let mut report = LoadReport::default();
    let _ = read_deployments(data, &opts, &mut report);
    let _ = read_media(data, &opts, &mut report);
    let _ = read_observations(data, &opts, &mut report);
});
