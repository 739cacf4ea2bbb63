/// How Camtrap CSV files are read.
///
/// Files written by the sync layer carry no header row and rely on column
/// position, so `has_headers` defaults to `false`.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub has_headers: bool,
    /// Skip rows that fail to parse instead of failing the whole load.
    pub skip_errors: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self { delimiter: b',', has_headers: false, skip_errors: false }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub deployments: u64,
    pub media: u64,
    pub observations: u64,
    pub skipped: u64,
}
