use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Malformed value for {attribute}: '{value}' ({reason})")]
    MalformedValue { attribute: String, value: String, reason: String },

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("Malformed condition list: {0}")]
    MalformedCondition(String),

    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    #[error("Resolver returned the wrong value kind for {attribute} (expected {expected})")]
    TypeMismatch { attribute: String, expected: String },

    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("Collection '{collection}' failed: {source}")]
    CollectionFailed {
        collection: String,
        #[source]
        source: Box<QueryError>,
    },

    #[error("Task error: {0}")]
    Task(String),

    #[error("query cancelled")]
    Cancelled,

    #[error("Invalid record in {file} row {row}: {reason}")]
    InvalidRecord { file: String, row: usize, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl QueryError {
    /// Unwraps `CollectionFailed` down to the error raised inside the task.
    #[must_use]
    pub fn root(&self) -> &QueryError {
        match self {
            Self::CollectionFailed { source, .. } => source.root(),
            other => other,
        }
    }
}
