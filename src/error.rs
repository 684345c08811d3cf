use thiserror::Error;

/// Errors raised while reading, bucketing or querying billing records.
#[derive(Error, Debug)]
pub enum Error {
    /// The cost column could not be parsed as an exact decimal.
    #[error("malformed cost {value:?}")]
    MalformedCost { value: String },

    /// A dimension extractor needed a field the record does not have.
    #[error("record has no {field} field (required by {metric})")]
    MissingField {
        field: &'static str,
        metric: &'static str,
    },

    /// A dimension value contains the key separator and cannot be keyed.
    #[error("{field} value {value:?} contains the key separator (required by {metric})")]
    SeparatorInValue {
        field: &'static str,
        metric: &'static str,
        value: String,
    },

    /// A running cost sum no longer fits in a decimal.
    #[error("cost overflow summing {key}")]
    CostOverflow { key: String },

    /// A usage-period field is neither epoch seconds nor a known date format.
    #[error("invalid timestamp in {field}: {value:?}")]
    InvalidTimestamp { field: &'static str, value: String },

    /// Two slices or metrics were built from different dimension schemas.
    #[error("schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    /// A query filter named a dimension the metric does not have.
    #[error("{metric} has no dimension named {dimension:?}")]
    UnknownDimension {
        dimension: String,
        metric: &'static str,
    },

    #[error("invalid query pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// A requested aggregation window does not describe a real date range.
    #[error("invalid window: {0}")]
    InvalidWindow(String),

    /// Wraps any of the above with the position of the offending record.
    #[error("record {position}: {source}")]
    Record {
        position: usize,
        #[source]
        source: Box<Error>,
    },

    /// Wraps an error with the bill file it came from.
    #[error("{}: {source}", path.display())]
    File {
        path: std::path::PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Attach a record position, unless one is already attached.
    pub fn at_record(self, position: usize) -> Self {
        match self {
            e @ Error::Record { .. } => e,
            e => Error::Record {
                position,
                source: Box::new(e),
            },
        }
    }

    pub fn in_file(self, path: impl Into<std::path::PathBuf>) -> Self {
        Error::File {
            path: path.into(),
            source: Box::new(self),
        }
    }

    /// The error underneath any file or record-position wrapper.
    pub fn root(&self) -> &Error {
        match self {
            Error::Record { source, .. } | Error::File { source, .. } => source.root(),
            e => e,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
