//! Error types for survey metrics
//!
//! Only two things can go wrong: a metric, reducer or summary was configured
//! badly (reported when it is built), or the caller handed a partition that
//! does not carry the columns the metric declared. Partitions with too little
//! data are not errors; they evaluate to [`MetricValue::Invalid`].
//!
//! [`MetricValue::Invalid`]: crate::MetricValue::Invalid

use thiserror::Error;

/// Result type alias for survey metric operations
pub type Result<T> = std::result::Result<T, MetricError>;

/// Main error type for survey metric operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    /// Construction-time configuration problem
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Partition does not match the declared column requirements
    #[error("Data error: {0}")]
    Data(#[from] DataError),
}

/// Errors raised while building metrics, reducers, summaries or bundles
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Configuration document could not be parsed (includes unknown keys)
    #[error("Invalid configuration document: {0}")]
    Parse(String),

    /// An option holds a value outside its legal range
    #[error("Invalid value for `{option}`: {reason}")]
    InvalidValue { option: String, reason: String },

    /// A column-name option was set to the empty string
    #[error("Column name for `{option}` must not be empty")]
    EmptyColumn { option: String },

    /// Reduce function is not declared by the metric
    #[error("Metric `{metric}` has no reduce function `{name}`")]
    UnknownReduce { metric: String, name: String },

    /// Reduce functions requested on a scalar metric
    #[error("Metric `{metric}` does not produce a vector and cannot be reduced")]
    NotAVectorMetric { metric: String },
}

impl ConfigError {
    /// Shorthand for [`ConfigError::InvalidValue`].
    pub fn invalid(option: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            option: option.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for MetricError {
    fn from(err: serde_json::Error) -> Self {
        MetricError::Config(err.into())
    }
}

/// Errors describing a malformed partition
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    /// A declared column is absent from the partition
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Column exists with the wrong kind of values
    #[error("Column `{column}` holds {actual} values, expected {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Column length differs from the rest of the table
    #[error("Column `{column}` has {len} rows, table has {expected}")]
    RaggedColumn {
        column: String,
        len: usize,
        expected: usize,
    },

    /// A row carries a field twice
    #[error("Duplicate field `{0}` in row")]
    DuplicateField(String),
}
