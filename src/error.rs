use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconciliationError {
    #[error("Invalid branch registry: {0}")]
    InvalidRegistry(String),

    #[error("Duplicate branch number {0} in registry")]
    DuplicateBranchNumber(u32),

    #[error("Override '{pattern}' targets branch {target} which is not in the registry")]
    UnknownOverrideTarget { pattern: String, target: u32 },

    #[error("Override pattern '{pattern}' targets conflicting branches {first} and {second}")]
    ConflictingOverride {
        pattern: String,
        first: u32,
        second: u32,
    },

    #[error("Invalid override: {0}")]
    InvalidOverride(String),

    #[error("Invalid period calendar: {0}")]
    InvalidCalendar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("UTF-8 error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReconciliationError>;
