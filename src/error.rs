use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatementError {
    #[error("Invalid path '{0}': expected a JSON pointer such as /Financials/0/NetIncome")]
    InvalidPath(String),

    #[error("Path {path} does not resolve: {details}")]
    PathNotFound { path: String, details: String },

    #[error("Path {0} addresses a container, not a value")]
    NotALeaf(String),

    #[error("Invalid value for {path}: {details}")]
    InvalidValue { path: String, details: String },

    #[error("Path {0} addresses a derived field; it is recomputed and cannot be edited")]
    DerivedField(String),

    #[error("Path {0} is read-only")]
    ReadOnly(String),

    #[error("Index {index} out of range for {path} (length {len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("Unknown form type: {0}")]
    UnknownFormType(String),

    #[error("Unsupported schema version '{version}' for form type {form_type}")]
    UnsupportedSchemaVersion { form_type: String, version: String },

    #[error("Section {section} is not part of the {form_type} schema ({version})")]
    UnknownSection {
        section: String,
        form_type: String,
        version: String,
    },

    #[error("Derived total mismatch at {path}: stored {stored}, recomputed {recomputed}")]
    TotalsMismatch {
        path: String,
        stored: String,
        recomputed: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StatementError>;
