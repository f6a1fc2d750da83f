use std::path::PathBuf;

use thiserror::Error;

/// Main application error type that encompasses all possible failure modes.
///
/// Only request-shape, intake, and descriptor-load failures abort a whole
/// request; per-resource engine faults are contained by the orchestrators and
/// surface as failed results instead of propagating through this type.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status error: {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("request timeout: {url} after {timeout_seconds} seconds")]
    Timeout { url: String, timeout_seconds: u64 },

    #[error("request shape error: {0}")]
    RequestShape(String),

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("concurrent operation error: {details}")]
    Concurrency { details: String },
}

/// Archive intake error types: the payload could not be turned into a
/// populated workspace.
#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("archive payload is empty")]
    EmptyPayload,

    #[error("payload is not a valid archive: {details}")]
    NotAnArchive { details: String },

    #[error("archive entry '{entry}' escapes the workspace")]
    PathTraversal { entry: String },

    #[error("failed to extract archive entry '{entry}': {details}")]
    Extraction { entry: String, details: String },

    #[error("archive exceeds the {limit_mb} MB size limit")]
    TooLarge { limit_mb: u64 },

    #[error("workspace IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Package descriptor loading error types.
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("descriptor not found: {uri}")]
    NotFound { uri: String },

    #[error("unsupported descriptor URI scheme: {uri}")]
    UnsupportedScheme { uri: String },

    #[error("failed to fetch descriptor {uri}: {details}")]
    Fetch { uri: String, details: String },

    #[error("malformed package descriptor: {details}")]
    Malformed { details: String },

    #[error("descriptor declares no resources")]
    NoResources,
}

/// Schema engine error types: unrecoverable conditions only. Ordinary
/// conformance violations are data, not errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("unknown schema name: {name}")]
    UnknownSchema { name: String },

    #[error("unreadable resource data at {path}: {details}")]
    Unreadable { path: PathBuf, details: String },

    #[error("CSV reader error: {details}")]
    Csv { details: String },
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        EngineError::Csv {
            details: err.to_string(),
        }
    }
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, ValidationError>;
