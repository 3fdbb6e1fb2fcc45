//! Error types for trackfuse

use thiserror::Error;

/// Errors that can occur while decoding, normalizing, or encoding GPS data
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed {format} in {file}: {message}")]
    MalformedXml {
        format: &'static str,
        file: String,
        message: String,
    },

    #[error("FIT decode error in {file}: {message}")]
    FitParse { file: String, message: String },

    #[error("No KML file found in KMZ archive {0}")]
    NoKmlEntry(String),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("No usable data in {0}")]
    NoUsableData(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

/// Result type for trackfuse operations
pub type Result<T> = std::result::Result<T, GeoError>;
