//! Error types for the WFS paging services.

use thiserror::Error;

/// Result type alias using WfsError.
pub type WfsResult<T> = Result<T, WfsError>;

/// Primary error type for WFS operations.
#[derive(Debug, Error)]
pub enum WfsError {
    // === WFS Protocol Errors ===
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Operation not supported: {0}")]
    OperationNotSupported(String),

    #[error("Unknown feature type: {0}")]
    UnknownTypeName(String),

    #[error("Requested format not supported: {0}")]
    UnsupportedFormat(String),

    #[error("Malformed request document: {0}")]
    XmlParse(String),

    // === Cursor Errors ===
    #[error("Failed to persist result set {token}: {message}")]
    CursorPersist { token: String, message: String },

    #[error("Unknown result set: {0}")]
    CursorNotFound(String),

    #[error("Result set {token} is corrupt: {message}")]
    CursorCorrupt { token: String, message: String },

    // === Storage Errors ===
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    // === Boundary Errors ===
    #[error("{message}: {source}")]
    PageRetrieval {
        message: String,
        #[source]
        source: Box<WfsError>,
    },

    #[error("{message}: {source}")]
    IndexCapture {
        message: String,
        #[source]
        source: Box<WfsError>,
    },

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl WfsError {
    /// Wrap a failure that happened while fetching a page of a result set.
    pub fn page_retrieval(message: impl Into<String>, source: WfsError) -> Self {
        WfsError::PageRetrieval {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a failure that happened while capturing an index query.
    pub fn index_capture(message: impl Into<String>, source: WfsError) -> Self {
        WfsError::IndexCapture {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Innermost error, looking through boundary wrappers.
    pub fn root_cause(&self) -> &WfsError {
        match self {
            WfsError::PageRetrieval { source, .. } | WfsError::IndexCapture { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }

    /// Get the OGC OWS exception code for this error.
    pub fn ows_exception_code(&self) -> &'static str {
        match self.root_cause() {
            WfsError::MissingParameter(_) => "MissingParameterValue",
            WfsError::InvalidParameter { .. }
            | WfsError::UnknownTypeName(_)
            | WfsError::UnsupportedFormat(_)
            | WfsError::CursorNotFound(_)
            | WfsError::CursorCorrupt { .. } => "InvalidParameterValue",
            WfsError::OperationNotSupported(_) => "OperationNotSupported",
            WfsError::XmlParse(_) => "OperationParsingFailed",
            _ => "OperationProcessingFailed",
        }
    }

    /// Name of the request parameter the error refers to, if any.
    pub fn locator(&self) -> Option<&str> {
        match self.root_cause() {
            WfsError::MissingParameter(param) => Some(param),
            WfsError::InvalidParameter { param, .. } => Some(param),
            WfsError::UnknownTypeName(_) => Some("typeNames"),
            WfsError::UnsupportedFormat(_) => Some("outputFormat"),
            WfsError::CursorNotFound(_) | WfsError::CursorCorrupt { .. } => Some("resultSetID"),
            _ => None,
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self.root_cause() {
            WfsError::MissingParameter(_)
            | WfsError::InvalidParameter { .. }
            | WfsError::OperationNotSupported(_)
            | WfsError::UnsupportedFormat(_)
            | WfsError::XmlParse(_) => 400,

            WfsError::UnknownTypeName(_)
            | WfsError::CursorNotFound(_)
            | WfsError::CursorCorrupt { .. } => 404,

            _ => 500,
        }
    }
}

impl From<std::io::Error> for WfsError {
    fn from(err: std::io::Error) -> Self {
        WfsError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for WfsError {
    fn from(err: serde_json::Error) -> Self {
        WfsError::InternalError(format!("JSON error: {}", err))
    }
}
