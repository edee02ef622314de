use thiserror::Error;

/// Main error type for blobcopy operations
#[derive(Debug, Error)]
pub enum BlobCopyError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Azure API error: {message}")]
    AzureApiError {
        status: Option<u16>,
        message: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: String,
    },

    #[error("Container '{name}' not found")]
    ContainerNotFound { name: String },

    #[error("Blob '{blob}' not found in container '{container}'")]
    BlobNotFound { container: String, blob: String },

    #[error("No copy task found on blob '{blob}' in container '{container}'")]
    CopyTaskNotFound { container: String, blob: String },

    #[error("A copy from a different source is already pending on blob '{blob}' in container '{container}' (copy id {copy_id})")]
    CopyConflict {
        container: String,
        blob: String,
        copy_id: String,
    },

    #[error("Copy of blob '{blob}' in container '{container}' failed after {bytes_copied} of {total_bytes} bytes: {description}")]
    CopyFailed {
        container: String,
        blob: String,
        bytes_copied: u64,
        total_bytes: u64,
        description: String,
    },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl BlobCopyError {
    pub fn authentication<S: Into<String>>(msg: S) -> Self {
        Self::AuthenticationError(msg.into())
    }

    pub fn azure_api<S: Into<String>>(msg: S) -> Self {
        Self::AzureApiError {
            status: None,
            message: msg.into(),
        }
    }

    pub fn azure_api_status<S: Into<String>>(status: u16, msg: S) -> Self {
        Self::AzureApiError {
            status: Some(status),
            message: format!("HTTP {}: {}", status, msg.into()),
        }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_name<S: Into<String>, R: Into<String>>(
        kind: &'static str,
        name: S,
        reason: R,
    ) -> Self {
        Self::InvalidName {
            kind,
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn container_not_found<S: Into<String>>(name: S) -> Self {
        Self::ContainerNotFound { name: name.into() }
    }

    pub fn blob_not_found<C: Into<String>, B: Into<String>>(container: C, blob: B) -> Self {
        Self::BlobNotFound {
            container: container.into(),
            blob: blob.into(),
        }
    }

    pub fn copy_task_not_found<C: Into<String>, B: Into<String>>(container: C, blob: B) -> Self {
        Self::CopyTaskNotFound {
            container: container.into(),
            blob: blob.into(),
        }
    }

    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::NetworkError(msg.into())
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn unknown<S: Into<String>>(msg: S) -> Self {
        Self::Unknown(msg.into())
    }

    /// HTTP status carried by this error, if it came from the remote service
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::AzureApiError { status, .. } => *status,
            _ => None,
        }
    }

    /// True for the 409 a racing abort legitimately produces
    pub fn is_conflict_status(&self) -> bool {
        self.http_status() == Some(409)
    }
}

/// Result type alias for blobcopy operations
pub type Result<T> = std::result::Result<T, BlobCopyError>;

/// Convert Azure Core errors to BlobCopyError
impl From<azure_core::Error> for BlobCopyError {
    fn from(error: azure_core::Error) -> Self {
        Self::AuthenticationError(error.to_string())
    }
}
