use crate::error::{BlobCopyError, Result};
use reqwest::Client;
use std::time::Duration;

/// Configuration for HTTP client with proper timeouts and user-friendly error handling
pub struct NetworkConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
            user_agent: format!("bcp/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Create a properly configured HTTP client with timeouts
pub fn create_http_client(config: &NetworkConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .user_agent(&config.user_agent)
        .build()
        .map_err(|e| BlobCopyError::network(format!("Failed to create HTTP client: {}", e)))
}

/// Check if an error is worth retrying
pub fn is_retryable_error(error: &BlobCopyError) -> bool {
    match error {
        BlobCopyError::NetworkError(msg) => {
            // Retry on temporary network issues
            let msg_lower = msg.to_lowercase();
            msg_lower.contains("timeout")
                || msg_lower.contains("temporary")
                || msg_lower.contains("connection reset")
        }
        BlobCopyError::AzureApiError { status, .. } => {
            matches!(status, Some(500) | Some(502) | Some(503) | Some(504))
        }
        _ => false,
    }
}
