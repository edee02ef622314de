//! Storage channel abstraction
//!
//! The channel is the narrow contract this tool holds against the remote
//! storage service: container/blob resolution, attribute fetches, and the
//! copy lifecycle calls. One production implementation speaks the Azure
//! Blob REST API; tests substitute scripted implementations.

pub mod azure;
pub mod management;

use crate::auth::provider::AzureAuthProvider;
use crate::copy::models::BlobHandle;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub use azure::AzureStorageChannel;
pub use management::StorageManagementClient;

/// Credentials a channel presents to the storage service
#[derive(Clone)]
pub enum StorageCredentials {
    /// Shared Key authorization using the base64 account key
    SharedKey { key: String },
    /// SAS token appended as query parameters
    SasToken { token: String },
    /// AAD bearer token minted by the auth provider
    Bearer { provider: Arc<dyn AzureAuthProvider> },
    /// No credentials; public containers only
    Anonymous,
}

impl std::fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageCredentials::SharedKey { .. } => f.write_str("SharedKey"),
            StorageCredentials::SasToken { .. } => f.write_str("SasToken"),
            StorageCredentials::Bearer { .. } => f.write_str("Bearer"),
            StorageCredentials::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/// An addressable storage account plus the credentials to reach it
#[derive(Debug, Clone)]
pub struct StorageContext {
    pub account: String,
    pub endpoint_suffix: String,
    pub credentials: StorageCredentials,
}

impl StorageContext {
    pub fn new(
        account: impl Into<String>,
        endpoint_suffix: impl Into<String>,
        credentials: StorageCredentials,
    ) -> Self {
        Self {
            account: account.into(),
            endpoint_suffix: endpoint_suffix.into(),
            credentials,
        }
    }

    /// Host of the blob endpoint, e.g. `myaccount.blob.core.windows.net`
    pub fn blob_host(&self) -> String {
        format!("{}.blob.{}", self.account, self.endpoint_suffix)
    }

    /// Base URL of the blob endpoint
    pub fn blob_endpoint(&self) -> String {
        format!("https://{}", self.blob_host())
    }
}

/// Source side of a copy operation
#[derive(Debug, Clone)]
pub enum CopySource {
    /// A blob resolved against a channel; carries its absolute URL
    Blob { handle: BlobHandle, url: Url },
    /// An opaque URI the service resolves itself (public or pre-signed)
    Uri(Url),
}

impl CopySource {
    /// The URL handed to the service's copy call
    pub fn url(&self) -> &Url {
        match self {
            CopySource::Blob { url, .. } => url,
            CopySource::Uri(url) => url,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            CopySource::Blob { handle, .. } => {
                format!("blob '{}' in container '{}'", handle.name, handle.container)
            }
            CopySource::Uri(url) => format!("URI '{url}'"),
        }
    }
}

/// Retry behavior attached to an individual remote call.
///
/// Abort-copy must always run with `RetryPolicy::None`: the service answers
/// a racing abort with 409, and a blind retry would misreport it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    None,
    Default {
        max_retries: usize,
        initial_interval: Duration,
    },
}

/// Remote storage operations used by the copy subsystem
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageChannel: Send + Sync {
    /// Account this channel is bound to
    fn account(&self) -> String;

    /// Host of the channel's blob endpoint
    fn endpoint_host(&self) -> String;

    /// Absolute URL of a blob under this channel
    fn blob_url(&self, container: &str, blob: &str) -> Result<Url>;

    async fn container_exists(&self, container: &str) -> Result<bool>;

    /// Create the container when missing; `Ok(true)` when it was created
    async fn create_container_if_not_exists(&self, container: &str) -> Result<bool>;

    /// Fetch a blob's server-side state; absent blobs are `BlobNotFound`
    async fn get_blob_from_server(&self, container: &str, blob: &str) -> Result<BlobHandle>;

    /// Refresh a blob's attributes, including its copy state
    async fn fetch_attributes(&self, container: &str, blob: &str) -> Result<BlobHandle>;

    /// Register a server-side copy; returns the service-assigned copy-id
    async fn start_copy(
        &self,
        source: &CopySource,
        dest_container: &str,
        dest_blob: &str,
    ) -> Result<String>;

    /// Abort an in-progress copy by copy-id
    async fn abort_copy(
        &self,
        container: &str,
        blob: &str,
        copy_id: &str,
        retry: RetryPolicy,
    ) -> Result<()>;

    /// Delete a blob; `Ok(false)` when it was already gone
    async fn delete_blob_if_exists(&self, container: &str, blob: &str) -> Result<bool>;
}
