//! Blob identity resolution
//!
//! Turns user input (names, URIs, handles) into validated remote blob and
//! container identities before any copy operation touches them.

use crate::channel::{CopySource, StorageChannel};
use crate::copy::validate::{validate_blob_name, validate_container_name};
use crate::error::{BlobCopyError, Result};
use std::sync::Arc;
use tracing::warn;
use url::Url;

/// Resolves user-supplied identities against one storage channel
pub struct BlobIdentityResolver {
    channel: Arc<dyn StorageChannel>,
}

impl BlobIdentityResolver {
    pub fn new(channel: Arc<dyn StorageChannel>) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> Arc<dyn StorageChannel> {
        self.channel.clone()
    }

    /// Resolve a source container; absent containers are an error
    pub async fn resolve_source_container(&self, name: &str) -> Result<()> {
        validate_container_name(name)?;
        if !self.channel.container_exists(name).await? {
            return Err(BlobCopyError::container_not_found(name));
        }
        Ok(())
    }

    /// Resolve a destination container, creating it when missing.
    /// Returns `true` when the container was created.
    pub async fn resolve_destination_container(&self, name: &str) -> Result<bool> {
        validate_container_name(name)?;
        self.channel.create_container_if_not_exists(name).await
    }

    /// Resolve a source blob from the server; absent blobs are an error
    pub async fn resolve_source_blob(&self, container: &str, blob: &str) -> Result<CopySource> {
        validate_container_name(container)?;
        validate_blob_name(blob)?;

        let handle = self.channel.get_blob_from_server(container, blob).await?;
        let url = self.channel.blob_url(container, blob)?;
        Ok(CopySource::Blob { handle, url })
    }

    /// Resolve a source URI against this resolver's storage context.
    ///
    /// When the URI's host matches the context's blob endpoint the blob is
    /// resolved directly with the context's credentials. On mismatch the URI
    /// is kept opaque (anonymous/pre-signed) and resolution is deferred to
    /// the service's own copy call.
    pub async fn resolve_source_by_uri(&self, uri: &Url) -> Result<CopySource> {
        let endpoint_host = self.channel.endpoint_host();
        let host_matches = uri
            .host_str()
            .map(|h| h.eq_ignore_ascii_case(&endpoint_host))
            .unwrap_or(false);

        if !host_matches {
            warn!(
                "Source URI host '{}' does not match storage context endpoint '{}'; treating the URI as an anonymous copy source",
                uri.host_str().unwrap_or("<none>"),
                endpoint_host
            );
            return Ok(CopySource::Uri(uri.clone()));
        }

        let (container, blob) = split_blob_path(uri)?;
        self.resolve_source_blob(&container, &blob).await
    }

    /// Destination blob name: explicit when given, otherwise the source
    /// blob's own name
    pub fn resolve_destination_name(
        &self,
        source: &CopySource,
        dest_blob: Option<&str>,
    ) -> Result<String> {
        let name = match dest_blob {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => default_name_from_source(source)?,
        };
        validate_blob_name(&name)?;
        Ok(name)
    }
}

/// Split a blob URI path into (container, blob)
pub fn split_blob_path(uri: &Url) -> Result<(String, String)> {
    let mut segments = uri
        .path_segments()
        .ok_or_else(|| {
            BlobCopyError::invalid_argument(format!("Source URI '{uri}' has no blob path"))
        })?
        .filter(|s| !s.is_empty());

    let container = segments.next().map(str::to_string);
    let blob = segments.collect::<Vec<_>>().join("/");

    match container {
        Some(container) if !blob.is_empty() => Ok((container, blob)),
        _ => Err(BlobCopyError::invalid_argument(format!(
            "Source URI '{uri}' does not address a blob (expected /container/blob)"
        ))),
    }
}

/// Derive the destination name a copy defaults to when none is supplied
fn default_name_from_source(source: &CopySource) -> Result<String> {
    match source {
        CopySource::Blob { handle, .. } => Ok(handle.name.clone()),
        CopySource::Uri(url) => {
            let name = url
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .unwrap_or("");
            if name.is_empty() {
                return Err(BlobCopyError::invalid_argument(format!(
                    "Cannot derive a destination blob name from source URI '{url}'"
                )));
            }
            Ok(name.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::models::BlobHandle;

    #[test]
    fn test_split_blob_path() {
        let uri = Url::parse("https://acct.blob.core.windows.net/src/dir/a.txt").unwrap();
        let (container, blob) = split_blob_path(&uri).unwrap();
        assert_eq!(container, "src");
        assert_eq!(blob, "dir/a.txt");
    }

    #[test]
    fn test_split_blob_path_rejects_container_only() {
        let uri = Url::parse("https://acct.blob.core.windows.net/src").unwrap();
        assert!(split_blob_path(&uri).is_err());

        let uri = Url::parse("https://acct.blob.core.windows.net/").unwrap();
        assert!(split_blob_path(&uri).is_err());
    }

    #[test]
    fn test_default_name_from_uri_source() {
        let source = CopySource::Uri(
            Url::parse("https://elsewhere.example.com/data/2026/report.csv").unwrap(),
        );
        assert_eq!(default_name_from_source(&source).unwrap(), "report.csv");
    }

    #[test]
    fn test_default_name_from_bare_uri_fails() {
        let source = CopySource::Uri(Url::parse("https://elsewhere.example.com/").unwrap());
        assert!(default_name_from_source(&source).is_err());
    }

    #[test]
    fn test_default_name_from_blob_source() {
        let handle = BlobHandle::new("src", "a.txt");
        let url = Url::parse("https://acct.blob.core.windows.net/src/a.txt").unwrap();
        let source = CopySource::Blob { handle, url };
        assert_eq!(default_name_from_source(&source).unwrap(), "a.txt");
    }
}
