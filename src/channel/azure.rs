//! Azure Blob Storage channel implementation
//!
//! Talks to the Azure Blob REST API directly via `reqwest`. Keeping the
//! transport in-house gives each call site an explicit retry policy and
//! access to the copy operations (Copy Blob, Abort Copy) the copy
//! coordinator is built around.

use crate::channel::{CopySource, RetryPolicy, StorageChannel, StorageContext, StorageCredentials};
use crate::copy::models::{BlobHandle, BlobKind, CopyState, CopyStatus};
use crate::error::{BlobCopyError, Result};
use crate::utils::network::{create_http_client, NetworkConfig};
use crate::utils::retry::{retry_with_backoff, RetryOptions};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use sha2::Sha256;
use tracing::debug;
use url::Url;

/// Azure Blob REST API version used for all requests.
const AZURE_API_VERSION: &str = "2021-08-06";

/// AAD scope for data-plane bearer tokens.
const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";

/// Channel bound to one storage account.
pub struct AzureStorageChannel {
    client: Client,
    context: StorageContext,
    /// Decoded account key when using Shared Key authorization.
    key_bytes: Option<Vec<u8>>,
}

impl AzureStorageChannel {
    pub fn new(context: StorageContext) -> Result<Self> {
        let client = create_http_client(&NetworkConfig::default())?;

        let key_bytes = match &context.credentials {
            StorageCredentials::SharedKey { key } => Some(BASE64_STANDARD.decode(key).map_err(
                |e| {
                    BlobCopyError::authentication(format!(
                        "Invalid account key for '{}' (not valid base64): {e}",
                        context.account
                    ))
                },
            )?),
            _ => None,
        };

        Ok(Self {
            client,
            context,
            key_bytes,
        })
    }

    pub fn context(&self) -> &StorageContext {
        &self.context
    }

    /// Current UTC date in RFC 1123 format for the `x-ms-date` header.
    fn rfc1123_date() -> String {
        Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
    }

    fn container_resource(&self, container: &str) -> String {
        container.to_string()
    }

    fn blob_resource(&self, container: &str, blob: &str) -> String {
        format!("{container}/{blob}")
    }

    /// Append the SAS token as query parameters when using SAS auth.
    fn maybe_append_sas(&self, url: &str) -> String {
        match &self.context.credentials {
            StorageCredentials::SasToken { token } => {
                if url.contains('?') {
                    format!("{url}&{token}")
                } else {
                    format!("{url}?{token}")
                }
            }
            _ => url.to_string(),
        }
    }

    /// Sign a request using Shared Key authorization and return the
    /// Authorization header value.
    ///
    /// String-to-sign layout per the service contract:
    /// VERB, standard headers (only Content-Length and Content-Type are
    /// populated here), canonicalized x-ms-* headers, canonicalized
    /// resource with sorted query parameters.
    fn sign_request(
        &self,
        method: &str,
        resource: &str,
        content_length: Option<usize>,
        content_type: &str,
        date: &str,
        extra_headers: &[(String, String)],
        query_params: &[(String, String)],
    ) -> Result<String> {
        let key_bytes = self.key_bytes.as_ref().ok_or_else(|| {
            BlobCopyError::authentication("Shared Key signing requires an account key")
        })?;

        let content_length_str = match content_length {
            Some(0) | None => String::new(),
            Some(len) => len.to_string(),
        };

        let mut ms_headers: Vec<(String, String)> = vec![
            ("x-ms-date".to_string(), date.to_string()),
            ("x-ms-version".to_string(), AZURE_API_VERSION.to_string()),
        ];
        for (k, v) in extra_headers {
            let lk = k.to_lowercase();
            if lk.starts_with("x-ms-") && lk != "x-ms-date" && lk != "x-ms-version" {
                ms_headers.push((lk, v.clone()));
            }
        }
        ms_headers.sort_by(|a, b| a.0.cmp(&b.0));

        let canonicalized_headers: String = ms_headers
            .iter()
            .map(|(k, v)| format!("{k}:{v}"))
            .collect::<Vec<_>>()
            .join("\n");

        // Shared Key uses the un-encoded resource path, not the URL form.
        let mut canonicalized_resource = format!("/{}/{}", self.context.account, resource);
        if !query_params.is_empty() {
            let mut sorted_params = query_params.to_vec();
            sorted_params.sort_by(|a, b| a.0.cmp(&b.0));
            for (k, v) in &sorted_params {
                canonicalized_resource.push_str(&format!("\n{}:{}", k.to_lowercase(), v));
            }
        }

        let string_to_sign = format!(
            "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n{}\n{}",
            method, content_length_str, content_type, canonicalized_headers, canonicalized_resource
        );

        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(key_bytes)
            .map_err(|e| BlobCopyError::authentication(format!("HMAC key error: {e}")))?;
        mac.update(string_to_sign.as_bytes());
        let signature = BASE64_STANDARD.encode(mac.finalize().into_bytes());

        Ok(format!("SharedKey {}:{}", self.context.account, signature))
    }

    /// Build an authorized request for the given resource.
    async fn request(
        &self,
        method: Method,
        url: &str,
        resource: &str,
        content_length: Option<usize>,
        extra_headers: &[(String, String)],
        query_params: &[(String, String)],
    ) -> Result<reqwest::RequestBuilder> {
        let date = Self::rfc1123_date();

        let mut req = self
            .client
            .request(method.clone(), self.maybe_append_sas(url))
            .header("x-ms-date", &date)
            .header("x-ms-version", AZURE_API_VERSION);
        for (k, v) in extra_headers {
            req = req.header(k.as_str(), v.as_str());
        }

        match &self.context.credentials {
            StorageCredentials::SharedKey { .. } => {
                let auth_header = self.sign_request(
                    method.as_str(),
                    resource,
                    content_length,
                    "",
                    &date,
                    extra_headers,
                    query_params,
                )?;
                req = req.header("Authorization", auth_header);
            }
            StorageCredentials::Bearer { provider } => {
                let token = provider.get_token(&[STORAGE_SCOPE]).await?;
                req = req.header(
                    "Authorization",
                    format!("Bearer {}", token.token.secret()),
                );
            }
            StorageCredentials::SasToken { .. } | StorageCredentials::Anonymous => {}
        }

        Ok(req)
    }

    /// Map a failed response to an error carrying the HTTP status.
    fn map_status_error(&self, operation: &str, status: StatusCode, body: &str) -> BlobCopyError {
        let account = &self.context.account;
        match status.as_u16() {
            403 => BlobCopyError::azure_api_status(
                403,
                format!(
                    "{operation} on account '{account}' was refused; check the supplied key, SAS token or role assignment"
                ),
            ),
            502 | 503 => BlobCopyError::azure_api_status(
                status.as_u16(),
                format!(
                    "{operation} on account '{account}' failed with a gateway error; verify the account name and endpoint"
                ),
            ),
            code => BlobCopyError::azure_api_status(
                code,
                format!("{operation} on account '{account}' failed: {body}"),
            ),
        }
    }

    fn header<'a>(resp: &'a reqwest::Response, name: &str) -> Option<&'a str> {
        resp.headers().get(name).and_then(|v| v.to_str().ok())
    }

    /// Assemble a `BlobHandle` from a properties response's headers.
    fn parse_blob_handle(
        container: &str,
        blob: &str,
        resp: &reqwest::Response,
    ) -> Result<BlobHandle> {
        let kind = Self::header(resp, "x-ms-blob-type")
            .map(BlobKind::parse)
            .unwrap_or(BlobKind::Block);
        let content_length = Self::header(resp, "content-length").and_then(|v| v.parse().ok());

        let copy_state = match (
            Self::header(resp, "x-ms-copy-id"),
            Self::header(resp, "x-ms-copy-status"),
            Self::header(resp, "x-ms-copy-source"),
        ) {
            (Some(copy_id), Some(status), Some(source)) => {
                let source = Url::parse(source).map_err(|e| {
                    BlobCopyError::azure_api(format!(
                        "Service returned an unparsable copy source '{source}': {e}"
                    ))
                })?;
                let (bytes_copied, total_bytes) = Self::header(resp, "x-ms-copy-progress")
                    .map(parse_copy_progress)
                    .unwrap_or((None, None));
                let completion_time = Self::header(resp, "x-ms-copy-completion-time")
                    .and_then(|v| chrono::DateTime::parse_from_rfc2822(v).ok())
                    .map(|dt| dt.with_timezone(&Utc));
                Some(CopyState {
                    status: CopyStatus::parse(status),
                    copy_id: copy_id.to_string(),
                    source,
                    bytes_copied,
                    total_bytes,
                    status_description: Self::header(resp, "x-ms-copy-status-description")
                        .map(str::to_string),
                    completion_time,
                })
            }
            _ => None,
        };

        Ok(BlobHandle {
            container: container.to_string(),
            name: blob.to_string(),
            kind,
            snapshot: None,
            content_length,
            copy_state,
        })
    }

    async fn head_container(&self, container: &str) -> Result<bool> {
        let url = format!(
            "{}/{}?restype=container",
            self.context.blob_endpoint(),
            container
        );
        let resource = self.container_resource(container);
        let query = [("restype".to_string(), "container".to_string())];

        let resp = self
            .request(Method::HEAD, &url, &resource, None, &[], &query)
            .await?
            .send()
            .await
            .map_err(|e| BlobCopyError::network(format!("Container lookup failed: {e}")))?;

        match resp.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(self.map_status_error("Container lookup", status, "")),
        }
    }

    async fn issue_abort(&self, container: &str, blob: &str, copy_id: &str) -> Result<()> {
        let url = format!(
            "{}?comp=copy&copyid={}",
            self.blob_url(container, blob)?,
            copy_id
        );
        let resource = self.blob_resource(container, blob);
        let extra_headers = vec![("x-ms-copy-action".to_string(), "abort".to_string())];
        let query = [
            ("comp".to_string(), "copy".to_string()),
            ("copyid".to_string(), copy_id.to_string()),
        ];

        let resp = self
            .request(Method::PUT, &url, &resource, Some(0), &extra_headers, &query)
            .await?
            .send()
            .await
            .map_err(|e| BlobCopyError::network(format!("Copy abort failed: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => Err(BlobCopyError::blob_not_found(container, blob)),
            status => Err(self.map_status_error("Copy abort", status, &body)),
        }
    }

    async fn head_blob(&self, container: &str, blob: &str) -> Result<BlobHandle> {
        let url = self.blob_url(container, blob)?.to_string();
        let resource = self.blob_resource(container, blob);

        let resp = self
            .request(Method::HEAD, &url, &resource, None, &[], &[])
            .await?
            .send()
            .await
            .map_err(|e| BlobCopyError::network(format!("Blob properties request failed: {e}")))?;

        match resp.status() {
            status if status.is_success() => Self::parse_blob_handle(container, blob, &resp),
            StatusCode::NOT_FOUND => Err(BlobCopyError::blob_not_found(container, blob)),
            status => Err(self.map_status_error("Fetching blob properties", status, "")),
        }
    }
}

/// Parse the `x-ms-copy-progress` header ("bytesCopied/totalBytes").
fn parse_copy_progress(value: &str) -> (Option<u64>, Option<u64>) {
    match value.split_once('/') {
        Some((copied, total)) => (copied.trim().parse().ok(), total.trim().parse().ok()),
        None => (None, None),
    }
}

#[async_trait]
impl StorageChannel for AzureStorageChannel {
    fn account(&self) -> String {
        self.context.account.clone()
    }

    fn endpoint_host(&self) -> String {
        self.context.blob_host()
    }

    fn blob_url(&self, container: &str, blob: &str) -> Result<Url> {
        let mut url = Url::parse(&self.context.blob_endpoint())?;
        url.path_segments_mut()
            .map_err(|_| {
                BlobCopyError::invalid_argument(format!(
                    "Endpoint '{}' cannot address blobs",
                    self.context.blob_endpoint()
                ))
            })?
            .push(container)
            .extend(blob.split('/'));
        Ok(url)
    }

    async fn container_exists(&self, container: &str) -> Result<bool> {
        retry_with_backoff(|| self.head_container(container), RetryOptions::default()).await
    }

    async fn create_container_if_not_exists(&self, container: &str) -> Result<bool> {
        let url = format!(
            "{}/{}?restype=container",
            self.context.blob_endpoint(),
            container
        );
        let resource = self.container_resource(container);
        let query = [("restype".to_string(), "container".to_string())];

        let resp = self
            .request(Method::PUT, &url, &resource, Some(0), &[], &query)
            .await?
            .send()
            .await
            .map_err(|e| BlobCopyError::network(format!("Container create failed: {e}")))?;

        match resp.status() {
            status if status.is_success() => {
                debug!("Created container '{}'", container);
                Ok(true)
            }
            StatusCode::CONFLICT => Ok(false),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(self.map_status_error("Container create", status, &body))
            }
        }
    }

    async fn get_blob_from_server(&self, container: &str, blob: &str) -> Result<BlobHandle> {
        retry_with_backoff(
            || self.head_blob(container, blob),
            RetryOptions::default(),
        )
        .await
    }

    async fn fetch_attributes(&self, container: &str, blob: &str) -> Result<BlobHandle> {
        retry_with_backoff(
            || self.head_blob(container, blob),
            RetryOptions::default(),
        )
        .await
    }

    async fn start_copy(
        &self,
        source: &CopySource,
        dest_container: &str,
        dest_blob: &str,
    ) -> Result<String> {
        let url = self.blob_url(dest_container, dest_blob)?.to_string();
        let resource = self.blob_resource(dest_container, dest_blob);
        let extra_headers = vec![(
            "x-ms-copy-source".to_string(),
            source.url().to_string(),
        )];

        debug!(
            "Starting copy from {} to '{}/{}'",
            source.describe(),
            dest_container,
            dest_blob
        );

        // Transport failures propagate; the service owns any copy retry.
        let resp = self
            .request(
                Method::PUT,
                &url,
                &resource,
                Some(0),
                &extra_headers,
                &[],
            )
            .await?
            .send()
            .await
            .map_err(|e| BlobCopyError::network(format!("Copy start failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(self.map_status_error("Copy start", status, &body));
        }

        Self::header(&resp, "x-ms-copy-id")
            .map(str::to_string)
            .ok_or_else(|| {
                BlobCopyError::azure_api("Copy start response did not carry a copy id")
            })
    }

    async fn abort_copy(
        &self,
        container: &str,
        blob: &str,
        copy_id: &str,
        retry: RetryPolicy,
    ) -> Result<()> {
        match retry {
            RetryPolicy::None => self.issue_abort(container, blob, copy_id).await,
            RetryPolicy::Default {
                max_retries,
                initial_interval,
            } => {
                retry_with_backoff(
                    || self.issue_abort(container, blob, copy_id),
                    RetryOptions {
                        max_retries,
                        initial_interval,
                        ..RetryOptions::default()
                    },
                )
                .await
            }
        }
    }

    async fn delete_blob_if_exists(&self, container: &str, blob: &str) -> Result<bool> {
        let url = self.blob_url(container, blob)?.to_string();
        let resource = self.blob_resource(container, blob);

        let resp = self
            .request(Method::DELETE, &url, &resource, None, &[], &[])
            .await?
            .send()
            .await
            .map_err(|e| BlobCopyError::network(format!("Blob delete failed: {e}")))?;

        match resp.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(self.map_status_error("Blob delete", status, &body))
            }
        }
    }
}
