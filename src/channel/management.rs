//! Storage account management operations
//!
//! Thin client for the ARM management endpoint, used to list a storage
//! account's access keys when a cross-account copy is started without an
//! explicit destination key.

use crate::auth::provider::AzureAuthProvider;
use crate::error::{BlobCopyError, Result};
use crate::utils::network::{create_http_client, NetworkConfig};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";
const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";
const STORAGE_API_VERSION: &str = "2023-01-01";

/// An access key of a storage account
#[derive(Debug, Clone, Deserialize)]
pub struct StorageAccountKey {
    #[serde(rename = "keyName")]
    pub key_name: String,
    pub value: String,
    #[serde(default)]
    pub permissions: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListKeysResponse {
    keys: Vec<StorageAccountKey>,
}

/// Client for the ARM storage management API
pub struct StorageManagementClient {
    auth_provider: Arc<dyn AzureAuthProvider>,
    http_client: Client,
    subscription_id: String,
}

impl StorageManagementClient {
    pub fn new(auth_provider: Arc<dyn AzureAuthProvider>, subscription_id: String) -> Result<Self> {
        let http_client = create_http_client(&NetworkConfig::default())?;
        Ok(Self {
            auth_provider,
            http_client,
            subscription_id,
        })
    }

    async fn get_management_token(&self) -> Result<String> {
        let token = self.auth_provider.get_token(&[MANAGEMENT_SCOPE]).await?;
        Ok(token.token.secret().to_string())
    }

    /// List the access keys of a storage account
    pub async fn list_account_keys(
        &self,
        resource_group: &str,
        account: &str,
    ) -> Result<Vec<StorageAccountKey>> {
        let url = format!(
            "{MANAGEMENT_ENDPOINT}/subscriptions/{}/resourceGroups/{resource_group}/providers/Microsoft.Storage/storageAccounts/{account}/listKeys?api-version={STORAGE_API_VERSION}",
            self.subscription_id
        );

        debug!("Listing access keys for storage account '{}'", account);

        let token = self.get_management_token().await?;
        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Length", "0")
            .send()
            .await
            .map_err(|e| BlobCopyError::network(format!("Failed to call management API: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                404 => BlobCopyError::azure_api_status(
                    404,
                    format!(
                        "Storage account '{account}' not found in resource group '{resource_group}'"
                    ),
                ),
                403 => BlobCopyError::azure_api_status(
                    403,
                    format!(
                        "Not authorized to list keys for storage account '{account}'; check your role assignment"
                    ),
                ),
                code => BlobCopyError::azure_api_status(
                    code,
                    format!("Listing keys for storage account '{account}' failed: {body}"),
                ),
            });
        }

        let parsed: ListKeysResponse = response
            .json()
            .await
            .map_err(|e| BlobCopyError::azure_api(format!("Failed to parse key listing: {e}")))?;

        if parsed.keys.is_empty() {
            return Err(BlobCopyError::azure_api(format!(
                "Storage account '{account}' returned no access keys"
            )));
        }

        Ok(parsed.keys)
    }
}
