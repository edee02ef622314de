//! Copy cancellation
//!
//! Aborts an in-progress copy. The copy-id is taken from the caller or
//! re-read from the blob's attributes, and the abort call runs without
//! retry: the service answers a racing abort with 409, which counts as
//! already resolved.

use crate::channel::{RetryPolicy, StorageChannel};
use crate::copy::validate::{validate_blob_name, validate_container_name};
use crate::error::Result;
use crate::utils::interactive::Confirmation;
use std::sync::Arc;
use tracing::info;

/// Cancels in-progress copies
pub struct CopyAborter<'a> {
    channel: Arc<dyn StorageChannel>,
    confirmation: &'a dyn Confirmation,
}

impl<'a> CopyAborter<'a> {
    pub fn new(channel: Arc<dyn StorageChannel>, confirmation: &'a dyn Confirmation) -> Self {
        Self {
            channel,
            confirmation,
        }
    }

    /// Abort the copy pending on a blob.
    ///
    /// Returns the aborted copy-id, or `None` when the user declined the
    /// confirmation prompt.
    pub async fn stop(
        &self,
        container: &str,
        blob: &str,
        copy_id: Option<&str>,
        force: bool,
    ) -> Result<Option<String>> {
        validate_container_name(container)?;
        validate_blob_name(blob)?;

        // With --force the service's current copy-id wins over whatever the
        // caller supplied.
        let copy_id = match copy_id {
            Some(id) if !force => id.to_string(),
            _ => self.discover_copy_id(container, blob).await?,
        };

        if !force {
            let message = format!(
                "Abort copy {copy_id} on blob '{blob}' in container '{container}'?"
            );
            if !self.confirmation.confirm(&message)? {
                info!(
                    "Abort of copy {} on '{}/{}' cancelled by user",
                    copy_id, container, blob
                );
                return Ok(None);
            }
        }

        match self
            .channel
            .abort_copy(container, blob, &copy_id, RetryPolicy::None)
            .await
        {
            Ok(()) => Ok(Some(copy_id)),
            Err(e) if e.is_conflict_status() => {
                // The copy finished or was already aborted between the
                // attribute fetch and the abort call.
                info!(
                    "Copy {} on '{}/{}' was already resolved: {}",
                    copy_id, container, blob, e
                );
                Ok(Some(copy_id))
            }
            Err(e) => Err(e),
        }
    }

    async fn discover_copy_id(&self, container: &str, blob: &str) -> Result<String> {
        let handle = self.channel.fetch_attributes(container, blob).await?;
        match handle.copy_id() {
            Some(id) => Ok(id.to_string()),
            None => Err(crate::error::BlobCopyError::copy_task_not_found(
                container, blob,
            )),
        }
    }
}
