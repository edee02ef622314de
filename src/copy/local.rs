//! Client-driven copy orchestration
//!
//! Foreground copy of a single source/destination pair, used when source
//! and destination live in independently authenticated accounts. Polls the
//! destination until the copy resolves, and on an external stop signal
//! aborts the copy and deletes the partially copied destination blob.

use crate::channel::{CopySource, RetryPolicy, StorageChannel};
use crate::copy::initiate::{classify_destination, DestinationState};
use crate::copy::models::{BlobHandle, CopyStatus};
use crate::copy::resolve::BlobIdentityResolver;
use crate::error::{BlobCopyError, Result};
use crate::utils::interactive::Confirmation;
use crate::utils::progress::ProgressReporter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Drives one copy to completion in the foreground
pub struct LocalCopyOrchestrator<'a> {
    dest_channel: Arc<dyn StorageChannel>,
    confirmation: &'a dyn Confirmation,
    interval: Duration,
    stop: Arc<AtomicBool>,
}

impl<'a> LocalCopyOrchestrator<'a> {
    pub fn new(
        dest_channel: Arc<dyn StorageChannel>,
        confirmation: &'a dyn Confirmation,
        interval: Duration,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            dest_channel,
            confirmation,
            interval,
            stop,
        }
    }

    /// Copy `source` into the destination container and block until the
    /// copy resolves. Returns the final destination handle, or `None` when
    /// the user declined to overwrite or cancelled mid-copy.
    pub async fn run(
        &self,
        source: &CopySource,
        dest_container: &str,
        dest_blob: Option<&str>,
        overwrite: bool,
        progress: &mut dyn ProgressReporter,
    ) -> Result<Option<BlobHandle>> {
        let resolver = BlobIdentityResolver::new(self.dest_channel.clone());
        let dest_name = resolver.resolve_destination_name(source, dest_blob)?;

        if resolver.resolve_destination_container(dest_container).await? {
            info!("Created destination container '{}'", dest_container);
        }

        let existing = match self
            .dest_channel
            .fetch_attributes(dest_container, &dest_name)
            .await
        {
            Ok(handle) => Some(handle),
            Err(BlobCopyError::BlobNotFound { .. }) => None,
            Err(e) => return Err(e),
        };

        let resuming = match classify_destination(existing.as_ref(), source.url()) {
            DestinationState::Resume(state) => {
                info!(
                    "Copy {} is already pending on '{}/{}'; resuming monitoring",
                    state.copy_id, dest_container, dest_name
                );
                true
            }
            DestinationState::Conflicting(state) => {
                return Err(BlobCopyError::CopyConflict {
                    container: dest_container.to_string(),
                    blob: dest_name,
                    copy_id: state.copy_id,
                });
            }
            DestinationState::Occupied if !overwrite => {
                let message = format!(
                    "Blob '{dest_name}' already exists in container '{dest_container}'. Overwrite it?"
                );
                if !self.confirmation.confirm(&message)? {
                    info!(
                        "Copy to '{}/{}' cancelled by user",
                        dest_container, dest_name
                    );
                    return Ok(None);
                }
                false
            }
            DestinationState::Occupied | DestinationState::Absent => false,
        };

        if !resuming {
            let copy_id = self
                .dest_channel
                .start_copy(source, dest_container, &dest_name)
                .await?;
            info!(
                "Copy {} started for '{}/{}'",
                copy_id, dest_container, dest_name
            );
        }

        self.poll_until_resolved(dest_container, &dest_name, progress)
            .await
    }

    async fn poll_until_resolved(
        &self,
        container: &str,
        name: &str,
        progress: &mut dyn ProgressReporter,
    ) -> Result<Option<BlobHandle>> {
        let label = format!("{container}/{name}");

        loop {
            if self.stop.load(Ordering::Relaxed) {
                progress.finish();
                self.cancel_and_clean_up(container, name).await?;
                return Ok(None);
            }

            let handle = self.dest_channel.fetch_attributes(container, name).await?;
            let Some(state) = handle.copy_state.clone() else {
                progress.finish();
                return Err(BlobCopyError::copy_task_not_found(container, name));
            };

            progress.slot_update(0, &label, state.percent(), state.status.as_str());

            if state.status.is_terminal() {
                progress.finish();
                return match state.status {
                    CopyStatus::Failed | CopyStatus::Invalid => Err(BlobCopyError::CopyFailed {
                        container: container.to_string(),
                        blob: name.to_string(),
                        bytes_copied: state.bytes_copied.unwrap_or(0),
                        total_bytes: state.total_bytes.unwrap_or(0),
                        description: state
                            .status_description
                            .unwrap_or_else(|| format!("copy reported {}", state.status.as_str())),
                    }),
                    _ => Ok(Some(handle)),
                };
            }

            tokio::time::sleep(self.interval).await;
        }
    }

    /// Abort the in-flight copy and remove the partial destination blob.
    ///
    /// The 409 a racing abort produces is swallowed; every other abort or
    /// delete failure propagates.
    async fn cancel_and_clean_up(&self, container: &str, name: &str) -> Result<()> {
        let copy_id = match self.dest_channel.fetch_attributes(container, name).await {
            Ok(handle) => handle.copy_id().map(str::to_string),
            Err(BlobCopyError::BlobNotFound { .. }) => None,
            Err(e) => {
                warn!("Could not read copy state during cancellation: {}", e);
                None
            }
        };

        if let Some(copy_id) = copy_id {
            match self
                .dest_channel
                .abort_copy(container, name, &copy_id, RetryPolicy::None)
                .await
            {
                Ok(()) => info!("Aborted copy {} on '{}/{}'", copy_id, container, name),
                Err(e) if e.is_conflict_status() => {
                    info!(
                        "Copy {} on '{}/{}' was already resolved: {}",
                        copy_id, container, name, e
                    );
                }
                Err(e) => return Err(e),
            }
        }

        if self
            .dest_channel
            .delete_blob_if_exists(container, name)
            .await?
        {
            info!(
                "Deleted partially copied blob '{}/{}'",
                container, name
            );
        }

        info!("Copy to '{}/{}' cancelled", container, name);
        Ok(())
    }
}
