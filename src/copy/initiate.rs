//! Copy initiation
//!
//! Starts a server-side copy between two resolved blob identities, handling
//! resume-monitoring of an identical pending copy, conflicting pending
//! copies, and overwrite confirmation for existing destinations.

use crate::channel::{CopySource, StorageChannel};
use crate::copy::models::{BlobHandle, CopyState, CopyStatus};
use crate::copy::resolve::BlobIdentityResolver;
use crate::error::{BlobCopyError, Result};
use crate::utils::interactive::Confirmation;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// What an existing destination blob means for a requested copy
#[derive(Debug)]
pub enum DestinationState {
    /// No blob at the destination
    Absent,
    /// Same copy already pending; monitor it instead of restarting
    Resume(CopyState),
    /// A different copy is pending; starting another one is an error
    Conflicting(CopyState),
    /// Blob exists with no pending copy; overwriting needs confirmation
    Occupied,
}

/// Classify an existing destination against the requested copy source
pub fn classify_destination(existing: Option<&BlobHandle>, source: &Url) -> DestinationState {
    let Some(handle) = existing else {
        return DestinationState::Absent;
    };
    match &handle.copy_state {
        Some(state) if state.status == CopyStatus::Pending => {
            if state.source_matches(source) {
                DestinationState::Resume(state.clone())
            } else {
                DestinationState::Conflicting(state.clone())
            }
        }
        _ => DestinationState::Occupied,
    }
}

/// Starts server-side copies against a destination channel
pub struct CopyInitiator<'a> {
    dest_channel: Arc<dyn StorageChannel>,
    confirmation: &'a dyn Confirmation,
}

impl<'a> CopyInitiator<'a> {
    pub fn new(dest_channel: Arc<dyn StorageChannel>, confirmation: &'a dyn Confirmation) -> Self {
        Self {
            dest_channel,
            confirmation,
        }
    }

    /// Start (or resume monitoring of) a copy into `dest_container`.
    ///
    /// Returns the destination handle carrying the registered copy-id, or
    /// `None` when the user declined to overwrite an existing blob.
    pub async fn start(
        &self,
        source: &CopySource,
        dest_container: &str,
        dest_blob: Option<&str>,
        force: bool,
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

        match classify_destination(existing.as_ref(), source.url()) {
            DestinationState::Resume(state) => {
                info!(
                    "Copy {} from {} is already pending on '{}/{}'; monitoring the existing operation",
                    state.copy_id,
                    source.describe(),
                    dest_container,
                    dest_name
                );
                // `existing` is Some here by construction
                return Ok(existing);
            }
            DestinationState::Conflicting(state) => {
                return Err(BlobCopyError::CopyConflict {
                    container: dest_container.to_string(),
                    blob: dest_name,
                    copy_id: state.copy_id,
                });
            }
            DestinationState::Occupied if !force => {
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
            }
            DestinationState::Occupied | DestinationState::Absent => {}
        }

        let copy_id = self
            .dest_channel
            .start_copy(source, dest_container, &dest_name)
            .await?;
        debug!(
            "Copy {} registered for '{}/{}'",
            copy_id, dest_container, dest_name
        );

        // The copy-id may only become visible on the first attribute fetch
        // after the start call.
        let refreshed = self
            .dest_channel
            .fetch_attributes(dest_container, &dest_name)
            .await?;
        if refreshed.copy_id().is_none() {
            debug!(
                "Destination '{}/{}' does not expose copy state yet (copy {})",
                dest_container, dest_name, copy_id
            );
        }

        Ok(Some(refreshed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_handle(source: &str) -> BlobHandle {
        let mut handle = BlobHandle::new("dst", "a.txt");
        handle.copy_state = Some(CopyState {
            status: CopyStatus::Pending,
            copy_id: "copy-1".to_string(),
            source: Url::parse(source).unwrap(),
            bytes_copied: Some(10),
            total_bytes: Some(100),
            status_description: None,
            completion_time: None,
        });
        handle
    }

    #[test]
    fn test_classify_absent() {
        let source = Url::parse("https://acct.blob.core.windows.net/src/a.txt").unwrap();
        assert!(matches!(
            classify_destination(None, &source),
            DestinationState::Absent
        ));
    }

    #[test]
    fn test_classify_resume_on_matching_source() {
        let source = Url::parse("https://acct.blob.core.windows.net/src/a.txt").unwrap();
        let handle = pending_handle("https://ACCT.blob.core.windows.net/src/a.txt");
        assert!(matches!(
            classify_destination(Some(&handle), &source),
            DestinationState::Resume(_)
        ));
    }

    #[test]
    fn test_classify_conflict_on_different_source() {
        let source = Url::parse("https://acct.blob.core.windows.net/src/a.txt").unwrap();
        let handle = pending_handle("https://acct.blob.core.windows.net/other/b.txt");
        assert!(matches!(
            classify_destination(Some(&handle), &source),
            DestinationState::Conflicting(_)
        ));
    }

    #[test]
    fn test_classify_occupied_on_terminal_state() {
        let source = Url::parse("https://acct.blob.core.windows.net/src/a.txt").unwrap();
        let mut handle = pending_handle("https://acct.blob.core.windows.net/src/a.txt");
        if let Some(state) = handle.copy_state.as_mut() {
            state.status = CopyStatus::Success;
        }
        assert!(matches!(
            classify_destination(Some(&handle), &source),
            DestinationState::Occupied
        ));

        handle.copy_state = None;
        assert!(matches!(
            classify_destination(Some(&handle), &source),
            DestinationState::Occupied
        ));
    }
}
