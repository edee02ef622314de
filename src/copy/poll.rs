//! Copy status polling
//!
//! Reports copy status once, or blocks until every watched copy reaches a
//! terminal state. Blocking mode interleaves work over a fixed pool of
//! progress slots: jobs rotate through a ring, at most pool-size jobs are
//! fetched per sweep, and the loop sleeps between sweeps.

use crate::channel::StorageChannel;
use crate::copy::models::{BlobHandle, CopyJob, CopyStatus, PollingSummary};
use crate::copy::validate::{validate_blob_name, validate_container_name};
use crate::error::{BlobCopyError, Result};
use crate::utils::progress::ProgressReporter;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Polls copy status for one or many blobs
pub struct CopyStatusPoller {
    channel: Arc<dyn StorageChannel>,
    watch: VecDeque<CopyJob>,
    summary: PollingSummary,
    slot_count: usize,
    interval: Duration,
    stop: Arc<AtomicBool>,
}

impl CopyStatusPoller {
    pub fn new(
        channel: Arc<dyn StorageChannel>,
        slot_count: usize,
        interval: Duration,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            channel,
            watch: VecDeque::new(),
            summary: PollingSummary::default(),
            slot_count: slot_count.max(1),
            interval,
            stop,
        }
    }

    /// Totals accumulated over this poller's lifetime
    pub fn summary(&self) -> &PollingSummary {
        &self.summary
    }

    /// Number of jobs still waiting on a terminal state
    pub fn queued(&self) -> usize {
        self.watch.len()
    }

    /// Fetch the current copy state of one blob.
    ///
    /// Returns the refreshed handle immediately unless `wait` is set and
    /// the copy is still pending, in which case the blob joins the watch
    /// ring and `None` is returned; `wait_for_completion` resolves it.
    pub async fn check_one(
        &mut self,
        container: &str,
        blob: &str,
        wait: bool,
    ) -> Result<Option<BlobHandle>> {
        validate_container_name(container)?;
        validate_blob_name(blob)?;

        let handle = self.channel.fetch_attributes(container, blob).await?;
        let Some(state) = handle.copy_state.clone() else {
            return Err(BlobCopyError::copy_task_not_found(container, blob));
        };

        self.summary.record(state.status);

        if wait && state.status == CopyStatus::Pending {
            debug!(
                "Watching pending copy {} on '{}/{}'",
                state.copy_id, container, blob
            );
            self.watch.push_back(CopyJob::new(handle));
            return Ok(None);
        }

        Ok(Some(handle))
    }

    /// Block until every watched copy reaches a terminal state or the stop
    /// signal fires. Returns the handles resolved during the wait.
    pub async fn wait_for_completion(
        &mut self,
        progress: &mut dyn ProgressReporter,
    ) -> Result<Vec<BlobHandle>> {
        let mut resolved = Vec::new();

        'sweeps: while !self.watch.is_empty() {
            if self.stop.load(Ordering::Relaxed) {
                debug!(
                    "Stop requested; leaving {} pending cop(ies) unresolved",
                    self.watch.len()
                );
                break;
            }

            let batch = self.watch.len().min(self.slot_count);
            for slot in 0..batch {
                if self.stop.load(Ordering::Relaxed) {
                    break 'sweeps;
                }
                let Some(job) = self.watch.pop_front() else {
                    break;
                };
                if let Some(handle) = self.poll_job(job, slot, progress).await {
                    resolved.push(handle);
                }
            }

            progress.summary(&format!(
                "{} pending, {} finished, {} failed",
                self.watch.len(),
                self.summary.finished,
                self.summary.failed
            ));

            if self.watch.is_empty() {
                break;
            }
            tokio::time::sleep(self.interval).await;
        }

        progress.finish();
        Ok(resolved)
    }

    /// Poll one job; re-queue it when still pending, resolve it otherwise.
    async fn poll_job(
        &mut self,
        mut job: CopyJob,
        slot: usize,
        progress: &mut dyn ProgressReporter,
    ) -> Option<BlobHandle> {
        let container = job.handle.container.clone();
        let name = job.handle.name.clone();
        let label = format!("{container}/{name}");

        let refreshed = match self.channel.fetch_attributes(&container, &name).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Polling '{}' failed: {}", label, e);
                self.summary.resolve(CopyStatus::Failed);
                progress.slot_clear(slot);
                return None;
            }
        };

        match refreshed.copy_state.clone() {
            Some(state) if state.status == CopyStatus::Pending => {
                progress.slot_update(slot, &label, state.percent(), state.status.as_str());
                job.handle = refreshed;
                job.last_state = Some(state);
                self.watch.push_back(job);
                None
            }
            Some(state) => {
                progress.slot_update(slot, &label, state.percent(), state.status.as_str());
                progress.slot_clear(slot);
                self.summary.resolve(state.status);
                Some(refreshed)
            }
            None => {
                warn!("Copy state on '{}' disappeared while polling", label);
                self.summary.resolve(CopyStatus::Invalid);
                progress.slot_clear(slot);
                Some(refreshed)
            }
        }
    }
}
