//! Scripted in-memory storage channel for integration tests
//!
//! Holds per-blob copy state with programmable status transitions and
//! records every call the copy coordinator makes against it.

use async_trait::async_trait;
use blobcopy::channel::{CopySource, RetryPolicy, StorageChannel};
use blobcopy::copy::models::{BlobHandle, BlobKind, CopyState, CopyStatus};
use blobcopy::error::{BlobCopyError, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

/// A blob held by the fake service
#[derive(Debug, Clone)]
pub struct FakeBlob {
    pub total_bytes: u64,
    pub copy: Option<FakeCopy>,
}

/// Scripted copy state: each attribute fetch consumes the next status in
/// the script; the last observed status repeats once the script is empty.
#[derive(Debug, Clone)]
pub struct FakeCopy {
    pub copy_id: String,
    pub source: Url,
    pub current: CopyStatus,
    pub script: VecDeque<CopyStatus>,
}

impl FakeCopy {
    pub fn pending(copy_id: &str, source: &str) -> Self {
        Self {
            copy_id: copy_id.to_string(),
            source: Url::parse(source).expect("valid source url"),
            current: CopyStatus::Pending,
            script: VecDeque::new(),
        }
    }

    pub fn with_script(mut self, script: &[CopyStatus]) -> Self {
        self.script = script.iter().copied().collect();
        self
    }
}

#[derive(Default)]
struct FakeState {
    containers: HashSet<String>,
    blobs: HashMap<(String, String), FakeBlob>,
    start_copy_calls: usize,
    abort_calls: usize,
    fetch_log: Vec<String>,
    next_copy_seq: usize,
    /// Script applied to copies created by `start_copy`
    new_copy_script: Vec<CopyStatus>,
}

/// In-memory channel with scripted copy transitions
pub struct FakeChannel {
    account: String,
    state: Mutex<FakeState>,
    /// When set, flips the flag once the fetch count reaches the threshold
    stop_after_fetches: Mutex<Option<(usize, Arc<AtomicBool>)>>,
}

impl FakeChannel {
    pub fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
            state: Mutex::new(FakeState {
                new_copy_script: vec![CopyStatus::Pending, CopyStatus::Success],
                ..FakeState::default()
            }),
            stop_after_fetches: Mutex::new(None),
        }
    }

    pub fn add_container(&self, name: &str) {
        self.state.lock().unwrap().containers.insert(name.to_string());
    }

    pub fn add_blob(&self, container: &str, blob: &str, fake: FakeBlob) {
        self.add_container(container);
        self.state
            .lock()
            .unwrap()
            .blobs
            .insert((container.to_string(), blob.to_string()), fake);
    }

    /// Script applied to the copy created by the next `start_copy`
    pub fn set_new_copy_script(&self, script: &[CopyStatus]) {
        self.state.lock().unwrap().new_copy_script = script.to_vec();
    }

    pub fn set_stop_after_fetches(&self, count: usize, flag: Arc<AtomicBool>) {
        *self.stop_after_fetches.lock().unwrap() = Some((count, flag));
    }

    pub fn start_copy_calls(&self) -> usize {
        self.state.lock().unwrap().start_copy_calls
    }

    pub fn abort_calls(&self) -> usize {
        self.state.lock().unwrap().abort_calls
    }

    pub fn has_container(&self, name: &str) -> bool {
        self.state.lock().unwrap().containers.contains(name)
    }

    pub fn has_blob(&self, container: &str, blob: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .blobs
            .contains_key(&(container.to_string(), blob.to_string()))
    }

    pub fn fetch_log(&self) -> Vec<String> {
        self.state.lock().unwrap().fetch_log.clone()
    }

    pub fn fetch_count(&self, container: &str, blob: &str) -> usize {
        let label = format!("{container}/{blob}");
        self.state
            .lock()
            .unwrap()
            .fetch_log
            .iter()
            .filter(|entry| **entry == label)
            .count()
    }

    fn handle_from(&self, container: &str, blob: &str, fake: &FakeBlob) -> BlobHandle {
        let copy_state = fake.copy.as_ref().map(|copy| {
            let (bytes_copied, status_description) = match copy.current {
                CopyStatus::Success => (fake.total_bytes, None),
                CopyStatus::Pending => (fake.total_bytes / 2, None),
                CopyStatus::Failed => (
                    fake.total_bytes / 3,
                    Some("simulated copy failure".to_string()),
                ),
                _ => (fake.total_bytes / 3, None),
            };
            CopyState {
                status: copy.current,
                copy_id: copy.copy_id.clone(),
                source: copy.source.clone(),
                bytes_copied: Some(bytes_copied),
                total_bytes: Some(fake.total_bytes),
                status_description,
                completion_time: None,
            }
        });

        BlobHandle {
            container: container.to_string(),
            name: blob.to_string(),
            kind: BlobKind::Block,
            snapshot: None,
            content_length: Some(fake.total_bytes),
            copy_state,
        }
    }
}

#[async_trait]
impl StorageChannel for FakeChannel {
    fn account(&self) -> String {
        self.account.clone()
    }

    fn endpoint_host(&self) -> String {
        format!("{}.blob.core.windows.net", self.account)
    }

    fn blob_url(&self, container: &str, blob: &str) -> Result<Url> {
        Url::parse(&format!(
            "https://{}/{container}/{blob}",
            self.endpoint_host()
        ))
        .map_err(Into::into)
    }

    async fn container_exists(&self, container: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().containers.contains(container))
    }

    async fn create_container_if_not_exists(&self, container: &str) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .containers
            .insert(container.to_string()))
    }

    async fn get_blob_from_server(&self, container: &str, blob: &str) -> Result<BlobHandle> {
        let state = self.state.lock().unwrap();
        let fake = state
            .blobs
            .get(&(container.to_string(), blob.to_string()))
            .ok_or_else(|| BlobCopyError::blob_not_found(container, blob))?;
        Ok(self.handle_from(container, blob, fake))
    }

    async fn fetch_attributes(&self, container: &str, blob: &str) -> Result<BlobHandle> {
        let handle = {
            let mut state = self.state.lock().unwrap();
            state.fetch_log.push(format!("{container}/{blob}"));

            let key = (container.to_string(), blob.to_string());
            let fake = state
                .blobs
                .get_mut(&key)
                .ok_or_else(|| BlobCopyError::blob_not_found(container, blob))?;
            if let Some(copy) = fake.copy.as_mut() {
                if let Some(next) = copy.script.pop_front() {
                    copy.current = next;
                }
            }
            let fake = fake.clone();
            self.handle_from(container, blob, &fake)
        };

        let mut stop_after = self.stop_after_fetches.lock().unwrap();
        if let Some((threshold, flag)) = stop_after.as_ref() {
            let fetches = self.state.lock().unwrap().fetch_log.len();
            if fetches >= *threshold {
                flag.store(true, Ordering::Relaxed);
                *stop_after = None;
            }
        }

        Ok(handle)
    }

    async fn start_copy(
        &self,
        source: &CopySource,
        dest_container: &str,
        dest_blob: &str,
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.start_copy_calls += 1;
        state.next_copy_seq += 1;
        let copy_id = format!("copy-{:04}", state.next_copy_seq);

        let total_bytes = match source {
            CopySource::Blob { handle, .. } => handle.content_length.unwrap_or(0),
            CopySource::Uri(_) => 1024,
        };

        let mut script: VecDeque<CopyStatus> = state.new_copy_script.iter().copied().collect();
        let current = script.pop_front().unwrap_or(CopyStatus::Pending);

        state.blobs.insert(
            (dest_container.to_string(), dest_blob.to_string()),
            FakeBlob {
                total_bytes,
                copy: Some(FakeCopy {
                    copy_id: copy_id.clone(),
                    source: source.url().clone(),
                    current,
                    script,
                }),
            },
        );

        Ok(copy_id)
    }

    async fn abort_copy(
        &self,
        container: &str,
        blob: &str,
        copy_id: &str,
        _retry: RetryPolicy,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.abort_calls += 1;

        let key = (container.to_string(), blob.to_string());
        let fake = state
            .blobs
            .get_mut(&key)
            .ok_or_else(|| BlobCopyError::blob_not_found(container, blob))?;

        match fake.copy.as_mut() {
            Some(copy) if copy.copy_id == copy_id && copy.current == CopyStatus::Pending => {
                copy.current = CopyStatus::Aborted;
                copy.script.clear();
                Ok(())
            }
            _ => Err(BlobCopyError::azure_api_status(
                409,
                "NoPendingCopyOperation: there is currently no pending copy operation",
            )),
        }
    }

    async fn delete_blob_if_exists(&self, container: &str, blob: &str) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .blobs
            .remove(&(container.to_string(), blob.to_string()))
            .is_some())
    }
}
