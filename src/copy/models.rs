//! Data models for blob copy coordination
//!
//! This module defines the data structures shared by the copy subsystem:
//! blob handles, copy state snapshots, polling jobs and summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Kind of remote blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlobKind {
    Block,
    Page,
    Append,
}

impl BlobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobKind::Block => "BlockBlob",
            BlobKind::Page => "PageBlob",
            BlobKind::Append => "AppendBlob",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "PageBlob" => BlobKind::Page,
            "AppendBlob" => BlobKind::Append,
            _ => BlobKind::Block,
        }
    }
}

/// Server-reported status of a copy operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopyStatus {
    Pending,
    Success,
    Aborted,
    Failed,
    Invalid,
}

impl CopyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyStatus::Pending => "pending",
            CopyStatus::Success => "success",
            CopyStatus::Aborted => "aborted",
            CopyStatus::Failed => "failed",
            CopyStatus::Invalid => "invalid",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "pending" => CopyStatus::Pending,
            "success" => CopyStatus::Success,
            "aborted" => CopyStatus::Aborted,
            "failed" => CopyStatus::Failed,
            _ => CopyStatus::Invalid,
        }
    }

    /// Anything other than `Pending` is terminal
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CopyStatus::Pending)
    }
}

/// Snapshot of a copy operation, always fetched fresh from the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyState {
    pub status: CopyStatus,
    pub copy_id: String,
    pub source: Url,
    pub bytes_copied: Option<u64>,
    pub total_bytes: Option<u64>,
    pub status_description: Option<String>,
    pub completion_time: Option<DateTime<Utc>>,
}

impl CopyState {
    /// Percent complete; 0 when the total is unknown or zero
    pub fn percent(&self) -> u64 {
        percent_complete(
            self.bytes_copied.unwrap_or(0),
            self.total_bytes.unwrap_or(0),
        )
    }

    /// True when this pending copy pulls from `source`: hosts compared
    /// case-insensitively, paths exactly
    pub fn source_matches(&self, source: &Url) -> bool {
        let hosts_match = match (self.source.host_str(), source.host_str()) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            (None, None) => true,
            _ => false,
        };
        hosts_match && self.source.path() == source.path()
    }
}

/// Percent complete with a zero-total guard
pub fn percent_complete(bytes_copied: u64, total_bytes: u64) -> u64 {
    if total_bytes == 0 {
        return 0;
    }
    bytes_copied * 100 / total_bytes
}

/// In-process reference to a remote blob plus cached metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobHandle {
    pub container: String,
    pub name: String,
    pub kind: BlobKind,
    pub snapshot: Option<DateTime<Utc>>,
    pub content_length: Option<u64>,
    pub copy_state: Option<CopyState>,
}

impl BlobHandle {
    pub fn new(container: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            name: name.into(),
            kind: BlobKind::Block,
            snapshot: None,
            content_length: None,
            copy_state: None,
        }
    }

    /// The copy-id of the cached copy state, if any
    pub fn copy_id(&self) -> Option<&str> {
        self.copy_state.as_ref().map(|s| s.copy_id.as_str())
    }
}

/// A blob whose pending copy is being watched by the poller
#[derive(Debug, Clone)]
pub struct CopyJob {
    pub handle: BlobHandle,
    pub last_state: Option<CopyState>,
}

impl CopyJob {
    pub fn new(handle: BlobHandle) -> Self {
        let last_state = handle.copy_state.clone();
        Self { handle, last_state }
    }
}

/// Running totals for one polling invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollingSummary {
    pub total: usize,
    pub started: usize,
    pub finished: usize,
    pub failed: usize,
}

impl PollingSummary {
    /// Record a freshly observed status
    pub fn record(&mut self, status: CopyStatus) {
        self.total += 1;
        match status {
            CopyStatus::Pending => self.started += 1,
            CopyStatus::Success => self.finished += 1,
            CopyStatus::Aborted | CopyStatus::Failed | CopyStatus::Invalid => self.failed += 1,
        }
    }

    /// Move a previously pending entry to its terminal bucket
    pub fn resolve(&mut self, status: CopyStatus) {
        self.started = self.started.saturating_sub(1);
        match status {
            CopyStatus::Success => self.finished += 1,
            _ => self.failed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(status: CopyStatus, source: &str) -> CopyState {
        CopyState {
            status,
            copy_id: "11111111-2222-3333-4444-555555555555".to_string(),
            source: Url::parse(source).unwrap(),
            bytes_copied: None,
            total_bytes: None,
            status_description: None,
            completion_time: None,
        }
    }

    #[test]
    fn test_percent_complete() {
        assert_eq!(percent_complete(50, 200), 25);
        assert_eq!(percent_complete(200, 200), 100);
        assert_eq!(percent_complete(0, 200), 0);
    }

    #[test]
    fn test_percent_complete_zero_total() {
        assert_eq!(percent_complete(0, 0), 0);
        assert_eq!(percent_complete(42, 0), 0);
    }

    #[test]
    fn test_source_match_ignores_host_case() {
        let s = state(
            CopyStatus::Pending,
            "https://Account.Blob.Core.Windows.Net/src/a.txt",
        );
        let requested = Url::parse("https://account.blob.core.windows.net/src/a.txt").unwrap();
        assert!(s.source_matches(&requested));
    }

    #[test]
    fn test_source_match_is_path_sensitive() {
        let s = state(
            CopyStatus::Pending,
            "https://account.blob.core.windows.net/src/a.txt",
        );
        let other = Url::parse("https://account.blob.core.windows.net/src/b.txt").unwrap();
        assert!(!s.source_matches(&other));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!CopyStatus::Pending.is_terminal());
        assert!(CopyStatus::Success.is_terminal());
        assert!(CopyStatus::Aborted.is_terminal());
        assert!(CopyStatus::Failed.is_terminal());
        assert!(CopyStatus::Invalid.is_terminal());
    }

    #[test]
    fn test_summary_record_and_resolve() {
        let mut summary = PollingSummary::default();
        summary.record(CopyStatus::Pending);
        summary.record(CopyStatus::Pending);
        summary.record(CopyStatus::Success);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.started, 2);
        assert_eq!(summary.finished, 1);

        summary.resolve(CopyStatus::Success);
        summary.resolve(CopyStatus::Failed);
        assert_eq!(summary.started, 0);
        assert_eq!(summary.finished, 2);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_copy_status_parse_round_trip() {
        for status in [
            CopyStatus::Pending,
            CopyStatus::Success,
            CopyStatus::Aborted,
            CopyStatus::Failed,
        ] {
            assert_eq!(CopyStatus::parse(status.as_str()), status);
        }
        assert_eq!(CopyStatus::parse("garbage"), CopyStatus::Invalid);
    }
}
