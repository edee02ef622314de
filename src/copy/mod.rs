//! Blob copy coordination
//!
//! The copy subsystem: name validation, identity resolution, copy
//! initiation, status polling, cancellation, and the client-driven
//! cross-account orchestrator.

pub mod abort;
pub mod initiate;
pub mod local;
pub mod models;
pub mod poll;
pub mod resolve;
pub mod validate;

pub use abort::CopyAborter;
pub use initiate::CopyInitiator;
pub use local::LocalCopyOrchestrator;
pub use models::{BlobHandle, BlobKind, CopyJob, CopyState, CopyStatus, PollingSummary};
pub use poll::CopyStatusPoller;
pub use resolve::BlobIdentityResolver;
