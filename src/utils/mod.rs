//! Utility functions module
//!
//! This module contains various utility functions including table
//! formatting, confirmation prompts, progress rendering, retry logic
//! and HTTP client construction.

pub mod format;
pub mod interactive;
pub mod network;
pub mod progress;
pub mod retry;

pub use format::*;
pub use interactive::*;
pub use network::*;
pub use progress::*;
pub use retry::*;
