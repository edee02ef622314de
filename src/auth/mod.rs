//! Authentication module for Azure services
//!
//! This module provides authentication capabilities for the storage data
//! plane and the ARM management endpoint using DefaultAzureCredential.

pub mod provider;

pub use provider::*;
