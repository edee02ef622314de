//! Name validation for Azure Blob Storage compatibility
//!
//! Container and blob names are checked against the service's naming
//! rules before any network call is made on them.

use crate::error::{BlobCopyError, Result};
use regex::Regex;

const MIN_CONTAINER_NAME_LENGTH: usize = 3;
const MAX_CONTAINER_NAME_LENGTH: usize = 63;
const MAX_BLOB_NAME_LENGTH: usize = 1024;
const MAX_BLOB_PATH_SEGMENTS: usize = 254;

/// Check if a name is a valid container name
pub fn is_valid_container_name(name: &str) -> bool {
    if name == "$root" || name == "$web" || name == "$logs" {
        return true;
    }
    if name.len() < MIN_CONTAINER_NAME_LENGTH || name.len() > MAX_CONTAINER_NAME_LENGTH {
        return false;
    }
    if name.contains("--") {
        return false;
    }
    let re = Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").unwrap();
    re.is_match(name)
}

/// Check if a name is a valid blob name
pub fn is_valid_blob_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_BLOB_NAME_LENGTH {
        return false;
    }
    if name.ends_with('/') || name.ends_with('.') {
        return false;
    }
    if name.split('/').count() > MAX_BLOB_PATH_SEGMENTS {
        return false;
    }
    true
}

/// Validate a container name, describing the violated rule on failure
pub fn validate_container_name(name: &str) -> Result<()> {
    if is_valid_container_name(name) {
        return Ok(());
    }
    let reason = if name.len() < MIN_CONTAINER_NAME_LENGTH || name.len() > MAX_CONTAINER_NAME_LENGTH
    {
        format!(
            "container names must be {MIN_CONTAINER_NAME_LENGTH}-{MAX_CONTAINER_NAME_LENGTH} characters"
        )
    } else if name.contains("--") {
        "container names cannot contain consecutive hyphens".to_string()
    } else {
        "container names may only contain lowercase letters, digits and hyphens, and must start and end with a letter or digit".to_string()
    };
    Err(BlobCopyError::invalid_name("container", name, reason))
}

/// Validate a blob name, describing the violated rule on failure
pub fn validate_blob_name(name: &str) -> Result<()> {
    if is_valid_blob_name(name) {
        return Ok(());
    }
    let reason = if name.is_empty() {
        "blob names cannot be empty".to_string()
    } else if name.len() > MAX_BLOB_NAME_LENGTH {
        format!("blob names cannot exceed {MAX_BLOB_NAME_LENGTH} characters")
    } else if name.ends_with('/') || name.ends_with('.') {
        "blob names cannot end with '/' or '.'".to_string()
    } else {
        format!("blob names cannot contain more than {MAX_BLOB_PATH_SEGMENTS} path segments")
    };
    Err(BlobCopyError::invalid_name("blob", name, reason))
}
