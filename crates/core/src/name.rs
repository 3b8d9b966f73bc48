// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment and service name validation.
//!
//! Names become container-network names, workspace directory names, and DNS
//! labels, so the permitted alphabet is the intersection of what all three
//! accept. Validation runs before any runtime command sees the name.

use thiserror::Error;

/// Maximum name length; names are embedded in DNS labels (63-byte limit)
/// and network names, so cap well below both.
pub const NAME_MAX_LEN: usize = 48;

/// Errors from name validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("name is empty")]
    Empty,
    #[error("name exceeds {NAME_MAX_LEN} characters: {0:?}")]
    TooLong(String),
    #[error("name contains invalid character {1:?}: {0:?} (allowed: A-Z a-z 0-9 _ -)")]
    InvalidChar(String, char),
}

/// Validate an environment or service name: `[A-Za-z0-9_-]+`, non-empty.
pub fn validate_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.len() > NAME_MAX_LEN {
        return Err(NameError::TooLong(name.to_string()));
    }
    for c in name.chars() {
        if !(c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(NameError::InvalidChar(name.to_string(), c));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "name_tests.rs"]
mod tests;
