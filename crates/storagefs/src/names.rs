//! Directory name validation, applied before any remote call.

use crate::error::{Error, Result};

const SHARE_DIRECTORY_MAX: usize = 255;
const BLOB_DIRECTORY_MAX: usize = 1024;
const SHARE_FORBIDDEN: &[char] = &['"', '\\', '/', ':', '|', '<', '>', '*', '?'];

/// Validate a new file share directory name.
pub fn validate_share_directory(name: &str) -> Result<()> {
    let len = name.chars().count();
    if len == 0 || len > SHARE_DIRECTORY_MAX {
        return Err(invalid(name, "must be between 1 and 255 characters long"));
    }
    if name.trim().is_empty() {
        return Err(invalid(name, "must not consist only of whitespace"));
    }
    if let Some(c) = name.chars().find(|c| SHARE_FORBIDDEN.contains(c)) {
        return Err(invalid(name, &format!("must not contain '{c}'")));
    }
    if name.ends_with('.') {
        return Err(invalid(name, "must not end with '.'"));
    }
    Ok(())
}

/// Validate a new blob (virtual) directory name.
pub fn validate_blob_directory(name: &str) -> Result<()> {
    let len = name.chars().count();
    if len == 0 || len > BLOB_DIRECTORY_MAX {
        return Err(invalid(name, "must be between 1 and 1024 characters long"));
    }
    if name.contains('\\') {
        return Err(invalid(name, "must not contain '\\'"));
    }
    if name.ends_with('.') {
        return Err(invalid(name, "must not end with '.'"));
    }
    Ok(())
}

fn invalid(name: &str, reason: &str) -> Error {
    Error::InvalidName(format!("'{name}' {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_names() {
        assert!(validate_share_directory("reports 2024").is_ok());
        assert!(validate_share_directory("").is_err());
        assert!(validate_share_directory("   ").is_err());
        assert!(validate_share_directory("a:b").is_err());
        assert!(validate_share_directory("a?").is_err());
        assert!(validate_share_directory("trailing.").is_err());
        assert!(validate_share_directory(&"x".repeat(255)).is_ok());
        assert!(validate_share_directory(&"x".repeat(256)).is_err());
    }

    #[test]
    fn blob_names() {
        assert!(validate_blob_directory("photos: 2024").is_ok());
        assert!(validate_blob_directory("a\\b").is_err());
        assert!(validate_blob_directory("dir.").is_err());
        assert!(validate_blob_directory(&"x".repeat(1025)).is_err());
    }

    #[test]
    fn message_names_the_offending_character() {
        let err = validate_share_directory("a|b").unwrap_err();
        assert_eq!(err.to_string(), "invalid name: 'a|b' must not contain '|'");
    }
}
