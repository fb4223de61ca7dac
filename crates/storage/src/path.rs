//! Path validation and security utilities.
//!
//! Logical paths come from listings, archives and asset payloads. Before one
//! is resolved against a backend root it must not be able to escape it.

use crate::error::{ErrorKind, Result};

/// Validates a logical path for security and correctness.
///
/// Back-slashes are treated as separators, `.` and empty segments are
/// dropped, and `..` is resolved. A path that would leave the root, contains a
/// null byte, or resolves to nothing is rejected with
/// [`InvalidPath`](crate::error::ErrorKind::InvalidPath).
///
/// # Examples
///
/// ```
/// use vamlib_storage::validate_path;
/// assert_eq!(validate_path(r"Custom\Scripts\a.cs").unwrap(), "Custom/Scripts/a.cs");
/// assert_eq!(validate_path("a/../Custom//./b.json").unwrap(), "Custom/b.json");
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a\0b").is_err());
/// ```
pub fn validate(path: impl AsRef<str>) -> Result<String> {
    let raw = path.as_ref();
    if raw.contains('\0') {
        exn::bail!(ErrorKind::InvalidPath(raw.to_string()));
    }
    let replaced = raw.replace('\\', "/");
    let mut segments = Vec::new();
    for segment in replaced.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(raw.to_string()));
                }
            },
            // Drive letters have no business in a logical path.
            s if s.ends_with(':') && segments.is_empty() && s.len() == 2 => {
                exn::bail!(ErrorKind::InvalidPath(raw.to_string()))
            },
            s => segments.push(s),
        }
    }
    match segments.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(raw.to_string())),
        false => Ok(segments.join("/")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        assert_eq!(validate("Custom/a.vam").unwrap(), "Custom/a.vam");
        assert_eq!(validate("/Custom/a.vam").unwrap(), "Custom/a.vam");
        assert_eq!(validate("a/b/../c.json").unwrap(), "a/c.json");
    }

    #[test]
    fn test_invalid_paths() {
        assert!(validate("").is_err());
        assert!(validate("./").is_err());
        assert!(validate("a/../../b").is_err());
        assert!(validate("C:/Windows/system.ini").is_err());
        assert!(validate("a\0b").is_err());
    }
}
