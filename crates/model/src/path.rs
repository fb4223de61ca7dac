//! Logical path handling.
//!
//! Library paths are compared case-insensitively and always use `/` as the
//! separator, regardless of the platform the content was authored on. Paths
//! are kept as `String` rather than [`PathBuf`](std::path::PathBuf) because
//! they mostly come from inside archives and asset payloads, never from the
//! local filesystem's own conventions.

/// Normalizes a logical path.
///
/// Back-slashes become forward slashes, empty and `.` segments are dropped,
/// and `..` is resolved without ever leaving the root (a `..` that would
/// escape is discarded instead of raising an error).
///
/// ```
/// use vamlib_model::path::normalize;
/// assert_eq!(normalize(r"Custom\Clothing\Female\top.vam"), "Custom/Clothing/Female/top.vam");
/// assert_eq!(normalize("/Custom//./Scripts/../Sounds/a.wav"), "Custom/Sounds/a.wav");
/// assert_eq!(normalize("../../a.json"), "a.json");
/// ```
pub fn normalize(raw: impl AsRef<str>) -> String {
    let replaced = raw.as_ref().replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in replaced.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                segments.pop();
            },
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Case-insensitive lookup key for a logical path.
pub fn key(path: impl AsRef<str>) -> String {
    normalize(path).to_lowercase()
}

/// Lower-cased extension of the last path segment, including the leading dot.
///
/// Returns an empty string when the file name has no extension. A leading dot
/// on its own (`.hidden`) does count as an extension, matching how the
/// content tools name marker files.
pub fn extension(path: impl AsRef<str>) -> String {
    let name = file_name(path.as_ref());
    match name.rfind('.') {
        Some(idx) => name[idx..].to_lowercase(),
        None => String::new(),
    }
}

/// The last segment of a path.
pub fn file_name(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// The path with the extension of its last segment removed.
pub fn stem(path: &str) -> &str {
    let name_start = path.rfind(['/', '\\']).map(|idx| idx + 1).unwrap_or(0);
    match path[name_start..].rfind('.') {
        Some(idx) => &path[..name_start + idx],
        None => path,
    }
}

/// Everything before the last `/`, or an empty string for top-level entries.
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Joins a relative path onto a directory and normalizes the result.
pub fn join(dir: &str, relative: &str) -> String {
    match dir.is_empty() {
        true => normalize(relative),
        false => normalize(format!("{dir}/{relative}")),
    }
}

/// Component-wise, case-insensitive prefix test.
///
/// `Custom/Atom/Person/Morphs/female` is a prefix of
/// `custom/atom/person/morphs/female/a.vmi` but not of
/// `Custom/Atom/Person/Morphs/female_genitalia/a.vmi`.
pub fn starts_with(path: &str, prefix: &str) -> bool {
    let path = key(path);
    let prefix = key(prefix);
    if prefix.is_empty() {
        return true;
    }
    path == prefix || path.starts_with(&format!("{prefix}/"))
}
