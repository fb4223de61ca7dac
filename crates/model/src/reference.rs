//! Reference string parsing.
//!
//! Asset payloads point at other assets with strings such as
//! `Custom/Scripts/a.cs`, `SELF:/Custom/a.png` or
//! `clothing:Author.Name.latest:/Custom/Clothing/Female/top.vam`.
//! [`parse_reference`] turns one such string into a [`ParsedReference`]. It
//! never fails: anything that doesn't fit the grammar is a local path.

use crate::category::{AssetCategory, classify};
use crate::package::PackageName;
use crate::path;

const SELF_TOKEN: &str = "SELF";
const SELF_PREFIX: &str = "SELF:";
const PACKAGE_SEPARATOR: &str = ":/";

/// A structured pointer from one file's payload to another asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReference {
    /// The raw string as found in the payload.
    pub value: String,
    /// Byte offset of the raw string inside the payload.
    pub offset: usize,
    /// Byte length of the raw string inside the payload.
    pub length: usize,
    /// Explicit `SELF:` marker: resolved against the referencing container.
    pub is_self: bool,
    /// No qualifier at all: implicitly relative to the referencing container.
    pub is_local: bool,
    /// Target package, if the reference names one.
    pub package: Option<PackageName>,
    /// Path of the target inside its container.
    pub local_path: String,
    /// Lower-cased extension (with dot) of [`local_path`](Self::local_path), or empty.
    pub extension: String,
    pub category: AssetCategory,
    /// Morph display name recorded next to the reference, if any.
    pub morph_name: Option<String>,
    /// Internal id recorded next to the reference, if any.
    pub internal_id: Option<String>,
}
impl ParsedReference {
    /// Parse a reference that isn't tied to a payload position.
    pub fn parse(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref();
        parse_reference(raw, 0, raw.len())
    }

    /// Target package's archive file name, e.g. `Author.Name.latest.var`.
    pub fn package_filename(&self) -> Option<String> {
        self.package.as_ref().map(PackageName::filename)
    }

    pub fn with_morph_name(mut self, name: impl Into<String>) -> Self {
        self.morph_name = Some(name.into());
        self
    }

    pub fn with_internal_id(mut self, id: impl Into<String>) -> Self {
        self.internal_id = Some(id.into());
        self
    }
}

enum Target<'a> {
    SelfContained(&'a str),
    Local(&'a str),
    Package(PackageName, &'a str),
}

/// Parses one reference string found at `offset..offset + length` of a payload.
///
/// ```
/// use vamlib_model::parse_reference;
/// let reference = parse_reference("clothing:JaxZoa.JaxEffects.latest:/Custom/Jax.vam", 0, 49);
/// assert_eq!(reference.package_filename().as_deref(), Some("JaxZoa.JaxEffects.latest.var"));
/// assert_eq!(reference.local_path, "Custom/Jax.vam");
/// assert!(!reference.is_self && !reference.is_local);
/// ```
pub fn parse_reference(raw: &str, offset: usize, length: usize) -> ParsedReference {
    let value = raw.replace('\\', "/");
    let (is_self, is_local, package, local) = match resolve(&value) {
        Target::SelfContained(local) => (true, false, None, local),
        Target::Local(local) => (false, true, None, local),
        Target::Package(package, local) => (false, false, Some(package), local),
    };
    let local_path = path::normalize(local);
    let extension = path::extension(&local_path);
    let category = match extension.is_empty() {
        true => AssetCategory::UNKNOWN,
        false => classify(&extension, &local_path),
    };
    ParsedReference {
        value: raw.to_string(),
        offset,
        length,
        is_self,
        is_local,
        package,
        local_path,
        extension,
        category,
        morph_name: None,
        internal_id: None,
    }
}

fn resolve(value: &str) -> Target<'_> {
    // Only one `SELF:` is ever stripped; a nested one stays in the path.
    if let Some(prefix) = value.get(..SELF_PREFIX.len())
        && prefix.eq_ignore_ascii_case(SELF_PREFIX)
    {
        return Target::SelfContained(&value[SELF_PREFIX.len()..]);
    }
    let Some(split) = value.find(PACKAGE_SEPARATOR) else {
        return Target::Local(value);
    };
    let local = &value[split + PACKAGE_SEPARATOR.len()..];
    let mut segments = value[..split].split(':');
    let Some(last) = segments.next_back() else {
        return Target::Local(value);
    };
    let qualifiers_ok = segments.all(is_qualifier);
    if !qualifiers_ok {
        return Target::Local(value);
    }
    if let Ok(package) = last.parse::<PackageName>() {
        return Target::Package(package, local);
    }
    if last.eq_ignore_ascii_case(SELF_TOKEN) {
        return Target::SelfContained(local);
    }
    match is_qualifier(last) {
        // `toggle:/Custom/...`: a qualifier with no package at all.
        true => Target::Local(local),
        false => Target::Local(value),
    }
}

fn is_qualifier(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
