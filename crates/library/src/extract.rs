//! Reference extraction from asset payloads.
//!
//! Payloads are scanned for JSON string literals rather than parsed: scenes
//! and presets are frequently not valid JSON, and `.cs` sources aren't JSON
//! at all. All structural markers (`"`, `\`, `{`, `}`) are ASCII, so the scan
//! works on raw bytes.

use memchr::{memchr2, memchr3};
use std::collections::HashMap;
use vamlib_model::{ParsedReference, parse_reference};

/// Payload kinds whose contents are scanned for references.
pub const SCANNED_EXTENSIONS: [&str; 6] = [".json", ".vap", ".vam", ".vaj", ".cs", ".cslist"];

/// Extensions a string literal must end in to count as a reference.
pub const REFERENCEABLE_EXTENSIONS: [&str; 19] = [
    ".vam", ".vaj", ".vab", ".vap", ".vmi", ".vmb", ".cs", ".cslist", ".json", ".jpg", ".jpeg", ".png", ".tif",
    ".tiff", ".assetbundle", ".scene", ".wav", ".mp3", ".ogg",
];

const MORPH_NAME_KEY: &str = "name";
const INTERNAL_ID_KEY: &str = "internalId";

pub fn is_scanned(extension: &str) -> bool {
    SCANNED_EXTENSIONS.iter().any(|ext| ext.eq_ignore_ascii_case(extension))
}

/// One string literal; `start..end` is its content, quotes excluded.
struct Literal {
    start: usize,
    end: usize,
    /// Innermost enclosing object, `0` for the top level.
    object: usize,
    is_key: bool,
    text: Option<String>,
}

/// Position of the quote closing a literal whose content starts at `from`.
fn closing_quote(payload: &[u8], from: usize) -> Option<usize> {
    let mut position = from;
    loop {
        let found = position + memchr2(b'"', b'\\', payload.get(position..)?)?;
        match payload[found] {
            b'\\' => position = found + 2,
            _ => return Some(found),
        }
    }
}

fn unescape(payload: &[u8], start: usize, end: usize) -> Option<String> {
    // Quotes included, so the slice is a complete JSON string.
    let literal = payload.get(start - 1..=end)?;
    serde_json::from_slice(literal).ok()
}

fn literals(payload: &[u8]) -> Vec<Literal> {
    let mut literals = Vec::new();
    let mut objects = vec![0];
    let mut next_object = 1;
    let mut position = 0;
    while let Some(found) = payload.get(position..).and_then(|rest| memchr3(b'"', b'{', b'}', rest)) {
        let at = position + found;
        match payload[at] {
            b'{' => {
                objects.push(next_object);
                next_object += 1;
                position = at + 1;
            },
            b'}' => {
                if objects.len() > 1 {
                    objects.pop();
                }
                position = at + 1;
            },
            _ => {
                let start = at + 1;
                let Some(end) = closing_quote(payload, start) else { break };
                let is_key = payload[end + 1..].iter().find(|byte| !byte.is_ascii_whitespace()) == Some(&b':');
                literals.push(Literal {
                    start,
                    end,
                    object: objects.last().copied().unwrap_or(0),
                    is_key,
                    text: unescape(payload, start, end),
                });
                position = end + 1;
            },
        }
    }
    literals
}

fn is_reference(text: &str, reference: &ParsedReference) -> bool {
    (text.contains('/') || text.contains(':')) && REFERENCEABLE_EXTENSIONS.iter().any(|ext| *ext == reference.extension)
}

/// Value of the `key` member of an object, given the indices of its literals.
fn member<'a>(literals: &'a [Literal], members: &[usize], key: &str) -> Option<&'a str> {
    members.windows(2).find_map(|pair| {
        let (name, value) = (&literals[pair[0]], &literals[pair[1]]);
        match name.is_key && !value.is_key && name.text.as_deref() == Some(key) {
            true => value.text.as_deref(),
            false => None,
        }
    })
}

/// Finds every reference string in `payload`.
///
/// A string literal counts when it contains a `/` or a `:` and ends in one of
/// the [`REFERENCEABLE_EXTENSIONS`]. Offsets and lengths are in bytes and
/// cover the literal as written, escapes included. A `"name"` or
/// `"internalId"` member of the same object is recorded as the reference's
/// morph name or internal id.
pub fn extract_references(payload: &[u8]) -> Vec<ParsedReference> {
    let literals = literals(payload);
    let mut objects: HashMap<usize, Vec<usize>> = HashMap::new();
    for (index, literal) in literals.iter().enumerate() {
        objects.entry(literal.object).or_default().push(index);
    }

    let mut references = Vec::new();
    for literal in &literals {
        if literal.is_key {
            continue;
        }
        let Some(text) = literal.text.as_deref() else { continue };
        let mut reference = parse_reference(text, literal.start, literal.end - literal.start);
        if !is_reference(text, &reference) {
            continue;
        }
        // Top-level literals of unrelated files share object `0`.
        if literal.object != 0
            && let Some(members) = objects.get(&literal.object)
        {
            reference.morph_name = member(&literals, members, MORPH_NAME_KEY).map(str::to_string);
            reference.internal_id = member(&literals, members, INTERNAL_ID_KEY).map(str::to_string);
        }
        references.push(reference);
    }
    references
}
