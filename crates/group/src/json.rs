//! Permissive JSON field extraction.
//!
//! Asset payloads are hand-edited often enough that comments and trailing
//! commas show up in the wild. [`relax`] removes both (outside of string
//! literals) so that the remainder can go through `serde_json` as normal.
//! Unknown fields are ignored; a missing or mistyped field is `None`.

use serde::Deserialize;
use serde::de::DeserializeOwned;

#[derive(Debug, Deserialize)]
struct MorphMeta {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PresetMeta {
    uid: Option<String>,
}

/// The `displayName` of a `.vmi` payload.
pub fn display_name(payload: &[u8]) -> Option<String> {
    parse::<MorphMeta>(payload)?.display_name.filter(|name| !name.trim().is_empty())
}

/// The `uid` of a `.vam` payload.
pub fn uid(payload: &[u8]) -> Option<String> {
    parse::<PresetMeta>(payload)?.uid.filter(|uid| !uid.trim().is_empty())
}

fn parse<T: DeserializeOwned>(payload: &[u8]) -> Option<T> {
    let text = String::from_utf8_lossy(payload);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
    match serde_json::from_str(&relax(text)) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!(error = %e, "could not parse payload as JSON");
            None
        },
    }
}

/// Strips `//` and `/* */` comments and trailing commas.
pub fn relax(text: &str) -> String {
    let without_comments = strip_comments(text);
    strip_trailing_commas(&without_comments)
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                },
                '"' => in_string = false,
                _ => {},
            }
            continue;
        }
        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            },
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            },
            ('/', Some('*')) => {
                chars.next();
                let mut previous = '\0';
                for skipped in chars.by_ref() {
                    if previous == '*' && skipped == '/' {
                        break;
                    }
                    previous = skipped;
                }
                out.push(' ');
            },
            _ => out.push(c),
        }
    }
    out
}

fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut idx = 0;
    while idx < chars.len() {
        let c = chars[idx];
        if in_string {
            out.push(c);
            match c {
                '\\' if idx + 1 < chars.len() => {
                    out.push(chars[idx + 1]);
                    idx += 1;
                },
                '"' => in_string = false,
                _ => {},
            }
            idx += 1;
            continue;
        }
        if c == ',' {
            let next = chars[idx + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                idx += 1;
                continue;
            }
        }
        if c == '"' {
            in_string = true;
        }
        out.push(c);
        idx += 1;
    }
    out
}
