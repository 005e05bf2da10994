//! Helpers for turning caller-supplied references into safe names.
//!
//! `redact_path` keeps full paths out of tracing span attributes;
//! `source_name` derives the directory name variants are stored under.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals the file name without exposing the full path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Cleaned source name for a canonical reference: the file stem with
/// anything other than ASCII alphanumerics, `-` and `_` replaced by `_`.
///
/// - `/input/sample1.jpg` → `sample1`
/// - `C:/photos/my cat.png` → `my_cat`
/// - `/input/.hidden` → `_hidden`
pub fn source_name(reference: &str) -> String {
    let last = reference.rsplit('/').next().unwrap_or(reference);
    let stem = match last.rfind('.') {
        Some(0) | None => last,
        Some(dot) => &last[..dot],
    };

    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}
