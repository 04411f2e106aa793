//! Names used on the storage side: document titles and session directories.
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[/\\\x00-\x1f]").expect("valid regex"));

const FALLBACK_NAME: &str = "document";

/// Lowercase, strip diacritics, turn spaces into underscores.
/// `"Économie Générale"` becomes `"economie_generale"`.
pub fn normalize_title(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    let stripped: String = lowered
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .nfc()
        .collect();
    let underscored = stripped.replace(' ', "_");
    let cleaned = UNSAFE_CHARS.replace_all(&underscored, "").into_owned();
    if cleaned.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        cleaned
    }
}

/// Title and file extension for an uploaded document. The title override wins
/// over the uploaded file's stem; both go through [`normalize_title`].
pub fn document_name(title: Option<&str>, filename: &str) -> (String, Option<String>) {
    let path = Path::new(filename);
    let extension = path
        .extension()
        .map(|e| UNSAFE_CHARS.replace_all(&e.to_string_lossy(), "").into_owned())
        .filter(|e| !e.is_empty());
    let name = match title.filter(|t| !t.trim().is_empty()) {
        Some(title) => normalize_title(title),
        None => {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            normalize_title(&stem)
        }
    };
    (name, extension)
}

/// Publish directory of a session, e.g. `/player/maths/2020/rc/session-12`.
pub fn publish_dir(subject: &str, year: &str, session_id: i64) -> String {
    format!(
        "/player/{}/{}/rc/session-{}",
        subject.trim().to_lowercase(),
        year.trim(),
        session_id
    )
}
