use once_cell::sync::Lazy;
use regex::Regex;

/// `<uuid>-<original name>` as produced by the upload API
static UUID_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}-(.+)$")
        .expect("valid uuid prefix regex")
});

/// Strip a leading upload UUID from a file name
pub fn strip_uuid_prefix(file_name: &str) -> &str {
    UUID_PREFIX
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map_or(file_name, |m| m.as_str())
}

/// Filename signature: no UUID prefix, no extension, lower case, only
/// ASCII letters, digits and Hangul syllables.
pub fn file_name_signature(file_name: &str) -> String {
    let base = strip_uuid_prefix(file_name);
    let stem = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => stem,
        _ => base,
    };

    stem.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || ('가'..='힣').contains(c))
        .collect()
}
