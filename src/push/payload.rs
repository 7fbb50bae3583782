//! Key/value payload codec shared by push request bodies, query strings
//! and the initial-exchange response.

/// Default pair separator for query strings and POST bodies.
pub(crate) const PAIR_SEPARATOR: &[u8] = b"&";

/// Separator between a key and its value.
pub(crate) const KEY_SEPARATOR: &[u8] = b"=";

/// Line separator used by the initial-exchange response body.
pub(crate) const LINE_SEPARATOR: &[u8] = b"\n";

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }

    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Locate `key` and return the raw bytes after its first `=`.
///
/// Scanning starts at the first occurrence of the key and is bounded by
/// the next `separator`; absent keys yield `None`.
pub fn extract_value_sep<'a>(payload: &'a [u8], key: &str, separator: &[u8]) -> Option<&'a [u8]> {
    let start = find(payload, key.as_bytes())?;
    let mut pair = &payload[start..];

    if let Some(end) = find(pair, separator) {
        pair = &pair[..end];
    }

    let eq = find(pair, KEY_SEPARATOR)?;
    Some(&pair[eq + KEY_SEPARATOR.len()..])
}

/// [`extract_value_sep`] with the default `&` separator.
pub fn extract_value<'a>(payload: &'a [u8], key: &str) -> Option<&'a [u8]> {
    extract_value_sep(payload, key, PAIR_SEPARATOR)
}

/// Extract a text value, falling back to `default` when absent.
pub fn extract_str(payload: &[u8], key: &str, default: &str) -> String {
    extract_value(payload, key)
        .map(|v| String::from_utf8_lossy(v).into_owned())
        .unwrap_or_else(|| default.to_string())
}

/// Extract a base-10 integer value, falling back to `default` when the
/// key is absent or its value does not parse.
pub fn extract_int(payload: &[u8], key: &str, default: i64) -> i64 {
    extract_int_sep(payload, key, PAIR_SEPARATOR, default)
}

/// [`extract_int`] with an explicit pair separator.
pub fn extract_int_sep(payload: &[u8], key: &str, separator: &[u8], default: i64) -> i64 {
    extract_value_sep(payload, key, separator)
        .and_then(|v| std::str::from_utf8(v).ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Append `sep` then `key=value`, skipping empty values entirely.
pub(crate) fn write_value(buf: &mut Vec<u8>, key: &str, sep: &[u8], value: &[u8]) {
    if value.is_empty() {
        return;
    }

    buf.extend_from_slice(sep);
    buf.extend_from_slice(key.as_bytes());
    buf.extend_from_slice(KEY_SEPARATOR);
    buf.extend_from_slice(value);
}
