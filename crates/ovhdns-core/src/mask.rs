//! Masking of sensitive values before they reach a log line
//!
//! Application keys, secrets, consumer keys and IP addresses are all
//! reduced to a short prefix followed by [`MASK_MARKER`].

/// Marker appended to every masked value
pub const MASK_MARKER: &str = "***";

/// Number of characters left visible by [`mask`]
pub const DEFAULT_VISIBLE_CHARS: usize = 5;

/// Keep the first `visible_chars` characters of `value` and append the marker.
///
/// An empty value yields the bare marker so that "unset" and "masked"
/// look the same in logs.
pub fn mask_sensitive(value: &str, visible_chars: usize) -> String {
    if value.is_empty() {
        return MASK_MARKER.to_string();
    }
    let prefix: String = value.chars().take(visible_chars).collect();
    format!("{prefix}{MASK_MARKER}")
}

/// [`mask_sensitive`] with [`DEFAULT_VISIBLE_CHARS`]
pub fn mask(value: &str) -> String {
    mask_sensitive(value, DEFAULT_VISIBLE_CHARS)
}
