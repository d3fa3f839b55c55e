//! Key-path tokenization.
//!
//! Keys are split on every occurrence of the separator. There is no
//! escaping: a separator inside a logical key name is indistinguishable from
//! a hierarchy boundary.

use crate::error::{Result, TreeError};

pub use crate::types::DEFAULT_SEPARATOR;

/// Split a key into its path segments. Never returns an empty vector.
pub fn split_key<'a>(key: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return vec![key];
    }
    key.split(separator).collect()
}

/// Byte ranges `(start, end)` of each segment of `key`.
///
/// `&key[..end]` is the full path of the node for that segment, so callers
/// can walk a key's folder chain without rebuilding prefixes.
pub fn segment_spans(key: &str, separator: &str) -> Vec<(usize, usize)> {
    if separator.is_empty() {
        return vec![(0, key.len())];
    }
    let mut spans = Vec::new();
    let mut start = 0;
    for (idx, _) in key.match_indices(separator) {
        spans.push((start, idx));
        start = idx + separator.len();
    }
    spans.push((start, key.len()));
    spans
}

/// Join segments back into a key.
pub fn join_path<S: AsRef<str>>(segments: &[S], separator: &str) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        out.push_str(segment.as_ref());
    }
    out
}

/// Path of the enclosing folder, or `None` for a top-level path.
pub fn parent_path<'a>(path: &'a str, separator: &str) -> Option<&'a str> {
    if separator.is_empty() {
        return None;
    }
    path.rfind(separator).map(|idx| &path[..idx])
}

/// Strip one trailing `*` and then one trailing separator.
///
/// `"user:*"` and `"user:"` both become `"user"`.
pub fn normalize_prefix<'a>(prefix: &'a str, separator: &str) -> &'a str {
    let prefix = prefix.strip_suffix('*').unwrap_or(prefix);
    if separator.is_empty() {
        return prefix;
    }
    prefix.strip_suffix(separator).unwrap_or(prefix)
}

/// Match pattern used to rescan everything below `prefix`.
pub fn scan_pattern(prefix: &str, separator: &str) -> String {
    if prefix.is_empty() {
        return "*".to_string();
    }
    let wildcard = format!("{}*", separator);
    if prefix.ends_with(&wildcard) {
        prefix.to_string()
    } else {
        format!("{}{}", prefix, wildcard)
    }
}

/// Reject separators that cannot delimit anything.
pub fn validate_separator(separator: &str) -> Result<()> {
    if separator.is_empty() {
        return Err(TreeError::InvalidSeparator(separator.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_on_every_separator() {
        assert_eq!(split_key("user:1001:profile", ":"), vec!["user", "1001", "profile"]);
        assert_eq!(split_key("a::b", ":"), vec!["a", "", "b"]);
        assert_eq!(split_key(":a:", ":"), vec!["", "a", ""]);
    }

    #[test]
    fn test_single_segment_keys() {
        assert_eq!(split_key("plain", ":"), vec!["plain"]);
        assert_eq!(split_key("", ":"), vec![""]);
    }

    #[test]
    fn test_multi_char_separator() {
        assert_eq!(split_key("a::b::c", "::"), vec!["a", "b", "c"]);
        assert_eq!(join_path(&["a", "b", "c"], "::"), "a::b::c");
    }

    #[test]
    fn test_segment_spans_agree_with_split() {
        let key = "user:1001::profile";
        let spans = segment_spans(key, ":");
        let labels: Vec<&str> = spans.iter().map(|&(s, e)| &key[s..e]).collect();
        assert_eq!(labels, split_key(key, ":"));
        let paths: Vec<&str> = spans.iter().map(|&(_, e)| &key[..e]).collect();
        assert_eq!(paths, vec!["user", "user:1001", "user:1001:", "user:1001::profile"]);
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("a:b:c", ":"), Some("a:b"));
        assert_eq!(parent_path("a", ":"), None);
        assert_eq!(parent_path(":a", ":"), Some(""));
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("user:*", ":"), "user");
        assert_eq!(normalize_prefix("user:", ":"), "user");
        assert_eq!(normalize_prefix("user", ":"), "user");
        assert_eq!(normalize_prefix("user*", ":"), "user");
    }

    #[test]
    fn test_scan_pattern() {
        assert_eq!(scan_pattern("", ":"), "*");
        assert_eq!(scan_pattern("user", ":"), "user:*");
        assert_eq!(scan_pattern("user:*", ":"), "user:*");
    }

    #[test]
    fn test_empty_separator_rejected() {
        assert!(validate_separator("").is_err());
        assert!(validate_separator("/").is_ok());
    }
}
