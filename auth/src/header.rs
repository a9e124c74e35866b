//! Digest header codec.
//!
//! Both `WWW-Authenticate` challenges and `Authorization` credentials share
//! one wire syntax:
//!
//! ```text
//! Digest key="value", key=token, ...
//! ```
//!
//! Parsing strips the scheme token, splits on commas that sit outside
//! double quotes, trims whitespace, lowercases keys and strips one pair of
//! surrounding quotes from values. No escape sequences are interpreted, so
//! a value can never contain a double quote. Formatting always quotes and
//! emits fields in a caller-supplied order.

use crate::error::ParseError;
use std::collections::HashMap;

/// Parsed header parameters, keyed by lowercase parameter name.
pub type HeaderFields = HashMap<String, String>;

/// How the parser treats parameters whose value is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyValues {
    /// Keep the parameter with an empty string value.
    #[default]
    Keep,

    /// Drop the parameter entirely.
    Drop,
}

/// Parse a header value of the form `<scheme> key=value, ...`.
///
/// The scheme is matched case-insensitively and must be followed by
/// whitespace or the end of input. When a key repeats, the last occurrence
/// wins.
///
/// # Errors
///
/// Returns [`ParseError::MissingScheme`] if `text` does not start with `scheme`.
///
/// # Examples
///
/// ```
/// use composable_digest_auth::header::{parse, EmptyValues};
///
/// let fields = parse(r#"Digest realm="api", qop="auth,auth-int""#, "Digest", EmptyValues::Keep).unwrap();
/// assert_eq!(fields["realm"], "api");
/// assert_eq!(fields["qop"], "auth,auth-int");
/// ```
pub fn parse(
    text: &str,
    scheme: &'static str,
    empty: EmptyValues,
) -> Result<HeaderFields, ParseError> {
    let params = strip_scheme(text, scheme).ok_or(ParseError::MissingScheme { expected: scheme })?;

    let mut fields = HeaderFields::new();
    for segment in split_unquoted_commas(params) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        let (key, value) = segment.split_once('=').unwrap_or((segment, ""));
        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        let value = unquote(value.trim());
        if value.is_empty() && empty == EmptyValues::Drop {
            continue;
        }

        fields.insert(key.to_ascii_lowercase(), value.to_string());
    }

    Ok(fields)
}

/// Format header parameters as `<scheme> key="value", ...`.
///
/// Keys are emitted in `order`; keys listed in `order` but absent from
/// `fields` are skipped, and keys not listed are not emitted.
///
/// # Examples
///
/// ```
/// use composable_digest_auth::header::{format, HeaderFields};
///
/// let mut fields = HeaderFields::new();
/// fields.insert("nonce".to_string(), "abc".to_string());
/// fields.insert("realm".to_string(), "api".to_string());
///
/// assert_eq!(
///     format("Digest", &fields, &["realm", "nonce", "opaque"]),
///     r#"Digest realm="api", nonce="abc""#
/// );
/// ```
#[must_use]
pub fn format(scheme: &str, fields: &HeaderFields, order: &[&str]) -> String {
    let params: Vec<String> = order
        .iter()
        .filter_map(|key| fields.get(*key).map(|value| format!("{key}=\"{value}\"")))
        .collect();

    if params.is_empty() {
        scheme.to_string()
    } else {
        format!("{scheme} {}", params.join(", "))
    }
}

/// Returns the text after the scheme token, or `None` if the scheme is absent.
fn strip_scheme<'a>(text: &'a str, scheme: &str) -> Option<&'a str> {
    let text = text.trim_start();
    let head = text.get(..scheme.len())?;
    if !head.eq_ignore_ascii_case(scheme) {
        return None;
    }

    let rest = &text[scheme.len()..];
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() => Some(rest),
        Some(_) => None,
    }
}

/// Splits on commas that are not inside a double-quoted run.
fn split_unquoted_commas(params: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (idx, c) in params.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                segments.push(&params[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    segments.push(&params[start..]);

    segments
}

/// Strips one pair of surrounding double quotes. An unterminated quote only
/// loses its opening mark.
fn unquote(value: &str) -> &str {
    let Some(inner) = value.strip_prefix('"') else {
        return value;
    };
    inner.strip_suffix('"').unwrap_or(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parse_keep(text: &str) -> HeaderFields {
        parse(text, "Digest", EmptyValues::Keep).unwrap()
    }

    #[test]
    fn test_parse_quoted_and_token_values() {
        let fields = parse_keep(r#"Digest username="Mufasa", nc=00000001, qop=auth"#);
        assert_eq!(fields["username"], "Mufasa");
        assert_eq!(fields["nc"], "00000001");
        assert_eq!(fields["qop"], "auth");
    }

    #[test]
    fn test_parse_requires_scheme() {
        let result = parse(r#"Basic realm="x""#, "Digest", EmptyValues::Keep);
        assert_eq!(result, Err(ParseError::MissingScheme { expected: "Digest" }));
    }

    #[test]
    fn test_parse_scheme_must_be_a_whole_token() {
        let result = parse(r#"Digestrealm="x""#, "Digest", EmptyValues::Keep);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_scheme_is_case_insensitive() {
        let fields = parse_keep(r#"digest realm="x""#);
        assert_eq!(fields["realm"], "x");
    }

    #[test]
    fn test_parse_trims_whitespace_and_newlines() {
        let fields = parse_keep("Digest\n   realm = \"api\" ,\n   nonce= abc ");
        assert_eq!(fields["realm"], "api");
        assert_eq!(fields["nonce"], "abc");
    }

    #[test]
    fn test_parse_comma_inside_quotes() {
        let fields = parse_keep(r#"Digest qop="auth, auth-int", realm="a""#);
        assert_eq!(fields["qop"], "auth, auth-int");
        assert_eq!(fields["realm"], "a");
    }

    #[test]
    fn test_parse_last_duplicate_wins() {
        let fields = parse_keep(r#"Digest realm="first", realm="second""#);
        assert_eq!(fields["realm"], "second");
    }

    #[test]
    fn test_parse_lowercases_keys() {
        let fields = parse_keep(r#"Digest Realm="api""#);
        assert_eq!(fields["realm"], "api");
    }

    #[test]
    fn test_parse_empty_values_kept_or_dropped() {
        let text = r#"Digest opaque="", cnonce=, stale"#;

        let kept = parse(text, "Digest", EmptyValues::Keep).unwrap();
        assert_eq!(kept["opaque"], "");
        assert_eq!(kept["cnonce"], "");
        assert_eq!(kept["stale"], "");

        let dropped = parse(text, "Digest", EmptyValues::Drop).unwrap();
        assert!(dropped.is_empty());
    }

    #[test]
    fn test_parse_skips_empty_segments() {
        let fields = parse_keep(r#"Digest , realm="a",, ,nonce="b","#);
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_parse_unterminated_quote() {
        let fields = parse_keep(r#"Digest realm="open"#);
        assert_eq!(fields["realm"], "open");
    }

    #[test]
    fn test_parse_scheme_only() {
        assert!(parse_keep("Digest").is_empty());
    }

    #[test]
    fn test_format_uses_given_order() {
        let mut fields = HeaderFields::new();
        fields.insert("b".to_string(), "2".to_string());
        fields.insert("a".to_string(), "1".to_string());
        fields.insert("c".to_string(), "3".to_string());

        assert_eq!(format("Digest", &fields, &["c", "a", "b"]), r#"Digest c="3", a="1", b="2""#);
        assert_eq!(format("Digest", &fields, &["b"]), r#"Digest b="2""#);
    }

    proptest! {
        #[test]
        fn prop_format_then_parse_recovers_fields(
            fields in prop::collection::hash_map("[a-z][a-z0-9_-]{0,10}", "[^\"]{0,24}", 1..8)
        ) {
            let order: Vec<&str> = fields.keys().map(String::as_str).collect();
            let wire = format("Digest", &fields, &order);
            let parsed = parse(&wire, "Digest", EmptyValues::Keep).unwrap();
            prop_assert_eq!(parsed, fields);
        }
    }
}
