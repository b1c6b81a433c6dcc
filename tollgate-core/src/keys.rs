//! Key derivation shared by the response cache and the admission limiter.
//!
//! Cache keys have the shape `{principal}|{path}|{query}`. The `|` separator
//! never appears unescaped inside a component, which lets invalidation
//! patterns anchor on whole path components: `|/resources|` matches the
//! listing and nothing else, `|/resources/42/` matches everything nested
//! under one resource.

use percent_encoding::{percent_decode_str, percent_encode, AsciiSet, CONTROLS};

use crate::types::{ClientId, ClientKeying, Principal};

const SEPARATOR: char = '|';
const ESCAPED_SEPARATOR: &str = "%7C";

/// Bytes kept percent-encoded inside a canonical path segment. Includes `/`
/// so an encoded slash never merges two segments, and `|` so segments never
/// carry the key separator.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(SEPARATOR as u8);

fn escape(component: &str) -> String {
    component.replace(SEPARATOR, ESCAPED_SEPARATOR)
}

/// Decodes a segment and re-encodes it with [`SEGMENT`], so `%31`, `1` and
/// `%7c` / `%7C` each collapse to one spelling.
fn canonical_segment(segment: &str) -> String {
    let raw: Vec<u8> = percent_decode_str(segment).collect();
    percent_encode(&raw, SEGMENT).to_string()
}

fn principal_part(principal: &Principal) -> String {
    match principal {
        Principal::Anonymous => crate::constants::ANONYMOUS_PRINCIPAL.to_string(),
        // Prefixed so a user literally named "anonymous" keys differently.
        Principal::User(id) => format!("u:{}", escape(id)),
    }
}

/// Normalizes a request path: empty becomes `/`, trailing slashes are dropped
/// and every segment is rewritten in canonical percent-encoding.
///
/// Two spellings the router resolves to the same resource normalize to the
/// same string, so their cache entries and limiter counters coincide.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }

    let relative = trimmed.strip_prefix('/').unwrap_or(trimmed);
    let mut normalized = String::with_capacity(trimmed.len() + 1);
    for segment in relative.split('/') {
        normalized.push('/');
        normalized.push_str(&canonical_segment(segment));
    }
    normalized
}

/// Derives the cache key for a read of `path?query` by `principal`.
pub fn cache_key(principal: &Principal, path: &str, query: Option<&str>) -> String {
    format!(
        "{}{sep}{}{sep}{}",
        principal_part(principal),
        normalize_path(path),
        escape(query.unwrap_or_default()),
        sep = SEPARATOR
    )
}

/// Returns true if `path` equals `root` or lies beneath it on a segment boundary.
pub fn is_within(path: &str, root: &str) -> bool {
    let path = normalize_path(path);
    let root = normalize_path(root);
    root == "/"
        || path == root
        || (path.starts_with(&root) && path.as_bytes().get(root.len()) == Some(&b'/'))
}

/// Patterns that cover every cached read affected by a write to `path`.
///
/// Yields the exact path, its subtree, and each ancestor collection down to
/// and including `family_root`. A path outside the family only yields its own
/// exact and subtree patterns.
pub fn invalidation_patterns(path: &str, family_root: &str) -> Vec<String> {
    let path = normalize_path(path);
    let root = normalize_path(family_root);

    let mut patterns = vec![
        format!("{sep}{}{sep}", path, sep = SEPARATOR),
        format!("{sep}{}/", path.trim_end_matches('/'), sep = SEPARATOR),
    ];

    if !is_within(&path, &root) {
        return patterns;
    }

    let mut current = path.as_str();
    while current.len() > root.len() {
        let Some(idx) = current.rfind('/') else { break };
        current = if idx == 0 { "/" } else { &current[..idx] };
        if current.len() < root.len() {
            break;
        }
        patterns.push(format!("{sep}{}{sep}", current, sep = SEPARATOR));
    }

    patterns
}

/// Derives the limiter key for `client` under the tier's keying mode.
pub fn limiter_key(client: &ClientId, keying: ClientKeying) -> String {
    match (keying, client.path.as_deref()) {
        (ClientKeying::AddressAndPath, Some(path)) => {
            format!("{}{}{}", client.address, SEPARATOR, normalize_path(path))
        }
        _ => client.address.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cache_key_shape() {
        let anon = cache_key(&Principal::Anonymous, "/api/v1/resources/42", None);
        assert_eq!(anon, "anonymous|/api/v1/resources/42|");

        let user = cache_key(
            &Principal::User("alice".into()),
            "/api/v1/resources/",
            Some("page=2"),
        );
        assert_eq!(user, "u:alice|/api/v1/resources|page=2");
    }

    #[test]
    fn test_cache_key_separates_principals() {
        let a = cache_key(&Principal::User("anonymous".into()), "/me", None);
        let b = cache_key(&Principal::Anonymous, "/me", None);
        assert_ne!(a, b);
    }

    #[test]
    fn test_cache_key_escapes_separator() {
        let key = cache_key(&Principal::User("a|b".into()), "/x", Some("q=|"));
        assert_eq!(key.matches('|').count(), 2);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("resources/"), "/resources");
        assert_eq!(normalize_path("/resources//"), "/resources");
    }

    #[test]
    fn test_normalize_path_canonical_encoding() {
        assert_eq!(normalize_path("/resources/%31"), "/resources/1");
        assert_eq!(normalize_path("/%72esources/%7c"), "/resources/%7C");
        assert_eq!(normalize_path("/resources/a|b"), "/resources/a%7Cb");
        assert_eq!(normalize_path("/files/a%2fb"), "/files/a%2Fb");
        assert_eq!(normalize_path("/caf\u{e9}"), "/caf%C3%A9");
        assert_eq!(normalize_path("/caf%C3%A9"), "/caf%C3%A9");
    }

    #[test]
    fn test_encoded_read_is_covered_by_plain_write() {
        let key = cache_key(&Principal::Anonymous, "/api/v1/resources/%31", None);
        let patterns = invalidation_patterns("/api/v1/resources/1", "/api/v1/resources");
        assert!(patterns.iter().any(|p| key.contains(p.as_str())), "{key} survived");
    }

    #[test]
    fn test_is_within() {
        assert!(is_within("/resources/42", "/resources"));
        assert!(is_within("/resources", "/resources"));
        assert!(!is_within("/resources-archive", "/resources"));
        assert!(!is_within("/my/resources", "/resources"));
    }

    #[test]
    fn test_invalidation_patterns_detail() {
        let patterns = invalidation_patterns("/api/v1/resources/42", "/api/v1/resources");
        assert_eq!(
            patterns,
            vec![
                "|/api/v1/resources/42|".to_string(),
                "|/api/v1/resources/42/".to_string(),
                "|/api/v1/resources|".to_string(),
            ]
        );
    }

    #[test]
    fn test_invalidation_patterns_collection() {
        let patterns = invalidation_patterns("/api/v1/resources", "/api/v1/resources");
        assert_eq!(
            patterns,
            vec![
                "|/api/v1/resources|".to_string(),
                "|/api/v1/resources/".to_string(),
            ]
        );
    }

    #[test]
    fn test_invalidation_patterns_nested() {
        let patterns = invalidation_patterns("/classrooms/7/students/3", "/classrooms");
        assert!(patterns.contains(&"|/classrooms/7/students|".to_string()));
        assert!(patterns.contains(&"|/classrooms/7|".to_string()));
        assert!(patterns.contains(&"|/classrooms|".to_string()));
        assert_eq!(patterns.len(), 5);
    }

    #[test]
    fn test_patterns_do_not_cross_families() {
        let sibling = cache_key(&Principal::Anonymous, "/api/v1/resources-archive", None);
        for pattern in invalidation_patterns("/api/v1/resources/1", "/api/v1/resources") {
            assert!(!sibling.contains(&pattern), "{pattern} matched {sibling}");
        }
    }

    #[test]
    fn test_limiter_key_modes() {
        let client = ClientId::new("10.0.0.1").with_path("/api/v1/auth/login");
        assert_eq!(limiter_key(&client, ClientKeying::Address), "10.0.0.1");
        assert_eq!(
            limiter_key(&client, ClientKeying::AddressAndPath),
            "10.0.0.1|/api/v1/auth/login"
        );
        assert_eq!(
            limiter_key(&ClientId::new("10.0.0.1"), ClientKeying::AddressAndPath),
            "10.0.0.1"
        );
    }

    #[test]
    fn test_limiter_key_ignores_encoding_aliases() {
        let plain = ClientId::new("10.0.0.1").with_path("/api/v1/auth/login");
        let encoded = ClientId::new("10.0.0.1").with_path("/api/v1/auth/%6Cogin");
        assert_eq!(
            limiter_key(&plain, ClientKeying::AddressAndPath),
            limiter_key(&encoded, ClientKeying::AddressAndPath)
        );
    }

    proptest! {
        #[test]
        fn prop_reads_are_covered_by_their_own_patterns(
            segments in prop::collection::vec("[a-z0-9]{1,8}", 1..5),
            user in proptest::option::of("[a-z]{1,8}"),
            query in proptest::option::of("[a-z]=[0-9]{1,3}"),
        ) {
            let path = format!("/{}", segments.join("/"));
            let principal = Principal::from_optional(user.as_deref());
            let key = cache_key(&principal, &path, query.as_deref());
            let patterns = invalidation_patterns(&path, &format!("/{}", segments[0]));
            prop_assert!(patterns.iter().any(|p| key.contains(p.as_str())));
        }
    }
}
