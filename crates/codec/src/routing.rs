//! The triple/quadruple URL resolution shared by the server router (§4.5)
//! and the client's subscription/publish dispatch (§4.2): exact match,
//! trailing-slash appended, trailing-slash stripped, or the longest
//! registered prefix ending in `/`. Shared here because both client and
//! server need byte-for-byte identical matching behavior.

/// Resolve `url` against `registered` using the four-tier scheme of §4.5/§4.6.
/// Returns the matched entry together with the registered key that matched,
/// so a caller can record the *effective* (not literal request) URL — see
/// SPEC_FULL §4.5a.
pub fn resolve<'a, V>(
    registered: impl Iterator<Item = (&'a str, &'a V)>,
    url: &str,
) -> Option<(&'a str, &'a V)> {
    let entries: Vec<(&str, &V)> = registered.collect();

    let exact = url;
    if let Some(&(k, v)) = entries.iter().find(|(k, _)| *k == exact) {
        return Some((k, v));
    }

    let with_slash = format!("{url}/");
    if let Some(&(k, v)) = entries.iter().find(|(k, _)| **k == with_slash) {
        return Some((k, v));
    }

    if let Some(stripped) = url.strip_suffix('/') {
        if let Some(&(k, v)) = entries.iter().find(|(k, _)| *k == stripped) {
            return Some((k, v));
        }
    }

    let probe = with_slash;
    entries
        .into_iter()
        .filter(|(k, _)| k.ends_with('/') && probe.starts_with(*k))
        .max_by_key(|(k, _)| k.len())
}

/// Does a client's subscribed path `s` cover a publish path `p`? §4.6:
/// exact match, root subscription (`""`) receives everything, or a
/// trailing-slash subscription is a hierarchical prefix of the publish path.
///
/// ```
/// use vsoa_codec::routing::subscription_matches;
///
/// assert!(subscription_matches("/p/d/", "/p/d/"));
/// assert!(subscription_matches("", "/anything"));
/// assert!(subscription_matches("/p/", "/p/d"));
/// assert!(!subscription_matches("/p/d", "/p/x"));
/// ```
pub fn subscription_matches(subscribed: &str, publish_path: &str) -> bool {
    let s = subscribed.trim_matches('/');
    let p = publish_path.trim_matches('/');

    if s.is_empty() {
        return true;
    }

    if s == p {
        return true;
    }

    if subscribed.ends_with('/') {
        let probe = format!("{p}/");
        let prefix = format!("{s}/");
        return probe.starts_with(&prefix);
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn exact_then_slash_appended_then_stripped_then_prefix() {
        let mut map = HashMap::new();
        map.insert("/p/d/".to_string(), 1);
        map.insert("/p/".to_string(), 2);

        let entries: Vec<(&str, &i32)> = map.iter().map(|(k, v)| (k.as_str(), v)).collect();

        let (k, v) = resolve(entries.clone().into_iter(), "/p/d").unwrap();
        assert_eq!((k, *v), ("/p/d/", 1));

        let (k, v) = resolve(entries.clone().into_iter(), "/p/d/x").unwrap();
        assert_eq!((k, *v), ("/p/", 2));

        assert!(resolve(entries.into_iter(), "/q").is_none());
    }
}
