//! Cache key definitions.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use axum::http::HeaderMap;
use axum::http::header::COOKIE;

/// Key for one cached response.
///
/// The cookie hash implements the "vary by cookie" rule: any difference in
/// the `Cookie` header produces a distinct entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResponseKey {
    pub path: String,
    pub query_hash: u64,
    pub cookie_hash: u64,
}

fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Hash a query string for cache key generation.
pub fn hash_query(query: &str) -> u64 {
    hash_value(&query)
}

/// Hash the request's `Cookie` header; requests without one share a bucket.
pub fn hash_cookie_header(headers: &HeaderMap) -> u64 {
    let cookie = headers.get(COOKIE).and_then(|value| value.to_str().ok());
    hash_value(&cookie)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn same_query_produces_same_hash() {
        assert_eq!(hash_query("page=2"), hash_query("page=2"));
        assert_ne!(hash_query("page=1"), hash_query("page=2"));
    }

    #[test]
    fn cookie_hash_varies_by_session() {
        let mut anonymous = HeaderMap::new();
        let mut signed_in = HeaderMap::new();
        signed_in.insert(COOKIE, HeaderValue::from_static("yatube_session=abc"));

        assert_ne!(
            hash_cookie_header(&anonymous),
            hash_cookie_header(&signed_in)
        );

        anonymous.insert(COOKIE, HeaderValue::from_static("yatube_session=abc"));
        assert_eq!(
            hash_cookie_header(&anonymous),
            hash_cookie_header(&signed_in)
        );
    }

    #[test]
    fn key_equality_covers_all_parts() {
        let key = ResponseKey {
            path: "/".to_string(),
            query_hash: hash_query(""),
            cookie_hash: 0,
        };
        let same = key.clone();
        assert_eq!(key, same);

        let other_page = ResponseKey {
            query_hash: hash_query("page=2"),
            ..key.clone()
        };
        assert_ne!(key, other_page);
    }
}
