//! Deterministic cache key generation.

use sha2::{Digest, Sha256};

/// Compute the cache key for a rendered page.
///
/// `normalized_url` must already be canonical (fragment removed). Extension
/// identifiers are sorted and de-duplicated, so the key only depends on the
/// *set* of extensions requested.
pub fn compute_cache_key<S: AsRef<str>>(normalized_url: &str, extensions: &[S]) -> String {
    let mut ids: Vec<&str> = extensions.iter().map(AsRef::as_ref).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut hasher = Sha256::new();
    hasher.update(normalized_url.as_bytes());
    hasher.update(b"\n");
    hasher.update(ids.join(",").as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_stability() {
        let key1 = compute_cache_key("https://example.com/", &["darkmode"]);
        let key2 = compute_cache_key("https://example.com/", &["darkmode"]);
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_key_ignores_extension_order_and_duplicates() {
        let key1 = compute_cache_key("https://example.com/", &["reader", "darkmode"]);
        let key2 = compute_cache_key("https://example.com/", &["darkmode", "reader", "darkmode"]);
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_key_different_extensions() {
        let plain = compute_cache_key::<&str>("https://example.com/", &[]);
        let dark = compute_cache_key("https://example.com/", &["darkmode"]);
        assert_ne!(plain, dark);
    }

    #[test]
    fn test_key_different_url() {
        let key1 = compute_cache_key::<&str>("https://example.com/a", &[]);
        let key2 = compute_cache_key::<&str>("https://example.com/b", &[]);
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_key_format() {
        let key = compute_cache_key("https://example.com/", &["nojs"]);
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
