use sha2::{Digest, Sha256};

/// Build a collision-free cache key from a readable namespace and a list of
/// parts. Parts are hashed (with separators) so user-supplied strings cannot
/// collide across positions or smuggle delimiter characters into the key.
#[must_use]
pub fn cache_key(namespace: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    format!("{namespace}:{digest:x}")
}
