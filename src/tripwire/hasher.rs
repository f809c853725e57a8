//! ST-014: BLAKE3 hashing for statement params and run provenance.

use crate::core::types::Params;

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_string(s: &str) -> String {
    format!("blake3:{}", blake3::hash(s.as_bytes()).to_hex())
}

/// Hash a parameter bag. Key order is significant, so equal bags built in
/// the same order hash equal.
pub fn hash_params(params: &Params) -> String {
    let mut hasher = blake3::Hasher::new();
    for (k, v) in params {
        hasher.update(k.as_bytes());
        hasher.update(b"=");
        hasher.update(v.to_string().as_bytes());
        hasher.update(b"\0");
    }
    format!("blake3:{}", hasher.finalize().to_hex())
}

/// Compute a composite hash from multiple component hashes.
pub fn composite_hash(components: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for c in components {
        hasher.update(c.as_bytes());
        hasher.update(b"\0");
    }
    format!("blake3:{}", hasher.finalize().to_hex())
}

/// Short hex digest (no prefix), for human-facing ids.
pub fn short_hex(hash: &str, len: usize) -> &str {
    let hex = hash.strip_prefix("blake3:").unwrap_or(hash);
    &hex[..len.min(hex.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_st014_hash_string() {
        let h1 = hash_string("hello");
        let h2 = hash_string("hello");
        let h3 = hash_string("world");
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
        assert_eq!(h1.len(), 7 + 64); // "blake3:" + 64 hex chars
    }

    #[test]
    fn test_st014_hash_params_deterministic() {
        let mut a = Params::new();
        a.insert("cidr".into(), json!("10.0.0.0/16"));
        a.insert("count".into(), json!(2));
        let b = a.clone();
        assert_eq!(hash_params(&a), hash_params(&b));

        let mut c = a.clone();
        c.insert("count".into(), json!(3));
        assert_ne!(hash_params(&a), hash_params(&c));
    }

    #[test]
    fn test_st014_hash_params_key_value_boundary() {
        // "ab"="c" must not collide with "a"="bc"
        let mut a = Params::new();
        a.insert("ab".into(), json!("c"));
        let mut b = Params::new();
        b.insert("a".into(), json!("bc"));
        assert_ne!(hash_params(&a), hash_params(&b));
    }

    #[test]
    fn test_st014_composite_order_matters() {
        assert_ne!(composite_hash(&["a", "b"]), composite_hash(&["b", "a"]));
    }

    #[test]
    fn test_st014_short_hex() {
        let h = hash_string("x");
        assert_eq!(short_hex(&h, 8).len(), 8);
        assert!(!short_hex(&h, 8).contains(':'));
        assert_eq!(short_hex("abc", 8), "abc");
    }
}
