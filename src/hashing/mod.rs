//! BLAKE3-derived identifiers for the vector index.
//!
//! Qdrant only accepts integer or UUID point ids, while chunk ids are loader-assigned
//! strings. Point ids are therefore derived from `(scope, chunk_id)` so the same chunk
//! indexed under two scopes never collides.

use blake3::Hasher;

/// Computes a 64-bit hash of the input data using BLAKE3, truncated from 256 bits.
///
/// With 64 bits the birthday bound sits around four billion items, far above the
/// size of a single job's corpus. The original chunk id is stored in the point payload,
/// so a collision surfaces as an overwritten point, never as a wrong chunk id.
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(bytes)
}

/// Point id for `chunk_id` within `scope`.
#[inline]
pub fn point_id(scope: &str, chunk_id: &str) -> u64 {
    let mut hasher = Hasher::new();
    hasher.update(scope.as_bytes());
    hasher.update(b"|");
    hasher.update(chunk_id.as_bytes());

    let hash = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_hash_to_u64_determinism() {
        let data = b"job-2024-alpha";

        assert_eq!(hash_to_u64(data), hash_to_u64(data));
    }

    #[test]
    fn test_point_id_scope_sensitivity() {
        let a = point_id("job-a", "chunk-1");
        let b = point_id("job-b", "chunk-1");
        let c = point_id("job-a", "chunk-2");

        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_point_id_separator_prevents_ambiguity() {
        let ids: HashSet<u64> = [
            point_id("ab", "cd"),
            point_id("abc", "d"),
            point_id("a", "bcd"),
        ]
        .into_iter()
        .collect();

        assert_eq!(ids.len(), 3);
    }
}
