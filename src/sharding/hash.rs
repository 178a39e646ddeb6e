/// Hash strategy used to route text keys.
///
/// Implementations must be deterministic for a given `(key, shard_count)`
/// pair. The output does not need to be in range; the resolver reduces it
/// modulo the shard count.
pub trait ShardHasher: Send + Sync {
    fn hash(&self, key: &str, shard_count: u32) -> i64;
}

impl<F> ShardHasher for F
where
    F: Fn(&str, u32) -> i64 + Send + Sync,
{
    fn hash(&self, key: &str, shard_count: u32) -> i64 {
        self(key, shard_count)
    }
}

/// MurmurHash3 (x86, 32-bit) seeded with the shard count.
#[derive(Debug, Clone, Copy, Default)]
pub struct Murmur3Hasher;

impl ShardHasher for Murmur3Hasher {
    fn hash(&self, key: &str, shard_count: u32) -> i64 {
        i64::from(murmur3_32(key.as_bytes(), shard_count))
    }
}

/// 64-bit FNV-1a over the key bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fnv1aHasher;

impl ShardHasher for Fnv1aHasher {
    fn hash(&self, key: &str, shard_count: u32) -> i64 {
        if shard_count == 0 {
            return 0;
        }
        let mut hash = 14695981039346656037u64;
        for byte in key.as_bytes() {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(1099511628211);
        }
        (hash % shard_count as u64) as i64
    }
}

pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;

    let mut hash = seed;
    let blocks = data.chunks_exact(4);
    let tail = blocks.remainder();

    for block in blocks {
        let k = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        hash ^= scramble(k, C1, C2);
        hash = hash.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    if !tail.is_empty() {
        let mut k = 0u32;
        for (i, byte) in tail.iter().enumerate() {
            k |= u32::from(*byte) << (8 * i);
        }
        hash ^= scramble(k, C1, C2);
    }

    // The reference implementation mixes in the length modulo 2^32.
    hash ^= data.len() as u32;
    fmix32(hash)
}

fn scramble(k: u32, c1: u32, c2: u32) -> u32 {
    k.wrapping_mul(c1).rotate_left(15).wrapping_mul(c2)
}

fn fmix32(mut hash: u32) -> u32 {
    hash ^= hash >> 16;
    hash = hash.wrapping_mul(0x85eb_ca6b);
    hash ^= hash >> 13;
    hash = hash.wrapping_mul(0xc2b2_ae35);
    hash ^= hash >> 16;
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_murmur3_reference_vectors() {
        assert_eq!(murmur3_32(b"", 0), 0);
        assert_eq!(murmur3_32(b"", 1), 0x514e_28b7);
        assert_eq!(murmur3_32(b"", 0xffff_ffff), 0x81f1_6f39);
        assert_eq!(murmur3_32(b"test", 0), 0xba6b_d213);
        assert_eq!(
            murmur3_32(b"The quick brown fox jumps over the lazy dog", 0),
            0x2e4f_f723
        );
    }

    #[test]
    fn test_murmur3_uses_shard_count_as_seed() {
        let hasher = Murmur3Hasher;
        assert_eq!(hasher.hash("test", 0), i64::from(murmur3_32(b"test", 0)));
        assert_ne!(hasher.hash("test", 4), hasher.hash("test", 8));
    }

    #[test]
    fn test_fnv_is_deterministic_and_in_range() {
        let hasher = Fnv1aHasher;
        for key in ["", "a", "user:42", "order-9000"] {
            let first = hasher.hash(key, 16);
            assert_eq!(first, hasher.hash(key, 16));
            assert!((0..16).contains(&first));
        }
        assert_eq!(hasher.hash("anything", 0), 0);
    }

    #[test]
    fn test_closures_are_hashers() {
        let fixed = |key: &str, _: u32| key.len() as i64;
        assert_eq!(fixed.hash("abcd", 4), 4);
    }
}
