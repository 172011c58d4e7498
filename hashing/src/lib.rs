use ethereum_types::H256;
use once_cell::sync::Lazy;
use sha2::{Digest as _, Sha256};

/// Deepest tree any caller may ask for.
///
/// Deposit contracts use 32 levels. Nothing in this workspace merkleizes anything deeper.
pub const MAX_DEPTH: usize = 32;

/// `ZERO_HASHES[n]` is the root of a tree of depth `n` whose leaves are all zero.
pub static ZERO_HASHES: Lazy<[H256; MAX_DEPTH + 1]> = Lazy::new(|| {
    let mut hashes = [H256::zero(); MAX_DEPTH + 1];

    for depth in 1..=MAX_DEPTH {
        hashes[depth] = hash_256_256(hashes[depth - 1], hashes[depth - 1]);
    }

    hashes
});

#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> H256 {
    H256(Sha256::digest(bytes).into())
}

#[must_use]
pub fn hash_256_256(left: H256, right: H256) -> H256 {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    H256(hasher.finalize().into())
}

#[must_use]
pub fn hash_256_64(root: H256, number: u64) -> H256 {
    hash_256_256(root, uint_chunk(number))
}

/// Mixes a list length into the root of its contents as SSZ does for lists.
#[must_use]
pub fn mix_in_length(root: H256, length: u64) -> H256 {
    hash_256_64(root, length)
}

#[must_use]
pub fn uint_chunk(number: u64) -> H256 {
    let mut chunk = H256::zero();
    chunk[..size_of::<u64>()].copy_from_slice(&number.to_le_bytes());
    chunk
}

/// Splits `bytes` into 32 byte chunks, padding the last one with zeros.
#[must_use]
pub fn pack_bytes(bytes: &[u8]) -> Vec<H256> {
    bytes
        .chunks(H256::len_bytes())
        .map(|chunk| {
            let mut padded = H256::zero();
            padded[..chunk.len()].copy_from_slice(chunk);
            padded
        })
        .collect()
}

/// Number of levels needed to fit `count` leaves.
#[must_use]
pub const fn depth_for(count: usize) -> usize {
    if count <= 1 {
        return 0;
    }

    count.next_power_of_two().trailing_zeros() as usize
}

/// Computes the root of a tree of `depth` levels with `chunks` as its leftmost leaves.
///
/// Missing leaves are zero.
#[must_use]
pub fn merkleize(chunks: &[H256], depth: usize) -> H256 {
    debug_assert!(depth <= MAX_DEPTH);
    debug_assert!(depth_for(chunks.len()) <= depth);

    if chunks.is_empty() {
        return ZERO_HASHES[depth];
    }

    let mut layer = chunks.to_vec();

    for zero_hash in &ZERO_HASHES[..depth] {
        if layer.len() % 2 == 1 {
            layer.push(*zero_hash);
        }

        layer = layer
            .chunks_exact(2)
            .map(|pair| hash_256_256(pair[0], pair[1]))
            .collect();
    }

    layer[0]
}

/// Merkleizes `chunks` in the smallest tree that fits them.
#[must_use]
pub fn merkleize_packed(chunks: &[H256]) -> H256 {
    merkleize(chunks, depth_for(chunks.len()))
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use test_case::test_case;

    use super::*;

    #[test_case(
        1,
        H256(hex!("f5a5fd42d16a20302798ef6ed309979b43003d2320d9f0e8ea9831a92759fb4b"));
        "depth 1"
    )]
    #[test_case(
        32,
        H256(hex!("c6f67e02e6e4e1bdefb994c6098953f34636ba2b6ca20a4721d2b26a886722ff"));
        "depth 32"
    )]
    fn zero_hashes_match_known_values(depth: usize, expected: H256) {
        assert_eq!(ZERO_HASHES[depth], expected);
    }

    #[test_case(0 => 0)]
    #[test_case(1 => 0)]
    #[test_case(2 => 1)]
    #[test_case(3 => 2)]
    #[test_case(6 => 3)]
    #[test_case(8 => 3)]
    fn depth_for_rounds_up(count: usize) -> usize {
        depth_for(count)
    }

    #[test]
    fn merkleize_pads_with_zero_subtrees() {
        let leaf = H256::repeat_byte(1);

        assert_eq!(merkleize(&[leaf], 1), hash_256_256(leaf, H256::zero()));
        assert_eq!(
            merkleize(&[leaf], 2),
            hash_256_256(hash_256_256(leaf, H256::zero()), ZERO_HASHES[1]),
        );
        assert_eq!(merkleize(&[], 5), ZERO_HASHES[5]);
    }

    #[test]
    fn uint_chunk_is_little_endian() {
        let chunk = uint_chunk(0x0102);

        assert_eq!(chunk[0], 0x02);
        assert_eq!(chunk[1], 0x01);
        assert!(chunk[2..].iter().all(|byte| *byte == 0));
    }

    #[test]
    fn pack_bytes_pads_last_chunk() {
        let chunks = pack_bytes(&[0xff; 48]);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], H256::repeat_byte(0xff));
        assert_eq!(chunks[1][..16], [0xff; 16]);
        assert_eq!(chunks[1][16..], [0; 16]);
    }
}
