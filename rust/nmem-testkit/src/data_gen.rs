//! Byte pattern generation for tests.

/// Returns `len` seeded random bytes.
pub fn random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = fastrand::Rng::with_seed(seed);
    std::iter::repeat_with(|| rng.u8(..)).take(len).collect()
}

/// Returns `len` bytes cycling through `1..=255`, so that no byte is zero and
/// neighbouring bytes always differ.
pub fn non_zero_sequence(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 255) as u8 + 1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_bytes_are_seeded() {
        assert_eq!(random_bytes(5, 100), random_bytes(5, 100));
        assert_ne!(random_bytes(5, 100), random_bytes(6, 100));
    }

    #[test]
    fn test_non_zero_sequence() {
        let seq = non_zero_sequence(600);
        assert_eq!(seq.len(), 600);
        assert!(seq.iter().all(|&b| b != 0));
        assert!(seq.windows(2).all(|w| w[0] != w[1]));
        assert_eq!(seq[254], 255);
        assert_eq!(seq[255], 1);
    }
}
