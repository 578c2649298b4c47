use rand_core::{CryptoRng, OsRng, RngCore};

use crate::mls::crypto::Secret;

#[inline]
pub fn get_rng() -> impl RngCore + CryptoRng {
    OsRng
}

#[inline]
pub fn random_array<const N: usize>() -> [u8; N] {
    let mut array = [0u8; N];
    get_rng().fill_bytes(&mut array);

    array
}

/// Fresh secret of `len` bytes, e.g. a leaf secret or the first init secret
/// of a group.
#[inline]
pub fn random_secret(len: usize) -> Secret {
    let mut secret = vec![0u8; len];
    get_rng().fill_bytes(&mut secret);

    Secret::from(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// Doesn't say anything about the quality of the randomness, only that
    /// we didn't hand back zeroes or the same output twice
    fn sanity_rng_check() {
        let first = random_secret(32);
        let second = random_secret(32);

        assert_eq!(first.len(), 32, "secret has the requested length");
        assert_ne!(&first[..], &[0u8; 32], "secret should not be all zeroes");
        assert_ne!(first, second, "two secrets should differ");
        assert_ne!(random_array::<16>(), random_array::<16>(), "arrays should differ");
    }
}
