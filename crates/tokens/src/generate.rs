//! Random token ids
//!
//! Ids come straight from the OS entropy source. A predictable id defeats
//! the whole point of an unguessable link, so entropy failure is not
//! recovered from: `OsRng` panics and takes the process with it.

use rand::rngs::OsRng;
use rand::Rng;

use crate::record::TokenMap;

/// Length of a token id
pub const TOKEN_LENGTH: usize = 8;

/// Characters a token id is drawn from
const CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a token id of `len` characters drawn uniformly from the
/// lowercase alphanumeric set.
///
/// # Panics
///
/// Panics if the OS random source cannot supply entropy.
pub fn generate(len: usize) -> String {
    (0..len)
        .map(|_| CHARSET[OsRng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// Generate an id that is not already a key of `map`.
///
/// A collision at the default length is vanishingly unlikely, but the
/// caller has the whole map in hand so retrying costs nothing.
pub fn fresh_id(map: &TokenMap, len: usize) -> String {
    loop {
        let id = generate(len);
        if !map.contains_key(&id) {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TokenRecord;
    use chrono::Utc;
    use std::collections::HashSet;
    use std::path::PathBuf;

    #[test]
    fn test_generate_length_and_charset() {
        for len in [0, 1, 8, 64] {
            let id = generate(len);
            assert_eq!(id.len(), len);
            assert!(id
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_generate_does_not_repeat() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(generate(TOKEN_LENGTH)), "duplicate id generated");
        }
    }

    #[test]
    fn test_fresh_id_skips_existing() {
        // Occupy 35 of the 36 single-character ids; the only free one left
        // is "z", so fresh_id has no choice but to find it.
        let mut map = TokenMap::new();
        for b in CHARSET.iter().take(CHARSET.len() - 1) {
            map.insert(
                (*b as char).to_string(),
                TokenRecord::new(PathBuf::from("/tmp/file.bin"), Utc::now()),
            );
        }
        assert_eq!(fresh_id(&map, 1), "z");
    }
}
