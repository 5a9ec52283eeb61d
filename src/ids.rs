//! Identifier and share-code generation.
//!
//! Ids are random v4 UUIDs from the OS CSPRNG; no uniqueness check is made
//! against existing ids. Share codes are short tokens for people to copy,
//! never used as the join key.

use rand::Rng;
use uuid::Uuid;

const SHARE_CODE_LEN: usize = 6;
const SHARE_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn share_code() -> String {
    let mut rng = rand::thread_rng();
    (0..SHARE_CODE_LEN)
        .map(|_| SHARE_CODE_ALPHABET[rng.gen_range(0..SHARE_CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_distinct() {
        let ids: HashSet<String> = (0..1000).map(|_| new_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_share_code_shape() {
        for _ in 0..100 {
            let code = share_code();
            assert_eq!(code.len(), SHARE_CODE_LEN);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }
}
