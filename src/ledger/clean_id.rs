//! Ledger ids that cannot be misread.
//!
//! Ids are base64 of 16 random bytes. Candidates containing `+ / - _` or two
//! adjacent letters from `csfhuit` (any case) are redrawn. The accepted id
//! drops its trailing `==` padding.

use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use regex::Regex;

static UNCLEAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[+/\-_]|[csfhuit]{2}").expect("Invalid unclean-id regex"));

/// Length of an id as written to the ledger
pub const CLEAN_ID_LEN: usize = 22;

/// True when `id` contains none of the rejected characters or letter pairs
pub fn is_clean(id: &str) -> bool {
    !UNCLEAN.is_match(id)
}

fn random_candidate<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

/// Draw candidates from `rng` until one is clean, then strip the padding
pub fn generate_with<R: RngCore + ?Sized>(rng: &mut R) -> String {
    loop {
        let candidate = random_candidate(rng);
        if is_clean(&candidate) {
            return candidate[..candidate.len() - 2].to_string();
        }
    }
}

/// Generate a clean id from the thread-local RNG
pub fn generate() -> String {
    generate_with(&mut rand::thread_rng())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_known_ids() {
        assert!(is_clean("N7pyNa2bp8DIA0RQYNnrmw"));
        assert!(!is_clean("N7pyNa2bp8DIA0RQYNnrcc"));
        assert!(!is_clean("N7pyNa2bp8DIA0RQYNnrSH"));
        assert!(!is_clean("abc+def"));
        assert!(!is_clean("abc/def"));
        assert!(!is_clean("abc-def"));
        assert!(!is_clean("abc_def"));
        // A single letter from the set is fine.
        assert!(is_clean("aXcYbZ"));
    }

    #[test]
    fn test_generated_ids_are_clean() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..10_000 {
            let id = generate_with(&mut rng);
            assert_eq!(id.len(), CLEAN_ID_LEN);
            assert!(is_clean(&id), "generated unclean id {}", id);
            assert!(!id.contains('='));
        }
    }

    #[test]
    fn test_generate_uses_thread_rng() {
        let a = generate();
        let b = generate();
        assert!(is_clean(&a) && is_clean(&b));
        assert_ne!(a, b);
    }
}
