//! Voucher code generation.
//!
//! In production codes come from the thread-local RNG. Tests inject a
//! predetermined sequence so issued codes are known in advance.

use rand::Rng;

/// Characters used in voucher codes. Excludes `0/O` and `1/I/L`.
const ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";

/// Abstraction over voucher code generation.
pub trait CodeGenerator: Send + Sync {
    /// Returns a fresh candidate code. Uniqueness is enforced by the store.
    fn next_code(&self) -> String;
}

/// Generates codes of the form `GIFT-XXXX-XXXX` from the thread RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn next_code(&self) -> String {
        let mut rng = rand::rng();
        let mut group = || -> String {
            (0..4)
                .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
                .collect()
        };
        let first = group();
        let second = group();
        format!("GIFT-{first}-{second}")
    }
}

/// Normalizes a code typed at a till or on a form.
#[must_use]
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}
