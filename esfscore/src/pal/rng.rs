//! CSPRNG platform capability (Secure Core, C1).

use rand_core::{OsRng, RngCore};

/// A cryptographically secure source of uniform random bytes.
///
/// The only production consumer is per-file nonce generation at
/// [`crate::file::lifecycle::create`] time; tests substitute
/// [`FixedRng`] for deterministic fixtures (e.g. scenario D's hash
/// collision, which needs two specific names, not specific nonces, but
/// still wants a reproducible nonce for assertions on ciphertext bytes).
pub trait Csprng {
    fn fill_bytes(&mut self, buf: &mut [u8]);

    fn next_nonce(&mut self) -> [u8; 8] {
        let mut nonce = [0u8; 8];
        self.fill_bytes(&mut nonce);
        nonce
    }
}

#[derive(Default)]
pub struct OsCsprng;

impl Csprng for OsCsprng {
    fn fill_bytes(&mut self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }
}

/// Deterministic RNG for tests: yields the same byte repeated, not
/// suitable for anything but fixtures.
pub struct FixedRng(pub u8);

impl Csprng for FixedRng {
    fn fill_bytes(&mut self, buf: &mut [u8]) {
        buf.fill(self.0);
    }
}
