//! Platform crypto primitives (Secure Core, C1).
//!
//! TRUST LEVEL: Secure Core
//!
//! These are the raw primitives this system names as required platform
//! capabilities: AES-CTR-128, CMAC-AES-128, SHA-256, HMAC-SHA-256.
//! Nothing here knows about files, keys-by-purpose, or position
//! anchoring — that lives in [`crate::crypto`] and [`crate::pal::rot`].

#![deny(clippy::derive_debug)]

use aes::Aes128;
use cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use cmac::{Cmac, Mac};
use sha2::{Digest, Sha256};

use crate::memory::GuardedKey16;

pub const AES_BLOCK_LEN: usize = 16;
pub const AES_IV_LEN: usize = 16;
pub const CMAC_TAG_LEN: usize = 16;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// A position-seekable AES-CTR-128 keystream cipher.
///
/// `seek` repositions the internal counter to the block containing the
/// given byte offset into the keystream, matching the IV construction in
/// The low 8 bytes of the IV are the per-file nonce, the
/// high 8 bytes are `position / 16` as a big-endian counter.
pub struct AesCtr128 {
    inner: Aes128Ctr,
}

impl AesCtr128 {
    /// `nonce` occupies the low 8 bytes of the IV; the high 8 bytes (the
    /// counter) start at zero and are set by [`Self::seek_to`].
    pub fn new(key: &GuardedKey16, nonce: &[u8; 8]) -> Self {
        let mut iv = [0u8; AES_IV_LEN];
        iv[..8].copy_from_slice(nonce);
        let inner = Aes128Ctr::new(key.borrow().into(), (&iv).into());
        Self { inner }
    }

    /// Reposition the keystream to the given byte offset (counted from the
    /// start of the encrypted region) and XOR `buf` in place.
    pub fn apply_at(&mut self, position: u64, buf: &mut [u8]) {
        self.inner.seek(position);
        self.inner.apply_keystream(buf);
    }
}

/// Incremental CMAC-AES-128 context.
pub struct CmacAes128 {
    inner: Cmac<Aes128>,
}

impl CmacAes128 {
    pub fn new(key: &GuardedKey16) -> Self {
        Self {
            inner: Cmac::<Aes128>::new(key.borrow().into()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finalize(self) -> [u8; CMAC_TAG_LEN] {
        let tag = self.inner.finalize().into_bytes();
        let mut out = [0u8; CMAC_TAG_LEN];
        out.copy_from_slice(&tag);
        out
    }
}

/// One-shot CMAC-AES-128, used only for device-key derivation
/// ([`crate::pal::rot`]), where the "key" is a fixed domain-separation
/// label rather than a device secret.
pub fn cmac_aes128_oneshot(key: &[u8; 16], message: &[u8]) -> [u8; CMAC_TAG_LEN] {
    let mut mac = Cmac::<Aes128>::new_from_slice(key).expect("16-byte key always valid for AES-128");
    mac.update(message);
    let tag = mac.finalize().into_bytes();
    let mut out = [0u8; CMAC_TAG_LEN];
    out.copy_from_slice(&tag);
    out
}

/// One-shot SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// One-shot HMAC-SHA-256, used only for the 256-bit storage HMAC key
/// derivation ([`crate::pal::rot`]).
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    use hmac::Hmac;
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(message);
    let digest = mac.finalize().into_bytes();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}
