//! Device root of trust and key derivation (Secure Core, C1).
//!
//! TRUST LEVEL: Secure Core
//!
//! FORMAL INVARIANTS (ENFORCED):
//! - The 128-bit root of trust is never used directly for file crypto.
//! - Each derived key is purpose-bound by a fixed ASCII label.
//! - Derivation is deterministic: no RNG, stable across reboots.
//! - Derived keys live only in [`GuardedKey16`]/[`GuardedKey32`].

use crate::memory::{GuardedKey16, GuardedKey32};
use crate::pal::crypto::{cmac_aes128_oneshot, hmac_sha256};

const SIGNATURE_LABEL: &[u8; 16] = b"RoTStorageSgn128";
const ENCRYPTION_LABEL: &[u8; 16] = b"RoTStorageEnc128";
const HMAC_LABEL: &[u8; 32] = b"StorageEnc256HMACSHA256SIGNATURE";

/// A per-device 128-bit secret, stable across boots, that never leaves
/// the platform security boundary directly — only its CMAC/HMAC
/// derivatives are used by the storage engine.
pub struct DeviceRoot {
    root: GuardedKey16,
}

impl DeviceRoot {
    pub fn new(root: [u8; 16]) -> Self {
        Self {
            root: GuardedKey16::new(root),
        }
    }

    /// CMAC-AES-128 keyed by `"RoTStorageSgn128"`, over the root of trust.
    pub fn storage_signature_key(&self) -> GuardedKey16 {
        GuardedKey16::new(cmac_aes128_oneshot(SIGNATURE_LABEL, self.root.borrow()))
    }

    /// CMAC-AES-128 keyed by `"RoTStorageEnc128"`, over the root of trust.
    pub fn storage_encryption_key(&self) -> GuardedKey16 {
        GuardedKey16::new(cmac_aes128_oneshot(ENCRYPTION_LABEL, self.root.borrow()))
    }

    /// HMAC-SHA-256 keyed by the 32-byte label, over the root of trust.
    ///
    /// Not consumed by the storage core today (no module needs a 256-bit
    /// key yet) but specified as a required platform capability; kept
    /// here so a future consumer has exactly one derivation site.
    pub fn storage_hmac_256_key(&self) -> GuardedKey32 {
        GuardedKey32::new(hmac_sha256(HMAC_LABEL, self.root.borrow()))
    }
}
