//! Whole-file CMAC integrity stream (Secure Core, C4).

use subtle::ConstantTimeEq;

use crate::memory::GuardedKey16;
use crate::pal::crypto::{CmacAes128, CMAC_TAG_LEN};

/// Chunk size used when recomputing the CMAC over an entire stored
/// file on open.
pub const VERIFY_CHUNK_LEN: usize = 64;

/// An incremental CMAC context fed every byte written to a file, in
/// the exact order those bytes hit the filesystem. Ordering matters:
/// `update` must run *before* the corresponding `write`, so a failed
/// write can never leave the CMAC ahead of the file on disk.
pub struct IntegrityStream {
    mac: CmacAes128,
    poisoned: bool,
}

impl IntegrityStream {
    /// Start a fresh CMAC context keyed with the device's storage
    /// signature key.
    pub fn new(signature_key: &GuardedKey16) -> Self {
        Self {
            mac: CmacAes128::new(signature_key),
            poisoned: false,
        }
    }

    /// Feed bytes about to be written. Must be called before the
    /// corresponding filesystem write.
    pub fn update(&mut self, data: &[u8]) {
        self.mac.update(data);
    }

    /// Mark the stream poisoned after a write failure; the handle
    /// that owns this stream must refuse to produce a trailer and
    /// instead unlink its file on close (the *invalid* flag).
    pub fn mark_invalid(&mut self) {
        self.poisoned = true;
    }

    /// Whether a prior write failure poisoned this stream.
    pub fn is_invalid(&self) -> bool {
        self.poisoned
    }

    /// Produce the 16-byte trailer. Returns `None` if the stream was
    /// poisoned by a prior write failure.
    pub fn finalize(self) -> Option<[u8; CMAC_TAG_LEN]> {
        if self.poisoned {
            None
        } else {
            Some(self.mac.finalize())
        }
    }
}

/// Recompute the CMAC over `data` (the whole file minus its trailer)
/// in [`VERIFY_CHUNK_LEN`]-byte chunks and compare it against
/// `trailer` in constant time. Used on `open` before any read is
/// permitted.
pub fn verify_trailer(signature_key: &GuardedKey16, data: &[u8], trailer: &[u8; CMAC_TAG_LEN]) -> bool {
    let mut mac = CmacAes128::new(signature_key);
    for chunk in data.chunks(VERIFY_CHUNK_LEN) {
        mac.update(chunk);
    }
    let computed = mac.finalize();
    computed.ct_eq(trailer).into()
}
