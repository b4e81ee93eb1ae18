//! Position-anchored AES-CTR stream (Secure Core, C3).

use crate::memory::GuardedKey16;
use crate::pal::crypto::AesCtr128;

/// Wraps [`AesCtr128`] with the file-level policy of "only encrypt
/// when the mode bit says so" — a no-op pass-through otherwise, so
/// callers in [`crate::file`] don't need to branch on `ENCRYPTED`
/// themselves.
pub struct CipherStream {
    cipher: Option<AesCtr128>,
}

impl CipherStream {
    /// Build a stream that XORs every byte against the AES-CTR-128
    /// keystream derived from `key` and the file's per-file `nonce`.
    pub fn encrypted(key: &GuardedKey16, nonce: &[u8; 8]) -> Self {
        Self {
            cipher: Some(AesCtr128::new(key, nonce)),
        }
    }

    /// Build a stream that leaves every buffer untouched.
    pub fn plain() -> Self {
        Self { cipher: None }
    }

    /// XOR `buf` in place with the keystream at `position` bytes into
    /// the encrypted region (i.e. already offset past the non-encrypted
    /// header — see [`crate::layout::FileHeader::not_encrypted_len`]).
    /// No-op when this stream is [`Self::plain`].
    pub fn apply_at(&mut self, position: u64, buf: &mut [u8]) {
        if let Some(cipher) = &mut self.cipher {
            cipher.apply_at(position, buf);
        }
    }

    /// Whether this stream actually transforms bytes.
    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_stream_leaves_buffer_untouched() {
        let mut stream = CipherStream::plain();
        let mut buf = *b"hello world";
        stream.apply_at(0, &mut buf);
        assert_eq!(&buf, b"hello world");
    }

    #[test]
    fn encrypted_stream_round_trips() {
        let key = GuardedKey16::new([1u8; 16]);
        let nonce = [2u8; 8];

        let mut plaintext = *b"secret payload!!";
        let mut enc = CipherStream::encrypted(&key, &nonce);
        enc.apply_at(0, &mut plaintext);
        assert_ne!(&plaintext, b"secret payload!!");

        let mut dec = CipherStream::encrypted(&key, &nonce);
        dec.apply_at(0, &mut plaintext);
        assert_eq!(&plaintext, b"secret payload!!");
    }

    #[test]
    fn writes_at_nonzero_offset_are_independent_of_chunking() {
        let key = GuardedKey16::new([9u8; 16]);
        let nonce = [3u8; 8];
        let header_len = 40u64;

        let mut a = [0xABu8; 80];
        CipherStream::encrypted(&key, &nonce).apply_at(header_len, &mut a);

        let mut b = [0xABu8; 80];
        let mut stream = CipherStream::encrypted(&key, &nonce);
        stream.apply_at(header_len, &mut b[..20]);
        stream.apply_at(header_len + 20, &mut b[20..]);

        assert_eq!(a, b);
    }
}
