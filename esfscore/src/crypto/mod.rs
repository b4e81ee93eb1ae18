//! File-level crypto streams (Secure Core, C3 + C4).
//!
//! Sits directly above [`crate::pal::crypto`]'s raw primitives and
//! directly below [`crate::file`]: it knows about file position
//! anchoring and write-before-verify ordering, but nothing about TLV
//! layout or handle lifecycle.

/// Position-anchored AES-CTR stream (C3).
pub mod cipher;
/// Whole-file CMAC integrity stream (C4).
pub mod integrity;

pub use cipher::CipherStream;
pub use integrity::{verify_trailer, IntegrityStream};

