//! On-disk file layout codec (Secure Core, C5).
//!
//! Byte-exact encode/decode of the header, TLV index, metadata values,
//! payload, and trailer CMAC:
//!
//! ```text
//! [ u16 format_version ]
//! [ u16 mode ]
//! [ u16 name_length ][ name_length bytes of raw name blob ]
//! [ 8-byte nonce ]                      -- present only if ENCRYPTED
//! [ u16 metadata_count ]
//! [ metadata_count * TlvIndexEntry ]    -- 6 bytes each: type, length, offset
//! [ metadata_count * value bytes ]      -- encrypted if ENCRYPTED
//! [ payload bytes ]                     -- encrypted if ENCRYPTED
//! [ 16-byte CMAC trailer ]
//! ```
//!
//! This module only knows how to lay bytes out; it has no opinion on
//! *whether* to encrypt or verify them — that belongs to [`crate::crypto`]
//! and [`crate::file`].

use crate::mode::ModeFlags;

pub const FORMAT_VERSION: u16 = 1;
pub const MAX_TLV_ENTRIES: usize = 3;
pub const NONCE_LEN: usize = 8;
pub const CMAC_TRAILER_LEN: usize = 16;
pub const TLV_INDEX_ENTRY_LEN: usize = 6;

/// A single metadata entry, either supplied by a caller of `create()`
/// or read back out of a stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvEntry {
    pub type_id: u16,
    pub value: Vec<u8>,
}

/// The decoded TLV index: type, length, and absolute file offset of
/// each metadata value, without the value bytes themselves. Kept
/// separately from [`TlvEntry`] because it is what the on-disk index
/// actually stores, and what the full header length is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvIndexEntry {
    pub type_id: u16,
    pub length: u16,
    pub offset: u16,
}

/// The decoded fixed-size portion of a file: everything up to and
/// including the TLV index, i.e. the non-encrypted header.
#[derive(Debug, Clone)]
pub struct FileHeader {
    pub format_version: u16,
    pub mode: ModeFlags,
    pub name: Vec<u8>,
    pub nonce: Option<[u8; NONCE_LEN]>,
    pub tlv_index: Vec<TlvIndexEntry>,
}

impl FileHeader {
    /// Size in bytes of everything before the first metadata value,
    /// i.e. the part of the file that is never encrypted. AES-CTR
    /// stream positions are measured from the end of this region.
    pub fn not_encrypted_len(&self) -> usize {
        2 // format_version
            + 2 // mode
            + 2 // name_length
            + self.name.len()
            + if self.mode.is_encrypted() { NONCE_LEN } else { 0 }
            + 2 // metadata_count
            + self.tlv_index.len() * TLV_INDEX_ENTRY_LEN
    }

    /// Size in bytes of the whole header, including metadata values.
    /// Payload bytes start immediately after this offset.
    pub fn full_header_len(&self) -> usize {
        self.not_encrypted_len() + self.tlv_index.iter().map(|e| e.length as usize).sum::<usize>()
    }

    /// Encode the header and TLV index (but not metadata values or
    /// payload) into `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.format_version.to_le_bytes());
        out.extend_from_slice(&self.mode.bits().to_le_bytes());
        out.extend_from_slice(&(self.name.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.name);
        if let Some(nonce) = self.nonce {
            out.extend_from_slice(&nonce);
        }
        out.extend_from_slice(&(self.tlv_index.len() as u16).to_le_bytes());
        for entry in &self.tlv_index {
            out.extend_from_slice(&entry.type_id.to_le_bytes());
            out.extend_from_slice(&entry.length.to_le_bytes());
            out.extend_from_slice(&entry.offset.to_le_bytes());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    Truncated,
    TooManyTlvEntries,
    NameTooLong,
}

fn read_u16(buf: &[u8], at: &mut usize) -> Result<u16, LayoutError> {
    let slice = buf.get(*at..*at + 2).ok_or(LayoutError::Truncated)?;
    *at += 2;
    Ok(u16::from_le_bytes([slice[0], slice[1]]))
}

/// Decode the header and TLV index from the start of a stored file.
/// Returns the header plus the byte offset immediately following the
/// TLV index (where metadata values begin).
pub fn decode_header(buf: &[u8]) -> Result<(FileHeader, usize), LayoutError> {
    let mut at = 0usize;
    let format_version = read_u16(buf, &mut at)?;
    let mode_bits = read_u16(buf, &mut at)?;
    let mode = ModeFlags::from_bits_truncate(mode_bits);

    let name_len = read_u16(buf, &mut at)? as usize;
    let name = buf
        .get(at..at + name_len)
        .ok_or(LayoutError::Truncated)?
        .to_vec();
    at += name_len;

    let nonce = if mode.is_encrypted() {
        let slice = buf.get(at..at + NONCE_LEN).ok_or(LayoutError::Truncated)?;
        at += NONCE_LEN;
        let mut n = [0u8; NONCE_LEN];
        n.copy_from_slice(slice);
        Some(n)
    } else {
        None
    };

    let count = read_u16(buf, &mut at)? as usize;
    if count > MAX_TLV_ENTRIES {
        return Err(LayoutError::TooManyTlvEntries);
    }
    let mut tlv_index = Vec::with_capacity(count);
    for _ in 0..count {
        let type_id = read_u16(buf, &mut at)?;
        let length = read_u16(buf, &mut at)?;
        let offset = read_u16(buf, &mut at)?;
        tlv_index.push(TlvIndexEntry { type_id, length, offset });
    }

    Ok((
        FileHeader {
            format_version,
            mode,
            name,
            nonce,
            tlv_index,
        },
        at,
    ))
}

/// Peek just the stored name blob out of a header, without decoding
/// the rest — used by `create()`'s exists/collision check (it only
/// needs to compare names, not touch metadata or payload).
pub fn peek_name(buf: &[u8]) -> Result<Vec<u8>, LayoutError> {
    let mut at = 0usize;
    let _format_version = read_u16(buf, &mut at)?;
    let _mode = read_u16(buf, &mut at)?;
    let name_len = read_u16(buf, &mut at)? as usize;
    buf.get(at..at + name_len)
        .ok_or(LayoutError::Truncated)
        .map(|s| s.to_vec())
}

/// Build a [`FileHeader`] ready for encoding, given the caller's
/// metadata entries (values not yet placed — the caller fills in
/// offsets once it knows where the encrypted region will start).
pub fn build_header(
    name: Vec<u8>,
    mode: ModeFlags,
    nonce: Option<[u8; NONCE_LEN]>,
    metadata: &[TlvEntry],
) -> Result<FileHeader, LayoutError> {
    if name.len() > u16::MAX as usize {
        return Err(LayoutError::NameTooLong);
    }
    if metadata.len() > MAX_TLV_ENTRIES {
        return Err(LayoutError::TooManyTlvEntries);
    }

    let not_encrypted_len = 2 + 2 + 2 + name.len()
        + if mode.is_encrypted() { NONCE_LEN } else { 0 }
        + 2
        + metadata.len() * TLV_INDEX_ENTRY_LEN;

    let mut offset = not_encrypted_len as u16;
    let mut tlv_index = Vec::with_capacity(metadata.len());
    for entry in metadata {
        let length = entry.value.len() as u16;
        tlv_index.push(TlvIndexEntry {
            type_id: entry.type_id,
            length,
            offset,
        });
        offset += length;
    }

    Ok(FileHeader {
        format_version: FORMAT_VERSION,
        mode,
        name,
        nonce,
        tlv_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plain_header() {
        let metadata = vec![TlvEntry {
            type_id: 7,
            value: vec![1, 2, 3, 4],
        }];
        let header = build_header(b"blob".to_vec(), ModeFlags::USER_READ, None, &metadata).unwrap();

        let mut bytes = Vec::new();
        header.encode(&mut bytes);

        let (decoded, values_start) = decode_header(&bytes).unwrap();
        assert_eq!(decoded.name, b"blob");
        assert_eq!(decoded.mode, ModeFlags::USER_READ);
        assert_eq!(decoded.tlv_index.len(), 1);
        assert_eq!(decoded.tlv_index[0].length, 4);
        assert_eq!(values_start, bytes.len());
        assert_eq!(values_start, header.not_encrypted_len());
    }

    #[test]
    fn encrypted_header_reserves_nonce_field() {
        let header = build_header(
            b"n".to_vec(),
            ModeFlags::ENCRYPTED,
            Some([9u8; NONCE_LEN]),
            &[],
        )
        .unwrap();
        let mut bytes = Vec::new();
        header.encode(&mut bytes);

        let (decoded, _) = decode_header(&bytes).unwrap();
        assert_eq!(decoded.nonce, Some([9u8; NONCE_LEN]));
    }

    #[test]
    fn full_header_len_includes_metadata_values() {
        let metadata = vec![TlvEntry {
            type_id: 1,
            value: vec![0u8; 10],
        }];
        let header = build_header(b"x".to_vec(), ModeFlags::empty(), None, &metadata).unwrap();
        assert_eq!(header.full_header_len(), header.not_encrypted_len() + 10);
    }

    #[test]
    fn rejects_too_many_tlv_entries() {
        let metadata = vec![
            TlvEntry { type_id: 1, value: vec![0] },
            TlvEntry { type_id: 2, value: vec![0] },
            TlvEntry { type_id: 3, value: vec![0] },
            TlvEntry { type_id: 4, value: vec![0] },
        ];
        assert_eq!(
            build_header(b"x".to_vec(), ModeFlags::empty(), None, &metadata),
            Err(LayoutError::TooManyTlvEntries)
        );
    }

    #[test]
    fn peek_name_ignores_trailing_bytes() {
        let header = build_header(b"target".to_vec(), ModeFlags::empty(), None, &[]).unwrap();
        let mut bytes = Vec::new();
        header.encode(&mut bytes);
        bytes.extend_from_slice(b"payload and trailer junk");
        assert_eq!(peek_name(&bytes).unwrap(), b"target");
    }
}
