//! File lifecycle API (Secure Core, C6).
//!
//! `Storage` owns every piece of engine-scoped state — the filesystem
//! binding, both mount roots, and the two derived device keys — as a
//! single value, rather than scattering it across process globals.
//! `create`/`open` each return a [`FileHandle`] borrowing from it, so a
//! handle can never outlive the keys it was opened with.

use std::cell::RefCell;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use crate::crypto::{verify_trailer, CipherStream, IntegrityStream};
use crate::file::error::{EsfsError, EsfsResult};
use crate::file::handle::{FileHandle, OpenMode, SeekOrigin};
use crate::filename::ShortFileName;
use crate::layout::{self, TlvEntry, CMAC_TRAILER_LEN, MAX_TLV_ENTRIES};
use crate::memory::GuardedKey16;
use crate::mode::ModeFlags;
use crate::pal::fs::{FileSystem, FsFile, Partition};
use crate::pal::rng::Csprng;
use crate::pal::rot::DeviceRoot;
use crate::paths::{BACKUP_DIR_NAME, WORKING_DIR_NAME};

const MAX_NAME_LEN: usize = 1024;

/// The fixed, device-bound part of engine state: filesystem binding,
/// both mount roots, and the two derived keys. Split out from
/// [`Storage`] so [`FileHandle`] can borrow exactly this and nothing
/// about the RNG (which it never needs after `create` returns).
pub struct StorageCore<FS: FileSystem> {
    fs: FS,
    working_root: PathBuf,
    backup_root: PathBuf,
    signature_key: GuardedKey16,
    encryption_key: GuardedKey16,
}

impl<FS: FileSystem> StorageCore<FS> {
    fn new(fs: FS, root: &DeviceRoot) -> Self {
        let working_root = fs.mountpoint(Partition::Primary).join(WORKING_DIR_NAME);
        let backup_root = fs.mountpoint(Partition::Secondary).join(BACKUP_DIR_NAME);
        Self {
            signature_key: root.storage_signature_key(),
            encryption_key: root.storage_encryption_key(),
            fs,
            working_root,
            backup_root,
        }
    }

    /// The filesystem binding this engine was constructed with.
    pub fn fs(&self) -> &FS {
        &self.fs
    }

    /// The primary mount's working directory.
    pub fn working_root(&self) -> &Path {
        &self.working_root
    }

    /// The secondary mount's backup directory.
    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }
}

/// The storage engine. One instance per device; `create`/`open` borrow
/// it for the lifetime of the handles they return.
pub struct Storage<FS: FileSystem, C: Csprng> {
    pub(crate) core: StorageCore<FS>,
    rng: RefCell<C>,
}

impl<FS: FileSystem, C: Csprng> Storage<FS, C> {
    /// Bind the engine to `fs`, deriving its two keys from `root` and
    /// drawing per-file nonces from `rng`.
    pub fn new(fs: FS, root: &DeviceRoot, rng: C) -> Self {
        Self {
            core: StorageCore::new(fs, root),
            rng: RefCell::new(rng),
        }
    }

    /// The fixed device-bound state (filesystem, mount roots, keys)
    /// this engine borrows handles from.
    pub fn core(&self) -> &StorageCore<FS> {
        &self.core
    }

    /// Borrow the factory-reset controller (C7) over this engine's
    /// filesystem binding and mount roots.
    pub fn factory(&self) -> crate::factory::FactoryReset<'_, FS> {
        crate::factory::FactoryReset::new(&self.core)
    }

    fn validate_name(name: &[u8]) -> EsfsResult<()> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(EsfsError::InvalidArgument);
        }
        Ok(())
    }

    /// `create(name, mode, metadata)`.
    pub fn create(
        &self,
        name: &[u8],
        mode: ModeFlags,
        metadata: &[TlvEntry],
    ) -> EsfsResult<FileHandle<'_, FS>> {
        Self::validate_name(name)?;
        if metadata.len() > MAX_TLV_ENTRIES || metadata.iter().any(|m| m.value.is_empty()) {
            return Err(EsfsError::InvalidArgument);
        }

        let short_name = ShortFileName::derive(name);
        let path = self.core.working_root.join(short_name.as_string());

        if self.core.fs.exists(&path) {
            return Err(self.existing_file_conflict(&path, name)?);
        }

        let nonce = if mode.is_encrypted() {
            Some(self.rng.borrow_mut().next_nonce())
        } else {
            None
        };

        let header = layout::build_header(name.to_vec(), mode, nonce, metadata)?;
        let not_encrypted_len = header.not_encrypted_len() as u64;
        let metadata_total: u64 = header.tlv_index.iter().map(|e| e.length as u64).sum();

        let mut encoded = Vec::new();
        header.encode(&mut encoded);

        let mut file = self.core.fs.open_create_excl(&path)?;
        let mut mac = IntegrityStream::new(&self.core.signature_key);
        mac.update(&encoded);
        if let Err(err) = file.write_all(&encoded) {
            let _ = self.core.fs.unlink(&path);
            return Err(err.into());
        }

        let mut cipher = if mode.is_encrypted() {
            CipherStream::encrypted(&self.core.encryption_key, nonce.as_ref().expect("nonce set above"))
        } else {
            CipherStream::plain()
        };

        for (entry, index_entry) in metadata.iter().zip(header.tlv_index.iter()) {
            let mut value = entry.value.clone();
            cipher.apply_at(index_entry.offset as u64 - not_encrypted_len, &mut value);
            mac.update(&value);
            if let Err(err) = file.write_all(&value) {
                let _ = self.core.fs.unlink(&path);
                return Err(err.into());
            }
        }

        if mode.is_factory() {
            self.create_backup_placeholder(&short_name)?;
        }

        Ok(FileHandle {
            core: &self.core,
            raw: file,
            mode: OpenMode::Write,
            mode_flags: mode,
            short_name,
            stored_name: name.to_vec(),
            nonce,
            tlv_index: header.tlv_index,
            payload_offset: not_encrypted_len + metadata_total,
            payload_crypto_base: metadata_total,
            cipher,
            mac: Some(mac),
            invalid: false,
            closed: false,
            cursor: 0,
            data_size: 0,
        })
    }

    /// `name` already exists at `path`'s derived short filename: decide
    /// between `Exists` (same stored name) and `HashConflict` (a
    /// different name collided onto the same short filename).
    fn existing_file_conflict(&self, path: &Path, name: &[u8]) -> EsfsResult<EsfsError> {
        let mut file = self.core.fs.open_read(path)?;
        let mut buf = Vec::new();
        read_to_end(&mut file, &mut buf)?;

        // A full decode (not just `peek_name`) lets a version mismatch
        // report as `InvalidFileVersion` rather than masquerading as a
        // plain `Exists`.
        let (header, _) = layout::decode_header(&buf)?;
        Ok(if header.format_version != layout::FORMAT_VERSION {
            EsfsError::InvalidFileVersion
        } else if header.name == name {
            EsfsError::Exists
        } else {
            EsfsError::HashConflict
        })
    }

    fn create_backup_placeholder(&self, short_name: &ShortFileName) -> EsfsResult<()> {
        let backup_path = self.core.backup_root.join(short_name.as_string());
        if !self.core.fs.exists(&backup_path) {
            let mut placeholder = self.core.fs.open_create_excl(&backup_path)?;
            placeholder.write_all(&[])?;
        }
        Ok(())
    }

    /// `open(name)`. Returns the handle and the stored mode bits.
    pub fn open(&self, name: &[u8]) -> EsfsResult<(FileHandle<'_, FS>, ModeFlags)> {
        Self::validate_name(name)?;

        let short_name = ShortFileName::derive(name);
        let path = self.core.working_root.join(short_name.as_string());
        if !self.core.fs.exists(&path) {
            return Err(EsfsError::NotExists);
        }

        let mut file = self.core.fs.open_read(&path)?;
        let mut buf = Vec::new();
        read_to_end(&mut file, &mut buf)?;

        if buf.len() < CMAC_TRAILER_LEN {
            return Err(EsfsError::IoError);
        }
        let (body, trailer_bytes) = buf.split_at(buf.len() - CMAC_TRAILER_LEN);
        let mut trailer = [0u8; CMAC_TRAILER_LEN];
        trailer.copy_from_slice(trailer_bytes);

        if !verify_trailer(&self.core.signature_key, body, &trailer) {
            return Err(EsfsError::CmacMismatch);
        }

        let (header, _values_start) = layout::decode_header(body)?;
        if header.format_version != layout::FORMAT_VERSION {
            return Err(EsfsError::InvalidFileVersion);
        }
        if header.name != name {
            return Err(EsfsError::HashConflict);
        }

        let not_encrypted_len = header.not_encrypted_len() as u64;
        let full_header_len = header.full_header_len() as u64;
        let metadata_total = full_header_len - not_encrypted_len;
        let physical_size = buf.len() as u64;
        let data_size = physical_size - full_header_len - CMAC_TRAILER_LEN as u64;

        file.seek(SeekFrom::Start(full_header_len))?;

        let cipher = if header.mode.is_encrypted() {
            CipherStream::encrypted(
                &self.core.encryption_key,
                header.nonce.as_ref().ok_or(EsfsError::InternalError)?,
            )
        } else {
            CipherStream::plain()
        };

        let mode = header.mode;
        Ok((
            FileHandle {
                core: &self.core,
                raw: file,
                mode: OpenMode::Read,
                mode_flags: mode,
                short_name,
                stored_name: header.name,
                nonce: header.nonce,
                tlv_index: header.tlv_index,
                payload_offset: full_header_len,
                payload_crypto_base: metadata_total,
                cipher,
                mac: None,
                invalid: false,
                closed: false,
                cursor: 0,
                data_size,
            },
            mode,
        ))
    }

    /// `delete(name)`: opens to detect corruption first;
    /// a corrupt file (any error but `NotExists`) is unconditionally
    /// deletable. A well-formed file additionally runs the (currently
    /// stubbed) permission hook before being removed.
    pub fn delete(&self, name: &[u8]) -> EsfsResult<()> {
        Self::validate_name(name)?;
        let short_name = ShortFileName::derive(name);
        let path = self.core.working_root.join(short_name.as_string());

        match self.open(name) {
            Ok((handle, _mode)) => {
                drop(handle);
                crate::kcm::policy::allow_access(name)?;
                self.core.fs.unlink(&path).map_err(EsfsError::from)
            }
            Err(EsfsError::NotExists) => Err(EsfsError::NotExists),
            Err(_corrupt) => self.core.fs.unlink(&path).map_err(EsfsError::from),
        }
    }
}

pub(crate) fn read_to_end<F: FsFile>(file: &mut F, buf: &mut Vec<u8>) -> std::io::Result<()> {
    let mut chunk = [0u8; 4096];
    loop {
        let n = file.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Ok(())
}

impl<'engine, FS: FileSystem> FileHandle<'engine, FS> {
    /// `write(buf)`. Append-only; never rewinds.
    pub fn write(&mut self, buf: &[u8]) -> EsfsResult<()> {
        if self.mode != OpenMode::Write {
            return Err(EsfsError::FileOpenForRead);
        }
        if buf.is_empty() {
            return Err(EsfsError::InvalidArgument);
        }

        let mut ciphertext = buf.to_vec();
        self.cipher
            .apply_at(self.payload_crypto_base + self.cursor, &mut ciphertext);

        let mac = self.mac.as_mut().expect("write handle always carries a mac");
        mac.update(&ciphertext);
        if let Err(err) = self.raw.write_all(&ciphertext) {
            mac.mark_invalid();
            self.invalid = true;
            return Err(err.into());
        }

        self.cursor += buf.len() as u64;
        self.data_size += buf.len() as u64;
        Ok(())
    }

    /// `read(buf)`. Clamps to the data-section tail; a
    /// short or zero-length return is not an error.
    pub fn read(&mut self, buf: &mut [u8]) -> EsfsResult<usize> {
        if self.mode != OpenMode::Read {
            return Err(EsfsError::FileOpenForWrite);
        }

        let remaining = self.data_size.saturating_sub(self.cursor);
        let want = (buf.len() as u64).min(remaining) as usize;
        if want == 0 {
            return Ok(0);
        }

        self.raw.read_exact(&mut buf[..want])?;
        self.cipher.apply_at(self.payload_crypto_base + self.cursor, &mut buf[..want]);
        self.cursor += want as u64;
        Ok(want)
    }

    /// `seek(offset, origin)`.
    pub fn seek(&mut self, offset: i64, origin: SeekOrigin) -> EsfsResult<u64> {
        if self.mode != OpenMode::Read {
            return Err(EsfsError::FileOpenForWrite);
        }

        let data_size = self.data_size as i64;
        let new_cursor = match origin {
            SeekOrigin::Start => offset,
            SeekOrigin::End => {
                if !(-data_size..=0).contains(&offset) {
                    return Err(EsfsError::InvalidArgument);
                }
                data_size + offset
            }
            SeekOrigin::Current => self.cursor as i64 + offset,
        };

        if new_cursor < 0 || new_cursor > data_size {
            return Err(EsfsError::InvalidArgument);
        }

        self.cursor = new_cursor as u64;
        self.raw.seek(SeekFrom::Start(self.payload_offset + self.cursor))?;
        Ok(self.cursor)
    }

    /// `file_size()`. Payload bytes only, never header
    /// or trailer.
    pub fn file_size(&self) -> u64 {
        self.data_size
    }

    /// `read_meta(index)`.
    pub fn read_meta(&mut self, index: usize) -> EsfsResult<TlvEntry> {
        if self.mode != OpenMode::Read {
            return Err(EsfsError::FileOpenForWrite);
        }
        let entry = self.tlv_index.get(index).copied().ok_or(EsfsError::InvalidArgument)?;

        let saved_pos = self.raw.tell()?;
        self.raw.seek(SeekFrom::Start(entry.offset as u64))?;
        let mut value = vec![0u8; entry.length as usize];
        self.raw.read_exact(&mut value)?;
        self.cipher
            .apply_at(entry.offset as u64 - (self.payload_offset - self.payload_crypto_base), &mut value);
        self.raw.seek(SeekFrom::Start(saved_pos))?;

        Ok(TlvEntry {
            type_id: entry.type_id,
            value,
        })
    }

    /// `close()`. Idempotent: a second call is a no-op.
    pub fn close(mut self) -> EsfsResult<()> {
        self.close_mut()
    }

    pub(crate) fn close_mut(&mut self) -> EsfsResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if self.mode != OpenMode::Write {
            return Ok(());
        }

        let mac = self.mac.take().expect("write handle always carries a mac");
        let path = self.core.working_root().join(self.short_name.as_string());

        if self.invalid {
            let _ = self.core.fs().unlink(&path);
            self.unlink_backup_placeholder();
            return Ok(());
        }

        let trailer = match mac.finalize() {
            Some(trailer) => trailer,
            None => {
                let _ = self.core.fs().unlink(&path);
                self.unlink_backup_placeholder();
                return Ok(());
            }
        };
        self.raw.write_all(&trailer)?;

        if self.mode_flags.is_factory() {
            let backup_path = self.core.backup_root().join(self.short_name.as_string());
            let _ = self.core.fs().unlink(&backup_path);
            mirror_to_backup(self.core.fs(), &path, &backup_path)?;
        }

        Ok(())
    }

    /// Remove the backup-root placeholder `create` staged for a
    /// `FACTORY_VAL` item, when a write never reached a successful
    /// close. Without this, a file that was never actually created
    /// leaves a 0-byte file behind in the backup root, which a later
    /// `factory_reset()` then copies into the working root as an item
    /// that can never be opened (its body is too short to hold a
    /// trailer).
    fn unlink_backup_placeholder(&self) {
        if self.mode_flags.is_factory() {
            let backup_path = self.core.backup_root().join(self.short_name.as_string());
            let _ = self.core.fs().unlink(&backup_path);
        }
    }
}

impl<'engine, FS: FileSystem> Drop for FileHandle<'engine, FS> {
    fn drop(&mut self) {
        let _ = self.close_mut();
    }
}

fn mirror_to_backup<FS: FileSystem>(fs: &FS, src: &Path, dst: &Path) -> EsfsResult<()> {
    let mut source = fs.open_read(src)?;
    let mut buf = Vec::new();
    read_to_end(&mut source, &mut buf)?;
    let mut dest = fs.open_create_excl(dst)?;
    dest.write_all(&buf)?;
    Ok(())
}
