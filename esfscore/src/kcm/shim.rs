//! KCM convenience flows (Secure Core, C8): one-shot write/read/delete
//! built on top of the C6 lifecycle API, plus is_factory/is_encrypted
//! → mode-bit packing.

use crate::file::lifecycle::Storage;
use crate::kcm::error::{KcmResult, KcmStatus};
use crate::mode::ModeFlags;
use crate::pal::fs::FileSystem;
use crate::pal::rng::Csprng;

fn packed_mode(is_factory: bool, is_encrypted: bool) -> ModeFlags {
    let mut mode = ModeFlags::USER_READ | ModeFlags::USER_WRITE;
    if is_factory {
        mode |= ModeFlags::FACTORY_VAL;
    }
    if is_encrypted {
        mode |= ModeFlags::ENCRYPTED;
    }
    mode
}

/// `write(name, data, is_factory, is_encrypted)` = `create` + `write` +
/// `close`; any failure between `create` and `close` triggers a
/// cleanup `delete`.
pub fn write<FS: FileSystem, C: Csprng>(
    storage: &Storage<FS, C>,
    name: &[u8],
    data: &[u8],
    is_factory: bool,
    is_encrypted: bool,
) -> KcmResult<()> {
    let mode = packed_mode(is_factory, is_encrypted);
    let mut handle = storage.create(name, mode, &[]).map_err(KcmStatus::from)?;

    if let Err(err) = handle.write(data) {
        drop(handle);
        let _ = storage.delete(name);
        return Err(err.into());
    }
    if let Err(err) = handle.close() {
        let _ = storage.delete(name);
        return Err(err.into());
    }
    Ok(())
}

/// `read(name, buf)` = `open` + `size` + length-check + `read` +
/// `close`, reporting `InsufficientBuffer` rather than silently
/// truncating.
pub fn read<FS: FileSystem, C: Csprng>(storage: &Storage<FS, C>, name: &[u8], buf: &mut [u8]) -> KcmResult<usize> {
    let (mut handle, _mode) = storage.open(name).map_err(KcmStatus::from)?;
    let size = handle.file_size();
    if (buf.len() as u64) < size {
        return Err(KcmStatus::InsufficientBuffer);
    }

    let n = handle.read(&mut buf[..size as usize]).map_err(KcmStatus::from)?;
    handle.close().map_err(KcmStatus::from)?;
    Ok(n)
}

/// `delete(name)` — a thin pass-through to the engine's own
/// open-to-detect-corruption delete policy.
pub fn delete<FS: FileSystem, C: Csprng>(storage: &Storage<FS, C>, name: &[u8]) -> KcmResult<()> {
    storage.delete(name).map_err(Into::into)
}
