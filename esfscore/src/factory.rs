//! Factory-reset controller (C7).
//!
//! Holds no state of its own beyond a borrow of [`StorageCore`]: the
//! working/backup roots and filesystem binding already live there. The
//! only persistent state this component owns is on disk — the `FR/fr_on`
//! sentinel inside the backup root, whose presence means "a factory
//! reset started and did not finish" and must be replayed before the
//! engine is safe to use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::file::error::{EsfsError, EsfsResult};
use crate::file::lifecycle::StorageCore;
use crate::pal::clock::Clock;
use crate::pal::fs::{FileSystem, FsFile, Partition};
use crate::paths::{FACTORY_RESET_DIR_NAME, FACTORY_RESET_SENTINEL_NAME};

/// Number of attempts the init protocol makes to create the working
/// directory before giving up (tolerates
/// late-arriving SD-card init).
pub const INIT_RETRY_ATTEMPTS: u32 = 100;
/// Back-off between working-directory creation attempts.
pub const INIT_RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// The factory-reset controller, borrowing the engine's filesystem
/// binding and mount roots for its lifetime.
pub struct FactoryReset<'engine, FS: FileSystem> {
    core: &'engine StorageCore<FS>,
}

impl<'engine, FS: FileSystem> FactoryReset<'engine, FS> {
    /// Build a controller over an already-constructed [`StorageCore`].
    pub fn new(core: &'engine StorageCore<FS>) -> Self {
        Self { core }
    }

    fn fr_dir(&self) -> PathBuf {
        self.core.backup_root().join(FACTORY_RESET_DIR_NAME)
    }

    fn sentinel_path(&self) -> PathBuf {
        self.fr_dir().join(FACTORY_RESET_SENTINEL_NAME)
    }

    /// Init protocol: ensure both roots exist,
    /// then replay an interrupted factory reset if the sentinel is
    /// still present from a prior crash.
    pub fn init(&self, clock: &impl Clock) -> EsfsResult<()> {
        self.ensure_dir_with_retry(self.core.working_root(), clock)?;
        self.core
            .fs()
            .mkdir_p(self.core.backup_root())
            .map_err(EsfsError::from)?;

        if self.core.fs().exists(&self.sentinel_path()) {
            self.replay()?;
        }
        Ok(())
    }

    fn ensure_dir_with_retry(&self, path: &Path, clock: &impl Clock) -> EsfsResult<()> {
        let mut attempt = 0u32;
        loop {
            match self.core.fs().mkdir_p(path) {
                Ok(()) => return Ok(()),
                Err(err) if attempt + 1 >= INIT_RETRY_ATTEMPTS => return Err(err.into()),
                Err(_) => {
                    attempt += 1;
                    clock.sleep(INIT_RETRY_BACKOFF);
                }
            }
        }
    }

    /// `factory_reset()`. Idempotent and
    /// crash-safe: a power loss between steps 1 and 4 leaves the
    /// sentinel present, and the next [`Self::init`] rediscovers and
    /// replays it from here.
    pub fn factory_reset(&self) -> EsfsResult<()> {
        self.core.fs().mkdir_p(&self.fr_dir()).map_err(EsfsError::from)?;
        let sentinel = self.sentinel_path();
        if !self.core.fs().exists(&sentinel) {
            let mut f = self
                .core
                .fs()
                .open_create_excl(&sentinel)
                .map_err(EsfsError::from)?;
            f.write_all(&[]).map_err(EsfsError::from)?;
        }
        self.replay()
    }

    /// Steps 2-4 of the factory-reset procedure: wipe (or format) the
    /// working root, copy the backup tree into it, then unlink the
    /// sentinel. Shared between a fresh [`Self::factory_reset`] call
    /// and crash replay from [`Self::init`] — the sentinel is already
    /// on disk by the time either caller reaches this point.
    fn replay(&self) -> EsfsResult<()> {
        let fs = self.core.fs();
        let working = self.core.working_root();
        let backup = self.core.backup_root();

        let working_is_isolated = fs.is_private_partition(Partition::Primary)
            && fs.mountpoint(Partition::Primary) != fs.mountpoint(Partition::Secondary);

        if working_is_isolated {
            fs.format_partition(Partition::Primary).map_err(EsfsError::from)?;
            fs.mkdir_p(working).map_err(EsfsError::from)?;
        } else {
            fs.remove_tree_contents(working).map_err(EsfsError::from)?;
        }

        fs.copy_tree(backup, working).map_err(EsfsError::from)?;

        let sentinel = self.sentinel_path();
        if fs.exists(&sentinel) {
            fs.unlink(&sentinel).map_err(EsfsError::from)?;
        }
        Ok(())
    }

    /// `reset()` — factory reset's non-persistent development sibling
    /// unconditionally wipes both roots and
    /// reinitializes, with no sentinel and no backup restoration.
    pub fn reset(&self, clock: &impl Clock) -> EsfsResult<()> {
        let fs = self.core.fs();
        fs.remove_tree_contents(self.core.working_root())
            .map_err(EsfsError::from)?;
        fs.remove_tree_contents(self.core.backup_root())
            .map_err(EsfsError::from)?;
        self.init(clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::lifecycle::Storage;
    use crate::mode::ModeFlags;
    use crate::pal::clock::InstantClock;
    use crate::pal::mem_fs::MemFileSystem;
    use crate::filename::ShortFileName;
    use crate::pal::rng::FixedRng;
    use crate::pal::rot::DeviceRoot;

    fn fixture() -> (Storage<MemFileSystem, FixedRng>, InstantClock) {
        let fs = MemFileSystem::new(PathBuf::from("/primary"), PathBuf::from("/secondary"), false);
        let root = DeviceRoot::new([0x44; 16]);
        let storage = Storage::new(fs, &root, FixedRng(0x22));
        (storage, InstantClock::default())
    }

    #[test]
    fn init_creates_both_roots_once() {
        let (storage, clock) = fixture();
        storage.factory().init(&clock).unwrap();
        assert!(storage.core().fs().exists(storage.core().working_root()));
        assert!(storage.core().fs().exists(storage.core().backup_root()));
    }

    #[test]
    fn factory_reset_keeps_only_factory_items() {
        let (storage, clock) = fixture();
        storage.factory().init(&clock).unwrap();

        storage.create(b"plain", ModeFlags::USER_READ, &[]).unwrap().write(b"a").unwrap();
        storage.create(b"also_plain", ModeFlags::USER_READ, &[]).unwrap().write(b"b").unwrap();
        storage
            .create(b"factory_item", ModeFlags::USER_READ | ModeFlags::FACTORY_VAL, &[])
            .unwrap()
            .write(b"keepme")
            .unwrap();

        storage.factory().factory_reset().unwrap();

        let (mut handle, _mode) = storage.open(b"factory_item").unwrap();
        let mut buf = [0u8; 16];
        let n = handle.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"keepme");

        assert_eq!(storage.open(b"plain").unwrap_err(), EsfsError::NotExists);
        assert_eq!(storage.open(b"also_plain").unwrap_err(), EsfsError::NotExists);

        // The working root must contain *only* the factory item —
        // nothing left over from the plain items, and no copy of the
        // backup root's own `FR/` sentinel subdirectory.
        let expected = storage
            .core()
            .working_root()
            .join(ShortFileName::derive(b"factory_item").as_string());
        assert_eq!(
            storage.core().fs().direct_children(storage.core().working_root()),
            vec![expected],
        );
    }

    #[test]
    fn invalid_close_of_a_factory_val_item_leaves_no_backup_placeholder() {
        let (storage, clock) = fixture();
        storage.factory().init(&clock).unwrap();

        let mut handle = storage
            .create(b"half_written", ModeFlags::USER_READ | ModeFlags::FACTORY_VAL, &[])
            .unwrap();
        handle.write(b"partial").unwrap();
        handle.invalid = true;
        handle.close().unwrap();

        assert_eq!(storage.open(b"half_written").unwrap_err(), EsfsError::NotExists);

        // Nothing should be left in the backup root either — a stray
        // 0-byte placeholder there would otherwise resurrect as an
        // unopenable item the next time factory_reset() runs.
        assert!(storage.core().fs().direct_children(storage.core().backup_root()).is_empty());

        storage.factory().factory_reset().unwrap();
        assert_eq!(storage.open(b"half_written").unwrap_err(), EsfsError::NotExists);
        assert!(storage.core().fs().direct_children(storage.core().working_root()).is_empty());
    }

    #[test]
    fn crash_replay_converges_to_the_same_state() {
        let (storage, clock) = fixture();
        storage.factory().init(&clock).unwrap();
        storage
            .create(b"factory_item", ModeFlags::USER_READ | ModeFlags::FACTORY_VAL, &[])
            .unwrap()
            .write(b"keepme")
            .unwrap();
        storage.create(b"scratch", ModeFlags::USER_READ, &[]).unwrap().write(b"x").unwrap();

        storage.factory().factory_reset().unwrap();

        // Simulate a crash between steps 1 and 4 of a *second* reset: the
        // sentinel is the only evidence a reset was in flight.
        storage
            .create(b"leftover", ModeFlags::USER_READ, &[])
            .unwrap()
            .write(b"y")
            .unwrap();
        let sentinel = storage.core().backup_root().join(FACTORY_RESET_DIR_NAME).join(FACTORY_RESET_SENTINEL_NAME);
        storage.core().fs().mkdir_p(sentinel.parent().unwrap()).unwrap();
        let mut f = storage.core().fs().open_create_excl(&sentinel).unwrap();
        f.write_all(&[]).unwrap();
        drop(f);

        storage.factory().init(&clock).unwrap();

        assert_eq!(storage.open(b"leftover").unwrap_err(), EsfsError::NotExists);
        let (mut handle, _mode) = storage.open(b"factory_item").unwrap();
        let mut buf = [0u8; 16];
        let n = handle.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"keepme");
        assert!(!storage.core().fs().exists(&sentinel));
    }

    #[test]
    fn factory_reset_twice_is_idempotent() {
        let (storage, clock) = fixture();
        storage.factory().init(&clock).unwrap();
        storage
            .create(b"factory_item", ModeFlags::USER_READ | ModeFlags::FACTORY_VAL, &[])
            .unwrap()
            .write(b"keepme")
            .unwrap();

        storage.factory().factory_reset().unwrap();
        storage.factory().factory_reset().unwrap();

        let (mut handle, _mode) = storage.open(b"factory_item").unwrap();
        let mut buf = [0u8; 16];
        let n = handle.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"keepme");
    }
}
