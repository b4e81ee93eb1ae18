//! Filesystem platform capability (Secure Core, C1).
//!
//! TRUST LEVEL: Secure Core
//!
//! Two implementors:
//! - [`StdFileSystem`] — real `std::fs`, used in production and in
//!   `tempfile`-backed integration tests.
//! - [`MemFileSystem`] (see [`crate::pal::mem_fs`]) — an in-memory
//!   backend used by unit tests, the same production/test split
//!   `disk_driver` uses between its `file` and `memory` backends.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Which of the two partitions a path belongs to. Primary holds the
/// working root; secondary holds the backup root. On single-partition
/// platforms both mount points may be equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Primary,
    Secondary,
}

/// A minimal seekable byte stream, implemented by both filesystem
/// backends' open file handles.
pub trait FsFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;
    fn tell(&mut self) -> io::Result<u64>;
}

pub trait FileSystem {
    type File: FsFile;

    fn open_create_excl(&self, path: &Path) -> io::Result<Self::File>;
    fn open_read(&self, path: &Path) -> io::Result<Self::File>;
    fn exists(&self, path: &Path) -> bool;

    fn mkdir_p(&self, path: &Path) -> io::Result<()>;
    fn rmdir(&self, path: &Path) -> io::Result<()>;
    fn unlink(&self, path: &Path) -> io::Result<()>;

    /// Recursively remove every entry *inside* `path`, keeping `path`
    /// itself (the non-format branch).
    fn remove_tree_contents(&self, path: &Path) -> io::Result<()>;

    /// Copy the top-level regular files of `from` into `to`. Mirrors
    /// the original `pal_fsCpFolder`, which does not recurse into
    /// subdirectories — this deliberately keeps a backup root's `FR/`
    /// sentinel subdirectory from ever reaching the working root
    /// during factory-reset replay.
    fn copy_tree(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Wipe and recreate an entire partition (the
    /// format branch — only reachable when the partition is private).
    fn format_partition(&self, partition: Partition) -> io::Result<()>;

    fn mountpoint(&self, partition: Partition) -> PathBuf;
    fn is_private_partition(&self, partition: Partition) -> bool;
}

/// Real-disk filesystem backend.
pub struct StdFileSystem {
    primary_mount: PathBuf,
    secondary_mount: PathBuf,
    primary_private: bool,
}

impl StdFileSystem {
    pub fn new(primary_mount: PathBuf, secondary_mount: PathBuf, primary_private: bool) -> Self {
        Self {
            primary_mount,
            secondary_mount,
            primary_private,
        }
    }

    fn mount_of(&self, partition: Partition) -> &Path {
        match partition {
            Partition::Primary => &self.primary_mount,
            Partition::Secondary => &self.secondary_mount,
        }
    }
}

impl FsFile for std::fs::File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        Read::read_exact(self, buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        Write::write_all(self, buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Seek::seek(self, pos)
    }

    fn tell(&mut self) -> io::Result<u64> {
        Seek::stream_position(self)
    }
}

impl FileSystem for StdFileSystem {
    type File = std::fs::File;

    fn open_create_excl(&self, path: &Path) -> io::Result<Self::File> {
        std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
    }

    fn open_read(&self, path: &Path) -> io::Result<Self::File> {
        std::fs::OpenOptions::new().read(true).open(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn mkdir_p(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn rmdir(&self, path: &Path) -> io::Result<()> {
        match std::fs::remove_dir(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn unlink(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn remove_tree_contents(&self, path: &Path) -> io::Result<()> {
        if !path.exists() {
            return Ok(());
        }
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let entry_path = entry.path();
            if entry.file_type()?.is_dir() {
                std::fs::remove_dir_all(&entry_path)?;
            } else {
                std::fs::remove_file(&entry_path)?;
            }
        }
        Ok(())
    }

    fn copy_tree(&self, from: &Path, to: &Path) -> io::Result<()> {
        if !from.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(to)?;
        for entry in std::fs::read_dir(from)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            let src = entry.path();
            let dst = to.join(entry.file_name());
            std::fs::copy(&src, &dst)?;
        }
        Ok(())
    }

    fn format_partition(&self, partition: Partition) -> io::Result<()> {
        let mount = self.mount_of(partition);
        if mount.exists() {
            std::fs::remove_dir_all(mount)?;
        }
        std::fs::create_dir_all(mount)
    }

    fn mountpoint(&self, partition: Partition) -> PathBuf {
        self.mount_of(partition).to_path_buf()
    }

    fn is_private_partition(&self, partition: Partition) -> bool {
        match partition {
            Partition::Primary => self.primary_private,
            Partition::Secondary => false,
        }
    }
}
