//! In-memory filesystem backend (Secure Core, C1, test support).
//!
//! Grounded in the production/test backend split of `disk_driver`
//! (`file.rs` vs `memory.rs`): the storage engine is generic over
//! [`crate::pal::fs::FileSystem`], so unit tests exercise factory-reset
//! replay, CMAC tampering, and hash-collision handling against this
//! backend instead of touching real disk.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::pal::fs::{FileSystem, FsFile, Partition};

#[derive(Default)]
struct MemState {
    files: HashMap<PathBuf, Vec<u8>>,
    dirs: std::collections::HashSet<PathBuf>,
}

#[derive(Clone)]
pub struct MemFileSystem {
    state: Arc<Mutex<MemState>>,
    primary_mount: PathBuf,
    secondary_mount: PathBuf,
    primary_private: bool,
}

impl MemFileSystem {
    pub fn new(primary_mount: PathBuf, secondary_mount: PathBuf, primary_private: bool) -> Self {
        let mut dirs = std::collections::HashSet::new();
        dirs.insert(primary_mount.clone());
        dirs.insert(secondary_mount.clone());
        Self {
            state: Arc::new(Mutex::new(MemState {
                files: HashMap::new(),
                dirs,
            })),
            primary_mount,
            secondary_mount,
            primary_private,
        }
    }

    fn mount_of(&self, partition: Partition) -> PathBuf {
        match partition {
            Partition::Primary => self.primary_mount.clone(),
            Partition::Secondary => self.secondary_mount.clone(),
        }
    }

    /// Test helper: full paths of every regular file directly under
    /// `dir` (one path component past `dir`), not recursing into
    /// subdirectories. Used to assert a directory's contents are
    /// exactly a given set of items, rather than merely that some
    /// expected items are present.
    pub fn direct_children(&self, dir: &Path) -> Vec<PathBuf> {
        let state = self.state.lock().unwrap();
        let mut out: Vec<PathBuf> = state
            .files
            .keys()
            .filter(|p| {
                p.strip_prefix(dir)
                    .map(|rel| rel.components().count() == 1)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        out.sort();
        out
    }
}

fn not_found() -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, "no such file in MemFileSystem")
}

fn already_exists() -> io::Error {
    io::Error::new(io::ErrorKind::AlreadyExists, "file already exists in MemFileSystem")
}

pub struct MemFile {
    state: Arc<Mutex<MemState>>,
    path: PathBuf,
    cursor: u64,
}

impl FsFile for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let state = self.state.lock().unwrap();
        let data = state.files.get(&self.path).ok_or_else(not_found)?;
        let start = self.cursor as usize;
        if start >= data.len() {
            return Ok(0);
        }
        let n = std::cmp::min(buf.len(), data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.cursor += n as u64;
        Ok(n)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let n = self.read(buf)?;
        if n != buf.len() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short read in MemFileSystem"));
        }
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        let data = state.files.entry(self.path.clone()).or_default();
        let start = self.cursor as usize;
        let end = start + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        self.cursor += buf.len() as u64;
        Ok(())
    }

    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let len = {
            let state = self.state.lock().unwrap();
            state.files.get(&self.path).map(|d| d.len() as u64).unwrap_or(0)
        };
        let new_pos = match pos {
            io::SeekFrom::Start(n) => n as i64,
            io::SeekFrom::End(n) => len as i64 + n,
            io::SeekFrom::Current(n) => self.cursor as i64 + n,
        };
        if new_pos < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "negative seek in MemFileSystem"));
        }
        self.cursor = new_pos as u64;
        Ok(self.cursor)
    }

    fn tell(&mut self) -> io::Result<u64> {
        Ok(self.cursor)
    }
}

impl FileSystem for MemFileSystem {
    type File = MemFile;

    fn open_create_excl(&self, path: &Path) -> io::Result<Self::File> {
        let mut state = self.state.lock().unwrap();
        if state.files.contains_key(path) {
            return Err(already_exists());
        }
        state.files.insert(path.to_path_buf(), Vec::new());
        drop(state);
        Ok(MemFile {
            state: self.state.clone(),
            path: path.to_path_buf(),
            cursor: 0,
        })
    }

    fn open_read(&self, path: &Path) -> io::Result<Self::File> {
        let state = self.state.lock().unwrap();
        if !state.files.contains_key(path) {
            return Err(not_found());
        }
        drop(state);
        Ok(MemFile {
            state: self.state.clone(),
            path: path.to_path_buf(),
            cursor: 0,
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.state.lock().unwrap().files.contains_key(path)
    }

    fn mkdir_p(&self, path: &Path) -> io::Result<()> {
        self.state.lock().unwrap().dirs.insert(path.to_path_buf());
        Ok(())
    }

    fn rmdir(&self, path: &Path) -> io::Result<()> {
        self.state.lock().unwrap().dirs.remove(path);
        Ok(())
    }

    fn unlink(&self, path: &Path) -> io::Result<()> {
        self.state
            .lock()
            .unwrap()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(not_found)
    }

    fn remove_tree_contents(&self, path: &Path) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        let path = path.to_path_buf();
        state.files.retain(|p, _| !(p.starts_with(&path) && p != &path));
        state.dirs.retain(|p| !(p.starts_with(&path) && p != &path));
        Ok(())
    }

    fn copy_tree(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        // Top-level regular files only, matching `pal_fsCpFolder`: a
        // file directly under `from` has exactly one path component
        // after stripping the `from` prefix. Anything nested (e.g. a
        // backup root's `FR/` sentinel subdirectory) is left behind.
        let entries: Vec<(PathBuf, Vec<u8>)> = state
            .files
            .iter()
            .filter(|(p, _)| p.starts_with(from))
            .filter_map(|(p, d)| {
                let rel = p.strip_prefix(from).ok()?;
                if rel.components().count() == 1 {
                    Some((to.join(rel), d.clone()))
                } else {
                    None
                }
            })
            .collect();
        for (path, data) in entries {
            state.files.insert(path, data);
        }
        state.dirs.insert(to.to_path_buf());
        Ok(())
    }

    fn format_partition(&self, partition: Partition) -> io::Result<()> {
        let mount = self.mount_of(partition);
        let mut state = self.state.lock().unwrap();
        state.files.retain(|p, _| !p.starts_with(&mount));
        state.dirs.retain(|p| !p.starts_with(&mount));
        state.dirs.insert(mount);
        Ok(())
    }

    fn mountpoint(&self, partition: Partition) -> PathBuf {
        self.mount_of(partition)
    }

    fn is_private_partition(&self, partition: Partition) -> bool {
        match partition {
            Partition::Primary => self.primary_private,
            Partition::Secondary => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> MemFileSystem {
        MemFileSystem::new(PathBuf::from("/primary"), PathBuf::from("/secondary"), false)
    }

    #[test]
    fn create_then_read_roundtrips() {
        let fs = fixture();
        let path = PathBuf::from("/primary/WORKING/abc.def");
        let mut f = fs.open_create_excl(&path).unwrap();
        f.write_all(b"hello world").unwrap();
        drop(f);

        let mut f = fs.open_read(&path).unwrap();
        let mut buf = [0u8; 5];
        f.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn create_excl_rejects_duplicate() {
        let fs = fixture();
        let path = PathBuf::from("/primary/WORKING/abc.def");
        fs.open_create_excl(&path).unwrap();
        assert!(fs.open_create_excl(&path).is_err());
    }

    #[test]
    fn copy_tree_and_remove_tree_contents() {
        let fs = fixture();
        let src = PathBuf::from("/secondary/BACKUP");
        let dst = PathBuf::from("/primary/WORKING");
        let mut f = fs.open_create_excl(&src.join("a.bin")).unwrap();
        f.write_all(b"payload").unwrap();
        drop(f);

        fs.copy_tree(&src, &dst).unwrap();
        assert!(fs.exists(&dst.join("a.bin")));

        fs.remove_tree_contents(&dst).unwrap();
        assert!(!fs.exists(&dst.join("a.bin")));
    }
}
