//! Single-slot backups and exclusive file handles.
//!
//! Every managed file has exactly one backup next to it (`<file>.bak`). A
//! switch replaces that backup with the file's current contents before writing
//! the new ones, so the backup always holds the previous generation.

use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Appended to a managed file's name to form its backup
pub const BACKUP_SUFFIX: &str = ".bak";

/// Location of the backup for `path`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(BACKUP_SUFFIX);
    path.with_file_name(name)
}

/// Write `bytes` into the backup slot of `path`.
///
/// Uses write-to-temp then rename so a failed backup never leaves a truncated
/// file in the slot.
fn write_backup(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let backup = backup_path(path);
    let mut temp_name = backup.file_name().map(OsString::from).unwrap_or_default();
    temp_name.push(".tmp");
    let temp = backup.with_file_name(temp_name);

    fs::write(&temp, bytes).map_err(|e| Error::io("write backup", &temp, e))?;
    if let Err(e) = fs::rename(&temp, &backup) {
        let _ = fs::remove_file(&temp);
        return Err(Error::io("replace backup", &backup, e));
    }

    tracing::debug!("backed up {} -> {}", path.display(), backup.display());
    Ok(backup)
}

/// A managed file held open under an exclusive lock.
///
/// Snapshot and write go through the same handle, so no other edtarget
/// process can interleave between them. The lock is released on drop.
pub struct ManagedFile {
    file: File,
    path: PathBuf,
    existed: bool,
}

impl ManagedFile {
    /// Open `path` for exclusive access, creating it if missing.
    ///
    /// The parent directory must already exist.
    pub fn acquire(path: &Path) -> Result<Self> {
        let existed = path
            .try_exists()
            .map_err(|e| Error::io("inspect", path, e))?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Error::io("open", path, e))?;

        file.lock_exclusive()
            .map_err(|e| Error::io("lock", path, e))?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            existed,
        })
    }

    /// Whether the file existed before it was acquired
    pub fn existed(&self) -> bool {
        self.existed
    }

    /// Current contents of the file
    pub fn contents(&mut self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_end(&mut bytes))
            .map_err(|e| Error::io("read", &self.path, e))?;
        Ok(bytes)
    }

    /// Copy the current contents into the backup slot.
    ///
    /// Returns the backup location, or `None` if the file did not exist
    /// before it was acquired.
    pub fn snapshot(&mut self) -> Result<Option<PathBuf>> {
        if !self.existed {
            return Ok(None);
        }
        let bytes = self.contents()?;
        write_backup(&self.path, &bytes).map(Some)
    }

    /// Replace the file's contents and flush them to disk
    pub fn replace(&mut self, bytes: &[u8]) -> Result<()> {
        let path = &self.path;
        self.file
            .set_len(0)
            .map_err(|e| Error::io("truncate", path, e))?;
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| Error::io("seek", path, e))?;
        self.file
            .write_all(bytes)
            .map_err(|e| Error::io("write", path, e))?;
        self.file
            .sync_all()
            .map_err(|e| Error::io("sync", path, e))?;
        Ok(())
    }
}

impl Drop for ManagedFile {
    fn drop(&mut self) {
        // Release the lock (ignore errors during drop)
        let _ = FileExt::unlock(&self.file);
    }
}

/// Swap `path` with its backup.
///
/// The current contents become the new backup, so a restore can itself be
/// undone by restoring again.
pub fn restore(path: &Path) -> Result<PathBuf> {
    let backup = backup_path(path);
    let previous = match fs::read(&backup) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::NoBackup { path: backup }),
        Err(e) => return Err(Error::io("read", &backup, e)),
    };

    let mut file = ManagedFile::acquire(path)?;
    if file.existed() {
        let current = file.contents()?;
        write_backup(path, &current)?;
    }
    file.replace(&previous)?;

    tracing::info!("restored {} from {}", path.display(), backup.display());
    Ok(backup)
}
