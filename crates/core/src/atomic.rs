use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::error::WriterError;
use crate::target::{split_target, temp_prefix};

/// 預設的檔案權限。 / Permission mode used when callers have no preference.
pub const DEFAULT_MODE: u32 = 0o644;

#[derive(Debug)]
struct TempFile {
    file: Arc<File>,
    path: PathBuf,
    // Set when the requested mode could not be applied; such a file is never renamed.
    mode_error: Option<io::ErrorKind>,
}

impl TempFile {
    /// Releases the handle, then renames it over `target`. A failed flush or a
    /// mode that was never applied skips the rename and leaves the temporary
    /// file where it is.
    fn commit(self, target: &Path, mode: u32) -> Result<(), WriterError> {
        let TempFile {
            file,
            path,
            mode_error,
        } = self;
        let synced = (&*file).flush().and_then(|()| file.sync_all());
        drop(file);
        if let Some(kind) = mode_error {
            warn!(
                "writer: not committing {}, mode {:o} was never applied",
                path.display(),
                mode
            );
            return Err(WriterError::Permissions {
                path,
                mode,
                source: io::Error::new(kind, "permission mode was never applied"),
            });
        }
        if let Err(source) = synced {
            return Err(WriterError::Sync { path, source });
        }

        debug!("writer: rename {} to {}", path.display(), target.display());
        fs::rename(&path, target).map_err(|source| WriterError::Rename {
            from: path,
            to: target.to_path_buf(),
            source,
        })
    }
}

/// 透過同目錄暫存檔寫入，關閉時以 rename 原子取代目標檔案。
/// Writes into a temporary sibling of the target and atomically renames it
/// into place on [`close`](Self::close).
///
/// No file is touched until the first write. Readers of the target observe
/// either its previous contents or the complete new contents.
#[derive(Debug)]
pub struct AtomicFileWriter {
    target: PathBuf,
    mode: u32,
    temp: Mutex<Option<TempFile>>,
}

impl AtomicFileWriter {
    /// 建立尚未開啟暫存檔的寫入器。 / Creates a writer bound to `target`; no filesystem access happens here.
    pub fn new(target: impl Into<PathBuf>, mode: u32) -> Self {
        let target = target.into();
        debug!("writer: created for {} (mode {:o})", target.display(), mode);
        Self {
            target,
            mode,
            temp: Mutex::new(None),
        }
    }

    /// 最終要取代的目標路徑。 / The path the staged bytes are renamed onto.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// 提交時套用的檔案權限。 / Permission mode applied to the temporary file before commit.
    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// 目前的暫存檔路徑；尚未寫入或已關閉時為 `None`。 / Current temporary file, if one is open.
    pub fn temp_path(&self) -> Option<PathBuf> {
        self.slot().as_ref().map(|temp| temp.path.clone())
    }

    /// Creates the temporary file now, so that [`close`](Self::close) replaces
    /// the target even if no bytes are written.
    pub fn begin(&self) -> Result<(), WriterError> {
        self.ensure_open().map(drop)
    }

    /// 提交暫存檔：關閉後 rename 至目標。 / Commits the staged bytes by renaming them over the target.
    ///
    /// Closing a writer that never wrote leaves the target untouched. A writer
    /// whose mode could not be applied refuses to commit and reports
    /// [`WriterError::Permissions`]. Later calls after a commit, successful or
    /// not, return `Ok(())` without renaming again.
    pub fn close(&self) -> Result<(), WriterError> {
        let mut slot = self.slot();
        let Some(temp) = slot.take() else {
            debug!("writer: nothing was written to {}", self.target.display());
            return Ok(());
        };
        temp.commit(&self.target, self.mode)
    }

    fn slot(&self) -> MutexGuard<'_, Option<TempFile>> {
        self.temp.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> Result<Arc<File>, WriterError> {
        self.ensure_open_with(apply_mode)
    }

    fn ensure_open_with<F>(&self, apply: F) -> Result<Arc<File>, WriterError>
    where
        F: FnOnce(&File, u32) -> io::Result<()>,
    {
        let mut slot = self.slot();
        if let Some(temp) = slot.as_ref() {
            return Ok(Arc::clone(&temp.file));
        }

        debug!("writer: creating temporary file for {}", self.target.display());
        let (dir, base) = split_target(&self.target).ok_or_else(|| WriterError::InvalidTarget {
            path: self.target.clone(),
        })?;
        let (file, path) = tempfile::Builder::new()
            .prefix(&temp_prefix(base))
            .tempfile_in(&dir)
            .and_then(|named| named.keep().map_err(|err| err.error))
            .map_err(|source| WriterError::CreateTemp { dir, source })?;

        let file = Arc::new(file);
        let applied = apply(&file, self.mode);
        // Held even when chmod fails so writes keep landing in one file; close refuses it.
        *slot = Some(TempFile {
            file: Arc::clone(&file),
            path: path.clone(),
            mode_error: applied.as_ref().err().map(io::Error::kind),
        });
        if let Err(source) = applied {
            warn!("writer: chmod {} failed: {}", path.display(), source);
            return Err(WriterError::Permissions {
                path,
                mode: self.mode,
                source,
            });
        }

        debug!("writer: using temporary file {}", path.display());
        Ok(file)
    }
}

impl Write for &AtomicFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let file = self.ensure_open()?;
        let mut handle: &File = &file;
        handle.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let file = self.slot().as_ref().map(|temp| Arc::clone(&temp.file));
        match file {
            Some(file) => (&*file).flush(),
            None => Ok(()),
        }
    }
}

impl Write for AtomicFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        <&AtomicFileWriter as Write>::write(&mut &*self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        <&AtomicFileWriter as Write>::flush(&mut &*self)
    }
}

impl Drop for AtomicFileWriter {
    fn drop(&mut self) {
        let slot = self.temp.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(temp) = slot.take() {
            warn!(
                "writer: {} dropped without close, leaving {}",
                self.target.display(),
                temp.path.display()
            );
        }
    }
}

#[cfg(unix)]
fn apply_mode(file: &File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn apply_mode(file: &File, mode: u32) -> io::Result<()> {
    let mut permissions = file.metadata()?.permissions();
    permissions.set_readonly(mode & 0o222 == 0);
    file.set_permissions(permissions)
}
