use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::Result;

/// A downloaded file that only lives until it has been handed to the requester.
///
/// The file is removed by [`TransientFile::release`] or, failing that, when the guard
/// is dropped. Dropping covers error paths and cancellation (the owning future is
/// dropped mid-transfer), so partial output never outlives its operation.
#[derive(Debug)]
pub struct TransientFile {
    path: PathBuf,
    armed: bool,
}

impl TransientFile {
    /// Reserve `dir/name` for a download. Nothing is created except `dir`.
    pub fn reserve(dir: &Path, name: &str) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(name),
            armed: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Track the path the source actually wrote, dropping the reserved one.
    pub fn adopt(&mut self, written: PathBuf) {
        if written == self.path {
            return;
        }
        remove_quietly(&self.path);
        self.path = written;
    }

    /// Delete the file now.
    pub async fn release(mut self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove transient file");
            }
        }
        // A release dropped before this point still removes the file in Drop.
        self.armed = false;
    }
}

impl Drop for TransientFile {
    fn drop(&mut self) {
        if self.armed {
            remove_quietly(&self.path);
        }
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove transient file");
        }
    }
}
