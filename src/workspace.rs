//! Scratch storage for one installation attempt.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{Error, Result};

const SCRATCH_ARCHIVE: &str = "payload.zip";

/// Scratch directory plus the path the container copy is written to.
///
/// Both are removed by [`release`](Self::release), which also runs on drop,
/// so every exit path of an attempt cleans up.
pub struct TempWorkspace {
    dir: Option<TempDir>,
    path: PathBuf,
    archive_path: PathBuf,
}

impl TempWorkspace {
    /// Acquire a fresh workspace under the platform temp location.
    pub fn acquire() -> Result<Self> {
        Self::acquire_in(&std::env::temp_dir())
    }

    pub fn acquire_in(parent: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("sfxzip-")
            .tempdir_in(parent)
            .map_err(|e| Error::workspace(parent, e))?;
        let path = dir.path().to_path_buf();
        let archive_path = path.join(SCRATCH_ARCHIVE);
        debug!("acquired workspace {}", path.display());

        Ok(Self {
            dir: Some(dir),
            path,
            archive_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the copied-out container lives.
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn is_released(&self) -> bool {
        self.dir.is_none()
    }

    /// Delete the scratch archive and remove the directory recursively.
    /// Calling this again after a release does nothing.
    pub fn release(&mut self) -> Result<()> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };

        match std::fs::remove_file(&self.archive_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "could not delete scratch archive {}: {}",
                self.archive_path.display(),
                e
            ),
        }

        dir.close().map_err(|e| Error::workspace(&self.path, e))?;
        debug!("released workspace {}", self.path.display());
        Ok(())
    }
}

impl Drop for TempWorkspace {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("workspace cleanup failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_removes_everything_and_is_idempotent() {
        let parent = tempfile::tempdir().unwrap();
        let mut workspace = TempWorkspace::acquire_in(parent.path()).unwrap();
        let dir = workspace.path().to_path_buf();
        assert!(workspace.archive_path().starts_with(&dir));

        std::fs::write(workspace.archive_path(), b"PK\x03\x04").unwrap();
        std::fs::create_dir_all(dir.join("nested/deeper")).unwrap();

        workspace.release().unwrap();
        assert!(workspace.is_released());
        assert!(!dir.exists());

        workspace.release().unwrap();
    }

    #[test]
    fn drop_releases_on_early_exit() {
        let parent = tempfile::tempdir().unwrap();
        let dir = {
            let workspace = TempWorkspace::acquire_in(parent.path()).unwrap();
            std::fs::write(workspace.archive_path(), b"partial").unwrap();
            workspace.path().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn workspaces_do_not_collide() {
        let parent = tempfile::tempdir().unwrap();
        let a = TempWorkspace::acquire_in(parent.path()).unwrap();
        let b = TempWorkspace::acquire_in(parent.path()).unwrap();
        assert_ne!(a.path(), b.path());
    }
}
