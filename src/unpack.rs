//! Materializing container entries under an installation directory.

use std::io;
use std::path::{Component, Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::io::LocalFileReader;
use crate::zip::{ContainerEntry, ContainerReader};

/// Result of a completed extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionOutcome {
    /// Files written; directories are not counted.
    pub files_written: usize,
    pub success: bool,
}

/// Extract every entry of the container at `container_path` into
/// `target_dir`.
///
/// All-or-nothing: the first entry that fails to decode, to match its
/// declared size, or to be written durably aborts the whole extraction,
/// and whatever sits at that entry's path is removed.
pub async fn extract(container_path: &Path, target_dir: &Path) -> Result<ExtractionOutcome> {
    extract_with(container_path, target_dir, |_, _, _| {}).await
}

/// Like [`extract`], calling `on_entry(index, total, entry)` before each
/// entry is processed.
pub async fn extract_with<F>(
    container_path: &Path,
    target_dir: &Path,
    mut on_entry: F,
) -> Result<ExtractionOutcome>
where
    F: FnMut(usize, usize, &ContainerEntry),
{
    let container = ContainerReader::open(container_path)?;
    let entries = container.list_entries().await?;

    fs::create_dir_all(target_dir)
        .await
        .map_err(|e| Error::io_at(target_dir, e))?;

    let total = entries.len();
    let mut files_written = 0;
    for (index, entry) in entries.iter().enumerate() {
        on_entry(index, total, entry);
        let path = target_dir.join(sanitize_entry_path(&entry.file_name)?);

        if entry.is_directory {
            debug!("creating directory {}", path.display());
            fs::create_dir_all(&path)
                .await
                .map_err(|e| Error::extraction(&path, format!("cannot create directory: {}", e)))?;
            continue;
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::extraction(parent, format!("cannot create directory: {}", e)))?;
        }

        let declared = entry.declared_size();
        let written = match decode_entry(&container, entry, &path).await {
            Ok(data) => {
                debug!("writing {} ({} bytes)", path.display(), declared);
                write_file(&path, &data, declared).await
            }
            Err(e) => Err(e),
        };
        // Nothing may be left at the entry's path, not even an older copy
        if let Err(e) = written {
            remove_partial(&path).await;
            return Err(e);
        }
        files_written += 1;
    }

    if is_empty_dir(target_dir).await? {
        return Err(Error::extraction(
            target_dir,
            "nothing was extracted into the target directory",
        ));
    }

    info!(
        "extracted {} files ({} entries) into {}",
        files_written,
        total,
        target_dir.display()
    );
    Ok(ExtractionOutcome {
        files_written,
        success: true,
    })
}

/// Turn an entry name into a relative path that cannot leave the target.
pub fn sanitize_entry_path(name: &str) -> Result<PathBuf> {
    if name.contains('\0') {
        return Err(Error::extraction(name, "entry name contains a NUL byte"));
    }

    let mut path = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::extraction(
                    name,
                    "entry path escapes the installation directory",
                ));
            }
        }
    }

    if path.as_os_str().is_empty() {
        return Err(Error::extraction(name, "entry has an empty path"));
    }
    Ok(path)
}

/// Decode `entry`, requiring exactly its declared size.
async fn decode_entry(
    container: &ContainerReader<LocalFileReader>,
    entry: &ContainerEntry,
    path: &Path,
) -> Result<Vec<u8>> {
    let data = container
        .read_entry(entry)
        .await
        .map_err(|e| Error::extraction(path, e.to_string()))?;
    let declared = entry.declared_size();
    if data.len() as u64 != declared {
        return Err(Error::extraction(
            path,
            format!("decoded {} bytes but entry declares {}", data.len(), declared),
        ));
    }
    Ok(data)
}

async fn write_file(path: &Path, data: &[u8], declared: u64) -> Result<()> {
    let write_err = |e: io::Error| Error::extraction(path, format!("write failed: {}", e));

    let mut file = File::create(path).await.map_err(write_err)?;
    file.write_all(data).await.map_err(write_err)?;
    file.flush().await.map_err(write_err)?;
    file.sync_all().await.map_err(write_err)?;
    drop(file);

    let on_disk = fs::metadata(path).await.map_err(write_err)?.len();
    if on_disk != declared {
        return Err(Error::extraction(
            path,
            format!("file is {} bytes on disk, expected {}", on_disk, declared),
        ));
    }
    Ok(())
}

async fn remove_partial(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!("removed partial file {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("could not remove partial file {}: {}", path.display(), e),
    }
}

async fn is_empty_dir(dir: &Path) -> Result<bool> {
    let mut entries = fs::read_dir(dir).await.map_err(|e| Error::io_at(dir, e))?;
    let first = entries
        .next_entry()
        .await
        .map_err(|e| Error::io_at(dir, e))?;
    Ok(first.is_none())
}
