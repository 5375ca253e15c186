//! Structural soundness checks for a copied-out container.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::io::{LocalFileReader, ReadAt};
use crate::zip::{ContainerReader, EndOfCentralDirectory, LFH_SIGNATURE};

/// Non-empty file entries decoded as a spot check.
pub const SAMPLE_ENTRIES: usize = 5;

/// Whether the file at `path` looks like a complete, sound container.
pub async fn validate(path: &Path) -> bool {
    match check(path).await {
        Ok(()) => true,
        Err(e) => {
            debug!("{} failed validation: {}", path.display(), e);
            false
        }
    }
}

/// Like [`validate`], but says what is wrong.
pub async fn check(path: &Path) -> Result<()> {
    let reader = Arc::new(LocalFileReader::new(path)?);
    check_container(reader).await
}

/// Validate any container source.
///
/// Checks the leading local file header, the trailing End of Central
/// Directory and the directory it describes, then decodes the first
/// [`SAMPLE_ENTRIES`] non-empty files and compares their lengths with the
/// declared sizes. This is a sample, not a full verification.
///
/// The End of Central Directory need not occupy the last 22 bytes: a
/// record followed by a comment passes when its comment length accounts
/// for every byte up to EOF.
pub async fn check_container<R: ReadAt>(reader: Arc<R>) -> Result<()> {
    let size = reader.size();
    if size < EndOfCentralDirectory::SIZE as u64 {
        return Err(Error::invalid(format!(
            "{} bytes is too small to be a container",
            size
        )));
    }

    let mut header = [0u8; 4];
    reader.read_exact_at(0, &mut header).await?;
    if header != LFH_SIGNATURE {
        return Err(Error::invalid("container does not start with a local file header"));
    }

    let container = ContainerReader::new(reader);
    let directory = container.directory().await?;

    let sample = directory
        .entries
        .iter()
        .filter(|e| !e.is_directory && e.declared_size() > 0)
        .take(SAMPLE_ENTRIES);
    for entry in sample {
        let data = container.read_entry(entry).await?;
        if data.len() as u64 != entry.declared_size() {
            return Err(Error::invalid(format!(
                "'{}' decodes to {} bytes but declares {}",
                entry.file_name,
                data.len(),
                entry.declared_size()
            )));
        }
    }

    debug!(
        "container of {} bytes with {} entries passed validation",
        size,
        directory.entries.len()
    );
    Ok(())
}
