//! Building an installer: append a container to an executable and record
//! where it went in a metadata footer.

use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufReader};
use tracing::info;

use crate::error::{Error, Result};
use crate::payload::CHUNK_SIZE;
use crate::validate;
use crate::zip::MetadataFooter;

#[derive(Debug, Clone)]
pub struct AppendReport {
    pub output: PathBuf,
    /// Where the container starts in the output.
    pub archive_offset: u64,
    pub archive_size: u64,
    pub footer: Option<MetadataFooter>,
}

/// Append the container at `zip_path` to the executable at `exe_path`,
/// writing the result to `output_path` (which may be `exe_path` itself).
///
/// The container must pass validation first. With `with_footer` a
/// [`MetadataFooter`] pointing at the container is written last.
pub async fn append_archive(
    exe_path: &Path,
    zip_path: &Path,
    output_path: &Path,
    with_footer: bool,
) -> Result<AppendReport> {
    validate::check(zip_path).await?;

    let archive_size = fs::metadata(zip_path)
        .await
        .map_err(|e| Error::io_at(zip_path, e))?
        .len();

    if !same_file(exe_path, output_path).await {
        fs::copy(exe_path, output_path)
            .await
            .map_err(|e| Error::io_at(output_path, e))?;
    }
    let archive_offset = fs::metadata(output_path)
        .await
        .map_err(|e| Error::io_at(output_path, e))?
        .len();

    let mut output = OpenOptions::new()
        .append(true)
        .open(output_path)
        .await
        .map_err(|e| Error::io_at(output_path, e))?;

    let zip_file = File::open(zip_path)
        .await
        .map_err(|e| Error::io_at(zip_path, e))?;
    let mut zip_reader = BufReader::with_capacity(CHUNK_SIZE, zip_file);
    let copied = tokio::io::copy_buf(&mut zip_reader, &mut output)
        .await
        .map_err(|e| Error::io_at(output_path, e))?;
    if copied != archive_size {
        return Err(Error::IntegrityMismatch {
            path: output_path.to_path_buf(),
            reason: format!("appended {} of {} container bytes", copied, archive_size),
        });
    }

    let footer = with_footer.then(|| MetadataFooter::new(archive_offset, archive_size));
    if let Some(footer) = &footer {
        output
            .write_all(&footer.to_bytes())
            .await
            .map_err(|e| Error::io_at(output_path, e))?;
    }

    output
        .flush()
        .await
        .map_err(|e| Error::io_at(output_path, e))?;
    output
        .sync_all()
        .await
        .map_err(|e| Error::io_at(output_path, e))?;

    info!(
        "appended {} bytes at offset {} to {}{}",
        archive_size,
        archive_offset,
        output_path.display(),
        if footer.is_some() { " with footer" } else { "" }
    );

    Ok(AppendReport {
        output: output_path.to_path_buf(),
        archive_offset,
        archive_size,
        footer,
    })
}

async fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
