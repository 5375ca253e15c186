//! Copying the located container out of the host executable.

use std::io::{self, SeekFrom};
use std::path::Path;

use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::validate;

/// Bytes moved per read/write round, bounding memory use.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Copy `size` bytes at `offset` of `host_path` into `dest_path`.
///
/// Any existing destination is replaced. On failure the destination is
/// removed: I/O trouble gives [`Error::IoAt`], a copy whose length or
/// structure is off gives [`Error::IntegrityMismatch`].
pub async fn copy_range(
    host_path: &Path,
    offset: u64,
    size: u64,
    dest_path: &Path,
) -> Result<()> {
    let host_size = fs::metadata(host_path)
        .await
        .map_err(|e| Error::io_at(host_path, e))?
        .len();
    let fits = offset.checked_add(size).is_some_and(|end| end <= host_size);
    if size == 0 || !fits {
        return Err(Error::InvalidRange {
            offset,
            size,
            available: host_size,
        });
    }

    debug!(
        "copying {} bytes at offset {} from {} to {}",
        size,
        offset,
        host_path.display(),
        dest_path.display()
    );
    if let Err(e) = copy_chunks(host_path, offset, size, dest_path).await {
        remove_partial(dest_path).await;
        return Err(e);
    }

    let written = fs::metadata(dest_path)
        .await
        .map_err(|e| Error::io_at(dest_path, e))?
        .len();
    if written != size {
        remove_partial(dest_path).await;
        return Err(Error::IntegrityMismatch {
            path: dest_path.to_path_buf(),
            reason: format!("copied file has {} bytes, expected {}", written, size),
        });
    }

    if let Err(e) = validate::check(dest_path).await {
        remove_partial(dest_path).await;
        return Err(Error::IntegrityMismatch {
            path: dest_path.to_path_buf(),
            reason: e.to_string(),
        });
    }

    Ok(())
}

async fn copy_chunks(host_path: &Path, offset: u64, size: u64, dest_path: &Path) -> Result<()> {
    let mut source = File::open(host_path)
        .await
        .map_err(|e| Error::io_at(host_path, e))?;
    source
        .seek(SeekFrom::Start(offset))
        .await
        .map_err(|e| Error::io_at(host_path, e))?;

    let mut dest = File::create(dest_path)
        .await
        .map_err(|e| Error::io_at(dest_path, e))?;

    let mut buf = vec![0u8; CHUNK_SIZE.min(size as usize)];
    let mut remaining = size;
    while remaining > 0 {
        let want = (buf.len() as u64).min(remaining) as usize;
        let read = read_chunk(&mut source, &mut buf[..want])
            .await
            .map_err(|e| Error::io_at(host_path, e))?;
        if read != want {
            return Err(Error::io_at(
                host_path,
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("read {} of {} bytes", read, want),
                ),
            ));
        }

        let written = write_chunk(&mut dest, &buf[..read])
            .await
            .map_err(|e| Error::io_at(dest_path, e))?;
        if written != read {
            return Err(Error::io_at(
                dest_path,
                io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("wrote {} of {} bytes", written, read),
                ),
            ));
        }

        remaining -= read as u64;
    }

    dest.flush().await.map_err(|e| Error::io_at(dest_path, e))?;
    dest.sync_all()
        .await
        .map_err(|e| Error::io_at(dest_path, e))?;
    Ok(())
}

/// Read until `buf` is full or the source runs dry.
async fn read_chunk(source: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Write as much of `buf` as the destination accepts, returning the count.
async fn write_chunk(dest: &mut File, buf: &[u8]) -> io::Result<usize> {
    let mut written = 0;
    while written < buf.len() {
        let n = dest.write(&buf[written..]).await?;
        if n == 0 {
            break;
        }
        written += n;
    }
    Ok(written)
}

async fn remove_partial(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!("removed partial copy {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("could not remove partial copy {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn range_past_end_is_rejected_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let host = dir.path().join("host.bin");
        std::fs::write(&host, vec![0u8; 100]).unwrap();
        let dest = dir.path().join("out.zip");

        let err = copy_range(&host, 90, 20, &dest).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidRange {
                offset: 90,
                size: 20,
                available: 100
            }
        ));
        assert!(!dest.exists());

        let err = copy_range(&host, 0, 0, &dest).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRange { .. }));

        let err = copy_range(&host, u64::MAX, 2, &dest).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRange { .. }));
    }

    #[tokio::test]
    async fn non_container_bytes_are_removed_after_copy() {
        let dir = tempfile::tempdir().unwrap();
        let host = dir.path().join("host.bin");
        std::fs::write(&host, vec![0xAAu8; 3 * CHUNK_SIZE + 17]).unwrap();
        let dest = dir.path().join("out.zip");

        let err = copy_range(&host, 5, 2 * CHUNK_SIZE as u64 + 3, &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IntegrityMismatch { .. }));
        assert!(!dest.exists());
    }
}
