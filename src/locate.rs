//! Locating the container embedded in a host executable.
//!
//! Three strategies are tried in order, each only when the previous one
//! produced nothing plausible:
//!
//! 1. the metadata footer written by the installer build,
//! 2. a backward scan of the file tail for an End of Central Directory
//!    record whose directory offsets lead back to a local file header,
//! 3. a brute-force backward scan for a local file header, accepted only
//!    when the host ends with an End of Central Directory record.
//!
//! Strategies 2 and 3 can be fooled by coincidental signature bytes inside
//! the executable itself; the copy step's validation is what catches that.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::io::{LocalFileReader, ReadAt};
use crate::zip::{EndOfCentralDirectory, LFH_SIGNATURE, MetadataFooter};

/// Window read per step of the brute-force scan.
const SCAN_CHUNK: u64 = 1024 * 1024;

/// Which strategy found the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateTier {
    Footer,
    DirectoryScan,
    SignatureScan,
}

impl fmt::Display for LocateTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LocateTier::Footer => "metadata footer",
            LocateTier::DirectoryScan => "end-of-directory scan",
            LocateTier::SignatureScan => "signature scan",
        };
        f.write_str(name)
    }
}

/// Byte range of the container inside the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLocation {
    pub offset: u64,
    pub size: u64,
    pub tier: LocateTier,
}

impl ArchiveLocation {
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

#[derive(Debug, Clone)]
pub struct LocatorOptions {
    /// Tail bytes searched for an End of Central Directory record.
    pub directory_window: u64,
    /// Maximum distance from EOF covered by the brute-force scan.
    pub signature_scan_limit: u64,
}

impl Default for LocatorOptions {
    fn default() -> Self {
        Self {
            directory_window: EndOfCentralDirectory::MAX_SIZE as u64,
            signature_scan_limit: 200 * 1024 * 1024,
        }
    }
}

/// Locate the container in the executable at `host_path`.
pub async fn locate(host_path: &Path) -> Result<ArchiveLocation> {
    locate_with(host_path, LocatorOptions::default()).await
}

pub async fn locate_with(host_path: &Path, options: LocatorOptions) -> Result<ArchiveLocation> {
    let locator = ArchiveLocator::open(host_path)?.with_options(options);
    match locator.locate().await? {
        Some(location) => Ok(location),
        None => Err(Error::NotFound {
            path: host_path.to_path_buf(),
        }),
    }
}

pub struct ArchiveLocator<R: ReadAt> {
    reader: Arc<R>,
    size: u64,
    options: LocatorOptions,
}

impl ArchiveLocator<LocalFileReader> {
    pub fn open(host_path: &Path) -> Result<Self> {
        Ok(Self::new(Arc::new(LocalFileReader::new(host_path)?)))
    }
}

impl<R: ReadAt> ArchiveLocator<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self {
            reader,
            size,
            options: LocatorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LocatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the strategies in priority order.
    ///
    /// Returns `Ok(None)` when none of them finds a plausible container;
    /// read failures are errors.
    pub async fn locate(&self) -> Result<Option<ArchiveLocation>> {
        debug!("locating embedded container in {} bytes", self.size);

        let found = match self.from_footer().await? {
            Some(location) => Some(location),
            None => match self.from_directory_scan().await? {
                Some(location) => Some(location),
                None => self.from_signature_scan().await?,
            },
        };

        match &found {
            Some(location) => info!(
                "container found by {} at offset {} ({} bytes)",
                location.tier, location.offset, location.size
            ),
            None => debug!("no strategy located a container"),
        }
        Ok(found)
    }

    /// Trust the trailing metadata footer, after cross-checking both ends
    /// of the range it describes.
    pub async fn from_footer(&self) -> Result<Option<ArchiveLocation>> {
        let footer_size = MetadataFooter::SIZE as u64;
        if self.size < footer_size {
            return Ok(None);
        }

        let mut buf = [0u8; MetadataFooter::SIZE];
        self.reader
            .read_exact_at(self.size - footer_size, &mut buf)
            .await?;
        let Some(footer) = MetadataFooter::from_bytes(&buf) else {
            debug!("no metadata footer");
            return Ok(None);
        };

        let limit = self.size.checked_sub(footer.metadata_block_size as u64);
        let end = footer.archive_offset.checked_add(footer.archive_size);
        let end = match (limit, end) {
            (Some(limit), Some(end))
                if end <= limit && footer.archive_size >= EndOfCentralDirectory::SIZE as u64 =>
            {
                end
            }
            _ => {
                debug!(
                    "metadata footer range {}+{} does not fit in {} bytes",
                    footer.archive_offset, footer.archive_size, self.size
                );
                return Ok(None);
            }
        };

        if !self.signature_at(footer.archive_offset, LFH_SIGNATURE).await? {
            debug!("no local file header at footer offset {}", footer.archive_offset);
            return Ok(None);
        }
        let eocd_offset = end - EndOfCentralDirectory::SIZE as u64;
        if !self
            .signature_at(eocd_offset, EndOfCentralDirectory::SIGNATURE)
            .await?
        {
            debug!("no End of Central Directory at {} per footer", eocd_offset);
            return Ok(None);
        }

        Ok(Some(ArchiveLocation {
            offset: footer.archive_offset,
            size: footer.archive_size,
            tier: LocateTier::Footer,
        }))
    }

    /// Derive the range from the last plausible End of Central Directory
    /// record in the file tail. Records may be followed by a comment, so
    /// every position in the window is a candidate.
    pub async fn from_directory_scan(&self) -> Result<Option<ArchiveLocation>> {
        let record = EndOfCentralDirectory::SIZE;
        let window = self.options.directory_window.min(self.size);
        if window < record as u64 {
            return Ok(None);
        }

        let window_start = self.size - window;
        let mut buf = vec![0u8; window as usize];
        self.reader.read_exact_at(window_start, &mut buf).await?;

        for i in (0..=buf.len() - record).rev() {
            if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
                continue;
            }

            let eocd = EndOfCentralDirectory::from_bytes(&buf[i..i + record])?;
            let position = window_start + i as u64;
            let directory_span = eocd.cd_size as u64 + eocd.cd_offset as u64;

            let Some(start) = position.checked_sub(directory_span) else {
                debug!("EOCD at {} points before the start of the file", position);
                continue;
            };
            let end = position + eocd.record_len();
            let size = end - start;
            if start >= self.size || size == 0 || size > self.size || end > self.size {
                debug!("EOCD at {} gives implausible range {}..{}", position, start, end);
                continue;
            }
            if !self.signature_at(start, LFH_SIGNATURE).await? {
                debug!("EOCD at {} leads to {} without a local file header", position, start);
                continue;
            }

            return Ok(Some(ArchiveLocation {
                offset: start,
                size,
                tier: LocateTier::DirectoryScan,
            }));
        }

        debug!("no usable End of Central Directory in the last {} bytes", window);
        Ok(None)
    }

    /// Last resort: the local file header nearest the end of the file,
    /// provided the file itself ends with an End of Central Directory.
    pub async fn from_signature_scan(&self) -> Result<Option<ArchiveLocation>> {
        let record = EndOfCentralDirectory::SIZE as u64;
        if self.size < record {
            return Ok(None);
        }
        // The trailing record position does not depend on the candidate
        if !self
            .signature_at(self.size - record, EndOfCentralDirectory::SIGNATURE)
            .await?
        {
            debug!("host does not end with an End of Central Directory record");
            return Ok(None);
        }

        let sig_len = LFH_SIGNATURE.len() as u64;
        let floor = self.size - self.options.signature_scan_limit.min(self.size);
        let mut hi = self.size - sig_len + 1;

        while hi > floor {
            let lo = hi.saturating_sub(SCAN_CHUNK).max(floor);
            // Overlap so signatures straddling the window edge are seen
            let read_end = (hi + sig_len - 1).min(self.size);
            let mut buf = vec![0u8; (read_end - lo) as usize];
            self.reader.read_exact_at(lo, &mut buf).await?;

            for position in (lo..hi).rev() {
                let i = (position - lo) as usize;
                if &buf[i..i + sig_len as usize] == LFH_SIGNATURE {
                    return Ok(Some(ArchiveLocation {
                        offset: position,
                        size: self.size - position,
                        tier: LocateTier::SignatureScan,
                    }));
                }
            }
            hi = lo;
        }

        debug!("no local file header within {} bytes of the end", self.size - floor);
        Ok(None)
    }

    async fn signature_at(&self, offset: u64, signature: &[u8]) -> Result<bool> {
        let Some(end) = offset.checked_add(signature.len() as u64) else {
            return Ok(false);
        };
        if end > self.size {
            return Ok(false);
        }
        let mut buf = [0u8; 4];
        let buf = &mut buf[..signature.len()];
        self.reader.read_exact_at(offset, buf).await?;
        Ok(&buf[..] == signature)
    }
}
