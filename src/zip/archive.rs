use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::io::{LocalFileReader, ReadAt};

use super::codec;
use super::parser::{ContainerParser, Directory};
use super::structures::ContainerEntry;

/// Container reader: lists entries and decodes their content on demand.
pub struct ContainerReader<R: ReadAt> {
    parser: ContainerParser<R>,
}

impl ContainerReader<LocalFileReader> {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Arc::new(LocalFileReader::new(path)?)))
    }
}

impl<R: ReadAt> ContainerReader<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ContainerParser::new(reader),
        }
    }

    /// Read the central directory with all structural cross-checks applied.
    pub async fn directory(&self) -> Result<Directory> {
        self.parser.read_directory().await
    }

    /// List all entries in the container, in directory order.
    pub async fn list_entries(&self) -> Result<Vec<ContainerEntry>> {
        Ok(self.parser.read_directory().await?.entries)
    }

    /// Decode an entry's content into memory.
    ///
    /// The returned length is whatever the data decodes to; comparing it to
    /// the declared size is up to the caller.
    pub async fn read_entry(&self, entry: &ContainerEntry) -> Result<Vec<u8>> {
        if entry.is_directory {
            return Ok(Vec::new());
        }

        let data_offset = self.parser.get_data_offset(entry).await?;

        let mut raw = vec![0u8; entry.compressed_size as usize];
        self.parser
            .reader()
            .read_exact_at(data_offset, &mut raw)
            .await?;

        codec::decode(entry.compression_method, &raw, entry.declared_size())
    }
}
