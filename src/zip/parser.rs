//! Low-level container parser.
//!
//! Reads the trailing End of Central Directory record, then the central
//! directory it points at, from any source implementing [`ReadAt`].
//! Structural inconsistencies (directory outside the file, entry count
//! disagreeing with the EOCD, 64-bit extended records) are reported as
//! [`Error::InvalidContainer`].

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::io::ReadAt;

use super::structures::*;

/// Parsed central directory together with the record that described it.
#[derive(Debug, Clone)]
pub struct Directory {
    pub eocd: EndOfCentralDirectory,
    /// Offset of the EOCD record within the container.
    pub eocd_offset: u64,
    pub entries: Vec<ContainerEntry>,
}

/// Low-level container parser, generic over the data source.
///
/// Typically used through [`ContainerReader`](super::ContainerReader).
pub struct ContainerParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the container in bytes
    size: u64,
}

impl<R: ReadAt> ContainerParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find the End of Central Directory record that ends exactly at EOF.
    ///
    /// The fast path checks the last 22 bytes for a comment-less record;
    /// otherwise the tail is searched backwards for a record whose comment
    /// length accounts for every remaining byte.
    ///
    /// # Returns
    ///
    /// A tuple of (EOCD record, offset of EOCD in file).
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let min = EndOfCentralDirectory::SIZE as u64;
        if self.size < min {
            return Err(Error::invalid(format!(
                "{} bytes is smaller than an End of Central Directory record",
                self.size
            )));
        }

        let offset = self.size - min;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.reader.read_exact_at(offset, &mut buf).await?;

        // Check for signature and zero-length comment
        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && buf[20..22] == [0, 0] {
            let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
            return Ok((eocd, offset));
        }

        let search_size = (EndOfCentralDirectory::MAX_SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_exact_at(search_start, &mut buf).await?;

        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd = EndOfCentralDirectory::from_bytes(
                        &buf[i..i + EndOfCentralDirectory::SIZE],
                    )?;
                    return Ok((eocd, search_start + i as u64));
                }
            }
        }

        Err(Error::invalid("no trailing End of Central Directory record"))
    }

    /// Read and cross-check the whole central directory.
    ///
    /// Requires `cd_size > 0`, `cd_offset < size`, the directory to end at
    /// or before the EOCD record, and exactly `total_entries` records in
    /// `cd_size` bytes.
    pub async fn read_directory(&self) -> Result<Directory> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        if eocd.disk_number != 0 || eocd.disk_with_cd != 0 {
            return Err(Error::invalid("multi-volume archives are not supported"));
        }
        if eocd.cd_size == 0xFFFF_FFFF
            || eocd.cd_offset == 0xFFFF_FFFF
            || eocd.total_entries == 0xFFFF
        {
            return Err(Error::invalid("ZIP64 archives are not supported"));
        }

        let cd_offset = eocd.cd_offset as u64;
        let cd_size = eocd.cd_size as u64;
        if cd_size == 0 {
            return Err(Error::invalid("central directory is empty"));
        }
        if cd_offset >= self.size {
            return Err(Error::invalid(format!(
                "central directory offset {} is outside the {}-byte container",
                cd_offset, self.size
            )));
        }
        // eocd_offset == size - 22 - comment_len
        if cd_offset + cd_size > eocd_offset {
            return Err(Error::invalid(format!(
                "central directory [{}, {}) overlaps the End of Central Directory at {}",
                cd_offset,
                cd_offset + cd_size,
                eocd_offset
            )));
        }

        let mut cd_data = vec![0u8; cd_size as usize];
        self.reader.read_exact_at(cd_offset, &mut cd_data).await?;

        let mut entries = Vec::with_capacity(eocd.total_entries as usize);
        let mut cursor = Cursor::new(cd_data.as_slice());
        while (cursor.position() as usize) < cd_data.len() {
            let entry = self.parse_cdfh(&mut cursor)?;
            entries.push(entry);
        }

        if entries.len() != eocd.total_entries as usize {
            return Err(Error::invalid(format!(
                "central directory holds {} records but End of Central Directory declares {}",
                entries.len(),
                eocd.total_entries
            )));
        }

        Ok(Directory {
            eocd,
            eocd_offset,
            entries,
        })
    }

    /// Parse a Central Directory File Header from a cursor.
    fn parse_cdfh(&self, cursor: &mut Cursor<&[u8]>) -> Result<ContainerEntry> {
        let remaining = cursor.get_ref().len() as u64 - cursor.position();
        if remaining < CDFH_MIN_SIZE as u64 {
            return Err(Error::invalid(format!(
                "{} trailing bytes in central directory",
                remaining
            )));
        }

        // Read and verify the signature (PK\x01\x02)
        let mut sig = [0u8; 4];
        cursor.read_exact(&mut sig)?;
        if sig != CDFH_SIGNATURE {
            return Err(Error::invalid("bad Central Directory File Header signature"));
        }

        // Read fixed-size header fields
        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()?;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;
        let file_comment_length = cursor.read_u16::<LittleEndian>()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let _external_attrs = cursor.read_u32::<LittleEndian>()?;
        let lfh_offset = cursor.read_u32::<LittleEndian>()?;

        // Read the variable-length file name
        let mut file_name_bytes = vec![0u8; file_name_length as usize];
        cursor.read_exact(&mut file_name_bytes)?;
        // Use lossy conversion to handle non-UTF8 filenames gracefully
        let file_name = String::from_utf8_lossy(&file_name_bytes).to_string();

        if flags & 0x0001 != 0 {
            return Err(Error::invalid(format!("entry '{}' is encrypted", file_name)));
        }
        if compressed_size == 0xFFFF_FFFF
            || uncompressed_size == 0xFFFF_FFFF
            || lfh_offset == 0xFFFF_FFFF
        {
            return Err(Error::invalid(format!(
                "entry '{}' uses ZIP64 extended sizes",
                file_name
            )));
        }

        // Directory entries end with '/'
        let is_directory = file_name.ends_with('/');

        // Skip the extra field and the file comment
        let skip = extra_field_length as u64 + file_comment_length as u64;
        let end = cursor.position() + skip;
        if end > cursor.get_ref().len() as u64 {
            return Err(Error::invalid(format!(
                "entry '{}' runs past the end of the central directory",
                file_name
            )));
        }
        cursor.set_position(end);

        Ok(ContainerEntry {
            file_name,
            compression_method: CompressionMethod::from_u16(compression_method),
            compressed_size: compressed_size as u64,
            uncompressed_size: uncompressed_size as u64,
            crc32,
            lfh_offset: lfh_offset as u64,
            last_mod_time,
            last_mod_date,
            is_directory,
        })
    }

    /// Get the actual data offset for a file entry.
    ///
    /// The Local File Header has variable-length fields that may differ from
    /// the central directory record, so it is read to find where the entry's
    /// data begins.
    pub async fn get_data_offset(&self, entry: &ContainerEntry) -> Result<u64> {
        let mut lfh_buf = vec![0u8; LFH_SIZE];
        self.reader
            .read_exact_at(entry.lfh_offset, &mut lfh_buf)
            .await?;

        // Verify LFH signature (PK\x03\x04)
        if &lfh_buf[0..4] != LFH_SIGNATURE {
            return Err(Error::invalid(format!(
                "bad Local File Header for '{}'",
                entry.file_name
            )));
        }

        // Read the variable field lengths from fixed positions in LFH
        let mut cursor = Cursor::new(&lfh_buf);
        cursor.set_position(26); // Offset to filename length field

        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        // Data starts after: LFH (30 bytes) + filename + extra field
        let data_offset =
            entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length;

        if data_offset + entry.compressed_size > self.size {
            return Err(Error::invalid(format!(
                "data of '{}' runs past the end of the container",
                entry.file_name
            )));
        }

        Ok(data_offset)
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}
