use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::error::{Error, Result};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;
    /// Largest possible record: fixed part plus a maximal comment.
    pub const MAX_SIZE: usize = Self::SIZE + u16::MAX as usize;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::invalid("truncated End of Central Directory"));
        }

        // Verify signature
        if &data[0..4] != Self::SIGNATURE {
            return Err(Error::invalid("bad End of Central Directory signature"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Total length of the record including its trailing comment.
    pub fn record_len(&self) -> u64 {
        Self::SIZE as u64 + self.comment_len as u64
    }
}

/// Trailing record an installer build writes after the appended container,
/// giving its exact position without any scanning.
///
/// Layout (little-endian, 34 bytes): magic, archive offset (u64),
/// archive size (u64), metadata block size (u32).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataFooter {
    pub archive_offset: u64,
    pub archive_size: u64,
    pub metadata_block_size: u32,
}

impl MetadataFooter {
    pub const MAGIC: &'static [u8; 14] = b"AUSIC_ZIP_INFO";
    pub const SIZE: usize = 34;

    pub fn new(archive_offset: u64, archive_size: u64) -> Self {
        Self {
            archive_offset,
            archive_size,
            metadata_block_size: Self::SIZE as u32,
        }
    }

    /// Decode a footer, returning `None` when the magic is absent.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE || &data[..14] != Self::MAGIC {
            return None;
        }

        let mut cursor = Cursor::new(&data[14..Self::SIZE]);
        Some(Self {
            archive_offset: cursor.read_u64::<LittleEndian>().ok()?,
            archive_size: cursor.read_u64::<LittleEndian>().ok()?,
            metadata_block_size: cursor.read_u32::<LittleEndian>().ok()?,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(Self::MAGIC);
        // Writes into a Vec cannot fail
        let _ = buf.write_u64::<LittleEndian>(self.archive_offset);
        let _ = buf.write_u64::<LittleEndian>(self.archive_size);
        let _ = buf.write_u32::<LittleEndian>(self.metadata_block_size);
        buf
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// One file or directory record of a container
#[derive(Debug, Clone)]
pub struct ContainerEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub is_directory: bool,
}

impl ContainerEntry {
    /// Size the entry claims to decode to.
    pub fn declared_size(&self) -> u64 {
        self.uncompressed_size
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}
