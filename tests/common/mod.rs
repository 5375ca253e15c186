#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sfxzip::InstallListener;
use sfxzip::zip::MetadataFooter;

/// Byte used for fake executable code; never forms a ZIP signature.
pub const EXE_FILL: u8 = 0x90;

struct Entry {
    name: String,
    raw: Vec<u8>,
    method: u16,
    crc: u32,
    declared: u64,
}

/// Writes ZIP containers by hand so sizes and records can be falsified.
#[derive(Default)]
pub struct ZipBuilder {
    entries: Vec<Entry>,
    comment: Vec<u8>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dir(mut self, name: &str) -> Self {
        self.entries.push(Entry {
            name: name.to_string(),
            raw: Vec::new(),
            method: 0,
            crc: 0,
            declared: 0,
        });
        self
    }

    pub fn file(self, name: &str, data: &[u8]) -> Self {
        self.file_declaring(name, data, data.len() as u64)
    }

    /// Stored entry whose central directory claims `declared` bytes.
    pub fn file_declaring(mut self, name: &str, data: &[u8], declared: u64) -> Self {
        self.entries.push(Entry {
            name: name.to_string(),
            raw: data.to_vec(),
            method: 0,
            crc: crc(data),
            declared,
        });
        self
    }

    pub fn deflated(mut self, name: &str, data: &[u8]) -> Self {
        let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        self.entries.push(Entry {
            name: name.to_string(),
            raw: enc.finish().unwrap(),
            method: 8,
            crc: crc(data),
            declared: data.len() as u64,
        });
        self
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut offsets = Vec::new();

        for entry in &self.entries {
            offsets.push(out.len() as u32);
            out.extend_from_slice(b"PK\x03\x04");
            out.write_u16::<LittleEndian>(20).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(entry.method).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0x21).unwrap();
            out.write_u32::<LittleEndian>(entry.crc).unwrap();
            out.write_u32::<LittleEndian>(entry.raw.len() as u32).unwrap();
            out.write_u32::<LittleEndian>(entry.declared as u32).unwrap();
            out.write_u16::<LittleEndian>(entry.name.len() as u16).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.extend_from_slice(entry.name.as_bytes());
            out.extend_from_slice(&entry.raw);
        }

        let cd_offset = out.len() as u32;
        for (entry, offset) in self.entries.iter().zip(&offsets) {
            out.extend_from_slice(b"PK\x01\x02");
            out.write_u16::<LittleEndian>(20).unwrap();
            out.write_u16::<LittleEndian>(20).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(entry.method).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0x21).unwrap();
            out.write_u32::<LittleEndian>(entry.crc).unwrap();
            out.write_u32::<LittleEndian>(entry.raw.len() as u32).unwrap();
            out.write_u32::<LittleEndian>(entry.declared as u32).unwrap();
            out.write_u16::<LittleEndian>(entry.name.len() as u16).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            let external = if entry.name.ends_with('/') { 0x10 } else { 0 };
            out.write_u32::<LittleEndian>(external).unwrap();
            out.write_u32::<LittleEndian>(*offset).unwrap();
            out.extend_from_slice(entry.name.as_bytes());
        }
        let cd_size = out.len() as u32 - cd_offset;

        let count = self.entries.len() as u16;
        out.extend_from_slice(b"PK\x05\x06");
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(count).unwrap();
        out.write_u16::<LittleEndian>(count).unwrap();
        out.write_u32::<LittleEndian>(cd_size).unwrap();
        out.write_u32::<LittleEndian>(cd_offset).unwrap();
        out.write_u16::<LittleEndian>(self.comment.len() as u16).unwrap();
        out.extend_from_slice(&self.comment);
        out
    }
}

fn crc(data: &[u8]) -> u32 {
    let mut crc = flate2::Crc::new();
    crc.update(data);
    crc.sum()
}

/// Small container with a directory and two files.
pub fn sample_container() -> Vec<u8> {
    ZipBuilder::new()
        .dir("app/")
        .file("app/readme.txt", b"hello from the payload")
        .deflated("app/bin/data.dat", &b"0123456789abcdef".repeat(512))
        .build()
}

/// Container of exactly `size` bytes: one stored file padded to fit.
pub fn container_of_size(size: usize) -> Vec<u8> {
    let overhead = ZipBuilder::new().file("payload.bin", b"").build().len();
    let container = ZipBuilder::new()
        .file("payload.bin", &vec![b'x'; size - overhead])
        .build();
    assert_eq!(container.len(), size);
    container
}

/// Fake executable bytes, starting with an MZ header.
pub fn exe_bytes(len: usize) -> Vec<u8> {
    let mut exe = vec![EXE_FILL; len];
    exe[..2].copy_from_slice(b"MZ");
    exe
}

/// `[exe][container][filler][footer]`, where `total` is the full length.
pub fn host_with_footer(container: &[u8], offset: usize, total: usize) -> Vec<u8> {
    let mut host = exe_bytes(offset);
    host.extend_from_slice(container);
    host.resize(total - MetadataFooter::SIZE, EXE_FILL);
    host.extend_from_slice(
        &MetadataFooter::new(offset as u64, container.len() as u64).to_bytes(),
    );
    assert_eq!(host.len(), total);
    host
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Progress(u8, String),
    Finished(bool, String),
    Error(String),
}

/// Listener that records every callback.
#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn percentages(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Progress(p, _) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Error(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn finished(&self) -> Vec<bool> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Finished(success, _) => Some(success),
                _ => None,
            })
            .collect()
    }
}

impl InstallListener for Recorder {
    fn on_progress(&self, percentage: u8, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Progress(percentage, message.to_string()));
    }

    fn on_finished(&self, success: bool, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Finished(success, message.to_string()));
    }

    fn on_error(&self, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Error(message.to_string()));
    }
}
