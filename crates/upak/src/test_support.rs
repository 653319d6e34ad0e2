//! Synthetic archive construction for tests.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use zerocopy::IntoBytes;

use crate::format::PakFooter;

/// Field values for one encoded record.
#[derive(Debug, Clone)]
pub(crate) struct RecordSpec {
    pub offset: u64,
    pub compressed_size: u64,
    pub decompressed_size: u64,
    pub compression_code: u32,
    pub timestamp: u64,
    pub hash: [u8; 20],
    /// Absolute (start, end) offsets.
    pub blocks: Vec<(u64, u64)>,
    pub is_encrypted: bool,
    pub block_size: u32,
}

pub(crate) fn write_string(buf: &mut Vec<u8>, value: &str) {
    if value.is_empty() {
        buf.extend_from_slice(&0u32.to_le_bytes());
        return;
    }
    buf.extend_from_slice(&(value.len() as u32 + 1).to_le_bytes());
    buf.extend_from_slice(value.as_bytes());
    buf.push(0);
}

/// Encode a record with the field presence rules of `version`.
pub(crate) fn write_record(buf: &mut Vec<u8>, version: u32, name: Option<&str>, record: &RecordSpec) {
    if let Some(name) = name {
        write_string(buf, name);
    }
    buf.extend_from_slice(&record.offset.to_le_bytes());
    buf.extend_from_slice(&record.compressed_size.to_le_bytes());
    buf.extend_from_slice(&record.decompressed_size.to_le_bytes());
    buf.extend_from_slice(&record.compression_code.to_le_bytes());
    if version <= 1 {
        buf.extend_from_slice(&record.timestamp.to_le_bytes());
    }
    buf.extend_from_slice(&record.hash);
    if version >= 3 {
        if record.compression_code != 0 {
            buf.extend_from_slice(&(record.blocks.len() as u32).to_le_bytes());
            for (start, end) in &record.blocks {
                buf.extend_from_slice(&start.to_le_bytes());
                buf.extend_from_slice(&end.to_le_bytes());
            }
        }
        buf.push(u8::from(record.is_encrypted));
        buf.extend_from_slice(&record.block_size.to_le_bytes());
    }
}

pub(crate) fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

#[derive(Debug, Clone)]
struct TestEntry {
    name: String,
    compression_code: u32,
    /// Payload chunks as stored on disk.
    chunks: Vec<Vec<u8>>,
    decompressed_size: u64,
    is_encrypted: bool,
    block_size: u32,
}

/// Builds archives in the layout the reader expects: entries (inline record
/// followed by payload), then the index, then the footer.
#[derive(Debug, Clone)]
pub(crate) struct PakBuilder {
    version: u32,
    mount_point: String,
    entries: Vec<TestEntry>,
    /// Entries listed in the index without being written, with a fixed offset.
    phantom: Vec<(String, u64)>,
}

impl PakBuilder {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            mount_point: "../../../".to_string(),
            entries: Vec::new(),
            phantom: Vec::new(),
        }
    }

    pub fn mount_point(mut self, mount_point: &str) -> Self {
        self.mount_point = mount_point.to_string();
        self
    }

    pub fn stored(mut self, name: &str, data: &[u8]) -> Self {
        self.entries.push(TestEntry {
            name: name.to_string(),
            compression_code: 0,
            chunks: vec![data.to_vec()],
            decompressed_size: data.len() as u64,
            is_encrypted: false,
            block_size: 0,
        });
        self
    }

    /// Zlib entry split into independently compressed blocks of `block_size`
    /// plaintext bytes. Versions before 3 store one stream instead.
    pub fn zlib(mut self, name: &str, data: &[u8], block_size: usize) -> Self {
        let chunks = if self.version >= 3 {
            data.chunks(block_size.max(1)).map(zlib).collect()
        } else {
            vec![zlib(data)]
        };
        self.entries.push(TestEntry {
            name: name.to_string(),
            compression_code: 1,
            chunks,
            decompressed_size: data.len() as u64,
            is_encrypted: false,
            block_size: block_size as u32,
        });
        self
    }

    /// Entry with an arbitrary method code and pre-encoded chunks.
    pub fn raw(mut self, name: &str, code: u32, chunks: Vec<Vec<u8>>, decompressed_size: u64) -> Self {
        self.entries.push(TestEntry {
            name: name.to_string(),
            compression_code: code,
            chunks,
            decompressed_size,
            is_encrypted: false,
            block_size: 0,
        });
        self
    }

    /// Mark the most recently added entry as encrypted.
    pub fn encrypted(mut self) -> Self {
        if let Some(entry) = self.entries.last_mut() {
            entry.is_encrypted = true;
        }
        self
    }

    /// List a name in the index that points at `offset` without writing data.
    pub fn phantom(mut self, name: &str, offset: u64) -> Self {
        self.phantom.push((name.to_string(), offset));
        self
    }

    fn inline_header_len(&self, entry: &TestEntry) -> u64 {
        let mut len = 8 + 16 + 4 + 20;
        if self.version <= 1 {
            len += 8;
        }
        if self.version >= 3 {
            if entry.compression_code != 0 {
                len += 4 + 16 * entry.chunks.len() as u64;
            }
            len += 5;
        }
        len
    }

    fn spec_for(&self, entry: &TestEntry, offset: u64) -> RecordSpec {
        let data_start = offset + self.inline_header_len(entry);
        let mut blocks = Vec::new();
        let mut cursor = data_start;
        for chunk in &entry.chunks {
            blocks.push((cursor, cursor + chunk.len() as u64));
            cursor += chunk.len() as u64;
        }
        RecordSpec {
            offset,
            compressed_size: cursor - data_start,
            decompressed_size: entry.decompressed_size,
            compression_code: entry.compression_code,
            timestamp: 0,
            hash: [0; 20],
            blocks,
            is_encrypted: entry.is_encrypted,
            block_size: entry.block_size,
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut data = Vec::new();
        let mut directory = Vec::new();

        for entry in &self.entries {
            let offset = data.len() as u64;
            let spec = self.spec_for(entry, offset);
            write_record(&mut data, self.version, None, &spec);
            for chunk in &entry.chunks {
                data.extend_from_slice(chunk);
            }
            directory.push((entry.name.clone(), spec));
        }

        for (name, offset) in &self.phantom {
            let spec = RecordSpec {
                offset: *offset,
                compressed_size: 0,
                decompressed_size: 0,
                compression_code: 0,
                timestamp: 0,
                hash: [0; 20],
                blocks: Vec::new(),
                is_encrypted: false,
                block_size: 0,
            };
            directory.push((name.clone(), spec));
        }

        let index_offset = data.len() as u64;
        write_string(&mut data, &self.mount_point);
        data.extend_from_slice(&(directory.len() as u32).to_le_bytes());
        for (name, spec) in &directory {
            write_record(&mut data, self.version, Some(name), spec);
        }
        let index_size = data.len() as u64 - index_offset;

        let footer = PakFooter::new(self.version, index_offset, index_size, [0; 20]);
        data.extend_from_slice(footer.as_bytes());
        data
    }
}
