//! Record header codec.
//!
//! Every entry is described twice: once by a directory record inside the
//! index (with the entry name) and once by an inline record stored at the
//! entry's offset, right before its payload (without the name). Both share
//! one layout, decoded by [`decode_record`]:
//!
//! | field                     | width        | present when                         |
//! |---------------------------|--------------|--------------------------------------|
//! | name                      | 4 + len      | `includes_name`                      |
//! | offset                    | 8            | always                               |
//! | compressed size           | 8            | always (skipped in quick mode)       |
//! | decompressed size         | 8            | always (skipped in quick mode)       |
//! | compression method        | 4            | always                               |
//! | timestamp                 | 8            | version <= 1 (skipped in quick mode) |
//! | content hash              | 20           | always (skipped in quick mode)       |
//! | block count + blocks      | 4 + 16 * n   | version >= 3 and method != NONE      |
//! | encrypted flag            | 1            | version >= 3 (skipped in quick mode) |
//! | compression block size    | 4            | version >= 3 (skipped in quick mode) |
//!
//! Quick mode skips exactly the bytes a full read consumes. Both paths take
//! their widths from the constants below, so a field width change must be
//! made there and nowhere else.

use std::io::{Read, Seek};

use tracing::trace;
use upak_common::BinaryReader;

use super::{CompressionBlock, CompressionMethod};
use crate::{Error, Result};

/// Width of the compressed and decompressed size fields together.
const SIZE_FIELDS_LEN: u64 = 2 * 8;

/// Width of the legacy timestamp (version <= 1).
const TIMESTAMP_LEN: u64 = 8;

/// Width of the content hash.
pub const HASH_LEN: usize = 20;

/// Width of the encrypted flag plus the compression block size hint.
const TRAILER_LEN: u64 = 1 + 4;

/// Last version that stores a timestamp.
const LAST_TIMESTAMP_VERSION: u32 = 1;

/// First version that stores block tables and the encryption trailer.
const FIRST_BLOCK_TABLE_VERSION: u32 = 3;

#[inline]
fn has_timestamp(version: u32) -> bool {
    version <= LAST_TIMESTAMP_VERSION
}

#[inline]
fn has_block_table(version: u32) -> bool {
    version >= FIRST_BLOCK_TABLE_VERSION
}

/// How much of a record to materialise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Read only the name, offset and method; skip everything else.
    Quick,
    /// Read every field.
    Full,
}

/// Fields materialised only by a full read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDetails {
    /// Stored payload size.
    pub compressed_size: u64,
    /// Payload size after decompression.
    pub decompressed_size: u64,
    /// Legacy timestamp, present for version <= 1.
    pub timestamp: Option<u64>,
    /// Content hash (not verified).
    pub hash: [u8; HASH_LEN],
    /// Compression blocks in table order. Empty unless version >= 3 and the
    /// method is not NONE.
    pub blocks: Vec<CompressionBlock>,
    /// Whether the payload is encrypted. Always false before version 3.
    pub is_encrypted: bool,
    /// Compression block size hint, present for version >= 3.
    pub block_size: Option<u32>,
}

/// One decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Entry name, present when decoded with `includes_name`.
    pub name: Option<String>,
    /// Absolute offset of the entry's inline record.
    pub offset: u64,
    /// Raw compression method code.
    pub compression_code: u32,
    /// Present when decoded with [`ReadMode::Full`].
    pub details: Option<RecordDetails>,
}

impl Record {
    /// Decode the compression method code.
    pub fn compression_method(&self) -> Result<CompressionMethod> {
        CompressionMethod::try_from(self.compression_code)
            .map_err(|code| Error::UnsupportedCompression { code })
    }
}

/// Decode one record at the reader's position.
///
/// Field presence is fully determined by `(version, includes_name, mode)`.
pub fn decode_record<R: Read + Seek>(
    reader: &mut BinaryReader<R>,
    version: u32,
    includes_name: bool,
    mode: ReadMode,
) -> Result<Record> {
    let name = if includes_name {
        Some(reader.read_string()?)
    } else {
        None
    };

    let offset = reader.read_u64()?;

    let sizes = match mode {
        ReadMode::Quick => {
            reader.skip(SIZE_FIELDS_LEN)?;
            None
        }
        ReadMode::Full => Some((reader.read_u64()?, reader.read_u64()?)),
    };

    let compression_code = reader.read_u32()?;

    let timestamp = if has_timestamp(version) {
        match mode {
            ReadMode::Quick => {
                reader.skip(TIMESTAMP_LEN)?;
                None
            }
            ReadMode::Full => Some(reader.read_u64()?),
        }
    } else {
        None
    };

    let hash = match mode {
        ReadMode::Quick => {
            reader.skip(HASH_LEN as u64)?;
            None
        }
        ReadMode::Full => Some(reader.read_array::<HASH_LEN>()?),
    };

    let mut blocks = Vec::new();
    let mut is_encrypted = false;
    let mut block_size = None;

    if has_block_table(version) {
        if compression_code != CompressionMethod::None as u32 {
            let count = reader.read_u32()?;
            let table_len = u64::from(count) * CompressionBlock::ENCODED_LEN;
            match mode {
                ReadMode::Quick => reader.skip(table_len)?,
                ReadMode::Full => blocks = read_block_table(reader, count, table_len)?,
            }
        }

        match mode {
            ReadMode::Quick => reader.skip(TRAILER_LEN)?,
            ReadMode::Full => {
                is_encrypted = reader.read_u8()? > 0;
                block_size = Some(reader.read_u32()?);
            }
        }
    }

    let details = match (sizes, hash) {
        (Some((compressed_size, decompressed_size)), Some(hash)) => Some(RecordDetails {
            compressed_size,
            decompressed_size,
            timestamp,
            hash,
            blocks,
            is_encrypted,
            block_size,
        }),
        _ => None,
    };

    Ok(Record {
        name,
        offset,
        compression_code,
        details,
    })
}

fn read_block_table<R: Read + Seek>(
    reader: &mut BinaryReader<R>,
    count: u32,
    table_len: u64,
) -> Result<Vec<CompressionBlock>> {
    // Reject absurd counts before allocating the table.
    let available = reader.remaining();
    if table_len > available {
        return Err(Error::Truncated {
            needed: table_len,
            available,
        });
    }

    let mut blocks = Vec::with_capacity(count as usize);
    for index in 0..count {
        let start = reader.read_u64()?;
        let end = reader.read_u64()?;
        let block = CompressionBlock::from_offsets(start, end).ok_or_else(|| {
            Error::InvalidArchive(format!(
                "compression block {index} ends at {end} before its start {start}"
            ))
        })?;
        blocks.push(block);
    }
    Ok(blocks)
}

/// Smallest number of bytes a directory record can occupy in `version`.
///
/// Used to reject record counts the index region cannot possibly hold.
pub fn min_directory_record_len(version: u32) -> u64 {
    let mut len = 4 + 8 + SIZE_FIELDS_LEN + 4 + HASH_LEN as u64;
    if has_timestamp(version) {
        len += TIMESTAMP_LEN;
    }
    if has_block_table(version) {
        len += TRAILER_LEN;
    }
    len
}

/// Index entry: name and location of one archive member.
///
/// Decoded in quick mode, since walking the index only needs the name,
/// offset and method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    /// Entry name.
    pub name: String,
    /// Absolute offset of the entry's inline record.
    pub offset: u64,
    /// Raw compression method code.
    pub compression_code: u32,
}

impl DirectoryRecord {
    /// Decode a directory record at the reader's position.
    pub fn read<R: Read + Seek>(reader: &mut BinaryReader<R>, version: u32) -> Result<Self> {
        let record = decode_record(reader, version, true, ReadMode::Quick)?;
        trace!(name = ?record.name, offset = record.offset, "directory record");
        Ok(Self {
            name: record.name.unwrap_or_default(),
            offset: record.offset,
            compression_code: record.compression_code,
        })
    }
}

/// Record header restated at the entry's offset, ahead of its payload.
///
/// Decoded in full mode; it carries the authoritative sizes and block table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineRecord {
    /// Absolute offset of this record.
    pub offset: u64,
    /// Offset stored inside the record.
    pub stored_offset: u64,
    /// Absolute offset of the first payload byte.
    pub data_offset: u64,
    /// Raw compression method code.
    pub compression_code: u32,
    /// All fully decoded fields.
    pub details: RecordDetails,
}

impl InlineRecord {
    /// Seek to `offset` and decode the inline record found there.
    pub fn read_at<R: Read + Seek>(
        reader: &mut BinaryReader<R>,
        offset: u64,
        version: u32,
    ) -> Result<Self> {
        reader.seek(offset)?;
        let record = decode_record(reader, version, false, ReadMode::Full)?;
        let Some(details) = record.details else {
            return Err(Error::InvalidArchive(format!(
                "inline record at {offset} decoded without details"
            )));
        };

        Ok(Self {
            offset,
            stored_offset: record.offset,
            data_offset: reader.position(),
            compression_code: record.compression_code,
            details,
        })
    }

    /// Length of the encoded header.
    #[inline]
    pub fn header_len(&self) -> u64 {
        self.data_offset - self.offset
    }
}
