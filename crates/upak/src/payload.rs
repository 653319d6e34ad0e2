//! Payload resolution: turning an inline record into entry bytes.

use std::io::{Read, Seek};

use tracing::{trace, warn};
use upak_common::BinaryReader;

use crate::decompress::{decompress_zlib, decompress_zlib_sized, MAX_PREALLOCATION};
use crate::format::{CompressionMethod, InlineRecord};
use crate::index::IndexSlot;
use crate::{Error, Result};

/// Read and decode the payload described by `record`.
///
/// The directory record's method governs decoding and must agree with the
/// inline record's. Encrypted payloads are returned undecrypted.
pub(crate) fn read_payload<R: Read + Seek>(
    reader: &mut BinaryReader<R>,
    name: &str,
    slot: IndexSlot,
    record: &InlineRecord,
) -> Result<Vec<u8>> {
    if record.compression_code != slot.compression_code {
        return Err(Error::InvalidArchive(format!(
            "{name}: directory record declares compression method {} but inline record declares {}",
            slot.compression_code, record.compression_code
        )));
    }

    let method = CompressionMethod::try_from(slot.compression_code)
        .map_err(|code| Error::UnsupportedCompression { code })?;

    if record.details.is_encrypted {
        warn!(name, "entry is encrypted; returning payload undecrypted");
    }

    trace!(
        name,
        %method,
        offset = record.offset,
        compressed = record.details.compressed_size,
        decompressed = record.details.decompressed_size,
        "resolving payload"
    );

    match method {
        CompressionMethod::None => read_stored(reader, record),
        CompressionMethod::Zlib => read_zlib(reader, record),
        CompressionMethod::BiasMemory | CompressionMethod::BiasSpeed => {
            Err(Error::UnsupportedCompression {
                code: method as u32,
            })
        }
    }
}

fn read_stored<R: Read + Seek>(
    reader: &mut BinaryReader<R>,
    record: &InlineRecord,
) -> Result<Vec<u8>> {
    reader.seek(record.data_offset)?;
    Ok(reader.read_bytes(to_usize(record.details.compressed_size)?)?)
}

fn read_zlib<R: Read + Seek>(
    reader: &mut BinaryReader<R>,
    record: &InlineRecord,
) -> Result<Vec<u8>> {
    let details = &record.details;
    let expected = to_usize(details.decompressed_size)?;

    // Versions before 3 have no block table: the payload is a single stream
    // right after the inline record.
    if details.blocks.is_empty() && details.compressed_size > 0 {
        reader.seek(record.data_offset)?;
        let stream = reader.read_bytes(to_usize(details.compressed_size)?)?;
        return decompress_zlib_sized(&stream, expected);
    }

    let mut output = Vec::with_capacity(expected.min(MAX_PREALLOCATION));
    for (index, block) in details.blocks.iter().enumerate() {
        reader.seek(block.start)?;
        let chunk = reader.read_bytes(to_usize(block.size)?)?;
        let left = (expected - output.len()) as u64;
        let inflated = decompress_zlib(&chunk, left, &mut output)?;
        trace!(block = index, start = block.start, size = block.size, inflated, "inflated block");
    }

    if output.len() != expected {
        return Err(Error::PayloadDecode(format!(
            "zlib blocks inflated to {} bytes, record declares {}",
            output.len(),
            expected
        )));
    }
    Ok(output)
}

fn to_usize(size: u64) -> Result<usize> {
    usize::try_from(size)
        .map_err(|_| Error::InvalidArchive(format!("size {size} exceeds the address space")))
}
