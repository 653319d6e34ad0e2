//! PAK archive entry.

use std::path::{Path, PathBuf};

use crate::format::record::HASH_LEN;
use crate::format::{CompressionBlock, CompressionMethod, InlineRecord};

/// Metadata of one entry, taken from its inline record.
///
/// This describes the file, not its contents. Use
/// [`PakArchive::extract`](crate::PakArchive::extract) to get the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PakEntry {
    name: String,
    offset: u64,
    stored_offset: u64,
    data_offset: u64,
    compressed_size: u64,
    decompressed_size: u64,
    compression_code: u32,
    is_encrypted: bool,
    blocks: Vec<CompressionBlock>,
    block_size: Option<u32>,
    hash: [u8; HASH_LEN],
    timestamp: Option<u64>,
}

impl PakEntry {
    pub(crate) fn from_inline(name: String, record: InlineRecord) -> Self {
        let details = record.details;
        Self {
            name,
            offset: record.offset,
            stored_offset: record.stored_offset,
            data_offset: record.data_offset,
            compressed_size: details.compressed_size,
            decompressed_size: details.decompressed_size,
            compression_code: record.compression_code,
            is_encrypted: details.is_encrypted,
            blocks: details.blocks,
            block_size: details.block_size,
            hash: details.hash,
            timestamp: details.timestamp,
        }
    }

    /// Get the entry name as stored in the index.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the absolute offset of the inline record.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Get the offset field as written inside the inline record.
    ///
    /// Some writers store zero here; retrieval always uses [`offset`](Self::offset).
    #[inline]
    pub fn stored_offset(&self) -> u64 {
        self.stored_offset
    }

    /// Get the absolute offset of the first payload byte.
    #[inline]
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Get the stored size in bytes.
    #[inline]
    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    /// Get the size after decompression in bytes.
    #[inline]
    pub fn decompressed_size(&self) -> u64 {
        self.decompressed_size
    }

    /// Get the raw compression method code.
    #[inline]
    pub fn compression_code(&self) -> u32 {
        self.compression_code
    }

    /// Get the compression method, if the code is a known one.
    #[inline]
    pub fn compression_method(&self) -> Option<CompressionMethod> {
        CompressionMethod::try_from(self.compression_code).ok()
    }

    /// Check whether the payload is stored compressed.
    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.compression_method() != Some(CompressionMethod::None)
    }

    /// Check if the entry is flagged as encrypted.
    ///
    /// Encrypted payloads are extracted as-is, without decryption.
    #[inline]
    pub fn is_encrypted(&self) -> bool {
        self.is_encrypted
    }

    /// Get the compression block table.
    #[inline]
    pub fn blocks(&self) -> &[CompressionBlock] {
        &self.blocks
    }

    /// Get the compression block size hint (version 3 and later).
    #[inline]
    pub fn block_size(&self) -> Option<u32> {
        self.block_size
    }

    /// Get the stored content hash. It is not verified.
    #[inline]
    pub fn hash(&self) -> &[u8; HASH_LEN] {
        &self.hash
    }

    /// Get the legacy timestamp (version 1 and earlier).
    #[inline]
    pub fn timestamp(&self) -> Option<u64> {
        self.timestamp
    }

    /// Get the relative output path for extraction.
    ///
    /// Backslashes become forward slashes and leading separators are dropped,
    /// so the result always stays below the extraction root.
    pub fn output_path(&self) -> PathBuf {
        let normalized = self.name.replace('\\', "/");
        normalized
            .split('/')
            .filter(|part| !part.is_empty() && *part != "." && *part != "..")
            .collect()
    }

    /// Get the file extension, if any.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
    }
}
