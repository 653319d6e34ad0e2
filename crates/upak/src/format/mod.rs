//! PAK format structures.
//!
//! This module contains the on-disk structures of a PAK archive: the
//! trailing footer, the record codec shared by directory and inline
//! records, and the compression block table.

mod block;
mod footer;
pub mod record;

use std::fmt;

pub use block::CompressionBlock;
pub use footer::{PakFooter, FOOTER_SIZE, PAK_MAGIC};
pub use record::{DirectoryRecord, InlineRecord, ReadMode, Record, RecordDetails};

/// Compression methods a PAK record can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CompressionMethod {
    /// No compression (stored).
    None = 0,
    /// Zlib streams, one per compression block.
    Zlib = 1,
    /// Recognised, not implemented.
    BiasMemory = 2,
    /// Recognised, not implemented.
    BiasSpeed = 3,
}

impl CompressionMethod {
    /// The method's canonical upper-case name.
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Zlib => "ZLIB",
            Self::BiasMemory => "BIAS_MEMORY",
            Self::BiasSpeed => "BIAS_SPEED",
        }
    }

    /// Whether payloads using this method can be decoded.
    pub fn is_supported(self) -> bool {
        matches!(self, Self::None | Self::Zlib)
    }
}

impl TryFrom<u32> for CompressionMethod {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Zlib),
            2 => Ok(Self::BiasMemory),
            3 => Ok(Self::BiasSpeed),
            other => Err(other),
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
