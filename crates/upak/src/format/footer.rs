//! Archive footer.

use std::io::{Read, Seek};

use tracing::debug;
use upak_common::BinaryReader;
use zerocopy::byteorder::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{Error, Result};

/// Footer magic number.
pub const PAK_MAGIC: u32 = 0x5A6F12E1;

/// Size of the footer in bytes. The footer always occupies the last
/// `FOOTER_SIZE` bytes of the archive.
pub const FOOTER_SIZE: usize = 44;

/// Fixed-size trailer at the end of every archive.
///
/// The index hash is carried but never verified.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct PakFooter {
    /// Must equal [`PAK_MAGIC`].
    pub magic: U32,
    /// Format version; controls record field presence.
    pub version: U32,
    /// Absolute offset of the index.
    pub index_offset: U64,
    /// Index length in bytes (informational).
    pub index_size: U64,
    /// SHA-1 of the index (informational).
    pub index_hash: [u8; 20],
}

const _: () = assert!(std::mem::size_of::<PakFooter>() == FOOTER_SIZE);

impl PakFooter {
    /// Build a footer with the standard magic.
    pub fn new(version: u32, index_offset: u64, index_size: u64, index_hash: [u8; 20]) -> Self {
        Self {
            magic: U32::new(PAK_MAGIC),
            version: U32::new(version),
            index_offset: U64::new(index_offset),
            index_size: U64::new(index_size),
            index_hash,
        }
    }

    /// Read and validate the footer from the last [`FOOTER_SIZE`] bytes.
    ///
    /// Leaves the reader positioned at the end of the archive.
    pub fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let size = reader.len();
        let footer_start = size
            .checked_sub(FOOTER_SIZE as u64)
            .ok_or(Error::ArchiveTooSmall { size })?;

        reader.seek(footer_start)?;
        let bytes = reader.read_array::<FOOTER_SIZE>()?;
        let footer =
            Self::read_from_bytes(&bytes).map_err(|_| Error::ArchiveTooSmall { size })?;

        let magic = footer.magic.get();
        if magic != PAK_MAGIC {
            return Err(Error::InvalidMagic {
                expected: PAK_MAGIC,
                actual: magic,
            });
        }

        let index_offset = footer.index_offset.get();
        if index_offset >= footer_start {
            return Err(Error::InvalidArchive(format!(
                "index offset {index_offset} is not before the footer at {footer_start}"
            )));
        }

        let index_size = footer.index_size.get();
        if index_size > footer_start - index_offset {
            return Err(Error::InvalidArchive(format!(
                "index of {index_size} bytes at {index_offset} overlaps the footer at {footer_start}"
            )));
        }

        debug!(
            version = footer.version.get(),
            index_offset,
            index_size,
            "located PAK footer"
        );

        Ok(footer)
    }

    /// Format version.
    #[inline]
    pub fn version(&self) -> u32 {
        self.version.get()
    }

    /// Absolute offset of the index.
    #[inline]
    pub fn index_offset(&self) -> u64 {
        self.index_offset.get()
    }

    /// Index length in bytes.
    #[inline]
    pub fn index_size(&self) -> u64 {
        self.index_size.get()
    }
}
