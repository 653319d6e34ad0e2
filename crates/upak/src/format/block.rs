//! Compression block table entries.

/// One independently compressed byte range of a payload.
///
/// Coordinates are absolute offsets into the archive. Blocks are decoded in
/// table order; their physical placement in the file is irrelevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionBlock {
    /// Absolute offset of the first byte.
    pub start: u64,
    /// Length in bytes.
    pub size: u64,
}

impl CompressionBlock {
    /// Width of one stored table entry: start and end offsets.
    pub const ENCODED_LEN: u64 = 2 * 8;

    /// Build a block from the stored start and end offsets.
    ///
    /// Returns `None` when `end` precedes `start`.
    pub fn from_offsets(start: u64, end: u64) -> Option<Self> {
        end.checked_sub(start).map(|size| Self { start, size })
    }

    /// Absolute offset one past the last byte.
    #[inline]
    pub fn end(&self) -> u64 {
        self.start + self.size
    }
}
