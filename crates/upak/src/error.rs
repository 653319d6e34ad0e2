//! Error types for the PAK crate.

use thiserror::Error;

use crate::format::CompressionMethod;

/// Errors that can occur when working with PAK archives.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the underlying source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Footer magic did not match.
    #[error("invalid PAK magic: expected {expected:#010x}, got {actual:#010x}")]
    InvalidMagic { expected: u32, actual: u32 },

    /// The source is too short to hold the footer.
    #[error("archive too small: {size} bytes cannot hold a PAK footer")]
    ArchiveTooSmall { size: u64 },

    /// Any other structural violation of the format.
    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    /// A read asked for more bytes than remain.
    #[error("truncated input: needed {needed} bytes but only {available} available")]
    Truncated { needed: u64, available: u64 },

    /// No entry with this name exists in the index.
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// Compression method that is recognised but not implemented, or not recognised at all.
    #[error("unsupported compression method: {}", describe_method(*code))]
    UnsupportedCompression { code: u32 },

    /// A compressed payload failed to inflate or had the wrong size.
    #[error("payload decode error: {0}")]
    PayloadDecode(String),
}

impl Error {
    /// Whether this error means the bytes are not a well-formed archive.
    pub fn is_invalid_archive(&self) -> bool {
        matches!(
            self,
            Self::InvalidMagic { .. } | Self::ArchiveTooSmall { .. } | Self::InvalidArchive(_)
        )
    }
}

impl From<upak_common::Error> for Error {
    fn from(err: upak_common::Error) -> Self {
        match err {
            upak_common::Error::UnexpectedEof { needed, available } => {
                Self::Truncated { needed, available }
            }
            upak_common::Error::Io(e) => Self::Io(e),
        }
    }
}

fn describe_method(code: u32) -> String {
    match CompressionMethod::try_from(code) {
        Ok(method) => format!("{method} ({code})"),
        Err(_) => format!("unknown ({code})"),
    }
}

/// Result type for PAK operations.
pub type Result<T> = std::result::Result<T, Error>;
