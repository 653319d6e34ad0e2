//! Reader for Unreal Engine PAK archives.
//!
//! A PAK archive is a flat sequence of entries (an inline record followed by
//! the payload), an index listing every entry by name, and a fixed 44-byte
//! footer at the very end pointing at the index. This crate reads such
//! archives lazily:
//!
//! - Opening an archive reads nothing
//! - The footer and index header are read on first use
//! - Directory records are decoded only as far as a lookup needs, and a later
//!   lookup resumes where the previous one stopped
//! - Payloads are stored raw or as zlib blocks; other methods are reported
//!   as unsupported per entry
//!
//! Decryption and hash verification are not performed.
//!
//! # Example
//!
//! ```no_run
//! use upak::PakArchive;
//!
//! let mut archive = PakArchive::open("Game-Windows.pak")?;
//!
//! for name in archive.list_names()? {
//!     println!("{name}");
//! }
//!
//! if archive.contains("Config/DefaultGame.ini")? {
//!     let text = archive.extract_text("Config/DefaultGame.ini")?;
//!     println!("{text}");
//! }
//! # Ok::<(), upak::Error>(())
//! ```

mod archive;
mod decompress;
mod entry;
mod error;
pub mod format;
pub mod index;
mod payload;

#[cfg(test)]
mod test_support;

pub use archive::{MappedPakArchive, PakArchive};
pub use entry::PakEntry;
pub use error::{Error, Result};
pub use format::{CompressionBlock, CompressionMethod, PakFooter, FOOTER_SIZE, PAK_MAGIC};
pub use index::{IndexProgress, IndexSlot};
