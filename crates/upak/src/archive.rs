//! PAK archive session.
//!
//! A [`PakArchive`] owns one seekable source plus the lazily built index.
//! Nothing is parsed on open; the footer and index header are read by the
//! first operation that needs them, and directory records only as far as
//! each lookup requires.
//!
//! Every operation moves the shared cursor and may extend the index, so a
//! session takes `&mut self` throughout. Callers that need concurrent access
//! should open one session per thread over the same storage.

use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use memmap2::Mmap;
use tracing::debug;
use upak_common::{latin1, BinaryReader};

use crate::entry::PakEntry;
use crate::format::InlineRecord;
use crate::index::{IndexProgress, IndexSlot, PakIndex};
use crate::payload::read_payload;
use crate::{Error, Result};

/// Archive session over a memory-mapped file.
pub type MappedPakArchive = PakArchive<Cursor<Mmap>>;

/// Lazy, seek-based reader for one PAK archive.
pub struct PakArchive<R> {
    /// Archive name used in diagnostics
    name: String,
    reader: BinaryReader<R>,
    /// Populated on first use
    index: Option<PakIndex>,
}

impl MappedPakArchive {
    /// Memory-map a PAK file.
    ///
    /// The footer is not read until the first operation.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // SAFETY: the map is only read. The file must not be truncated by
        // another process while the session is alive.
        let mmap = unsafe { Mmap::map(&file)? };

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let mut archive = Self::new(Cursor::new(mmap))?;
        archive.name = name;
        Ok(archive)
    }
}

impl PakArchive<Cursor<Vec<u8>>> {
    /// Wrap an archive held in memory.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            name: "memory".to_string(),
            reader: BinaryReader::from_bytes(data),
            index: None,
        }
    }
}

impl<R: Read + Seek> PakArchive<R> {
    /// Wrap any seekable source.
    pub fn new(source: R) -> Result<Self> {
        Ok(Self {
            name: "stream".to_string(),
            reader: BinaryReader::new(source)?,
            index: None,
        })
    }

    /// Get the archive name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Format version from the footer.
    pub fn version(&mut self) -> Result<u32> {
        let (index, _) = self.session()?;
        Ok(index.version())
    }

    /// Mount point from the index header. Retrieval does not use it.
    pub fn mount_point(&mut self) -> Result<&str> {
        let (index, _) = self.session()?;
        Ok(index.mount_point())
    }

    /// Number of directory records the index declares.
    pub fn record_count(&mut self) -> Result<u32> {
        let (index, _) = self.session()?;
        Ok(index.progress().record_count)
    }

    /// How far the index has been scanned, or `None` before the footer has
    /// been read.
    pub fn index_progress(&self) -> Option<IndexProgress> {
        self.index.as_ref().map(PakIndex::progress)
    }

    /// Number of read operations issued against the source so far.
    #[inline]
    pub fn read_calls(&self) -> u64 {
        self.reader.read_calls()
    }

    /// All entry names in index order.
    ///
    /// Scans whatever part of the index has not been scanned yet; later
    /// calls are served from the cache.
    pub fn list_names(&mut self) -> Result<&[String]> {
        let (index, reader) = self.session()?;
        index.scan_all(reader)?;
        Ok(index.names())
    }

    /// Check whether an entry exists, scanning only as far as needed.
    pub fn contains(&mut self, name: &str) -> Result<bool> {
        Ok(self.lookup(name)?.is_some())
    }

    /// Absolute offset of an entry's inline record.
    pub fn offset_of(&mut self, name: &str) -> Result<Option<u64>> {
        Ok(self.lookup(name)?.map(|slot| slot.offset))
    }

    /// Metadata for one entry, decoded from its inline record.
    pub fn entry(&mut self, name: &str) -> Result<PakEntry> {
        let (slot, version) = self.resolve(name)?;
        let record = InlineRecord::read_at(&mut self.reader, slot.offset, version)?;
        Ok(PakEntry::from_inline(name.to_string(), record))
    }

    /// Metadata for every entry, in index order.
    pub fn entries(&mut self) -> Result<Vec<PakEntry>> {
        let names = self.list_names()?.to_vec();
        names.iter().map(|name| self.entry(name)).collect()
    }

    /// Extract an entry's bytes, decompressing if needed.
    ///
    /// Encrypted entries are returned undecrypted; check
    /// [`PakEntry::is_encrypted`] first if that matters.
    pub fn extract(&mut self, name: &str) -> Result<Vec<u8>> {
        let (slot, version) = self.resolve(name)?;
        let record = InlineRecord::read_at(&mut self.reader, slot.offset, version)?;
        read_payload(&mut self.reader, name, slot, &record)
    }

    /// Extract an entry and decode it as Latin-1 text.
    pub fn extract_text(&mut self, name: &str) -> Result<String> {
        let bytes = self.extract(name)?;
        Ok(latin1::decode(&bytes))
    }

    /// Consume the session and return the underlying source.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    fn session(&mut self) -> Result<(&mut PakIndex, &mut BinaryReader<R>)> {
        let index = match self.index.take() {
            Some(index) => index,
            None => {
                debug!(archive = %self.name, "reading PAK footer");
                PakIndex::locate(&mut self.reader)?
            }
        };
        Ok((self.index.insert(index), &mut self.reader))
    }

    fn lookup(&mut self, name: &str) -> Result<Option<IndexSlot>> {
        let (index, reader) = self.session()?;
        index.lookup(reader, name)
    }

    fn resolve(&mut self, name: &str) -> Result<(IndexSlot, u32)> {
        let (index, reader) = self.session()?;
        let version = index.version();
        match index.lookup(reader, name)? {
            Some(slot) => Ok((slot, version)),
            None => Err(Error::EntryNotFound(name.to_string())),
        }
    }
}

impl<R> std::fmt::Debug for PakArchive<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PakArchive")
            .field("name", &self.name)
            .field("progress", &self.index.as_ref().map(PakIndex::progress))
            .finish()
    }
}
