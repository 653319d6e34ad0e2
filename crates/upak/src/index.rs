//! Lazy archive index.
//!
//! The index is walked forward one directory record at a time and only as
//! far as a lookup needs. Progress is kept in [`PakIndex`] so the next lookup
//! resumes where the previous one stopped; records already scanned are
//! never read again.

use std::hash::BuildHasherDefault;
use std::io::{Read, Seek};

use hashbrown::hash_map::Entry;
use hashbrown::HashMap as FastHashMap;
use rustc_hash::FxHasher;
use tracing::{debug, trace};
use upak_common::BinaryReader;

use crate::format::record::min_directory_record_len;
use crate::format::{DirectoryRecord, PakFooter, FOOTER_SIZE};
use crate::{Error, Result};

type FxHashMap<K, V> = FastHashMap<K, V, BuildHasherDefault<FxHasher>>;

/// Where a named entry lives, as stated by its directory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSlot {
    /// Absolute offset of the entry's inline record.
    pub offset: u64,
    /// Compression method code from the directory record.
    pub compression_code: u32,
}

/// Snapshot of how far the index has been walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexProgress {
    /// Directory records decoded so far.
    pub records_scanned: u32,
    /// Directory records the index header declares.
    pub record_count: u32,
    /// Absolute position of the next unscanned directory record.
    pub resume_position: u64,
}

impl IndexProgress {
    /// Whether every directory record has been decoded.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.records_scanned >= self.record_count
    }
}

/// Incrementally populated name index of one archive session.
#[derive(Debug)]
pub struct PakIndex {
    footer: PakFooter,
    mount_point: String,
    progress: IndexProgress,
    slots: FxHashMap<String, IndexSlot>,
    /// Names in index order, without duplicates.
    names: Vec<String>,
}

impl PakIndex {
    /// Read the footer and the index header.
    ///
    /// No directory records are decoded yet.
    pub fn locate<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let footer = PakFooter::read(reader)?;
        let version = footer.version();

        reader.seek(footer.index_offset())?;
        let mount_point = reader.read_string()?;
        let record_count = reader.read_u32()?;
        let resume_position = reader.position();

        // The record count alone bounds the scan loop, so make sure the
        // bytes between here and the footer could actually hold that many.
        let footer_start = reader.len() - FOOTER_SIZE as u64;
        let available = footer_start.saturating_sub(resume_position);
        let needed = u64::from(record_count) * min_directory_record_len(version);
        if needed > available {
            return Err(Error::InvalidArchive(format!(
                "index declares {record_count} records ({needed} bytes minimum) \
                 but only {available} bytes precede the footer"
            )));
        }

        debug!(version, %mount_point, record_count, "opened PAK index");

        Ok(Self {
            footer,
            mount_point,
            progress: IndexProgress {
                records_scanned: 0,
                record_count,
                resume_position,
            },
            slots: FxHashMap::default(),
            names: Vec::new(),
        })
    }

    /// Format version from the footer.
    #[inline]
    pub fn version(&self) -> u32 {
        self.footer.version()
    }

    /// Mount point from the index header.
    #[inline]
    pub fn mount_point(&self) -> &str {
        &self.mount_point
    }

    /// Current scan progress.
    #[inline]
    pub fn progress(&self) -> IndexProgress {
        self.progress
    }

    /// Names scanned so far, in index order.
    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Look up a name already in the cache, without scanning.
    #[inline]
    pub fn cached(&self, name: &str) -> Option<IndexSlot> {
        self.slots.get(name).copied()
    }

    /// Resolve a name, scanning forward from the resume point if needed.
    ///
    /// Returns `None` once the whole index has been scanned without a match.
    pub fn lookup<R: Read + Seek>(
        &mut self,
        reader: &mut BinaryReader<R>,
        name: &str,
    ) -> Result<Option<IndexSlot>> {
        if let Some(slot) = self.cached(name) {
            return Ok(Some(slot));
        }
        self.scan(reader, Some(name))
    }

    /// Scan every remaining directory record.
    pub fn scan_all<R: Read + Seek>(&mut self, reader: &mut BinaryReader<R>) -> Result<()> {
        self.scan(reader, None).map(|_| ())
    }

    fn scan<R: Read + Seek>(
        &mut self,
        reader: &mut BinaryReader<R>,
        target: Option<&str>,
    ) -> Result<Option<IndexSlot>> {
        if self.progress.is_complete() {
            return Ok(None);
        }

        let version = self.version();
        let start = self.progress.records_scanned;
        reader.seek(self.progress.resume_position)?;

        while !self.progress.is_complete() {
            let record = DirectoryRecord::read(reader, version)?;
            // Commit only after the record decoded completely.
            self.progress.records_scanned += 1;
            self.progress.resume_position = reader.position();

            let found = target.is_some_and(|t| t == record.name);
            let slot = self.insert(record);
            if found {
                trace!(
                    scanned = self.progress.records_scanned - start,
                    "found target entry"
                );
                return Ok(Some(slot));
            }
        }

        debug!(
            scanned = self.progress.records_scanned - start,
            total = self.progress.record_count,
            "index fully scanned"
        );
        Ok(None)
    }

    /// Cache a record. The first record seen for a name wins.
    fn insert(&mut self, record: DirectoryRecord) -> IndexSlot {
        let slot = IndexSlot {
            offset: record.offset,
            compression_code: record.compression_code,
        };
        match self.slots.entry(record.name) {
            Entry::Occupied(existing) => {
                trace!(name = %existing.key(), "ignoring duplicate entry name");
                *existing.get()
            }
            Entry::Vacant(vacant) => {
                self.names.push(vacant.key().clone());
                vacant.insert(slot);
                slot
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::PakBuilder;

    fn ten_entries() -> Vec<u8> {
        let mut builder = PakBuilder::new(3);
        for i in 0..10 {
            builder = builder.stored(&format!("file{i}.txt"), format!("data {i}").as_bytes());
        }
        builder.build()
    }

    #[test]
    fn test_locate_reads_header_only() {
        let data = PakBuilder::new(3)
            .mount_point("../../../Game/")
            .stored("a", b"1")
            .stored("b", b"2")
            .build();
        let mut reader = BinaryReader::from_bytes(data);

        let index = PakIndex::locate(&mut reader).unwrap();
        assert_eq!(index.version(), 3);
        assert_eq!(index.mount_point(), "../../../Game/");
        assert_eq!(index.progress().record_count, 2);
        assert_eq!(index.progress().records_scanned, 0);
        assert!(index.names().is_empty());
    }

    #[test]
    fn test_targeted_lookup_stops_at_match() {
        let mut reader = BinaryReader::from_bytes(ten_entries());
        let mut index = PakIndex::locate(&mut reader).unwrap();

        let slot = index.lookup(&mut reader, "file3.txt").unwrap();
        assert!(slot.is_some());
        assert_eq!(index.progress().records_scanned, 4);
        assert_eq!(index.names().len(), 4);
    }

    #[test]
    fn test_resume_reads_only_unscanned_suffix() {
        let mut reader = BinaryReader::from_bytes(ten_entries());
        let mut index = PakIndex::locate(&mut reader).unwrap();

        index.lookup(&mut reader, "file2.txt").unwrap().unwrap();
        let resume = index.progress().resume_position;
        let reads_before = reader.read_calls();

        index.lookup(&mut reader, "file7.txt").unwrap().unwrap();
        // Records 3 through 7, four reads each for a stored entry: name
        // length, name bytes, offset and method.
        assert_eq!(reader.read_calls() - reads_before, 5 * 4);
        assert_eq!(index.progress().records_scanned, 8);
        assert!(index.progress().resume_position > resume);
    }

    #[test]
    fn test_cached_lookup_does_not_read() {
        let mut reader = BinaryReader::from_bytes(ten_entries());
        let mut index = PakIndex::locate(&mut reader).unwrap();

        let first = index.lookup(&mut reader, "file5.txt").unwrap();
        let reads = reader.read_calls();

        assert_eq!(index.lookup(&mut reader, "file5.txt").unwrap(), first);
        assert!(index.lookup(&mut reader, "file0.txt").unwrap().is_some());
        assert_eq!(reader.read_calls(), reads);
    }

    #[test]
    fn test_miss_exhausts_index() {
        let mut reader = BinaryReader::from_bytes(ten_entries());
        let mut index = PakIndex::locate(&mut reader).unwrap();

        assert_eq!(index.lookup(&mut reader, "missing").unwrap(), None);
        assert!(index.progress().is_complete());
        assert_eq!(index.names().len(), 10);

        // A second miss needs no reads at all.
        let reads = reader.read_calls();
        assert_eq!(index.lookup(&mut reader, "also-missing").unwrap(), None);
        assert_eq!(reader.read_calls(), reads);
    }

    #[test]
    fn test_scan_all_then_lookup() {
        let mut reader = BinaryReader::from_bytes(ten_entries());
        let mut index = PakIndex::locate(&mut reader).unwrap();

        index.lookup(&mut reader, "file1.txt").unwrap();
        index.scan_all(&mut reader).unwrap();
        let names: Vec<_> = (0..10).map(|i| format!("file{i}.txt")).collect();
        assert_eq!(index.names(), names.as_slice());

        // Scanning elsewhere does not disturb the cache.
        reader.seek(0).unwrap();
        assert!(index.cached("file9.txt").is_some());
    }

    #[test]
    fn test_duplicate_names_first_wins() {
        let data = PakBuilder::new(3)
            .stored("dup", b"first")
            .phantom("dup", 999)
            .build();
        let mut reader = BinaryReader::from_bytes(data);
        let mut index = PakIndex::locate(&mut reader).unwrap();

        index.scan_all(&mut reader).unwrap();
        assert_eq!(index.names(), ["dup".to_string()]);
        assert_eq!(index.cached("dup").unwrap().offset, 0);
        assert_eq!(index.progress().records_scanned, 2);
    }

    #[test]
    fn test_pathological_record_count() {
        let mut data = PakBuilder::new(3).stored("a", b"x").build();
        let footer_start = data.len() - FOOTER_SIZE;
        let index_offset = u64::from_le_bytes(
            data[footer_start + 8..footer_start + 16].try_into().unwrap(),
        ) as usize;
        // Mount point "../../../" is stored as 4 + 10 bytes.
        let count_at = index_offset + 14;
        data[count_at..count_at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        let mut reader = BinaryReader::from_bytes(data);

        let err = PakIndex::locate(&mut reader).unwrap_err();
        assert!(matches!(err, Error::InvalidArchive(_)), "{err}");
    }

    #[test]
    fn test_truncated_record_keeps_committed_state() {
        let mut builder = PakBuilder::new(3);
        for i in 0..3 {
            builder = builder.stored(&format!("n{i}"), b"abc");
        }
        let mut data = builder.build();
        let footer_start = data.len() - FOOTER_SIZE;
        let index_offset = u64::from_le_bytes(
            data[footer_start + 8..footer_start + 16].try_into().unwrap(),
        ) as usize;
        // Directory records start after the mount point (14 bytes) and the
        // count (4 bytes); each stored v3 record with a two-char name is
        // 4 + 3 + 8 + 16 + 4 + 20 + 5 = 60 bytes. Corrupt the third name length.
        let third = index_offset + 18 + 2 * 60;
        data[third..third + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        let mut reader = BinaryReader::from_bytes(data);
        let mut index = PakIndex::locate(&mut reader).unwrap();

        let err = index.lookup(&mut reader, "n2").unwrap_err();
        assert!(matches!(err, Error::Truncated { .. }), "{err}");
        assert_eq!(index.progress().records_scanned, 2);
        assert!(index.cached("n0").is_some());
        assert!(index.cached("n1").is_some());
    }
}
