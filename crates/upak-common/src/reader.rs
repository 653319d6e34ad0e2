//! Positioned binary reader over a seekable source.
//!
//! This module provides [`BinaryReader`], a cursor-like type that reads
//! little-endian integers, raw byte runs and length-prefixed strings from
//! anything implementing `Read + Seek`: an in-memory buffer, a file, or a
//! memory map wrapped in a `Cursor`.

use std::io::{self, Cursor, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::{latin1, Error, Result};

/// A binary reader that tracks its absolute position in a seekable source.
///
/// Every read and skip is checked against the source length before anything
/// is consumed or allocated, so a malformed length field fails with
/// [`Error::UnexpectedEof`] instead of reading garbage or allocating an
/// absurd buffer.
///
/// # Example
///
/// ```
/// use upak_common::BinaryReader;
///
/// let data = vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
/// let mut reader = BinaryReader::from_bytes(data);
///
/// assert_eq!(reader.read_u32().unwrap(), 0x04030201);
/// assert_eq!(reader.read_u32().unwrap(), 0x08070605);
/// assert!(reader.is_empty());
/// ```
#[derive(Debug)]
pub struct BinaryReader<R> {
    inner: R,
    position: u64,
    len: u64,
    /// Whether `inner` is known to sit at `position`.
    synced: bool,
    read_calls: u64,
}

impl BinaryReader<Cursor<Vec<u8>>> {
    /// Create a reader over an owned in-memory buffer.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let len = data.len() as u64;
        Self {
            inner: Cursor::new(data),
            position: 0,
            len,
            synced: true,
            read_calls: 0,
        }
    }
}

impl<R: Read + Seek> BinaryReader<R> {
    /// Create a reader over a seekable source, starting at position 0.
    ///
    /// The source length is measured once here by seeking to its end.
    pub fn new(mut inner: R) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner,
            position: 0,
            len,
            synced: true,
            read_calls: 0,
        })
    }

    /// Get the current absolute position.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Get the total length of the source.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Get the number of bytes remaining after the current position.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.position)
    }

    /// Check if there are no more bytes to read.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.position >= self.len
    }

    /// Number of read operations issued against the source so far.
    ///
    /// Skips and seeks are not counted.
    #[inline]
    pub fn read_calls(&self) -> u64 {
        self.read_calls
    }

    /// Seek to an absolute position.
    ///
    /// Positions past the end of the source are rejected.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        if position > self.len {
            return Err(Error::UnexpectedEof {
                needed: position,
                available: self.len,
            });
        }
        if position != self.position {
            self.position = position;
            self.synced = false;
        }
        Ok(())
    }

    /// Advance the position without reading.
    pub fn skip(&mut self, count: u64) -> Result<()> {
        self.ensure(count)?;
        if count > 0 {
            self.position += count;
            self.synced = false;
        }
        Ok(())
    }

    /// Read exactly `count` bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.read_with(count as u64, |inner| {
            buf.resize(count, 0);
            inner.read_exact(&mut buf)
        })?;
        Ok(buf)
    }

    /// Read a fixed-size byte array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_with(N as u64, |inner| inner.read_exact(&mut buf))?;
        Ok(buf)
    }

    /// Read a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_with(1, |inner| inner.read_u8())
    }

    /// Read a signed byte.
    #[inline]
    pub fn read_i8(&mut self) -> Result<i8> {
        self.read_with(1, |inner| inner.read_i8())
    }

    /// Read a little-endian u16.
    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_with(2, |inner| inner.read_u16::<LittleEndian>())
    }

    /// Read a little-endian i16.
    #[inline]
    pub fn read_i16(&mut self) -> Result<i16> {
        self.read_with(2, |inner| inner.read_i16::<LittleEndian>())
    }

    /// Read a little-endian u32.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_with(4, |inner| inner.read_u32::<LittleEndian>())
    }

    /// Read a little-endian i32.
    #[inline]
    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_with(4, |inner| inner.read_i32::<LittleEndian>())
    }

    /// Read a little-endian u64.
    #[inline]
    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_with(8, |inner| inner.read_u64::<LittleEndian>())
    }

    /// Read a little-endian i64.
    #[inline]
    pub fn read_i64(&mut self) -> Result<i64> {
        self.read_with(8, |inner| inner.read_i64::<LittleEndian>())
    }

    /// Read a length-prefixed Latin-1 string.
    ///
    /// The prefix is an unsigned 32-bit byte count. Trailing NUL bytes are
    /// dropped before decoding.
    pub fn read_string(&mut self) -> Result<String> {
        let length = self.read_u32()?;
        let bytes = self.read_bytes(length as usize)?;
        Ok(latin1::decode_trimmed(&bytes))
    }

    /// Consume the reader and return the underlying source.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn ensure(&self, count: u64) -> Result<()> {
        let available = self.remaining();
        if count > available {
            return Err(Error::UnexpectedEof {
                needed: count,
                available,
            });
        }
        Ok(())
    }

    fn read_with<T>(&mut self, width: u64, read: impl FnOnce(&mut R) -> io::Result<T>) -> Result<T> {
        self.ensure(width)?;
        if !self.synced {
            self.inner.seek(SeekFrom::Start(self.position))?;
            self.synced = true;
        }
        self.read_calls += 1;
        match read(&mut self.inner) {
            Ok(value) => {
                self.position += width;
                Ok(value)
            }
            Err(e) => {
                // A partial read leaves the source somewhere inside the field.
                self.synced = false;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_primitives() {
        let data = vec![
            0x01u8, 0x02, 0x03, 0x04, // u32: 0x04030201
            0xFF, 0xFF, 0xFF, 0xFF, // i32: -1
            0xFE, // i8: -2
            0x34, 0x12, // u16: 0x1234
        ];
        let mut reader = BinaryReader::from_bytes(data);

        assert_eq!(reader.read_u32().unwrap(), 0x04030201);
        assert_eq!(reader.read_i32().unwrap(), -1);
        assert_eq!(reader.read_i8().unwrap(), -2);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert!(reader.is_empty());
        assert_eq!(reader.read_calls(), 4);
    }

    #[test]
    fn test_read_u64_and_i64() {
        let mut reader = BinaryReader::from_bytes(vec![0xFF; 16]);

        assert_eq!(reader.read_u64().unwrap(), u64::MAX);
        assert_eq!(reader.read_i64().unwrap(), -1);
    }

    #[test]
    fn test_signed_reads_sign_extend() {
        let data = vec![
            0x80, // i8: -128
            0x80, // u8: 128
            0x00, 0x80, // i16: -32768
            0x00, 0x80, // u16: 32768
            0xFE, 0xFF, 0xFF, 0x7F, // i32: i32::MAX - 1
        ];
        let mut reader = BinaryReader::from_bytes(data);

        assert_eq!(i32::from(reader.read_i8().unwrap()), -128);
        assert_eq!(u32::from(reader.read_u8().unwrap()), 128);
        assert_eq!(i64::from(reader.read_i16().unwrap()), -32768);
        assert_eq!(reader.read_u16().unwrap(), 32768);
        assert_eq!(reader.read_i32().unwrap(), i32::MAX - 1);
    }

    #[test]
    fn test_read_string_trims_nuls() {
        let mut data = 7u32.to_le_bytes().to_vec();
        data.extend_from_slice(b"a.txt\0\0");
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&[0xC4, 0x00]);
        let mut reader = BinaryReader::from_bytes(data);

        assert_eq!(reader.read_string().unwrap(), "a.txt");
        assert_eq!(reader.read_string().unwrap(), "\u{c4}");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_skip_and_seek() {
        let data: Vec<u8> = (0u8..16).collect();
        let mut reader = BinaryReader::from_bytes(data);

        reader.skip(4).unwrap();
        assert_eq!(reader.read_u8().unwrap(), 4);
        reader.seek(12).unwrap();
        assert_eq!(reader.read_u8().unwrap(), 12);
        reader.seek(1).unwrap();
        assert_eq!(reader.read_array::<3>().unwrap(), [1, 2, 3]);
        assert_eq!(reader.position(), 4);
        // Skips and seeks are not reads.
        assert_eq!(reader.read_calls(), 3);
    }

    #[test]
    fn test_eof_error() {
        let mut reader = BinaryReader::from_bytes(vec![0x01, 0x02]);

        match reader.read_u32() {
            Err(Error::UnexpectedEof { needed, available }) => {
                assert_eq!(needed, 4);
                assert_eq!(available, 2);
            }
            other => panic!("expected UnexpectedEof, got {other:?}"),
        }
        // Nothing was consumed.
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.read_u16().unwrap(), 0x0201);
    }

    #[test]
    fn test_oversized_length_prefix_does_not_allocate() {
        let mut reader = BinaryReader::from_bytes(u32::MAX.to_le_bytes().to_vec());

        assert!(matches!(
            reader.read_string(),
            Err(Error::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_skip_and_seek_past_end() {
        let mut reader = BinaryReader::from_bytes(vec![0u8; 8]);

        assert!(reader.skip(9).is_err());
        assert!(reader.seek(9).is_err());
        reader.seek(8).unwrap();
        assert!(reader.is_empty());
    }

    #[test]
    fn test_file_backed_reader() {
        use std::io::Write;

        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&[0xAA, 0xBB, 0x78, 0x56, 0x34, 0x12]).unwrap();

        let mut reader = BinaryReader::new(file).unwrap();
        assert_eq!(reader.len(), 6);
        assert_eq!(reader.position(), 0);
        reader.skip(2).unwrap();
        assert_eq!(reader.read_u32().unwrap(), 0x12345678);
        reader.seek(0).unwrap();
        assert_eq!(reader.read_u8().unwrap(), 0xAA);
    }
}
