// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The file I/O callback contract. The engine never opens paths itself; it is handed a
//! [`StreamSource`] and reads from it at arbitrary offsets.

use std::io;

/// A seekable, offset-addressed byte source. Unlike [`std::io::Read`], reads are positioned
/// explicitly by `offset` rather than by an internal cursor, because channel descriptors
/// ([`crate::channel::ChannelDescriptor`]) already carry their own byte offsets and re-entrant
/// reads across interleaved channels would otherwise require a stateful cursor per channel.
pub trait StreamSource: Send {
    /// Reads up to `buf.len()` bytes starting at `offset`, returning the number of bytes
    /// actually read. A short read indicates end-of-file; it is not an error.
    fn read(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Total size of the source in bytes, if known.
    fn size(&self) -> u64;

    /// Produces an independent handle to the same underlying data, for re-entrant reads (one
    /// handle per channel in interleaved layouts).
    fn try_clone(&self) -> io::Result<Box<dyn StreamSource>>;
}

/// Reads exactly `buf.len()` bytes at `offset`, treating a short read as an unexpected EOF.
pub fn read_exact_at(source: &mut dyn StreamSource, buf: &mut [u8], offset: u64) -> io::Result<()> {
    let n = source.read(buf, offset)?;
    if n != buf.len() {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
    }
    Ok(())
}

/// A [`StreamSource`] backed by an in-memory byte slice. Used by tests and by small embedded
/// assets; mirrors the teacher's `ReadOnlySource` in spirit.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: std::sync::Arc<Vec<u8>>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        MemorySource { data: std::sync::Arc::new(data) }
    }
}

impl StreamSource for MemorySource {
    fn read(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let offset = offset as usize;
        if offset >= self.data.len() {
            return Ok(0);
        }
        let available = &self.data[offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn try_clone(&self) -> io::Result<Box<dyn StreamSource>> {
        Ok(Box::new(self.clone()))
    }
}

/// A [`StreamSource`] backed by an open [`std::fs::File`]. Each read seeks to `offset` first,
/// since `StreamSource` is offset-addressed rather than cursor-based; `try_clone` reopens the
/// same path rather than duplicating the file descriptor, mirroring the teacher's
/// `std::fs::File: MediaSource` impl but adapted to this crate's explicit-offset contract.
pub struct FileSource {
    file: std::fs::File,
    len: u64,
}

impl FileSource {
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> io::Result<Self> {
        let file = std::fs::File::open(path)?;
        let len = file.metadata()?.len();
        Ok(FileSource { file, len })
    }
}

impl StreamSource for FileSource {
    fn read(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::io::{Read, Seek, SeekFrom};
        self.file.seek(SeekFrom::Start(offset))?;
        let mut total = 0;
        while total < buf.len() {
            match self.file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    fn size(&self) -> u64 {
        self.len
    }

    fn try_clone(&self) -> io::Result<Box<dyn StreamSource>> {
        Ok(Box::new(FileSource { file: self.file.try_clone()?, len: self.len }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_reads_at_offset() {
        let mut src = MemorySource::new(vec![1, 2, 3, 4, 5]);
        let mut buf = [0u8; 2];
        let n = src.read(&mut buf, 2).unwrap();
        assert_eq!(n, 2);
        assert_eq!(buf, [3, 4]);
    }

    #[test]
    fn memory_source_short_read_at_end() {
        let mut src = MemorySource::new(vec![1, 2, 3]);
        let mut buf = [0u8; 4];
        let n = src.read(&mut buf, 2).unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn memory_source_past_end_is_empty() {
        let mut src = MemorySource::new(vec![1, 2, 3]);
        let mut buf = [0u8; 4];
        let n = src.read(&mut buf, 10).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn file_source_reads_at_offset_and_clones() {
        let mut path = std::env::temp_dir();
        path.push(format!("gaudio-core-io-test-{}.bin", std::process::id()));
        std::fs::write(&path, [10u8, 20, 30, 40, 50]).unwrap();

        let mut src = FileSource::open(&path).unwrap();
        assert_eq!(src.size(), 5);
        let mut buf = [0u8; 2];
        assert_eq!(src.read(&mut buf, 3).unwrap(), 2);
        assert_eq!(buf, [40, 50]);

        let mut cloned = src.try_clone().unwrap();
        let mut buf2 = [0u8; 1];
        assert_eq!(cloned.read(&mut buf2, 0).unwrap(), 1);
        assert_eq!(buf2, [10]);

        std::fs::remove_file(&path).unwrap();
    }
}
