//! Positional I/O abstraction used throughout the ECM reader.
//!
//! All reads in this crate are positional (`pread`-style): no component
//! advances or relies on a shared file cursor, which is what lets a cursor
//! be re-derived from a logical offset on every call instead of being
//! tracked persistently.

use std::io;

/// A source that can be read from at an arbitrary byte offset without
/// disturbing any other reader of the same underlying resource.
pub trait PositionalRead {
    /// Reads into `buf` starting at `offset`, returning the number of bytes
    /// actually read. A return of `0` with `buf` non-empty means EOF.
    fn pread(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

#[cfg(unix)]
impl PositionalRead for std::fs::File {
    fn pread(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::os::unix::fs::FileExt;
        self.read_at(buf, offset)
    }
}

#[cfg(not(unix))]
impl PositionalRead for std::fs::File {
    fn pread(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::io::{Read, Seek, SeekFrom};
        // SAFETY: not actually safe against concurrent readers on non-unix
        // targets, which lack a true positional read primitive on `File`.
        // This crate's single-threaded-per-handle contract covers it.
        let mut file = self;
        file.seek(SeekFrom::Start(offset))?;
        file.read(buf)
    }
}

impl PositionalRead for [u8] {
    fn pread(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let offset = offset as usize;
        if offset >= self.len() {
            return Ok(0);
        }
        let avail = &self[offset..];
        let n = avail.len().min(buf.len());
        buf[..n].copy_from_slice(&avail[..n]);
        Ok(n)
    }
}

impl PositionalRead for Vec<u8> {
    fn pread(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.as_slice().pread(buf, offset)
    }
}
