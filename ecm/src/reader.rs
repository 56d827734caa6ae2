//! The random-access reader (component E): composes the tag codec, the
//! ECC/EDC kernel (via the sector reconstructor), and the seek index into a
//! stateless `read(offset, length)` operation over the logical image.

use crate::error::{EcmError, Result};
use crate::index::SeekIndex;
use crate::io::PositionalRead;
use crate::sector;
use crate::tag::{read_tag, BlockType, Decoded, Tag};
use std::fs::File;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::io::RawFd;

const MAGIC: &[u8; 4] = b"ECM\0";

/// An open handle on an `.ecm` file and its `.edi` sparse index.
///
/// Reads are positional end to end: nothing here retains a "current
/// position" across calls, so a `&EcmReader` can safely serve concurrent
/// reads from multiple threads.
pub struct EcmReader {
    file: File,
    index: SeekIndex,
    size: u64,
}

impl EcmReader {
    /// Opens `path` directly. A convenience for callers that already have a
    /// concrete filesystem path (the CLI tool, tests); FFI callers that need
    /// directory-relative semantics should use [`EcmReader::open_at`].
    pub fn open_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(EcmError::from_stream_io)?;
        let edi_path = {
            let mut p = path.as_os_str().to_owned();
            p.push(".edi");
            std::path::PathBuf::from(p)
        };
        let edi_file = File::open(&edi_path).map_err(|_| EcmError::MissingIndex)?;
        Self::open_files(file, edi_file)
    }

    /// Opens `relative_path` (and its sibling `relative_path.edi`) relative
    /// to the open directory `dir_fd`, matching the filesystem bridge's
    /// `open(dir_fd, relative_path)` contract.
    #[cfg(unix)]
    pub fn open_at(dir_fd: RawFd, relative_path: &Path) -> Result<Self> {
        let file = crate::unix::open_relative(dir_fd, relative_path)
            .map_err(EcmError::from_stream_io)?;
        let edi_relative = {
            let mut p = relative_path.as_os_str().to_owned();
            p.push(".edi");
            std::path::PathBuf::from(p)
        };
        let edi_file = crate::unix::open_relative(dir_fd, &edi_relative)
            .map_err(|_| EcmError::MissingIndex)?;
        Self::open_files(file, edi_file)
    }

    fn open_files(file: File, edi_file: File) -> Result<Self> {
        let mut magic = [0u8; 4];
        if file.pread(&mut magic, 0)? != 4 || &magic != MAGIC {
            return Err(EcmError::MissingMagic);
        }

        let index = SeekIndex::load(&edi_file)?;
        let size = determine_size(&file, &index)?;

        Ok(EcmReader { file, index, size })
    }

    /// The total size, in bytes, of the reconstructed logical image.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Reads up to `buf.len()` bytes starting at logical `offset`. Returns
    /// the number of bytes actually produced; `0` with a non-empty `buf`
    /// means clean end-of-file.
    pub fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut produced = 0usize;
        let mut cursor = offset;
        while produced < buf.len() {
            let n = read_at(&self.file, &self.index, cursor, &mut buf[produced..])?;
            if n == 0 {
                break;
            }
            produced += n;
            cursor += n as u64;
        }
        Ok(produced)
    }
}

/// Determines the uncompressed size by reading forward from the last
/// checkpoint in 4096-byte chunks until EOF.
fn determine_size<R: PositionalRead + ?Sized>(src: &R, index: &SeekIndex) -> Result<u64> {
    let last = index.last();
    let mut offset = last.logical_offset;
    let mut chunk = [0u8; 4096];
    loop {
        let n = read_at(src, index, offset, &mut chunk)?;
        if n == 0 {
            return Ok(offset);
        }
        offset += n as u64;
    }
}

/// Serves one bounded read against the block containing `offset`. Returns
/// at most one sector's (or one BYTES block's) worth of data — callers loop
/// to satisfy a longer request.
fn read_at<R: PositionalRead + ?Sized>(
    src: &R,
    index: &SeekIndex,
    offset: u64,
    buf: &mut [u8],
) -> Result<usize> {
    if buf.is_empty() {
        return Ok(0);
    }

    let checkpoint = index.checkpoint_for_offset(offset);
    let mut cursor_logical = checkpoint.logical_offset;
    let mut cursor_ecm = checkpoint.ecm_offset;

    loop {
        let tag_start = cursor_ecm;
        match read_tag(src, tag_start)? {
            Decoded::End(_) => return Ok(0),
            Decoded::Block(tag) => {
                let count = tag.count as u64;
                let logical_size = tag
                    .block_type
                    .logical_unit_size()
                    .checked_mul(count)
                    .ok_or(EcmError::CorruptIndex)?;
                let payload_size = tag
                    .block_type
                    .payload_unit_size()
                    .checked_mul(count)
                    .ok_or(EcmError::CorruptIndex)?;

                if offset < cursor_logical + logical_size {
                    let skip = offset - cursor_logical;
                    return read_from_block(src, tag, tag.next_offset, skip, buf);
                }

                cursor_logical += logical_size;
                cursor_ecm = tag.next_offset + payload_size;
            }
        }
    }
}

/// Produces bytes from within a single decoded block, `skip` logical bytes
/// into it, filling as much of `buf` as the remainder of the current unit
/// (BYTES run, or one reconstructed sector) allows.
fn read_from_block<R: PositionalRead + ?Sized>(
    src: &R,
    tag: Tag,
    payload_start: u64,
    skip: u64,
    buf: &mut [u8],
) -> Result<usize> {
    match tag.block_type {
        BlockType::Bytes => {
            let remaining = tag.count as u64 - skip;
            let n = buf.len().min(remaining as usize);
            let got = src.pread(&mut buf[..n], payload_start + skip)?;
            if got != n {
                return Err(EcmError::TruncatedStream);
            }
            Ok(n)
        }
        block_type => {
            let unit_logical = block_type.logical_unit_size();
            let unit_payload = block_type.payload_unit_size();
            let unit_index = skip / unit_logical;
            let unit_skip = (skip % unit_logical) as usize;

            let mut payload = vec![0u8; unit_payload as usize];
            let payload_offset = payload_start + unit_index * unit_payload;
            let got = src.pread(&mut payload, payload_offset)?;
            if got != payload.len() {
                return Err(EcmError::TruncatedStream);
            }

            let sector = sector::reconstruct(block_type, &payload);
            let visible = &sector[sector::logical_range(block_type)];
            let available = visible.len() - unit_skip;
            let n = buf.len().min(available);
            buf[..n].copy_from_slice(&visible[unit_skip..unit_skip + n]);
            Ok(n)
        }
    }
}
