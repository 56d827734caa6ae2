//! The sparse seek index (component D): load/build the `.edi` checkpoint
//! table and translate a logical offset into the nearest checkpoint.

use crate::error::{EcmError, Result};
use crate::io::PositionalRead;
use crate::tag::{read_tag, Decoded};
use byteorder::{ByteOrder, LittleEndian};

/// One `.edi` checkpoint: a logical offset paired with the ECM stream
/// offset of the block boundary at which that logical offset begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub logical_offset: u64,
    pub ecm_offset: u64,
}

/// The in-memory form of a `.edi` file: a flat table of checkpoints spaced
/// (at construction time) no more than 64 KiB of logical output apart.
#[derive(Debug)]
pub struct SeekIndex {
    entries: Vec<Checkpoint>,
}

/// Logical bytes between consecutive checkpoints.
const CHECKPOINT_SPACING: u64 = 65536;

impl SeekIndex {
    /// Loads a `.edi` index from `src`: a `u32` entry count, a `u32`
    /// reserved field, then that many `(i64, i64)` little-endian pairs.
    pub fn load<R: PositionalRead + ?Sized>(src: &R) -> Result<Self> {
        let mut header = [0u8; 8];
        if src.pread(&mut header, 0)? != header.len() {
            return Err(EcmError::CorruptIndex);
        }
        let count = LittleEndian::read_u32(&header[0..4]) as usize;
        if count == 0 {
            return Err(EcmError::CorruptIndex);
        }

        let mut buf = vec![0u8; count * 16];
        if src.pread(&mut buf, 8)? != buf.len() {
            return Err(EcmError::CorruptIndex);
        }

        let entries = buf
            .chunks_exact(16)
            .map(|chunk| Checkpoint {
                logical_offset: LittleEndian::read_i64(&chunk[0..8]) as u64,
                ecm_offset: LittleEndian::read_i64(&chunk[8..16]) as u64,
            })
            .collect();

        Ok(SeekIndex { entries })
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns the checkpoint nearest to (at or before) `offset`, per the
    /// `offset / 65536` bucket lookup, clamped to the last entry.
    pub fn checkpoint_for_offset(&self, offset: u64) -> Checkpoint {
        let idx = (offset / CHECKPOINT_SPACING) as usize;
        let idx = idx.min(self.entries.len() - 1);
        self.entries[idx]
    }

    /// The last checkpoint, used as the starting point for determining the
    /// uncompressed size at open time.
    pub fn last(&self) -> Checkpoint {
        *self.entries.last().expect("entries is non-empty by construction")
    }
}

/// Scans an ECM stream and builds the bytes of its `.edi` companion index:
/// a checkpoint every 64 KiB of logical output.
pub fn build_index<R: PositionalRead + ?Sized>(src: &R) -> Result<Vec<u8>> {
    let mut magic = [0u8; 4];
    if src.pread(&mut magic, 0)? != 4 || magic != *b"ECM\0" {
        return Err(EcmError::MissingMagic);
    }

    let mut entries = vec![Checkpoint {
        logical_offset: 0,
        ecm_offset: 4,
    }];
    let mut next_boundary = CHECKPOINT_SPACING;
    let mut logical_offset: u64 = 0;
    let mut ecm_offset: u64 = 4;

    loop {
        let current = ecm_offset;
        match read_tag(src, current)? {
            Decoded::End(_) => break,
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

                while logical_offset
                    .checked_add(logical_size)
                    .ok_or(EcmError::CorruptIndex)?
                    > next_boundary
                {
                    entries.push(Checkpoint {
                        logical_offset,
                        ecm_offset: current,
                    });
                    next_boundary += CHECKPOINT_SPACING;
                }

                logical_offset += logical_size;
                ecm_offset = tag.next_offset + payload_size;
            }
        }
    }

    let mut out = Vec::with_capacity(8 + entries.len() * 16);
    out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    for entry in &entries {
        out.extend_from_slice(&(entry.logical_offset as i64).to_le_bytes());
        out.extend_from_slice(&(entry.ecm_offset as i64).to_le_bytes());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_tag(count: u8) -> u8 {
        ((count as u32 - 1) << 2) as u8
    }

    #[test]
    fn load_rejects_short_header() {
        let buf: &[u8] = &[0, 0, 0];
        assert!(matches!(SeekIndex::load(buf), Err(EcmError::CorruptIndex)));
    }

    #[test]
    fn load_rejects_zero_entries() {
        let buf: &[u8] = &[0, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(SeekIndex::load(buf), Err(EcmError::CorruptIndex)));
    }

    #[test]
    fn load_parses_entries() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0i64.to_le_bytes());
        buf.extend_from_slice(&4i64.to_le_bytes());
        buf.extend_from_slice(&65536i64.to_le_bytes());
        buf.extend_from_slice(&1000i64.to_le_bytes());

        let index = SeekIndex::load(buf.as_slice()).unwrap();
        assert_eq!(index.entry_count(), 2);
        assert_eq!(
            index.checkpoint_for_offset(0),
            Checkpoint {
                logical_offset: 0,
                ecm_offset: 4
            }
        );
        assert_eq!(
            index.checkpoint_for_offset(70000),
            Checkpoint {
                logical_offset: 65536,
                ecm_offset: 1000
            }
        );
        // Out-of-range buckets clamp to the last entry.
        assert_eq!(index.checkpoint_for_offset(9_000_000).ecm_offset, 1000);
    }

    #[test]
    fn build_index_rejects_bad_magic() {
        let buf: &[u8] = b"NOPE";
        assert!(matches!(build_index(buf), Err(EcmError::MissingMagic)));
    }

    #[test]
    fn build_index_single_byte_block_has_one_entry() {
        // "ECM\0" + tag(type=0, count=3) + 4 raw bytes + sentinel.
        let mut stream = b"ECM\0".to_vec();
        stream.push(bytes_tag(4));
        stream.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        stream.extend_from_slice(&[0xFC, 0xFF, 0xFF, 0xFF, 0x0F]);

        let edi = build_index(stream.as_slice()).unwrap();
        let index = SeekIndex::load(edi.as_slice()).unwrap();
        assert_eq!(index.entry_count(), 1);
        assert_eq!(index.checkpoint_for_offset(0).logical_offset, 0);
        assert_eq!(index.checkpoint_for_offset(0).ecm_offset, 4);
    }

    #[test]
    fn build_index_spans_multiple_checkpoints() {
        // 10 Mode 1 blocks of count=9 each: logical size 10*9*2352 = 211680,
        // which must span several 64 KiB checkpoints.
        let mut stream = b"ECM\0".to_vec();
        let payload = vec![0u8; 0x803 * 9];
        for _ in 0..10 {
            // tag(type=1, raw count=8) -> count=9 instances.
            stream.push(mode1_tag_with_count(8));
            stream.extend_from_slice(&payload);
        }
        stream.extend_from_slice(&[0xFC, 0xFF, 0xFF, 0xFF, 0x0F]);

        fn mode1_tag_with_count(raw_count: u32) -> u8 {
            (((raw_count & 0x1F) << 2) as u8) | 0x01
        }

        let edi = build_index(stream.as_slice()).unwrap();
        let index = SeekIndex::load(edi.as_slice()).unwrap();

        let total_logical = 10 * 9 * 2352u64;
        let expected_min_entries = total_logical.div_ceil(65536) as usize;
        assert!(index.entry_count() >= expected_min_entries);

        // Entry i must never claim a logical offset past i * 65536.
        for (i, entry) in (0..).zip(index_entries(&edi)) {
            assert!(entry.logical_offset <= (i as u64) * 65536);
        }
    }

    fn index_entries(edi: &[u8]) -> Vec<Checkpoint> {
        let count = LittleEndian::read_u32(&edi[0..4]) as usize;
        edi[8..8 + count * 16]
            .chunks_exact(16)
            .map(|chunk| Checkpoint {
                logical_offset: LittleEndian::read_i64(&chunk[0..8]) as u64,
                ecm_offset: LittleEndian::read_i64(&chunk[8..16]) as u64,
            })
            .collect()
    }
}
