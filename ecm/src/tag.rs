//! The ECM tag codec (component A): reads one variable-length `(type, count)`
//! tag at a byte offset using positional I/O.

use crate::error::{EcmError, Result};
use crate::io::PositionalRead;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// The sentinel raw count value that terminates an ECM stream.
pub const SENTINEL_COUNT: u32 = 0xFFFF_FFFF;

/// The four block types an ECM tag may declare. The type occupies the low
/// 2 bits of the tag's first byte, so no other discriminant is structurally
/// possible.
#[repr(u8)]
#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// Verbatim bytes; payload size equals logical size.
    Bytes = 0,
    /// A full raw 2352-byte Mode 1 sector, stored as an 0x803-byte payload.
    Mode1 = 1,
    /// A Mode 2 Form 1 sector, stored as an 0x804-byte payload.
    Mode2Form1 = 2,
    /// A Mode 2 Form 2 sector, stored as an 0x918-byte payload.
    Mode2Form2 = 3,
}

impl BlockType {
    /// Per-unit payload (compressed) size in bytes for one repetition of
    /// this block type.
    pub const fn payload_unit_size(&self) -> u64 {
        match self {
            BlockType::Bytes => 1,
            BlockType::Mode1 => 0x803,
            BlockType::Mode2Form1 => 0x804,
            BlockType::Mode2Form2 => 0x918,
        }
    }

    /// Per-unit logical (decompressed) size in bytes for one repetition of
    /// this block type.
    pub const fn logical_unit_size(&self) -> u64 {
        match self {
            BlockType::Bytes => 1,
            BlockType::Mode1 => 2352,
            BlockType::Mode2Form1 => 2336,
            BlockType::Mode2Form2 => 2336,
        }
    }
}

/// A decoded tag: its block type, repetition count (already `+1`'d, i.e. the
/// number of instances), and the stream offset immediately following the
/// tag's last byte.
#[derive(Debug, Clone, Copy)]
pub struct Tag {
    pub block_type: BlockType,
    pub count: u32,
    pub next_offset: u64,
}

/// The decoded sentinel marking the end of the block sequence.
#[derive(Debug, Clone, Copy)]
pub struct Sentinel {
    pub next_offset: u64,
}

/// The result of decoding one tag: either a block header or the terminator.
#[derive(Debug, Clone, Copy)]
pub enum Decoded {
    Block(Tag),
    End(Sentinel),
}

/// Reads one tag at `pos` using positional reads, leaving any shared file
/// cursor undisturbed. Returns `TruncatedStream` if a byte read hits EOF
/// before the tag (including all continuation bytes) completes.
pub fn read_tag<R: PositionalRead + ?Sized>(src: &R, pos: u64) -> Result<Decoded> {
    let mut cursor = pos;
    let mut byte = [0u8; 1];

    if src.pread(&mut byte, cursor)? == 0 {
        return Err(EcmError::TruncatedStream);
    }
    cursor += 1;

    let c = byte[0];
    let raw_type = c & 0x3;
    let mut count: u32 = ((c >> 2) & 0x1F) as u32;
    let mut bits: u32 = 5;

    let mut last = c;
    while last & 0x80 != 0 {
        if src.pread(&mut byte, cursor)? == 0 {
            return Err(EcmError::TruncatedStream);
        }
        cursor += 1;
        last = byte[0];
        // `bits` can exceed 31 on a malformed stream with more continuation
        // bytes than a 32-bit count can hold; a plain `<<` panics on
        // shift-overflow in both debug and release, so use a wrapping shift
        // to stay within the 32-bit accumulator the varint is defined over.
        count |= ((last as u32) & 0x7F).wrapping_shl(bits);
        bits += 7;
    }

    if count == SENTINEL_COUNT {
        return Ok(Decoded::End(Sentinel { next_offset: cursor }));
    }

    let block_type = BlockType::from_u8(raw_type).ok_or(EcmError::UnknownBlockType)?;
    Ok(Decoded::Block(Tag {
        block_type,
        count: count + 1,
        next_offset: cursor,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_byte_tag() {
        // type=0 (BYTES), raw count=3: raw byte (3 << 2) | 0 = 0x0C
        let buf: &[u8] = &[0x0C];
        match read_tag(buf, 0).unwrap() {
            Decoded::Block(tag) => {
                assert_eq!(tag.block_type, BlockType::Bytes);
                assert_eq!(tag.count, 4);
                assert_eq!(tag.next_offset, 1);
            }
            Decoded::End(_) => panic!("expected a block"),
        }
    }

    #[test]
    fn decodes_mode1_tag() {
        // type=1 (MODE_1), raw count=0 -> raw byte 0x01
        let buf: &[u8] = &[0x01];
        match read_tag(buf, 0).unwrap() {
            Decoded::Block(tag) => {
                assert_eq!(tag.block_type, BlockType::Mode1);
                assert_eq!(tag.count, 1);
            }
            Decoded::End(_) => panic!("expected a block"),
        }
    }

    #[test]
    fn decodes_continuation_bytes() {
        // raw byte 0: 0x80 (continuation set, type=0, low 5 count bits = 0)
        // raw byte 1 (final, bit7 clear): 0x01 -> contributes 1 << 5 = 32
        let buf: &[u8] = &[0x80, 0x01];
        match read_tag(buf, 0).unwrap() {
            Decoded::Block(tag) => {
                assert_eq!(tag.block_type, BlockType::Bytes);
                assert_eq!(tag.count, 33); // raw count 32, +1
                assert_eq!(tag.next_offset, 2);
            }
            Decoded::End(_) => panic!("expected a block"),
        }
    }

    #[test]
    fn decodes_sentinel() {
        // count == 0xFFFFFFFF regardless of type.
        let buf: &[u8] = &[0xFC, 0xFF, 0xFF, 0xFF, 0x0F];
        match read_tag(buf, 0).unwrap() {
            Decoded::End(s) => assert_eq!(s.next_offset, 5),
            Decoded::Block(_) => panic!("expected sentinel"),
        }
    }

    #[test]
    fn eof_before_tag_is_truncated() {
        let buf: &[u8] = &[];
        assert!(matches!(read_tag(buf, 0), Err(EcmError::TruncatedStream)));
    }

    #[test]
    fn eof_mid_continuation_is_truncated() {
        let buf: &[u8] = &[0x80];
        assert!(matches!(read_tag(buf, 0), Err(EcmError::TruncatedStream)));
    }

    #[test]
    fn excess_continuation_bytes_do_not_panic() {
        // Five continuation bytes push the bit accumulator past 32; this
        // must return a decoded result (or an error), never panic on
        // shift-overflow.
        let buf: &[u8] = &[0x80, 0x80, 0x80, 0x80, 0x80, 0x00];
        assert!(read_tag(buf, 0).is_ok());
    }

    #[test]
    fn tag_roundtrips_with_encoder() {
        // decode(encode(type, count)) must round-trip for representative values.
        fn encode(block_type: u8, raw_count: u32) -> Vec<u8> {
            let mut out = Vec::new();
            let mut first = block_type & 0x3;
            let mut remaining = raw_count;
            first |= ((remaining & 0x1F) as u8) << 2;
            remaining >>= 5;
            if remaining != 0 {
                first |= 0x80;
            }
            out.push(first);
            while remaining != 0 {
                let mut byte = (remaining & 0x7F) as u8;
                remaining >>= 7;
                if remaining != 0 {
                    byte |= 0x80;
                }
                out.push(byte);
            }
            out
        }

        for block_type in 0u8..4 {
            for raw_count in [0u32, 1, 31, 32, 4096, 1 << 20, (1u32 << 31) - 1] {
                let bytes = encode(block_type, raw_count);
                match read_tag(bytes.as_slice(), 0).unwrap() {
                    Decoded::Block(tag) => {
                        assert_eq!(tag.block_type as u8, block_type);
                        assert_eq!(tag.count, raw_count + 1);
                    }
                    Decoded::End(_) => panic!("unexpected sentinel"),
                }
            }
        }
    }
}
