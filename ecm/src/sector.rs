//! The sector reconstructor (component C): fills a 2352-byte CD-ROM sector
//! template from a block's compressed payload bytes.
//!
//! Each block type has a fixed physical layout; only the bytes not implied
//! by the block type (address/subheader/user data) come from the payload.
//! Sync pattern, mode byte, EDC, and (where applicable) ECC are computed or
//! filled in unconditionally, so a caller requesting the full sector always
//! gets a bit-exact reconstruction regardless of which sub-slice it asked
//! for.

use crate::ecc;
use crate::tag::BlockType;
use byteorder::{ByteOrder, LittleEndian};
use std::ops::Range;

const SECTOR_SIZE: usize = 2352;

/// A full 2352-byte reconstructed CD-ROM sector. Only `logical_range()` of
/// it is part of the logical (uncompressed) byte stream; the rest exists
/// only because the template shares storage with it.
pub type Sector = [u8; SECTOR_SIZE];

/// The sub-range of a reconstructed [`Sector`] that is part of the logical
/// output for a block of `block_type`.
///
/// Mode 1 exposes the entire sector, including sync pattern, address, and
/// mode byte — the uncompressed image format for Mode 1 tracks is the raw
/// sector. Mode 2 Form 1/2 expose only `[0x10..0x930)`, stripping the
/// 16-byte sync/address/mode header that the original source also never
/// returns to a reader (it is reconstructible, and the image format for
/// Mode 2 tracks omits it).
pub fn logical_range(block_type: BlockType) -> Range<usize> {
    match block_type {
        BlockType::Mode1 => 0..SECTOR_SIZE,
        BlockType::Mode2Form1 | BlockType::Mode2Form2 => 0x10..SECTOR_SIZE,
        BlockType::Bytes => unreachable!("BYTES blocks are not reconstructed"),
    }
}

fn sync_header(sector: &mut Sector) {
    sector[0x00] = 0x00;
    sector[0x01..0x0B].fill(0xFF);
    sector[0x0B] = 0x00;
}

/// Reconstructs a Mode 1 sector from its 0x803-byte payload: `payload[0..3]`
/// is the 3-byte MSF address, `payload[3..0x803]` is the 2048 bytes of user
/// data. EDC is computed over `[0x00..0x810)`; ECC P/Q are computed with the
/// address left intact.
fn reconstruct_mode1(payload: &[u8]) -> Sector {
    debug_assert_eq!(payload.len(), BlockType::Mode1.payload_unit_size() as usize);
    let mut sector = [0u8; SECTOR_SIZE];
    sync_header(&mut sector);
    sector[0x0C..0x0F].copy_from_slice(&payload[0..3]);
    sector[0x0F] = 0x01;
    sector[0x10..0x810].copy_from_slice(&payload[3..0x803]);

    let edc = ecc::compute_edc(&sector[0x00..0x810]);
    LittleEndian::write_u32(&mut sector[0x810..0x814], edc);
    sector[0x814..0x81C].fill(0);

    ecc::generate_ecc(&mut sector, false);
    sector
}

/// Reconstructs a Mode 2 Form 1 sector from its 0x804-byte payload:
/// `payload[0..4]` is the subheader (duplicated at `[0x10..0x14)` and
/// `[0x14..0x18)`), `payload[4..0x804]` is the 2048 bytes of user data. EDC
/// is computed over `[0x10..0x818)`; ECC P/Q are computed with the 4-byte
/// address zeroed.
fn reconstruct_mode2_form1(payload: &[u8]) -> Sector {
    debug_assert_eq!(
        payload.len(),
        BlockType::Mode2Form1.payload_unit_size() as usize
    );
    let mut sector = [0u8; SECTOR_SIZE];
    sync_header(&mut sector);
    sector[0x0F] = 0x02;
    sector[0x10..0x14].copy_from_slice(&payload[0..4]);
    sector[0x14..0x18].copy_from_slice(&payload[0..4]);
    sector[0x18..0x818].copy_from_slice(&payload[4..0x804]);

    let edc = ecc::compute_edc(&sector[0x10..0x818]);
    LittleEndian::write_u32(&mut sector[0x818..0x81C], edc);

    ecc::generate_ecc(&mut sector, true);
    sector
}

/// Reconstructs a Mode 2 Form 2 sector from its 0x918-byte payload:
/// `payload[0..4]` is the subheader (duplicated as above), `payload[4..
/// 0x918]` is the 2324 bytes of user data. EDC is computed over
/// `[0x10..0x92C)`. Form 2 carries no ECC.
fn reconstruct_mode2_form2(payload: &[u8]) -> Sector {
    debug_assert_eq!(
        payload.len(),
        BlockType::Mode2Form2.payload_unit_size() as usize
    );
    let mut sector = [0u8; SECTOR_SIZE];
    sync_header(&mut sector);
    sector[0x0F] = 0x02;
    sector[0x10..0x14].copy_from_slice(&payload[0..4]);
    sector[0x14..0x18].copy_from_slice(&payload[0..4]);
    sector[0x18..0x92C].copy_from_slice(&payload[4..0x918]);

    let edc = ecc::compute_edc(&sector[0x10..0x92C]);
    LittleEndian::write_u32(&mut sector[0x92C..0x930], edc);
    sector
}

/// Reconstructs one sector's worth of a block's payload. `payload` must be
/// exactly `block_type.payload_unit_size()` bytes (one repetition).
///
/// # Panics
/// Panics if `block_type` is [`BlockType::Bytes`] (those blocks need no
/// reconstruction — the payload *is* the logical output) or if `payload`
/// has the wrong length.
pub fn reconstruct(block_type: BlockType, payload: &[u8]) -> Sector {
    assert_eq!(payload.len(), block_type.payload_unit_size() as usize);
    match block_type {
        BlockType::Bytes => unreachable!("BYTES blocks are not reconstructed"),
        BlockType::Mode1 => reconstruct_mode1(payload),
        BlockType::Mode2Form1 => reconstruct_mode2_form1(payload),
        BlockType::Mode2Form2 => reconstruct_mode2_form2(payload),
    }
}
