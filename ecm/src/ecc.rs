//! The ECC/EDC reconstruction kernel (component B).
//!
//! EDC is a 32-bit CRC using the reversed polynomial `0xD8018001`, computed
//! bytewise via a 256-entry table. ECC is Reed-Solomon P/Q parity over
//! GF(2^8) with primitive polynomial `0x11D`, using the classic two-table
//! (`f_lut`/`b_lut`) finalization.
//!
//! Both tables are process-global and built exactly once, lazily, the first
//! time they're needed.

use byteorder::{ByteOrder, LittleEndian};
use std::sync::OnceLock;

struct EccEdcTables {
    /// GF(2^8) multiplication-by-alpha table.
    f_lut: [u8; 256],
    /// Inverse table used to finalize a parity byte.
    b_lut: [u8; 256],
    /// CRC-32 (poly 0xD8018001, reflected, init 0) table.
    edc_lut: [u32; 256],
}

fn build_tables() -> EccEdcTables {
    let mut f_lut = [0u8; 256];
    let mut b_lut = [0u8; 256];
    let mut edc_lut = [0u32; 256];

    for i in 0u32..256 {
        let j = (i << 1) ^ if i & 0x80 != 0 { 0x11D } else { 0 };
        f_lut[i as usize] = j as u8;
        b_lut[(i ^ j) as usize] = i as u8;

        let mut edc = i;
        for _ in 0..8 {
            edc = (edc >> 1) ^ if edc & 1 != 0 { 0xD801_8001 } else { 0 };
        }
        edc_lut[i as usize] = edc;
    }

    EccEdcTables {
        f_lut,
        b_lut,
        edc_lut,
    }
}

static TABLES: OnceLock<EccEdcTables> = OnceLock::new();

fn tables() -> &'static EccEdcTables {
    TABLES.get_or_init(build_tables)
}

/// Computes the EDC (CRC-32, poly 0xD8018001 reflected, init 0, no final
/// XOR) of `data`.
pub fn compute_edc(data: &[u8]) -> u32 {
    let edc_lut = &tables().edc_lut;
    let mut edc: u32 = 0;
    for &byte in data {
        edc = (edc >> 8) ^ edc_lut[((edc ^ byte as u32) & 0xFF) as usize];
    }
    edc
}

/// Computes and writes the little-endian EDC of `data` into `dest[0..4]`.
pub fn write_edc(dest: &mut [u8], data: &[u8]) {
    LittleEndian::write_u32(dest, compute_edc(data));
}

/// Computes one Reed-Solomon parity codeword (either P or Q, depending on
/// the stride parameters) over `data`, XOR-folding `minor_count` bytes per
/// major index selected with stride `minor_inc`, wrapping modulo
/// `major_count * minor_count`.
///
/// Returns `major_count * 2` parity bytes: bytes `[0..major_count)` are the
/// "A" parity, `[major_count..2*major_count)` are the "B" parity XORed with
/// "A".
fn compute_block(
    data: &[u8],
    major_count: usize,
    minor_count: usize,
    major_mult: usize,
    minor_inc: usize,
) -> Vec<u8> {
    let tables = tables();
    let size = major_count * minor_count;
    let mut dest = vec![0u8; major_count * 2];

    for major in 0..major_count {
        let mut index = (major >> 1) * major_mult + (major & 1);
        let mut ecc_a: u8 = 0;
        let mut ecc_b: u8 = 0;

        for _ in 0..minor_count {
            let temp = data[index];
            index += minor_inc;
            if index >= size {
                index -= size;
            }
            ecc_a ^= temp;
            ecc_b ^= temp;
            ecc_a = tables.f_lut[ecc_a as usize];
        }
        ecc_a = tables.b_lut[(tables.f_lut[ecc_a as usize] ^ ecc_b) as usize];
        dest[major] = ecc_a;
        dest[major + major_count] = ecc_a ^ ecc_b;
    }
    dest
}

/// The 2340-byte data region (sector offset `0x0C..0x930`) that both ECC
/// codewords are computed over.
const ECC_DATA_LEN: usize = 2340;

/// Computes ECC P (86, 24, 2, 86) and Q (52, 43, 86, 88) parity for `sector`
/// and writes them at offsets `0x81C` and `0x8C8` respectively.
///
/// If `zero_address` is set, the 4-byte address at sector offset `0x0C` is
/// treated as zero for the purposes of the computation (but the sector's
/// actual address bytes are left untouched either way — we never need to
/// mutate-then-restore because the parity is computed from a private copy).
pub fn generate_ecc(sector: &mut [u8; 2352], zero_address: bool) {
    let mut data = [0u8; ECC_DATA_LEN];
    data.copy_from_slice(&sector[0x0C..0x0C + ECC_DATA_LEN]);
    if zero_address {
        data[0..4].fill(0);
    }

    let p = compute_block(&data, 86, 24, 2, 86);
    let q = compute_block(&data, 52, 43, 86, 88);

    sector[0x81C..0x81C + p.len()].copy_from_slice(&p);
    sector[0x8C8..0x8C8 + q.len()].copy_from_slice(&q);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edc_lut_matches_single_byte_crc() {
        // edc_lut[i] must equal CRC32(single byte i) under this polynomial.
        for i in 0u32..256 {
            let single = [i as u8];
            assert_eq!(compute_edc(&single), tables().edc_lut[i as usize]);
        }
    }

    #[test]
    fn edc_of_empty_is_zero() {
        assert_eq!(compute_edc(&[]), 0);
    }

    #[test]
    fn f_lut_and_b_lut_are_inverses_under_xor() {
        let tables = tables();
        for i in 0u32..256 {
            let j = tables.f_lut[i as usize];
            assert_eq!(tables.b_lut[(i as u8 ^ j) as usize], i as u8);
        }
    }

    #[test]
    fn generate_ecc_is_deterministic() {
        let mut sector = [0u8; 2352];
        sector[0x0C..0x930].iter_mut().enumerate().for_each(|(i, b)| {
            *b = (i % 251) as u8;
        });
        let mut a = sector;
        let mut b = sector;
        generate_ecc(&mut a, false);
        generate_ecc(&mut b, false);
        assert_eq!(a, b);
    }

    #[test]
    fn generate_ecc_preserves_address_bytes() {
        let mut sector = [0u8; 2352];
        sector[0x0C..0x10].copy_from_slice(&[0x00, 0x02, 0x10, 0x01]);
        generate_ecc(&mut sector, true);
        assert_eq!(&sector[0x0C..0x10], &[0x00, 0x02, 0x10, 0x01]);
    }
}
