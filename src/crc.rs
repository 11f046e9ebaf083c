//! CRC-16 used for the Packet Error Control field of telemetry packets.
//!
//! Reference: ECSS-E-70-41A, Annex A.1.
//!
//! The lookup table is computed at compile time from the generator polynomial
//! contributions of each bit of the table index.

/// Initial syndrome value.
pub const INIT: u16 = 0xffff;

/// Contribution of each bit (LSB first) of a table index.
const GENERATOR: [u16; 8] = [
    0x1021, 0x2042, 0x4084, 0x8108, 0x1231, 0x2462, 0x48c4, 0x9188,
];

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut tmp = 0u16;
        let mut bit = 0;
        while bit < 8 {
            if (i >> bit) & 1 != 0 {
                tmp ^= GENERATOR[bit];
            }
            bit += 1;
        }
        table[i] = tmp;
        i += 1;
    }
    table
}

static TABLE: [u16; 256] = build_table();

/// Feed `buf` into a running `syndrome`.
///
/// Start with [INIT]; `update(update(INIT, a), b)` equals `compute` over `a` followed by `b`.
#[must_use]
pub fn update(syndrome: u16, buf: &[u8]) -> u16 {
    buf.iter().fold(syndrome, |syndrome, b| {
        ((syndrome << 8) & 0xff00) ^ TABLE[usize::from(((syndrome >> 8) ^ u16::from(*b)) & 0xff)]
    })
}

/// Compute the CRC of `buf`.
///
/// # Example
/// ```
/// assert_eq!(ccsds_telemetry::crc::compute(&[0xab, 0xcd, 0xef, 0x01]), 0x04a2);
/// ```
#[must_use]
pub fn compute(buf: &[u8]) -> u16 {
    update(INIT, buf)
}
