//! The `ec` module computes Reed-Solomon error correction codewords and
//! interleaves the data and parity blocks for placement.

use crate::types::{EcLevel, QrResult, Version};

/// Multiplies two elements of GF(256) with the QR code reducing polynomial
/// x^8 + x^4 + x^3 + x^2 + 1.
fn gf_mul(x: u8, y: u8) -> u8 {
    let mut z = 0u8;
    for i in (0..8).rev() {
        z = (z << 1) ^ ((z >> 7).wrapping_mul(0x1d));
        z ^= ((y >> i) & 1).wrapping_mul(x);
    }
    z
}

/// A Reed-Solomon generator polynomial of a given degree, built from the
/// standard primitive element 2 of GF(256).
struct Generator {
    // Coefficients of the divisor polynomial, from the second-highest power
    // down to the constant term. The leading coefficient is an implicit 1.
    coefficients: Vec<u8>,
}

impl Generator {
    fn new(degree: usize) -> Self {
        debug_assert!(degree > 0);
        let mut coefficients = vec![0u8; degree];
        coefficients[degree - 1] = 1;

        // Multiply (x - r^0)(x - r^1)...(x - r^{degree-1}) together.
        let mut root = 1u8;
        for _ in 0..degree {
            for i in 0..degree {
                coefficients[i] = gf_mul(coefficients[i], root);
                if i + 1 < degree {
                    coefficients[i] ^= coefficients[i + 1];
                }
            }
            root = gf_mul(root, 0x02);
        }
        Self { coefficients }
    }

    /// Computes the polynomial division remainder of `data` by the
    /// generator, i.e. the error correction codewords for one block.
    fn remainder(&self, data: &[u8]) -> Vec<u8> {
        let mut result = vec![0u8; self.coefficients.len()];
        for b in data {
            let factor = b ^ result[0];
            result.rotate_left(1);
            if let Some(last) = result.last_mut() {
                *last = 0;
            }
            for (r, c) in result.iter_mut().zip(&self.coefficients) {
                *r ^= gf_mul(*c, factor);
            }
        }
        result
    }
}

/// Computes the error correction codewords for a single block.
pub fn create_error_correction_code(data: &[u8], ec_codewords: usize) -> Vec<u8> {
    Generator::new(ec_codewords).remainder(data)
}

/// The total number of codewords (data plus error correction) in a symbol
/// of the given version, derived from the count of non-function modules.
pub fn total_codewords(version: Version) -> usize {
    let v = usize::from(version.number());
    let mut modules = (16 * v + 128) * v + 64;
    if v >= 2 {
        let numalign = v / 7 + 2;
        modules -= (25 * numalign - 10) * numalign - 55;
        if v >= 7 {
            modules -= 36;
        }
    }
    modules / 8
}

/// The number of data codewords in a symbol of the given version and error
/// correction level.
pub fn data_codewords(version: Version, ec_level: EcLevel) -> usize {
    let blocks = version.fetch(ec_level, &EC_BLOCK_COUNTS);
    let ec_per_block = version.fetch(ec_level, &EC_CODEWORDS_PER_BLOCK);
    total_codewords(version) - blocks * ec_per_block
}

/// Splits the data codewords into blocks per the standard table, computes
/// the error correction codewords of each block, and interleaves both
/// sequences codeword-by-codeword across blocks.
///
/// Returns the interleaved data codewords and the interleaved error
/// correction codewords, in placement order.
///
/// # Panics
///
/// Panics if `data` does not exactly match the data capacity of the given
/// version and level. That count is fixed by the terminator/padding step,
/// so a mismatch is a defect, not an input error.
pub fn construct_codewords(
    data: &[u8],
    version: Version,
    ec_level: EcLevel,
) -> QrResult<(Vec<u8>, Vec<u8>)> {
    assert_eq!(
        data.len(),
        data_codewords(version, ec_level),
        "data codeword count does not match the version capacity"
    );

    let blocks = version.fetch(ec_level, &EC_BLOCK_COUNTS);
    let ec_per_block = version.fetch(ec_level, &EC_CODEWORDS_PER_BLOCK);
    let total = total_codewords(version);

    // The first `short_blocks` blocks carry one data codeword less than the
    // rest; block lengths differ by at most one.
    let short_block_len = total / blocks;
    let short_blocks = blocks - total % blocks;
    let short_data_len = short_block_len - ec_per_block;

    let mut data_blocks = Vec::with_capacity(blocks);
    let mut ec_blocks = Vec::with_capacity(blocks);
    let generator = Generator::new(ec_per_block);
    let mut offset = 0;
    for i in 0..blocks {
        let len = short_data_len + usize::from(i >= short_blocks);
        let block = &data[offset..offset + len];
        offset += len;
        ec_blocks.push(generator.remainder(block));
        data_blocks.push(block);
    }
    debug_assert_eq!(offset, data.len());

    let max_data_len = short_data_len + usize::from(short_blocks < blocks);
    let mut interleaved_data = Vec::with_capacity(data.len());
    for i in 0..max_data_len {
        for block in &data_blocks {
            if let Some(b) = block.get(i) {
                interleaved_data.push(*b);
            }
        }
    }

    let mut interleaved_ec = Vec::with_capacity(blocks * ec_per_block);
    for i in 0..ec_per_block {
        for block in &ec_blocks {
            interleaved_ec.push(block[i]);
        }
    }

    Ok((interleaved_data, interleaved_ec))
}

// The two tables below are copied from ISO/IEC 18004:2006 §6.5.1, Table 9.
// Rows are versions 1 to 40; columns are the levels [L, M, Q, H].

static EC_CODEWORDS_PER_BLOCK: [[usize; 4]; 40] = [
    [7, 10, 13, 17],
    [10, 16, 22, 28],
    [15, 26, 18, 22],
    [20, 18, 26, 16],
    [26, 24, 18, 22],
    [18, 16, 24, 28],
    [20, 18, 18, 26],
    [24, 22, 22, 26],
    [30, 22, 20, 24],
    [18, 26, 24, 28],
    [20, 30, 28, 24],
    [24, 22, 26, 28],
    [26, 22, 24, 22],
    [30, 24, 20, 24],
    [22, 24, 30, 24],
    [24, 28, 24, 30],
    [28, 28, 28, 28],
    [30, 26, 28, 28],
    [28, 26, 26, 26],
    [28, 26, 30, 28],
    [28, 26, 28, 30],
    [28, 28, 30, 24],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [26, 28, 30, 30],
    [28, 28, 28, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
];

static EC_BLOCK_COUNTS: [[usize; 4]; 40] = [
    [1, 1, 1, 1],
    [1, 1, 1, 1],
    [1, 1, 2, 2],
    [1, 2, 2, 4],
    [1, 2, 4, 4],
    [2, 4, 4, 4],
    [2, 4, 6, 5],
    [2, 4, 6, 6],
    [2, 5, 8, 8],
    [4, 5, 8, 8],
    [4, 5, 8, 11],
    [4, 8, 10, 11],
    [4, 9, 12, 16],
    [4, 9, 16, 16],
    [6, 10, 12, 18],
    [6, 10, 17, 16],
    [6, 11, 16, 19],
    [6, 13, 18, 21],
    [7, 14, 21, 25],
    [8, 16, 20, 25],
    [8, 17, 23, 25],
    [9, 17, 23, 34],
    [9, 18, 25, 30],
    [10, 20, 27, 32],
    [12, 21, 29, 35],
    [12, 23, 34, 37],
    [12, 25, 34, 40],
    [13, 26, 35, 42],
    [14, 28, 38, 45],
    [15, 29, 40, 48],
    [16, 31, 43, 51],
    [17, 33, 45, 54],
    [18, 35, 48, 57],
    [19, 37, 51, 60],
    [19, 38, 53, 63],
    [20, 40, 56, 66],
    [21, 43, 59, 70],
    [22, 45, 62, 74],
    [24, 47, 65, 77],
    [25, 49, 68, 81],
];

//-------------------------------------------------------------------
// TESTS
//-------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::data_capacity_bits;

    #[test]
    fn test_gf_mul() {
        assert_eq!(gf_mul(0, 0x53), 0);
        assert_eq!(gf_mul(1, 0x53), 0x53);
        assert_eq!(gf_mul(0x02, 0x80), 0x1d);
        // 2^8 = 2 * 2^7
        assert_eq!(gf_mul(0x02, gf_mul(0x02, 0x80)), 0x3a);
    }

    #[test]
    fn test_iso_18004_annex_i_parity() {
        // The worked 1-M example of ISO/IEC 18004:2006 Annex I: data
        // codewords of "01234567", 10 error correction codewords.
        let data = [
            0b0001_0000, 0b0010_0000, 0b0000_1100, 0b0101_0110, 0b0110_0001,
            0b1000_0000, 0b1110_1100, 0b0001_0001, 0b1110_1100, 0b0001_0001,
            0b1110_1100, 0b0001_0001, 0b1110_1100, 0b0001_0001, 0b1110_1100,
            0b0001_0001,
        ];
        let ec = create_error_correction_code(&data, 10);
        assert_eq!(ec, vec![0xa5, 0x24, 0xd4, 0xc1, 0xed, 0x36, 0xc7, 0x87, 0x2c, 0x55]);
    }

    #[test]
    fn test_total_codewords() {
        assert_eq!(total_codewords(Version::MIN), 26);
        assert_eq!(total_codewords(Version::new(2).unwrap()), 44);
        assert_eq!(total_codewords(Version::new(7).unwrap()), 196);
        assert_eq!(total_codewords(Version::MAX), 3706);
    }

    #[test]
    fn test_capacity_table_consistency() {
        // data codewords must equal the published per-version data capacity
        // for every (version, level) pair.
        for v in 1..=40 {
            let version = Version::new(v).unwrap();
            for ec_level in [EcLevel::L, EcLevel::M, EcLevel::Q, EcLevel::H] {
                assert_eq!(
                    data_codewords(version, ec_level) * 8,
                    data_capacity_bits(version, ec_level),
                    "version {} level {:?}",
                    v,
                    ec_level
                );
            }
        }
    }

    #[test]
    fn test_single_block_interleave_is_identity() {
        let data: Vec<u8> = (0..16).collect();
        let (d, e) = construct_codewords(&data, Version::MIN, EcLevel::M).unwrap();
        assert_eq!(d, data);
        assert_eq!(e.len(), 10);
    }

    #[test]
    fn test_multi_block_interleave() {
        // Version 5-H: 4 blocks, two of 11 data codewords then two of 12.
        let version = Version::new(5).unwrap();
        let n = data_codewords(version, EcLevel::H);
        assert_eq!(n, 46);
        let data: Vec<u8> = (0..n as u8).collect();
        let (d, e) = construct_codewords(&data, version, EcLevel::H).unwrap();
        assert_eq!(d.len(), n);
        assert_eq!(e.len(), 4 * 22);
        // First round of interleaving takes the first codeword of each block.
        assert_eq!(&d[..4], &[0, 11, 22, 34]);
        // The 11th round exhausts the two short blocks.
        assert_eq!(&d[4 * 10..4 * 10 + 4], &[10, 21, 32, 44]);
        assert_eq!(&d[44..], &[33, 45]);
    }

    #[test]
    #[should_panic(expected = "data codeword count")]
    fn test_wrong_data_length_panics() {
        let _ = construct_codewords(&[0u8; 10], Version::MIN, EcLevel::M);
    }
}
