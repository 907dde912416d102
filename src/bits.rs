//! The `bits` module assembles the raw bit stream carried by one symbol.
use core::cmp::min;

use crate::types::{EcLevel, Mode, QrError, QrResult, Version};

/// The `Bits` structure stores the encoded data stream for one QR symbol.
pub struct Bits {
    data: Vec<u8>,
    bit_len: usize,
    version: Version,
}

impl Bits {
    /// Constructs a new, empty bit stream for the given version.
    pub fn new(version: Version) -> Self {
        Self {
            data: Vec::new(),
            bit_len: 0,
            version,
        }
    }

    fn push_bit(&mut self, bit: bool) {
        if self.bit_len % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            let last = self.data.len() - 1;
            self.data[last] |= 0x80 >> (self.bit_len % 8);
        }
        self.bit_len += 1;
    }

    /// Pushes the `n` low bits of `value` in big-endian order.
    fn push_bits(&mut self, n: usize, value: u32) {
        debug_assert!(
            n <= 24 && value >> n == 0,
            "{} does not fit in {} bits",
            value,
            n
        );
        for i in (0..n).rev() {
            self.push_bit((value >> i) & 1 != 0);
        }
    }

    /// Converts the bits into a byte vector, zero-padded to a byte boundary.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Total number of bits currently pushed.
    pub fn len(&self) -> usize {
        self.bit_len
    }

    /// Whether there are any bits pushed.
    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    /// Version of the symbol this stream is destined for.
    pub fn version(&self) -> Version {
        self.version
    }

    fn push_header(&mut self, mode: Mode, char_count: usize) -> QrResult<()> {
        let indicator = match mode {
            Mode::Numeric => 0b0001,
            Mode::Alphanumeric => 0b0010,
            Mode::Byte => 0b0100,
            Mode::Kanji => 0b1000,
        };
        self.push_bits(4, indicator);
        let length_bits = mode.length_bits_count(self.version);
        if char_count >= (1 << length_bits) {
            return Err(QrError::CapacityExceeded);
        }
        self.push_bits(length_bits, char_count as u32);
        Ok(())
    }
}

/// In alphanumeric mode a pair of characters is encoded as a base-45
/// integer. `alphanumeric_digit` converts one character into its base-45
/// digit, or `None` for characters outside the 45-character set.
#[inline]
fn alphanumeric_digit(character: u8) -> Option<u16> {
    match character {
        b'0'..=b'9' => Some(u16::from(character - b'0')),
        b'A'..=b'Z' => Some(u16::from(character - b'A') + 10),
        b' ' => Some(36),
        b'$' => Some(37),
        b'%' => Some(38),
        b'*' => Some(39),
        b'+' => Some(40),
        b'-' => Some(41),
        b'.' => Some(42),
        b'/' => Some(43),
        b':' => Some(44),
        _ => None,
    }
}

/// Maps one Shift JIS double-byte codepoint into its 13-bit Kanji-mode
/// value, or `None` if the codepoint is outside the encodable ranges.
#[inline]
fn kanji_value(cp: u16) -> Option<u16> {
    let bytes = match cp {
        0x8140..=0x9ffc => cp - 0x8140,
        0xe040..=0xebbf => cp - 0xc140,
        _ => return None,
    };
    Some((bytes >> 8) * 0xc0 + (bytes & 0xff))
}

/// Checks that `data` is well formed for the declared `mode`, without
/// encoding anything.
///
/// # Errors
///
/// Returns `Err(QrError::InvalidModeData)` on the first offending byte.
pub fn validate_mode_data(mode: Mode, data: &[u8]) -> QrResult<()> {
    match mode {
        Mode::Numeric => {
            if data.iter().all(u8::is_ascii_digit) {
                Ok(())
            } else {
                Err(QrError::InvalidModeData)
            }
        }
        Mode::Alphanumeric => {
            if data.iter().all(|b| alphanumeric_digit(*b).is_some()) {
                Ok(())
            } else {
                Err(QrError::InvalidModeData)
            }
        }
        Mode::Byte => Ok(()),
        Mode::Kanji => {
            if data.len() % 2 != 0 {
                return Err(QrError::InvalidModeData);
            }
            for pair in data.chunks(2) {
                let cp = u16::from(pair[0]) * 256 + u16::from(pair[1]);
                if kanji_value(cp).is_none() {
                    return Err(QrError::InvalidModeData);
                }
            }
            Ok(())
        }
    }
}

impl Bits {
    /// Encodes a numeric string to the bits.
    ///
    /// The data should only contain the characters 0 to 9.
    ///
    /// # Errors
    ///
    /// Returns `Err(QrError::InvalidModeData)` if a non-digit is found, or
    /// `Err(QrError::CapacityExceeded)` if the character count overflows
    /// its field.
    pub fn push_numeric_data(&mut self, data: &[u8]) -> QrResult<()> {
        self.push_header(Mode::Numeric, data.len())?;
        for chunk in data.chunks(3) {
            let mut number = 0u32;
            for b in chunk {
                if !b.is_ascii_digit() {
                    return Err(QrError::InvalidModeData);
                }
                number = number * 10 + u32::from(b - b'0');
            }
            self.push_bits(chunk.len() * 3 + 1, number);
        }
        Ok(())
    }

    /// Encodes an alphanumeric string to the bits.
    ///
    /// The data should only contain the characters A to Z (excluding
    /// lowercase), 0 to 9, space, `$`, `%`, `*`, `+`, `-`, `.`, `/` or `:`.
    ///
    /// # Errors
    ///
    /// Returns `Err(QrError::InvalidModeData)` if a character outside the
    /// set is found.
    pub fn push_alphanumeric_data(&mut self, data: &[u8]) -> QrResult<()> {
        self.push_header(Mode::Alphanumeric, data.len())?;
        for chunk in data.chunks(2) {
            let mut number = 0u32;
            for b in chunk {
                let digit = alphanumeric_digit(*b).ok_or(QrError::InvalidModeData)?;
                number = number * 45 + u32::from(digit);
            }
            self.push_bits(chunk.len() * 5 + 1, number);
        }
        Ok(())
    }

    /// Encodes 8-bit byte data to the bits, verbatim.
    pub fn push_byte_data(&mut self, data: &[u8]) -> QrResult<()> {
        self.push_header(Mode::Byte, data.len())?;
        for b in data {
            self.push_bits(8, u32::from(*b));
        }
        Ok(())
    }

    /// Encodes Shift JIS double-byte data to the bits, one 13-bit value per
    /// character.
    ///
    /// The engine does not transcode character sets; the input must already
    /// be Shift JIS encoded.
    ///
    /// # Errors
    ///
    /// Returns `Err(QrError::InvalidModeData)` if the length is odd or a
    /// codepoint falls outside the encodable Shift JIS ranges.
    pub fn push_kanji_data(&mut self, data: &[u8]) -> QrResult<()> {
        if data.len() % 2 != 0 {
            return Err(QrError::InvalidModeData);
        }
        self.push_header(Mode::Kanji, data.len() / 2)?;
        for pair in data.chunks(2) {
            let cp = u16::from(pair[0]) * 256 + u16::from(pair[1]);
            let value = kanji_value(cp).ok_or(QrError::InvalidModeData)?;
            self.push_bits(13, u32::from(value));
        }
        Ok(())
    }

    /// Pushes data in the given mode.
    pub fn push_mode_data(&mut self, mode: Mode, data: &[u8]) -> QrResult<()> {
        match mode {
            Mode::Numeric => self.push_numeric_data(data),
            Mode::Alphanumeric => self.push_alphanumeric_data(data),
            Mode::Byte => self.push_byte_data(data),
            Mode::Kanji => self.push_kanji_data(data),
        }
    }

    /// Pushes an ECI header, switching the interpretation of the following
    /// byte-mode data.
    ///
    /// # Errors
    ///
    /// Returns `Err(QrError::InvalidEciDesignator)` if the designator is
    /// above 999999.
    pub fn push_eci_designator(&mut self, designator: u32) -> QrResult<()> {
        self.push_bits(4, 0b0111);
        match designator {
            0..=127 => {
                self.push_bits(8, designator);
            }
            128..=16383 => {
                self.push_bits(2, 0b10);
                self.push_bits(14, designator);
            }
            16384..=999_999 => {
                self.push_bits(3, 0b110);
                self.push_bits(21, designator);
            }
            _ => return Err(QrError::InvalidEciDesignator),
        }
        Ok(())
    }

    /// Pushes the structured-append header tagging this symbol as number
    /// `position` (1-based) of `total`, with the parity byte computed over
    /// the entire original input.
    pub fn push_structured_append(&mut self, position: usize, total: usize, parity: u8) {
        debug_assert!((1..=16).contains(&total) && (1..=total).contains(&position));
        self.push_bits(4, 0b0011);
        self.push_bits(4, (position - 1) as u32);
        self.push_bits(4, (total - 1) as u32);
        self.push_bits(8, u32::from(parity));
    }

    /// Pushes the terminator, pads to a codeword boundary and fills the
    /// remaining data capacity with the alternating pad codewords.
    ///
    /// # Errors
    ///
    /// Returns `Err(QrError::CapacityExceeded)` if the stream is already
    /// longer than `capacity_bits`.
    pub fn push_terminator(&mut self, capacity_bits: usize) -> QrResult<()> {
        if self.bit_len > capacity_bits {
            return Err(QrError::CapacityExceeded);
        }

        let terminator = min(4, capacity_bits - self.bit_len);
        self.push_bits(terminator, 0);

        if self.bit_len % 8 != 0 {
            self.push_bits(8 - self.bit_len % 8, 0);
        }

        const PAD_CODEWORDS: [u8; 2] = [0b1110_1100, 0b0001_0001];
        let mut pad = PAD_CODEWORDS.iter().cycle();
        while self.bit_len < capacity_bits {
            self.push_bits(8, u32::from(*pad.next().unwrap()));
        }
        Ok(())
    }
}

/// The number of encoded bits one segment of `char_count` characters
/// occupies at the given version, header included.
pub fn segment_encoded_bits(mode: Mode, version: Version, char_count: usize) -> usize {
    4 + mode.length_bits_count(version) + mode.data_bits_count(char_count)
}

/// The number of bits an ECI header occupies.
pub fn eci_encoded_bits(designator: u32) -> usize {
    4 + match designator {
        0..=127 => 8,
        128..=16383 => 16,
        _ => 24,
    }
}

/// The structured-append header length in bits.
pub const STRUCTURED_APPEND_BITS: usize = 20;

/// The data capacity, in bits, of one symbol at the given version and
/// error correction level.
pub fn data_capacity_bits(version: Version, ec_level: EcLevel) -> usize {
    version.fetch(ec_level, &DATA_LENGTHS)
}

// This table is copied from ISO/IEC 18004:2006 §6.4.10, Table 7.
static DATA_LENGTHS: [[usize; 4]; 40] = [
    [152, 128, 104, 72],
    [272, 224, 176, 128],
    [440, 352, 272, 208],
    [640, 512, 384, 288],
    [864, 688, 496, 368],
    [1088, 864, 608, 480],
    [1248, 992, 704, 528],
    [1552, 1232, 880, 688],
    [1856, 1456, 1056, 800],
    [2192, 1728, 1232, 976],
    [2592, 2032, 1440, 1120],
    [2960, 2320, 1648, 1264],
    [3424, 2672, 1952, 1440],
    [3688, 2920, 2088, 1576],
    [4184, 3320, 2360, 1784],
    [4712, 3624, 2600, 2024],
    [5176, 4056, 2936, 2264],
    [5768, 4504, 3176, 2504],
    [6360, 5016, 3560, 2728],
    [6888, 5352, 3880, 3080],
    [7456, 5712, 4096, 3248],
    [8048, 6256, 4544, 3536],
    [8752, 6880, 4912, 3712],
    [9392, 7312, 5312, 4112],
    [10208, 8000, 5744, 4304],
    [10960, 8496, 6032, 4768],
    [11744, 9024, 6464, 5024],
    [12248, 9544, 6968, 5288],
    [13048, 10136, 7288, 5608],
    [13880, 10984, 7880, 5960],
    [14744, 11640, 8264, 6344],
    [15640, 12328, 8920, 6760],
    [16568, 13048, 9368, 7208],
    [17528, 13800, 9848, 7688],
    [18448, 14496, 10288, 7888],
    [19472, 15312, 10832, 8432],
    [20528, 15936, 11408, 8768],
    [21616, 16816, 12016, 9136],
    [22496, 17728, 12656, 9776],
    [23648, 18672, 13328, 10208],
];

//-------------------------------------------------------------------
// TESTS
//-------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_bits() {
        let mut bits = Bits::new(Version::MIN);
        bits.push_bits(3, 0b010);
        bits.push_bits(3, 0b110);
        bits.push_bits(3, 0b101);
        bits.push_bits(7, 0b001_1010);
        assert_eq!(bits.len(), 16);
        assert_eq!(bits.into_bytes(), vec![0b0101_1010, 0b1001_1010]);
    }

    #[test]
    fn test_iso_18004_numeric_example_1() {
        let mut bits = Bits::new(Version::MIN);
        assert_eq!(bits.push_numeric_data(b"01234567"), Ok(()));
        assert_eq!(
            bits.into_bytes(),
            vec![
                0b0001_0000,
                0b0010_0000,
                0b00001100,
                0b01010110,
                0b01_100001,
                0b1000_0000
            ]
        );
    }

    #[test]
    fn test_iso_18004_numeric_example_2() {
        let mut bits = Bits::new(Version::MIN);
        assert_eq!(bits.push_numeric_data(b"0123456789012345"), Ok(()));
        assert_eq!(
            bits.into_bytes(),
            vec![
                0b0001_0000,
                0b0100_0000,
                0b00001100,
                0b01010110,
                0b01_101010,
                0b0110_1110,
                0b0001_0100,
                0b11101010,
                0b0101_0000,
            ]
        );
    }

    #[test]
    fn test_numeric_rejects_letters() {
        let mut bits = Bits::new(Version::MIN);
        assert_eq!(bits.push_numeric_data(b"12a4"), Err(QrError::InvalidModeData));
        assert_eq!(
            validate_mode_data(Mode::Numeric, b"12a4"),
            Err(QrError::InvalidModeData)
        );
    }

    #[test]
    fn test_iso_18004_alphanumeric_example() {
        let mut bits = Bits::new(Version::MIN);
        assert_eq!(bits.push_alphanumeric_data(b"AC-42"), Ok(()));
        assert_eq!(
            bits.into_bytes(),
            vec![
                0b0010_0000,
                0b0010_1001,
                0b11001110,
                0b11100111,
                0b001_00001,
                0b0000_0000
            ]
        );
    }

    #[test]
    fn test_alphanumeric_rejects_lowercase() {
        assert_eq!(
            validate_mode_data(Mode::Alphanumeric, b"ab"),
            Err(QrError::InvalidModeData)
        );
    }

    #[test]
    fn test_byte_data() {
        let mut bits = Bits::new(Version::MIN);
        assert_eq!(bits.push_byte_data(b"\x12\x34\x56"), Ok(()));
        assert_eq!(
            bits.into_bytes(),
            vec![
                0b0100_0000,
                0b0011_0001,
                0b0010_0011,
                0b0100_0101,
                0b0110_0000,
            ]
        );
    }

    #[test]
    fn test_iso_18004_kanji_example() {
        let mut bits = Bits::new(Version::MIN);
        assert_eq!(bits.push_kanji_data(b"\x93\x5f\xe4\xaa"), Ok(()));
        assert_eq!(
            bits.into_bytes(),
            vec![
                0b1000_0000,
                0b0010_0110,
                0b11001111,
                0b1_1101010,
                0b1010_1000
            ]
        );
    }

    #[test]
    fn test_kanji_rejects_odd_length() {
        assert_eq!(
            validate_mode_data(Mode::Kanji, b"\x93\x5f\xe4"),
            Err(QrError::InvalidModeData)
        );
    }

    #[test]
    fn test_kanji_rejects_out_of_range() {
        assert_eq!(
            validate_mode_data(Mode::Kanji, b"\x40\x40"),
            Err(QrError::InvalidModeData)
        );
    }

    #[test]
    fn test_eci_designator_sizes() {
        let mut bits = Bits::new(Version::MIN);
        assert_eq!(bits.push_eci_designator(9), Ok(()));
        assert_eq!(bits.len(), 12);
        assert_eq!(bits.into_bytes(), vec![0b0111_0000, 0b1001_0000]);

        let mut bits = Bits::new(Version::MIN);
        assert_eq!(bits.push_eci_designator(300), Ok(()));
        assert_eq!(bits.len(), 20);

        let mut bits = Bits::new(Version::MIN);
        assert_eq!(bits.push_eci_designator(999_999), Ok(()));
        assert_eq!(bits.len(), 28);

        let mut bits = Bits::new(Version::MIN);
        assert_eq!(
            bits.push_eci_designator(1_000_000),
            Err(QrError::InvalidEciDesignator)
        );
    }

    #[test]
    fn test_structured_append_header() {
        let mut bits = Bits::new(Version::MIN);
        bits.push_structured_append(2, 3, 0xa5);
        assert_eq!(bits.len(), STRUCTURED_APPEND_BITS);
        assert_eq!(bits.into_bytes(), vec![0b0011_0001, 0b0010_1010, 0b0101_0000]);
    }

    #[test]
    fn test_terminator_and_padding() {
        let mut bits = Bits::new(Version::MIN);
        bits.push_numeric_data(b"01234567").unwrap();
        bits.push_terminator(data_capacity_bits(Version::MIN, EcLevel::M))
            .unwrap();
        // ISO/IEC 18004:2006 Annex I.2, the worked 1-M example.
        assert_eq!(
            bits.into_bytes(),
            vec![
                0b0001_0000, 0b0010_0000, 0b0000_1100, 0b0101_0110, 0b0110_0001,
                0b1000_0000, 0b1110_1100, 0b0001_0001, 0b1110_1100, 0b0001_0001,
                0b1110_1100, 0b0001_0001, 0b1110_1100, 0b0001_0001, 0b1110_1100,
                0b0001_0001,
            ]
        );
    }

    #[test]
    fn test_terminator_overflow() {
        let mut bits = Bits::new(Version::MIN);
        bits.push_byte_data(&[0u8; 20]).unwrap();
        assert_eq!(
            bits.push_terminator(data_capacity_bits(Version::MIN, EcLevel::H)),
            Err(QrError::CapacityExceeded)
        );
    }

    #[test]
    fn test_segment_encoded_bits() {
        assert_eq!(segment_encoded_bits(Mode::Numeric, Version::MIN, 7), 38);
        assert_eq!(segment_encoded_bits(Mode::Byte, Version::MIN, 7), 68);
        assert_eq!(
            segment_encoded_bits(Mode::Byte, Version::new(10).unwrap(), 7),
            76
        );
    }
}
