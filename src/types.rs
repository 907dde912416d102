use core::fmt::{Display, Error, Formatter};
use core::ops::Not;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum QrError {
    /// The requested version is outside 1 to 40.
    InvalidVersion,

    /// The requested mask pattern is outside 0 to 7.
    InvalidMaskPattern,

    /// The data is malformed for the declared encoding mode, e.g. a letter
    /// in numeric mode or an odd number of bytes in Kanji mode.
    InvalidModeData,

    /// The provided ECI designator is invalid. A valid designator should be
    /// between 0 and 999999.
    InvalidEciDesignator,

    /// The data does not fit a single symbol at any permitted version.
    CapacityExceeded,

    /// The data cannot be distributed over the configured maximum number of
    /// structured-append symbols.
    TooManySymbols,

    /// The requested symbol position is outside the finalized set.
    InvalidSymbolNumber,

    /// The requested output format is not known to the renderer.
    UnsupportedFormat,

    /// The render configuration is out of range, e.g. a magnification of
    /// zero or a separator wider than 16 modules.
    InvalidRenderConfig,

    /// The underlying raster codec rejected the image.
    ImageEncoding,
}

impl Display for QrError {
    fn fmt(&self, fmt: &mut Formatter) -> Result<(), Error> {
        let msg = match *self {
            QrError::InvalidVersion => "invalid version",
            QrError::InvalidMaskPattern => "invalid mask pattern",
            QrError::InvalidModeData => "data malformed for declared mode",
            QrError::InvalidEciDesignator => "invalid ECI designator",
            QrError::CapacityExceeded => "capacity exceeded",
            QrError::TooManySymbols => "too many symbols",
            QrError::InvalidSymbolNumber => "invalid symbol number",
            QrError::UnsupportedFormat => "unsupported output format",
            QrError::InvalidRenderConfig => "invalid render configuration",
            QrError::ImageEncoding => "image encoding failed",
        };
        fmt.write_str(msg)
    }
}

impl ::std::error::Error for QrError {}

/// `QrResult` is a convenient alias for a QR code generation result.
pub type QrResult<T> = Result<T, QrError>;

/// The color of a module.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Color {
    /// The module is light colored.
    Light,
    /// The module is dark colored.
    Dark,
}

impl Color {
    /// Selects a value according to color of the module. Equivalent to
    /// `if self != Color::Light { dark } else { light }`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use qrsym::types::Color;
    /// assert_eq!(Color::Light.select(1, 0), 0);
    /// assert_eq!(Color::Dark.select("black", "white"), "black");
    /// ```
    pub fn select<T>(self, dark: T, light: T) -> T {
        match self {
            Color::Light => light,
            Color::Dark => dark,
        }
    }
}

impl Not for Color {
    type Output = Self;
    fn not(self) -> Self {
        match self {
            Color::Light => Color::Dark,
            Color::Dark => Color::Light,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcLevel {
    /// Low error correction. Allows up to 7% of wrong blocks.
    L = 0,

    /// Medium error correction (default). Allows up to 15% of wrong blocks.
    M = 1,

    /// "Quartile" error correction. Allows up to 25% of wrong blocks.
    Q = 2,

    /// High error correction. Allows up to 30% of wrong blocks.
    H = 3,
}

/// A QR code symbol version between 1 and 40. The version determines the
/// matrix dimension: a version `v` symbol is `17 + 4·v` modules wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u8);

impl Version {
    pub const MIN: Version = Version(1);
    pub const MAX: Version = Version(40);

    /// Constructs a version, checking the valid range.
    ///
    /// # Errors
    ///
    /// Returns `Err(QrError::InvalidVersion)` if `v` is outside 1 to 40.
    pub fn new(v: u8) -> QrResult<Self> {
        if (1..=40).contains(&v) {
            Ok(Self(v))
        } else {
            Err(QrError::InvalidVersion)
        }
    }

    /// The version number, between 1 and 40.
    pub fn number(self) -> u8 {
        self.0
    }

    /// The number of modules on each side of the symbol, without the quiet
    /// zone.
    pub fn width(self) -> i16 {
        i16::from(self.0) * 4 + 17
    }

    /// Looks up a per-version, per-level entry in a hard-coded `40×4` table.
    /// The inner arrays are ordered `[L, M, Q, H]`.
    pub fn fetch<T: Copy>(self, ec_level: EcLevel, table: &[[T; 4]; 40]) -> T {
        table[usize::from(self.0) - 1][ec_level as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Numeric,
    Alphanumeric,
    Byte,
    Kanji,
}

impl Mode {
    /// Computes the number of bits of the character count field for this
    /// mode at the given version.
    ///
    ///     use qrsym::types::{Version, Mode};
    ///
    ///     assert_eq!(Mode::Numeric.length_bits_count(Version::MIN), 10);
    pub fn length_bits_count(self, version: Version) -> usize {
        match version.number() {
            1..=9 => match self {
                Mode::Numeric => 10,
                Mode::Alphanumeric => 9,
                Mode::Byte | Mode::Kanji => 8,
            },
            10..=26 => match self {
                Mode::Numeric => 12,
                Mode::Alphanumeric => 11,
                Mode::Byte => 16,
                Mode::Kanji => 10,
            },
            _ => match self {
                Mode::Numeric => 14,
                Mode::Alphanumeric => 13,
                Mode::Byte => 16,
                Mode::Kanji => 12,
            },
        }
    }

    /// Computes the number of payload bits taken by `raw_data_len`
    /// characters in this mode.
    ///
    /// Note that in Kanji mode, `raw_data_len` is the number of Kanji
    /// characters, i.e. half the number of bytes.
    pub fn data_bits_count(self, raw_data_len: usize) -> usize {
        match self {
            Mode::Numeric => (raw_data_len * 10 + 2) / 3,
            Mode::Alphanumeric => (raw_data_len * 11 + 1) / 2,
            Mode::Byte => raw_data_len * 8,
            Mode::Kanji => raw_data_len * 13,
        }
    }

    /// The number of bytes occupied by one character of this mode.
    pub fn bytes_per_char(self) -> usize {
        match self {
            Mode::Kanji => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_range() {
        assert_eq!(Version::new(0), Err(QrError::InvalidVersion));
        assert_eq!(Version::new(41), Err(QrError::InvalidVersion));
        assert_eq!(Version::new(1).unwrap().width(), 21);
        assert_eq!(Version::new(40).unwrap().width(), 177);
    }

    #[test]
    fn test_length_bits() {
        let v10 = Version::new(10).unwrap();
        let v27 = Version::new(27).unwrap();
        assert_eq!(Mode::Byte.length_bits_count(Version::MIN), 8);
        assert_eq!(Mode::Byte.length_bits_count(v10), 16);
        assert_eq!(Mode::Kanji.length_bits_count(v27), 12);
    }

    #[test]
    fn test_data_bits() {
        assert_eq!(Mode::Numeric.data_bits_count(7), 24);
        assert_eq!(Mode::Alphanumeric.data_bits_count(5), 28);
        assert_eq!(Mode::Kanji.data_bits_count(2), 26);
    }
}
