//! QR code symbol generator
//!
//! This crate encodes binary data into one or more QR code symbols and
//! renders them into raster, vector and text formats. Data is appended to
//! a `QrEncoder` segment by segment, then `finalize` selects the version,
//! splits the message into a structured-append sequence when necessary,
//! and produces an immutable `SymbolSet`.
//!
//! ```
//! use qrsym::{EncodeOptions, QrEncoder, RenderConfig};
//!
//! let mut encoder = QrEncoder::new(EncodeOptions::default()).unwrap();
//! encoder.add_data(b"HELLO WORLD").unwrap();
//!
//! let symbols = encoder.finalize().unwrap();
//! assert_eq!(symbols.len(), 1);
//!
//! // Render the first symbol as a PNG.
//! let png = symbols.render_at(1, &RenderConfig::default()).unwrap();
//! assert!(!png.is_empty());
//! ```

pub mod bits;
pub mod canvas;
pub mod ec;
pub mod render;
pub mod split;
pub mod types;

pub use crate::render::{Bitmap, Order, RenderConfig, RenderFormat};
pub use crate::types::{Color, EcLevel, Mode, QrError, QrResult, Version};

use crate::bits::Bits;
use crate::canvas::Canvas;
use crate::split::Segment;

/// The knobs fixed at encoder construction time. Everything here affects
/// the symbol bits; presentation lives in [`RenderConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Symbol version 1 to 40, or `None` to pick the smallest that fits.
    pub version: Option<u8>,

    /// Error correction level. Defaults to medium.
    pub ec_level: EcLevel,

    /// Mask pattern 0 to 7, or `None` to select by penalty score.
    pub mask: Option<u8>,

    /// The most symbols a structured-append sequence may use, 1 to 16.
    /// With the default of 1 the data must fit a single symbol.
    pub max_symbols: usize,

    /// The mode used by [`QrEncoder::add_data`], or `None` to pick the
    /// densest mode the data allows.
    pub mode: Option<Mode>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            version: None,
            ec_level: EcLevel::M,
            mask: None,
            max_symbols: 1,
            mode: None,
        }
    }
}

/// The densest mode whose character set covers `data`. Kanji is never
/// picked automatically; pass it explicitly.
fn detect_mode(data: &[u8]) -> Mode {
    if bits::validate_mode_data(Mode::Numeric, data).is_ok() {
        Mode::Numeric
    } else if bits::validate_mode_data(Mode::Alphanumeric, data).is_ok() {
        Mode::Alphanumeric
    } else {
        Mode::Byte
    }
}

/// A staged QR code builder: append data segments, then consume the
/// encoder with [`finalize`](QrEncoder::finalize) to obtain the symbols.
///
/// The encoder is `Clone`, so a partially filled builder can be forked
/// and the copies finalized independently.
#[derive(Debug, Clone)]
pub struct QrEncoder {
    version: Option<Version>,
    ec_level: EcLevel,
    mask: Option<u8>,
    max_symbols: usize,
    mode: Option<Mode>,
    segments: Vec<Segment>,
}

impl QrEncoder {
    /// Constructs an empty encoder, validating the options.
    ///
    /// # Errors
    ///
    /// - `QrError::InvalidVersion` if the explicit version is outside 1
    ///   to 40.
    /// - `QrError::InvalidMaskPattern` if the explicit mask is above 7.
    /// - `QrError::TooManySymbols` if `max_symbols` is outside 1 to 16.
    pub fn new(options: EncodeOptions) -> QrResult<Self> {
        let version = match options.version {
            Some(v) => Some(Version::new(v)?),
            None => None,
        };
        if let Some(pattern) = options.mask {
            if pattern >= 8 {
                return Err(QrError::InvalidMaskPattern);
            }
        }
        if !(1..=16).contains(&options.max_symbols) {
            return Err(QrError::TooManySymbols);
        }
        Ok(Self {
            version,
            ec_level: options.ec_level,
            mask: options.mask,
            max_symbols: options.max_symbols,
            mode: options.mode,
            segments: Vec::new(),
        })
    }

    /// Appends a data segment, using the configured default mode or the
    /// densest mode the data allows.
    ///
    /// # Errors
    ///
    /// Returns `Err(QrError::InvalidModeData)` if the data is malformed
    /// for the configured mode.
    pub fn add_data(&mut self, data: &[u8]) -> QrResult<()> {
        let mode = self.mode.unwrap_or_else(|| detect_mode(data));
        self.add_data_with_mode(mode, data)
    }

    /// Appends a data segment in an explicit mode. The data is validated
    /// eagerly; Kanji input must already be Shift JIS encoded.
    ///
    /// # Errors
    ///
    /// Returns `Err(QrError::InvalidModeData)` if the data is malformed
    /// for `mode`.
    pub fn add_data_with_mode(&mut self, mode: Mode, data: &[u8]) -> QrResult<()> {
        bits::validate_mode_data(mode, data)?;
        self.segments.push(Segment::Data {
            mode,
            bytes: data.to_vec(),
        });
        Ok(())
    }

    /// Appends an ECI header switching the interpretation of the
    /// following byte data.
    ///
    /// # Errors
    ///
    /// Returns `Err(QrError::InvalidEciDesignator)` if the designator is
    /// above 999999.
    pub fn add_eci(&mut self, designator: u32) -> QrResult<()> {
        if designator > 999_999 {
            return Err(QrError::InvalidEciDesignator);
        }
        self.segments.push(Segment::Eci(designator));
        Ok(())
    }

    /// Consumes the encoder, selecting the version and symbol count and
    /// building every symbol of the set.
    ///
    /// # Errors
    ///
    /// - `QrError::CapacityExceeded` if the data cannot fit a single
    ///   symbol and `max_symbols` is 1.
    /// - `QrError::TooManySymbols` if the data needs more symbols than
    ///   `max_symbols` allows.
    pub fn finalize(self) -> QrResult<SymbolSet> {
        let plan = split::select_plan(
            &self.segments,
            self.version,
            self.ec_level,
            self.max_symbols,
        )?;
        let parity = split::parity(&self.segments);
        let total = plan.shards.len();
        let mut symbols = Vec::with_capacity(total);
        for (index, shard) in plan.shards.iter().enumerate() {
            symbols.push(self.build_symbol(shard, plan.version, index + 1, total, parity)?);
        }
        Ok(SymbolSet { symbols })
    }

    fn build_symbol(
        &self,
        shard: &[Segment],
        version: Version,
        position: usize,
        total: usize,
        parity: u8,
    ) -> QrResult<Symbol> {
        let mut data_bits = Bits::new(version);
        if total > 1 {
            data_bits.push_structured_append(position, total, parity);
        }
        for segment in shard {
            match segment {
                Segment::Data { mode, bytes } => data_bits.push_mode_data(*mode, bytes)?,
                Segment::Eci(designator) => data_bits.push_eci_designator(*designator)?,
            }
        }
        data_bits.push_terminator(bits::data_capacity_bits(version, self.ec_level))?;

        let (data, ec) = ec::construct_codewords(&data_bits.into_bytes(), version, self.ec_level)?;
        let mut canvas = Canvas::new(version, self.ec_level);
        canvas.draw_all_functional_patterns();
        canvas.draw_data(&data, &ec);

        let (mask, canvas) = match self.mask {
            Some(pattern) => {
                let mut masked = canvas;
                masked.apply_mask(pattern);
                (pattern, masked)
            }
            None => canvas.apply_best_mask(),
        };

        Ok(Symbol {
            version,
            ec_level: self.ec_level,
            mask,
            width: version.width(),
            modules: canvas.into_colors(),
            position,
            total,
        })
    }
}

/// One finished QR code symbol. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    version: Version,
    ec_level: EcLevel,
    mask: u8,
    width: i16,
    modules: Vec<Color>,
    position: usize,
    total: usize,
}

impl Symbol {
    pub fn version(&self) -> Version {
        self.version
    }

    pub fn ec_level(&self) -> EcLevel {
        self.ec_level
    }

    /// The mask pattern applied to the symbol, 0 to 7.
    pub fn mask(&self) -> u8 {
        self.mask
    }

    /// The number of modules on each side, without the quiet zone.
    pub fn width(&self) -> i16 {
        self.width
    }

    /// This symbol's 1-based place in its structured-append sequence.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The number of symbols in the sequence this symbol belongs to.
    pub fn total(&self) -> usize {
        self.total
    }

    /// The color of the module at column `x`, row `y`.
    pub fn module(&self, x: i16, y: i16) -> Color {
        debug_assert!(x >= 0 && x < self.width && y >= 0 && y < self.width);
        self.modules[(y as usize) * (self.width as usize) + (x as usize)]
    }

    /// The module colors in row-major order.
    pub fn modules(&self) -> &[Color] {
        &self.modules
    }

    /// Formats the symbol as a text grid of `#` and `.` characters.
    pub fn to_str(&self) -> String {
        let width = self.width as usize;
        let mut grid = String::with_capacity(width * (width + 1));
        for row in self.modules.chunks(width) {
            for color in row {
                grid.push(color.select('#', '.'));
            }
            grid.push('\n');
        }
        grid
    }
}

/// The read-only product of [`QrEncoder::finalize`]: one symbol, or a
/// structured-append sequence of up to 16.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolSet {
    symbols: Vec<Symbol>,
}

impl SymbolSet {
    /// The number of symbols in the set, at least 1.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// The symbol at the 1-based `position`, if any.
    pub fn get(&self, position: usize) -> Option<&Symbol> {
        position.checked_sub(1).and_then(|i| self.symbols.get(i))
    }

    /// Iterates over `(position, symbol)` pairs in the given order. The
    /// iterator is finite and may be restarted by calling `iter` again.
    pub fn iter(&self, order: Order) -> impl Iterator<Item = (usize, &Symbol)> {
        let mut pairs: Vec<_> = self
            .symbols
            .iter()
            .enumerate()
            .map(|(i, symbol)| (i + 1, symbol))
            .collect();
        if order == Order::Reverse {
            pairs.reverse();
        }
        pairs.into_iter()
    }

    /// Renders the symbol at the 1-based `position`.
    ///
    /// # Errors
    ///
    /// Returns `Err(QrError::InvalidSymbolNumber)` if `position` is
    /// outside the set.
    pub fn render_at(&self, position: usize, config: &RenderConfig) -> QrResult<Vec<u8>> {
        let symbol = self.get(position).ok_or(QrError::InvalidSymbolNumber)?;
        render::render(symbol, config)
    }

    /// Renders every symbol, in the order the configuration asks for.
    pub fn render_all(&self, config: &RenderConfig) -> QrResult<Vec<Vec<u8>>> {
        self.iter(config.order)
            .map(|(_, symbol)| render::render(symbol, config))
            .collect()
    }
}

//-------------------------------------------------------------------
// TESTS
//-------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;

    fn encoder() -> QrEncoder {
        QrEncoder::new(EncodeOptions::default()).unwrap()
    }

    #[test]
    fn test_numeric_end_to_end() {
        let mut encoder = encoder();
        encoder.add_data(b"8675309").unwrap();
        let set = encoder.finalize().unwrap();
        assert_eq!(set.len(), 1);

        let symbol = set.get(1).unwrap();
        assert_eq!(symbol.version(), Version::MIN);
        assert_eq!(symbol.ec_level(), EcLevel::M);
        assert_eq!(symbol.width(), 21);
        assert_eq!(symbol.modules().len(), 441);
        assert!(symbol.mask() < 8);
        assert_eq!(symbol.position(), 1);
        assert_eq!(symbol.total(), 1);
        // Finder corners are dark, the separator next to them light.
        assert_eq!(symbol.module(0, 0), Color::Dark);
        assert_eq!(symbol.module(7, 0), Color::Light);
        assert_eq!(symbol.module(20, 0), Color::Dark);
        assert_eq!(symbol.module(0, 20), Color::Dark);
    }

    #[test]
    fn test_auto_version_escalation() {
        let mut enc = QrEncoder::new(EncodeOptions {
            ec_level: EcLevel::H,
            ..EncodeOptions::default()
        })
        .unwrap();
        enc.add_data_with_mode(Mode::Byte, &[0x41; 8]).unwrap();
        let set = enc.finalize().unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(1).unwrap().version(), Version::new(2).unwrap());
        assert_eq!(set.get(1).unwrap().width(), 25);
    }

    #[test]
    fn test_forced_two_symbol_split() {
        let mut enc = QrEncoder::new(EncodeOptions {
            version: Some(1),
            ec_level: EcLevel::H,
            max_symbols: 2,
            ..EncodeOptions::default()
        })
        .unwrap();
        enc.add_data_with_mode(Mode::Byte, &[0x41; 8]).unwrap();
        let set = enc.finalize().unwrap();
        assert_eq!(set.len(), 2);
        for (expected, (position, symbol)) in (1..=2).zip(set.iter(Order::Forward)) {
            assert_eq!(position, expected);
            assert_eq!(symbol.position(), expected);
            assert_eq!(symbol.total(), 2);
            assert_eq!(symbol.version(), Version::MIN);
        }
    }

    #[test]
    fn test_single_symbol_overflow() {
        let mut enc = QrEncoder::new(EncodeOptions {
            version: Some(1),
            ec_level: EcLevel::H,
            ..EncodeOptions::default()
        })
        .unwrap();
        enc.add_data_with_mode(Mode::Byte, &[0x41; 8]).unwrap();
        assert_eq!(enc.finalize().unwrap_err(), QrError::CapacityExceeded);
    }

    #[test]
    fn test_mask_override() {
        let mut enc = QrEncoder::new(EncodeOptions {
            mask: Some(3),
            ..EncodeOptions::default()
        })
        .unwrap();
        enc.add_data(b"MASKED").unwrap();
        let set = enc.finalize().unwrap();
        assert_eq!(set.get(1).unwrap().mask(), 3);
    }

    #[test]
    fn test_invalid_options() {
        let bad_version = EncodeOptions {
            version: Some(41),
            ..EncodeOptions::default()
        };
        assert_eq!(
            QrEncoder::new(bad_version).unwrap_err(),
            QrError::InvalidVersion
        );

        let bad_mask = EncodeOptions {
            mask: Some(8),
            ..EncodeOptions::default()
        };
        assert_eq!(
            QrEncoder::new(bad_mask).unwrap_err(),
            QrError::InvalidMaskPattern
        );

        for max_symbols in [0, 17] {
            let bad_max = EncodeOptions {
                max_symbols,
                ..EncodeOptions::default()
            };
            assert_eq!(
                QrEncoder::new(bad_max).unwrap_err(),
                QrError::TooManySymbols
            );
        }
    }

    #[test]
    fn test_mode_detection() {
        assert_eq!(detect_mode(b"123456"), Mode::Numeric);
        assert_eq!(detect_mode(b"HELLO WORLD"), Mode::Alphanumeric);
        assert_eq!(detect_mode(b"hello"), Mode::Byte);
    }

    #[test]
    fn test_add_data_validates_mode() {
        let mut enc = encoder();
        assert_eq!(
            enc.add_data_with_mode(Mode::Numeric, b"12a"),
            Err(QrError::InvalidModeData)
        );
        assert_eq!(
            enc.add_data_with_mode(Mode::Kanji, b"\x93\x5f\xe4"),
            Err(QrError::InvalidModeData)
        );
        // Nothing was accumulated by the failed calls.
        let set = enc.finalize().unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_kanji_symbol() {
        let mut enc = encoder();
        enc.add_data_with_mode(Mode::Kanji, b"\x93\x5f\xe4\xaa").unwrap();
        let set = enc.finalize().unwrap();
        assert_eq!(set.get(1).unwrap().version(), Version::MIN);
    }

    #[test]
    fn test_eci_designators() {
        let mut enc = encoder();
        assert_eq!(enc.add_eci(1_000_000), Err(QrError::InvalidEciDesignator));
        enc.add_eci(26).unwrap();
        enc.add_data_with_mode(Mode::Byte, "héllo".as_bytes()).unwrap();
        let set = enc.finalize().unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_clone_and_diverge() {
        let mut left = encoder();
        left.add_data(b"COMMON").unwrap();
        let mut right = left.clone();

        left.add_data(b"LEFT").unwrap();
        right.add_data(b"RIGHT-AND-THEN-SOME").unwrap();

        let left_set = left.finalize().unwrap();
        let right_set = right.finalize().unwrap();
        assert_ne!(
            left_set.get(1).unwrap().modules(),
            right_set.get(1).unwrap().modules()
        );
    }

    #[test]
    fn test_iteration_orders() {
        let mut enc = QrEncoder::new(EncodeOptions {
            version: Some(1),
            ec_level: EcLevel::H,
            max_symbols: 2,
            ..EncodeOptions::default()
        })
        .unwrap();
        enc.add_data_with_mode(Mode::Byte, &[0x42; 8]).unwrap();
        let set = enc.finalize().unwrap();

        let forward: Vec<usize> = set.iter(Order::Forward).map(|(p, _)| p).collect();
        let reverse: Vec<usize> = set.iter(Order::Reverse).map(|(p, _)| p).collect();
        assert_eq!(forward, vec![1, 2]);
        assert_eq!(reverse, vec![2, 1]);

        let config = RenderConfig {
            order: Order::Reverse,
            ..RenderConfig::default()
        };
        let all = set.render_all(&config).unwrap();
        assert_eq!(all[0], set.render_at(2, &config).unwrap());
        assert_eq!(all[1], set.render_at(1, &config).unwrap());
    }

    #[test]
    fn test_render_at_bad_position() {
        let mut enc = encoder();
        enc.add_data(b"1").unwrap();
        let set = enc.finalize().unwrap();
        let config = RenderConfig::default();
        assert_eq!(
            set.render_at(0, &config).unwrap_err(),
            QrError::InvalidSymbolNumber
        );
        assert_eq!(
            set.render_at(2, &config).unwrap_err(),
            QrError::InvalidSymbolNumber
        );
    }

    #[test]
    fn test_repeated_finalize_is_deterministic() {
        let make = || {
            let mut enc = encoder();
            enc.add_data(b"DETERMINISM").unwrap();
            enc.finalize().unwrap()
        };
        assert_eq!(make(), make());
    }

    #[test]
    fn test_to_str_grid() {
        let mut enc = encoder();
        enc.add_data(b"8675309").unwrap();
        let grid = enc.finalize().unwrap().get(1).unwrap().to_str();
        let lines: Vec<&str> = grid.lines().collect();
        assert_eq!(lines.len(), 21);
        assert!(lines[0].starts_with("#######"));
    }

    #[test]
    fn test_empty_input_still_encodes() {
        let set = encoder().finalize().unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(1).unwrap().version(), Version::MIN);
    }
}
