//! The `canvas` module lays out function patterns and codeword bits in the
//! module matrix, applies the masking patterns and selects the best one by
//! penalty score.

use crate::ec;
use crate::types::{Color, EcLevel, Version};

/// The state of one module during matrix construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    /// The module is not yet assigned.
    Empty,

    /// The module belongs to a function pattern or an information area and
    /// must not be touched by masking.
    Function(Color),

    /// The module carries a codeword or remainder bit and participates in
    /// masking.
    Data(Color),
}

impl Module {
    /// The color of the module, with unassigned modules reading as light.
    pub fn color(self) -> Color {
        match self {
            Module::Empty => Color::Light,
            Module::Function(c) | Module::Data(c) => c,
        }
    }
}

/// A working QR symbol matrix before it is frozen into a `Symbol`.
#[derive(Clone)]
pub struct Canvas {
    width: i16,
    version: Version,
    ec_level: EcLevel,
    modules: Vec<Module>,
}

impl Canvas {
    /// Constructs a blank canvas for the given version.
    pub fn new(version: Version, ec_level: EcLevel) -> Self {
        let width = version.width();
        Self {
            width,
            version,
            ec_level,
            modules: vec![Module::Empty; (width as usize) * (width as usize)],
        }
    }

    pub fn width(&self) -> i16 {
        self.width
    }

    fn index(&self, x: i16, y: i16) -> usize {
        debug_assert!(x >= 0 && x < self.width && y >= 0 && y < self.width);
        (y as usize) * (self.width as usize) + (x as usize)
    }

    pub fn get(&self, x: i16, y: i16) -> Module {
        self.modules[self.index(x, y)]
    }

    fn put(&mut self, x: i16, y: i16, module: Module) {
        let index = self.index(x, y);
        self.modules[index] = module;
    }

    fn put_function(&mut self, x: i16, y: i16, color: Color) {
        self.put(x, y, Module::Function(color));
    }

    /// Consumes the canvas and returns the final module colors in row-major
    /// order.
    pub fn into_colors(self) -> Vec<Color> {
        self.modules.into_iter().map(Module::color).collect()
    }
}

/// Function patterns
impl Canvas {
    /// Draws one finder pattern centered at `(cx, cy)` together with its
    /// light separator ring, clipping at the symbol edge.
    fn draw_finder_pattern_at(&mut self, cx: i16, cy: i16) {
        for dy in -4..=4 {
            for dx in -4..=4 {
                let x = cx + dx;
                let y = cy + dy;
                if x < 0 || x >= self.width || y < 0 || y >= self.width {
                    continue;
                }
                let r = dx.abs().max(dy.abs());
                let color = if r <= 1 || r == 3 {
                    Color::Dark
                } else {
                    Color::Light
                };
                self.put_function(x, y, color);
            }
        }
    }

    fn draw_finder_patterns(&mut self) {
        self.draw_finder_pattern_at(3, 3);
        self.draw_finder_pattern_at(self.width - 4, 3);
        self.draw_finder_pattern_at(3, self.width - 4);
    }

    fn draw_timing_patterns(&mut self) {
        for i in 8..self.width - 8 {
            let color = if i % 2 == 0 { Color::Dark } else { Color::Light };
            self.put_function(i, 6, color);
            self.put_function(6, i, color);
        }
    }

    /// The center coordinates of the alignment patterns, per ISO/IEC
    /// 18004:2006 Annex E.
    fn alignment_pattern_positions(&self) -> Vec<i16> {
        let v = i16::from(self.version.number());
        if v == 1 {
            return Vec::new();
        }
        let count = v / 7 + 2;
        let step = (v * 8 + count * 3 + 5) / (count * 4 - 4) * 2;
        let mut positions = vec![6];
        let mut pos = v * 4 + 10;
        for _ in 1..count {
            positions.insert(1, pos);
            pos -= step;
        }
        positions
    }

    fn draw_alignment_patterns(&mut self) {
        let positions = self.alignment_pattern_positions();
        let last = positions.len().wrapping_sub(1);
        for (i, &cy) in positions.iter().enumerate() {
            for (j, &cx) in positions.iter().enumerate() {
                // The three finder corners have no alignment pattern.
                if (i == 0 && j == 0) || (i == 0 && j == last) || (i == last && j == 0) {
                    continue;
                }
                for dy in -2..=2i16 {
                    for dx in -2..=2i16 {
                        let r = dx.abs().max(dy.abs());
                        let color = if r == 1 { Color::Light } else { Color::Dark };
                        self.put_function(cx + dx, cy + dy, color);
                    }
                }
            }
        }
    }

    /// Draws the version information blocks for version 7 and up.
    fn draw_version_info(&mut self) {
        let v = u32::from(self.version.number());
        if v < 7 {
            return;
        }
        let mut rem = v;
        for _ in 0..12 {
            rem = (rem << 1) ^ ((rem >> 11) * 0x1f25);
        }
        let bits = (v << 12) | rem;
        for i in 0..18i16 {
            let color = if (bits >> i) & 1 != 0 {
                Color::Dark
            } else {
                Color::Light
            };
            let a = self.width - 11 + i % 3;
            let b = i / 3;
            self.put_function(a, b, color);
            self.put_function(b, a, color);
        }
    }

    /// Writes the two copies of the 15-bit format information word into
    /// their fixed positions, plus the always-dark module.
    fn draw_format_bits(&mut self, bits: u16) {
        let color = |i: usize| {
            if (bits >> i) & 1 != 0 {
                Color::Dark
            } else {
                Color::Light
            }
        };

        // First copy, around the top-left finder.
        for i in 0..6 {
            self.put_function(8, i as i16, color(i));
        }
        self.put_function(8, 7, color(6));
        self.put_function(8, 8, color(7));
        self.put_function(7, 8, color(8));
        for i in 9..15 {
            self.put_function(14 - i as i16, 8, color(i));
        }

        // Second copy, split between the other two finders.
        for i in 0..8 {
            self.put_function(self.width - 1 - i as i16, 8, color(i));
        }
        for i in 8..15 {
            self.put_function(8, self.width - 15 + i as i16, color(i));
        }
        self.put_function(8, self.width - 8, Color::Dark);
    }

    /// Draws every data-independent pattern and reserves the format
    /// information area so data placement skips it. The real format bits
    /// are written after mask selection.
    pub fn draw_all_functional_patterns(&mut self) {
        self.draw_finder_patterns(); // separators included
        self.draw_timing_patterns();
        self.draw_alignment_patterns();
        self.draw_version_info();
        self.draw_format_bits(0);
    }
}

/// The 15-bit BCH-protected format information word for an error
/// correction level and mask pattern.
fn format_info_bits(ec_level: EcLevel, mask_pattern: u8) -> u16 {
    let level_bits: u32 = match ec_level {
        EcLevel::L => 1,
        EcLevel::M => 0,
        EcLevel::Q => 3,
        EcLevel::H => 2,
    };
    let data = level_bits << 3 | u32::from(mask_pattern);
    let mut rem = data;
    for _ in 0..10 {
        rem = (rem << 1) ^ ((rem >> 9) * 0x537);
    }
    ((data << 10 | rem) ^ 0x5412) as u16
}

/// Data placement
impl Canvas {
    /// Places the interleaved codewords in the standard two-column zig-zag
    /// traversal, skipping function modules. Slots beyond the last codeword
    /// bit become light remainder bits.
    ///
    /// # Panics
    ///
    /// Panics if the codeword count does not match the symbol's total
    /// codeword capacity; the selector and coder guarantee it does, so a
    /// mismatch is a defect.
    pub fn draw_data(&mut self, data: &[u8], ec: &[u8]) {
        assert_eq!(
            data.len() + ec.len(),
            ec::total_codewords(self.version),
            "codeword count does not fill the symbol"
        );
        let bits: Vec<u8> = data.iter().chain(ec.iter()).copied().collect();

        let mut i = 0usize;
        let mut right = self.width - 1;
        while right >= 1 {
            if right == 6 {
                right = 5;
            }
            let upward = (right + 1) & 2 == 0;
            for vert in 0..self.width {
                let y = if upward { self.width - 1 - vert } else { vert };
                for j in 0..2 {
                    let x = right - j;
                    if self.get(x, y) == Module::Empty {
                        let color = if i < bits.len() * 8 {
                            if (bits[i >> 3] >> (7 - (i & 7))) & 1 != 0 {
                                Color::Dark
                            } else {
                                Color::Light
                            }
                        } else {
                            Color::Light
                        };
                        self.put(x, y, Module::Data(color));
                        i += 1;
                    }
                }
            }
            right -= 2;
        }
        let placed = i;
        let expected = bits.len() * 8;
        assert!(
            placed >= expected && placed - expected < 8,
            "codeword bits do not fill the data modules"
        );
    }
}

/// Masking
impl Canvas {
    /// Whether the mask formula of `pattern` flips the module at column `x`,
    /// row `y`.
    fn mask_hit(pattern: u8, x: i16, y: i16) -> bool {
        match pattern {
            0 => (x + y) % 2 == 0,
            1 => y % 2 == 0,
            2 => x % 3 == 0,
            3 => (x + y) % 3 == 0,
            4 => (y / 2 + x / 3) % 2 == 0,
            5 => (x * y) % 2 + (x * y) % 3 == 0,
            6 => ((x * y) % 2 + (x * y) % 3) % 2 == 0,
            7 => ((x + y) % 2 + (x * y) % 3) % 2 == 0,
            _ => panic!("unknown mask pattern {}", pattern),
        }
    }

    /// XORs the mask formula over the data modules and writes the matching
    /// format information. Function modules are untouched.
    pub fn apply_mask(&mut self, pattern: u8) {
        for y in 0..self.width {
            for x in 0..self.width {
                if let Module::Data(color) = self.get(x, y) {
                    if Self::mask_hit(pattern, x, y) {
                        self.put(x, y, Module::Data(!color));
                    }
                }
            }
        }
        self.draw_format_bits(format_info_bits(self.ec_level, pattern));
    }

    /// Applies all eight candidate masks and keeps the one with the lowest
    /// penalty score; ties resolve to the lowest pattern id.
    pub fn apply_best_mask(&self) -> (u8, Canvas) {
        let (_, pattern, canvas) = (0u8..8)
            .map(|pattern| {
                let mut candidate = self.clone();
                candidate.apply_mask(pattern);
                (candidate.penalty_score(), pattern, candidate)
            })
            .min_by_key(|(score, pattern, _)| (*score, *pattern))
            .unwrap();
        (pattern, canvas)
    }
}

const PENALTY_ADJACENT: u32 = 3;
const PENALTY_BLOCK: u32 = 3;
const PENALTY_FINDER_LIKE: u32 = 40;
const PENALTY_RATIO: u32 = 10;

/// Penalty scoring
impl Canvas {
    fn row_colors(&self, y: i16) -> Vec<bool> {
        (0..self.width)
            .map(|x| self.get(x, y).color() == Color::Dark)
            .collect()
    }

    fn column_colors(&self, x: i16) -> Vec<bool> {
        (0..self.width)
            .map(|y| self.get(x, y).color() == Color::Dark)
            .collect()
    }

    /// Rule 1: runs of five or more same-colored modules in a row/column.
    fn penalty_adjacent(&self) -> u32 {
        let mut score = 0;
        for i in 0..self.width {
            for line in [self.row_colors(i), self.column_colors(i)] {
                let mut run = 1usize;
                for w in line.windows(2) {
                    if w[0] == w[1] {
                        run += 1;
                        if run == 5 {
                            score += PENALTY_ADJACENT;
                        } else if run > 5 {
                            score += 1;
                        }
                    } else {
                        run = 1;
                    }
                }
            }
        }
        score
    }

    /// Rule 2: 2×2 blocks of same-colored modules.
    fn penalty_blocks(&self) -> u32 {
        let mut score = 0;
        for y in 0..self.width - 1 {
            for x in 0..self.width - 1 {
                let c = self.get(x, y).color();
                if self.get(x + 1, y).color() == c
                    && self.get(x, y + 1).color() == c
                    && self.get(x + 1, y + 1).color() == c
                {
                    score += PENALTY_BLOCK;
                }
            }
        }
        score
    }

    /// Rule 3: patterns resembling a finder (1:1:3:1:1 with four light
    /// modules on one side) in a row/column.
    fn penalty_finder_like(&self) -> u32 {
        const A: [bool; 11] = [
            true, false, true, true, true, false, true, false, false, false, false,
        ];
        const B: [bool; 11] = [
            false, false, false, false, true, false, true, true, true, false, true,
        ];
        let mut score = 0;
        for i in 0..self.width {
            for line in [self.row_colors(i), self.column_colors(i)] {
                for window in line.windows(11) {
                    if window == &A[..] || window == &B[..] {
                        score += PENALTY_FINDER_LIKE;
                    }
                }
            }
        }
        score
    }

    /// Rule 4: deviation of the dark-module ratio from 50%, in 5% steps.
    fn penalty_ratio(&self) -> u32 {
        let total = self.modules.len() as i32;
        let dark = self
            .modules
            .iter()
            .filter(|m| m.color() == Color::Dark)
            .count() as i32;
        let k = ((dark * 20 - total * 10).abs() + total - 1) / total - 1;
        PENALTY_RATIO * (k.max(0) as u32)
    }

    pub fn penalty_score(&self) -> u32 {
        self.penalty_adjacent()
            + self.penalty_blocks()
            + self.penalty_finder_like()
            + self.penalty_ratio()
    }
}
