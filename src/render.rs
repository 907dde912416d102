//! The `render` module turns a finished symbol into raster, vector and
//! text output.

use std::io::Cursor;

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tiff::TiffEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::types::{Color, QrError, QrResult};
use crate::Symbol;

/// The output encodings the renderer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderFormat {
    /// The indexed pixel buffer itself, row-major, one byte per pixel.
    RawBitmap,
    Png,
    Bmp,
    Tiff,
    Jpeg,
    /// Plain PBM (`P1`) text.
    Pbm,
    Svg,
    /// One `#` or space character per pixel.
    Ascii,
}

impl RenderFormat {
    /// The Content-Type string for this format.
    pub fn mime_type(self) -> &'static str {
        match self {
            RenderFormat::RawBitmap => "application/octet-stream",
            RenderFormat::Png => "image/png",
            RenderFormat::Bmp => "image/bmp",
            RenderFormat::Tiff => "image/tiff",
            RenderFormat::Jpeg => "image/jpeg",
            RenderFormat::Pbm => "image/x-portable-bitmap",
            RenderFormat::Svg => "image/svg+xml",
            RenderFormat::Ascii => "text/plain",
        }
    }

    /// Looks up a format by its conventional name, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `Err(QrError::UnsupportedFormat)` for unknown names.
    pub fn from_name(name: &str) -> QrResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "raw" => Ok(RenderFormat::RawBitmap),
            "png" => Ok(RenderFormat::Png),
            "bmp" => Ok(RenderFormat::Bmp),
            "tiff" => Ok(RenderFormat::Tiff),
            "jpeg" | "jpg" => Ok(RenderFormat::Jpeg),
            "pbm" => Ok(RenderFormat::Pbm),
            "svg" => Ok(RenderFormat::Svg),
            "ascii" => Ok(RenderFormat::Ascii),
            _ => Err(QrError::UnsupportedFormat),
        }
    }
}

/// The traversal order of a multi-symbol set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Order {
    Forward,
    Reverse,
}

/// How to render a symbol. The configuration never affects the symbol's
/// modules, only their presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    pub format: RenderFormat,
    /// Pixels per module. Must be at least 1.
    pub magnify: u32,
    /// Quiet zone width in modules, 0 to 16.
    pub separator: u32,
    pub order: Order,
    pub foreground: [u8; 3],
    pub background: [u8; 3],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            format: RenderFormat::Png,
            magnify: 1,
            separator: 4,
            order: Order::Forward,
            foreground: [0, 0, 0],
            background: [255, 255, 255],
        }
    }
}

impl RenderConfig {
    fn validate(&self) -> QrResult<()> {
        if self.magnify == 0 || self.separator > 16 {
            return Err(QrError::InvalidRenderConfig);
        }
        Ok(())
    }
}

/// A two-color indexed pixel buffer. The palette may be recolored between
/// rasterization and encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    /// Palette indices, row-major, one byte per pixel.
    pub pixels: Vec<u8>,
    pub palette: [[u8; 3]; 2],
}

impl Bitmap {
    /// The palette index of dark modules.
    pub const FOREGROUND: u8 = 0;
    /// The palette index of light modules and the quiet zone.
    pub const BACKGROUND: u8 = 1;

    /// Expands the indexed pixels through the palette into packed RGB.
    pub fn to_rgb(&self) -> Vec<u8> {
        let mut rgb = Vec::with_capacity(self.pixels.len() * 3);
        for &index in &self.pixels {
            rgb.extend_from_slice(&self.palette[usize::from(index)]);
        }
        rgb
    }
}

/// Rasterizes a symbol into an indexed bitmap, applying the quiet zone and
/// magnification.
///
/// # Errors
///
/// Returns `Err(QrError::InvalidRenderConfig)` on a zero magnification or
/// a quiet zone wider than 16 modules.
pub fn to_bitmap(symbol: &Symbol, config: &RenderConfig) -> QrResult<Bitmap> {
    config.validate()?;
    let modules = symbol.width() as u32 + 2 * config.separator;
    let dim = modules * config.magnify;
    let mut pixels = vec![Bitmap::BACKGROUND; (dim as usize) * (dim as usize)];
    for y in 0..symbol.width() {
        for x in 0..symbol.width() {
            if symbol.module(x, y) == Color::Light {
                continue;
            }
            let px = (x as u32 + config.separator) * config.magnify;
            let py = (y as u32 + config.separator) * config.magnify;
            for dy in 0..config.magnify {
                let row = ((py + dy) * dim + px) as usize;
                for p in &mut pixels[row..row + config.magnify as usize] {
                    *p = Bitmap::FOREGROUND;
                }
            }
        }
    }
    Ok(Bitmap {
        width: dim,
        height: dim,
        pixels,
        palette: [config.foreground, config.background],
    })
}

/// Renders a symbol into the encoded bytes of the configured format.
pub fn render(symbol: &Symbol, config: &RenderConfig) -> QrResult<Vec<u8>> {
    config.validate()?;
    match config.format {
        RenderFormat::RawBitmap => Ok(to_bitmap(symbol, config)?.pixels),
        RenderFormat::Png | RenderFormat::Bmp | RenderFormat::Tiff | RenderFormat::Jpeg => {
            encode_raster(&to_bitmap(symbol, config)?, config.format)
        }
        RenderFormat::Pbm => Ok(to_pbm(&to_bitmap(symbol, config)?).into_bytes()),
        RenderFormat::Ascii => Ok(to_ascii(&to_bitmap(symbol, config)?).into_bytes()),
        RenderFormat::Svg => Ok(to_svg(symbol, config).into_bytes()),
    }
}

fn encode_raster(bitmap: &Bitmap, format: RenderFormat) -> QrResult<Vec<u8>> {
    let rgb = bitmap.to_rgb();
    let mut buffer = Cursor::new(Vec::new());
    let result = match format {
        RenderFormat::Png => PngEncoder::new(&mut buffer).write_image(
            &rgb,
            bitmap.width,
            bitmap.height,
            ExtendedColorType::Rgb8,
        ),
        RenderFormat::Bmp => BmpEncoder::new(&mut buffer).write_image(
            &rgb,
            bitmap.width,
            bitmap.height,
            ExtendedColorType::Rgb8,
        ),
        RenderFormat::Tiff => TiffEncoder::new(&mut buffer).write_image(
            &rgb,
            bitmap.width,
            bitmap.height,
            ExtendedColorType::Rgb8,
        ),
        RenderFormat::Jpeg => JpegEncoder::new(&mut buffer).write_image(
            &rgb,
            bitmap.width,
            bitmap.height,
            ExtendedColorType::Rgb8,
        ),
        _ => unreachable!(),
    };
    result.map_err(|_| QrError::ImageEncoding)?;
    Ok(buffer.into_inner())
}

/// Formats the bitmap as plain PBM (`P1`), where 1 is a dark pixel.
fn to_pbm(bitmap: &Bitmap) -> String {
    let mut out = format!("P1\n{} {}\n", bitmap.width, bitmap.height);
    for row in bitmap.pixels.chunks(bitmap.width as usize) {
        let line: Vec<&str> = row
            .iter()
            .map(|&p| if p == Bitmap::FOREGROUND { "1" } else { "0" })
            .collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out
}

fn to_ascii(bitmap: &Bitmap) -> String {
    let mut out = String::with_capacity(bitmap.pixels.len() + bitmap.height as usize);
    for row in bitmap.pixels.chunks(bitmap.width as usize) {
        for &p in row {
            out.push(if p == Bitmap::FOREGROUND { '#' } else { ' ' });
        }
        out.push('\n');
    }
    out
}

fn hex_color(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

/// Formats the symbol as an SVG document: a background rectangle plus one
/// path outlining every dark region. Magnification scales the pixel
/// dimensions; the view box stays in module units.
fn to_svg(symbol: &Symbol, config: &RenderConfig) -> String {
    let sep = config.separator as i16;
    let modules = symbol.width() + 2 * sep;
    let pixels = (modules as u32) * config.magnify;

    let mut outline = Outline::new();
    for y in 0..symbol.width() {
        for x in 0..symbol.width() {
            if symbol.module(x, y) == Color::Dark {
                outline.paint(x + sep, y + sep);
            }
        }
    }

    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{px}\" height=\"{px}\" ",
            "viewBox=\"0 0 {m} {m}\" shape-rendering=\"crispEdges\">\n",
            "<rect width=\"{m}\" height=\"{m}\" fill=\"{bg}\"/>\n",
            "<path d=\"{path}\" fill=\"{fg}\"/>\n",
            "</svg>\n"
        ),
        px = pixels,
        m = modules,
        bg = hex_color(config.background),
        fg = hex_color(config.foreground),
        path = outline.into_path(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// One unit edge of a painted cell, directed clockwise around the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Edge {
    sx: i16,
    sy: i16,
    ex: i16,
    ey: i16,
}

impl Edge {
    fn new(sx: i16, sy: i16, ex: i16, ey: i16) -> Self {
        Self { sx, sy, ex, ey }
    }

    fn around_cell(x: i16, y: i16) -> [Edge; 4] {
        [
            Self::new(x, y, x + 1, y),
            Self::new(x + 1, y, x + 1, y + 1),
            Self::new(x + 1, y + 1, x, y + 1),
            Self::new(x, y + 1, x, y),
        ]
    }

    fn reversed(self) -> Self {
        Self::new(self.ex, self.ey, self.sx, self.sy)
    }

    fn direction(self) -> Direction {
        match (self.sx == self.ex, self.sy < self.ey, self.sx < self.ex) {
            (true, true, _) => Direction::Down,
            (true, false, _) => Direction::Up,
            (false, _, true) => Direction::Right,
            (false, _, false) => Direction::Left,
        }
    }

    fn turned(self, direction: Direction) -> Self {
        match direction {
            Direction::Right => Self::new(self.ex, self.ey, self.ex + 1, self.ey),
            Direction::Down => Self::new(self.ex, self.ey, self.ex, self.ey + 1),
            Direction::Left => Self::new(self.ex, self.ey, self.ex - 1, self.ey),
            Direction::Up => Self::new(self.ex, self.ey, self.ex, self.ey - 1),
        }
    }

    /// The three candidate continuations at the end of this edge, innermost
    /// turn first so that touching corners are resolved consistently.
    fn continuations(self) -> [Edge; 3] {
        match self.direction() {
            Direction::Right => [
                self.turned(Direction::Down),
                self.turned(Direction::Up),
                self.turned(Direction::Right),
            ],
            Direction::Down => [
                self.turned(Direction::Left),
                self.turned(Direction::Right),
                self.turned(Direction::Down),
            ],
            Direction::Left => [
                self.turned(Direction::Up),
                self.turned(Direction::Down),
                self.turned(Direction::Left),
            ],
            Direction::Up => [
                self.turned(Direction::Right),
                self.turned(Direction::Left),
                self.turned(Direction::Up),
            ],
        }
    }
}

/// Traces the outline of the painted region. Interior edges cancel as
/// cells are painted, leaving only the boundary loops; holes come out
/// wound opposite to their enclosing loop.
#[derive(Debug, Clone)]
struct Outline {
    edges: hashbrown::HashSet<Edge>,
}

impl Outline {
    fn new() -> Self {
        Self {
            edges: hashbrown::HashSet::new(),
        }
    }

    /// Adds one cell; an edge shared with an already painted neighbor
    /// cancels out.
    fn paint(&mut self, x: i16, y: i16) {
        for edge in Edge::around_cell(x, y) {
            if !self.edges.remove(&edge.reversed()) {
                self.edges.insert(edge);
            }
        }
    }

    fn pop(&mut self) -> Option<Edge> {
        let edge = self.edges.iter().next().copied()?;
        self.edges.remove(&edge);
        Some(edge)
    }

    fn pop_next(&mut self, edge: Edge) -> Option<Edge> {
        edge.continuations()
            .into_iter()
            .find(|e| self.edges.remove(e))
    }

    /// Walks one boundary loop and returns its corner edges.
    fn pop_loop(&mut self) -> Option<Vec<Edge>> {
        let start = self.pop()?;
        let mut corners = Vec::new();
        let mut current = start;
        while let Some(next) = self.pop_next(current) {
            if current.direction() != next.direction() {
                corners.push(current);
            }
            current = next;
            if (current.ex, current.ey) == (start.sx, start.sy) {
                break;
            }
        }
        if current.direction() != start.direction() {
            corners.push(current);
        }
        Some(corners)
    }

    /// Consumes the outline into an SVG path string of axis-aligned loops.
    fn into_path(mut self) -> String {
        let mut path = String::new();
        while let Some(corners) = self.pop_loop() {
            if corners.is_empty() {
                continue;
            }
            path.push_str(&format!("M{} {}", corners[0].ex, corners[0].ey));
            for pair in corners.windows(2) {
                let dx = pair[1].ex - pair[0].ex;
                let dy = pair[1].ey - pair[0].ey;
                if dx == 0 {
                    path.push_str(&format!("v{}", dy));
                } else {
                    path.push_str(&format!("h{}", dx));
                }
            }
            path.push('Z');
        }
        path
    }
}
