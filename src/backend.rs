//! Seam between the inspector core and the font rendering library.
//!
//! The engine facade only talks to fonts through [`FontBackend`] and
//! [`NativeFace`]. The library handles hinting and rasterization. The
//! core decides what to ask for and caches the answers.

use std::path::Path;

use euclid::Point2D;

use crate::render_config::{EngineProperties, LoadFlags};

mod ttf;
#[cfg(test)]
pub(crate) mod test_backend;

pub use ttf::{TtfBackend, TtfFace};

/// Failure reported by the backend.
///
/// The engine wraps it into a domain [`crate::Error`] carrying the face or
/// glyph it was working on.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Outline coordinates: pixels, y axis pointing up, origin on the baseline.
pub struct OutlineSpace;

/// Font technology, used to pick the hinting engine variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FontTechnology {
    TrueType,
    Cff,
    Other,
}

/// Result of probing one face of a font file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaceProbe {
    pub family_name: String,
    pub style_name: String,
    /// Number of named instances; `0` for static faces.
    pub named_instances: u32,
}

/// Result of probing a font file. `None` marks a face that failed to probe.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FontProbe {
    pub faces: Vec<Option<FaceProbe>>,
}

/// Scaled metrics of a face at a given size, in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceMetrics {
    pub units_per_em: u16,
    pub ppem: f32,
    pub ascender: f32,
    pub descender: f32,
    pub height: f32,
    pub glyph_count: u32,
    pub technology: FontTechnology,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointTag {
    On,
    /// Quadratic (conic) control point.
    Conic,
    /// Cubic control point.
    Cubic,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutlinePoint {
    pub position: Point2D<f32, OutlineSpace>,
    pub tag: PointTag,
}

/// Engine-native glyph outline.
///
/// `contours` holds the index of the last point of each contour. Contours are
/// implicitly closed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Outline {
    pub points: Vec<OutlinePoint>,
    pub contours: Vec<usize>,
}

impl Outline {
    /// Approximate heap size, used as cache weight.
    pub fn weight(&self) -> usize {
        self.points.len() * std::mem::size_of::<OutlinePoint>()
            + self.contours.len() * std::mem::size_of::<usize>()
            + std::mem::size_of::<Self>()
    }

    /// Iterates over the point ranges of each contour.
    pub fn contour_ranges(&self) -> impl Iterator<Item = std::ops::RangeInclusive<usize>> + '_ {
        let mut start = 0;
        self.contours.iter().map(move |&end| {
            let range = start..=end;
            start = end + 1;
            range
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelMode {
    /// 1 bit per pixel, most significant bit first.
    Mono,
    /// 8 bit coverage.
    Gray,
    /// 3 subpixels per pixel horizontally; `width` counts subpixels.
    Lcd,
    /// 3 subpixels per pixel vertically; `rows` counts subpixels.
    LcdV,
}

/// Rasterized glyph as produced by the engine.
///
/// `left` and `top` are the bearings from the pen position to the top-left
/// pixel, y pointing up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub rows: u32,
    pub pitch: usize,
    pub left: i32,
    pub top: i32,
    pub pixel_mode: PixelMode,
    pub buffer: Vec<u8>,
}

impl Bitmap {
    pub fn empty(pixel_mode: PixelMode) -> Self {
        Self {
            width: 0,
            rows: 0,
            pitch: 0,
            left: 0,
            top: 0,
            pixel_mode,
            buffer: Vec::new(),
        }
    }

    pub fn weight(&self) -> usize {
        self.buffer.len() + std::mem::size_of::<Self>()
    }

    /// Raw value of the pixel at `(x, y)`: `0`/`1` for mono, coverage otherwise.
    pub fn value(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.rows {
            return 0;
        }
        let row = &self.buffer[y as usize * self.pitch..];
        match self.pixel_mode {
            PixelMode::Mono => (row[x as usize / 8] >> (7 - (x % 8))) & 1,
            _ => row[x as usize],
        }
    }
}

/// A face opened by the backend.
pub trait NativeFace {
    fn technology(&self) -> FontTechnology;

    fn glyph_count(&self) -> u32;

    fn family_name(&self) -> Option<String>;

    fn style_name(&self) -> Option<String>;

    /// Best effort; `None` when the face has no glyph names.
    fn glyph_name(&self, glyph_index: u32) -> Option<String>;

    fn metrics(&self, ppem: f32) -> BackendResult<FaceMetrics>;

    fn load_outline(&self, glyph_index: u32, ppem: f32, flags: &LoadFlags)
    -> BackendResult<Outline>;

    fn render_bitmap(&self, glyph_index: u32, ppem: f32, flags: &LoadFlags)
    -> BackendResult<Bitmap>;
}

/// The font rendering library.
pub trait FontBackend {
    type Face: NativeFace;

    /// Probes a font file for its faces and their named instances.
    ///
    /// Fails only if the file cannot be read at all; broken faces are reported
    /// as `None` entries.
    fn probe(&mut self, path: &Path) -> BackendResult<FontProbe>;

    /// Opens a face fresh from disk. `named_instance == 0` is the default instance.
    fn open_face(
        &mut self,
        path: &Path,
        face_index: u32,
        named_instance: u32,
    ) -> BackendResult<Self::Face>;

    /// Applies library-wide properties. Affects faces opened afterwards.
    fn apply_properties(&mut self, properties: &EngineProperties);
}
