//! Conversion of engine glyph data into drawable primitives.
//!
//! Everything here is a pure function of its inputs: an [`Outline`] or a
//! [`Bitmap`] plus the zoom factor (and gamma for pixel colors). The output
//! lives in [`DisplaySpace`], where the y axis points down and the glyph
//! origin sits at `(0, 0)`.

use euclid::{Box2D, Point2D, Vector2D};
use palette::Srgba;

use crate::backend::{Bitmap, Outline, OutlinePoint, PixelMode, PointTag};

/// Display coordinates: zoomed pixels, y axis pointing down.
pub struct DisplaySpace;

pub type DisplayPoint = Point2D<f32, DisplaySpace>;
pub type DisplayBox = Box2D<f32, DisplaySpace>;

/// Offset of a point index label from its point.
const LABEL_OFFSET: (f32, f32) = (3.0, -3.0);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathSegment {
    MoveTo(DisplayPoint),
    LineTo(DisplayPoint),
    QuadTo {
        ctrl: DisplayPoint,
        to: DisplayPoint,
    },
    CubicTo {
        ctrl1: DisplayPoint,
        ctrl2: DisplayPoint,
        to: DisplayPoint,
    },
    Close,
}

/// Drawable glyph outline.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlyphPath {
    pub segments: Vec<PathSegment>,
}

impl GlyphPath {
    /// Control box of the path (control points included).
    pub fn bounds(&self) -> Option<DisplayBox> {
        let mut points = Vec::new();
        for segment in &self.segments {
            match *segment {
                PathSegment::MoveTo(p) | PathSegment::LineTo(p) => points.push(p),
                PathSegment::QuadTo { ctrl, to } => points.extend([ctrl, to]),
                PathSegment::CubicTo { ctrl1, ctrl2, to } => points.extend([ctrl1, ctrl2, to]),
                PathSegment::Close => {}
            }
        }

        if points.is_empty() {
            return None;
        }
        Some(Box2D::from_points(points))
    }
}

fn to_display(point: &OutlinePoint, zoom: f32) -> DisplayPoint {
    Point2D::new(point.position.x * zoom, -point.position.y * zoom)
}

fn midpoint(a: DisplayPoint, b: DisplayPoint) -> DisplayPoint {
    a.lerp(b, 0.5)
}

/// Decomposes `outline` into path segments, scaled by `zoom`.
///
/// Two consecutive conic control points imply an on-curve point halfway
/// between them. A contour may start on a conic point; if it has no on-curve
/// point at all, it starts at the midpoint of its last and first points.
pub fn outline_path(outline: &Outline, zoom: u32) -> GlyphPath {
    let zoom = zoom as f32;
    let mut segments = Vec::new();

    for range in outline.contour_ranges() {
        let Some(contour) = outline.points.get(range.clone()) else {
            log::warn!("Outline contour {:?} exceeds {} points", range, outline.points.len());
            break;
        };
        if contour.is_empty() {
            continue;
        }

        let points: Vec<(DisplayPoint, PointTag)> = contour
            .iter()
            .map(|point| (to_display(point, zoom), point.tag))
            .collect();

        // rotate so that iteration begins right after an on-curve point
        let (start, rest): (DisplayPoint, Vec<(DisplayPoint, PointTag)>) =
            match points.iter().position(|&(_, tag)| tag == PointTag::On) {
                Some(first_on) => (
                    points[first_on].0,
                    points[first_on + 1..]
                        .iter()
                        .chain(&points[..first_on])
                        .copied()
                        .collect(),
                ),
                None => {
                    let last = points[points.len() - 1].0;
                    (midpoint(last, points[0].0), points.clone())
                }
            };

        segments.push(PathSegment::MoveTo(start));

        let mut conic: Option<DisplayPoint> = None;
        let mut cubic: Vec<DisplayPoint> = Vec::with_capacity(2);

        for (point, tag) in rest
            .into_iter()
            .chain(std::iter::once((start, PointTag::On)))
        {
            match tag {
                PointTag::On => {
                    let segment = if let Some(ctrl) = conic.take() {
                        PathSegment::QuadTo { ctrl, to: point }
                    } else {
                        match cubic.as_slice() {
                            [] => PathSegment::LineTo(point),
                            [ctrl] => {
                                log::warn!(
                                    "Lone cubic control point {:?}, drawing it as a degenerate cubic",
                                    ctrl
                                );
                                PathSegment::CubicTo {
                                    ctrl1: *ctrl,
                                    ctrl2: *ctrl,
                                    to: point,
                                }
                            }
                            [ctrl1, ctrl2, ..] => PathSegment::CubicTo {
                                ctrl1: *ctrl1,
                                ctrl2: *ctrl2,
                                to: point,
                            },
                        }
                    };
                    cubic.clear();
                    segments.push(segment);
                }
                PointTag::Conic => {
                    if let Some(ctrl) = conic {
                        segments.push(PathSegment::QuadTo {
                            ctrl,
                            to: midpoint(ctrl, point),
                        });
                    }
                    conic = Some(point);
                }
                PointTag::Cubic => cubic.push(point),
            }
        }

        segments.push(PathSegment::Close);
    }

    GlyphPath { segments }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointMarker {
    pub position: DisplayPoint,
    pub on_curve: bool,
    pub index: usize,
}

/// One marker per outline point. On-curve and off-curve points are told apart
/// by `on_curve`.
pub fn point_markers(outline: &Outline, zoom: u32) -> Vec<PointMarker> {
    outline
        .points
        .iter()
        .enumerate()
        .map(|(index, point)| PointMarker {
            position: to_display(point, zoom as f32),
            on_curve: point.tag == PointTag::On,
            index,
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct PointLabel {
    pub position: DisplayPoint,
    pub text: String,
}

pub fn point_labels(outline: &Outline, zoom: u32) -> Vec<PointLabel> {
    outline
        .points
        .iter()
        .enumerate()
        .map(|(index, point)| PointLabel {
            position: to_display(point, zoom as f32)
                + Vector2D::new(LABEL_OFFSET.0, LABEL_OFFSET.1),
            text: index.to_string(),
        })
        .collect()
}

/// Maps raw bitmap values to colors.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorTable {
    colors: Vec<Srgba<u8>>,
}

impl ColorTable {
    /// Two entries: white background, black ink.
    pub fn mono() -> Self {
        Self {
            colors: vec![
                Srgba::new(255, 255, 255, 255),
                Srgba::new(0, 0, 0, 255),
            ],
        }
    }

    /// 256 gray levels, dark for full coverage, shaped by `gamma`.
    pub fn gray(gamma: f64) -> Self {
        let exponent = 1.0 / gamma.max(f64::EPSILON);
        Self {
            colors: (0..=255u8)
                .map(|i| {
                    let coverage = (i as f64 / 255.0).powf(exponent);
                    let v = (255.0 - 255.0 * coverage).round().clamp(0.0, 255.0) as u8;
                    Srgba::new(v, v, v, 255)
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Color of raw value `value`; values past the end map to the last entry.
    pub fn color(&self, value: u8) -> Srgba<u8> {
        let index = (value as usize).min(self.colors.len().saturating_sub(1));
        self.colors
            .get(index)
            .copied()
            .unwrap_or(Srgba::new(255, 255, 255, 255))
    }

    /// Single channel value of a gray entry.
    fn level(&self, value: u8) -> u8 {
        self.color(value).red
    }
}

/// Bitmap expanded to colors, ready to be drawn as zoomed squares.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelImage {
    /// Display position of the top-left pixel.
    pub origin: DisplayPoint,
    /// Edge length of one glyph pixel in display units.
    pub pixel_size: u32,
    pub width: u32,
    pub height: u32,
    /// Row-major, `width * height` entries.
    pub pixels: Vec<Srgba<u8>>,
}

impl PixelImage {
    pub fn pixel(&self, x: u32, y: u32) -> Option<Srgba<u8>> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }
}

/// Converts a rasterized glyph to colored pixels.
///
/// Mono bitmaps use [`ColorTable::mono`], everything else the gamma-shaped
/// gray table. LCD bitmaps map each subpixel to one color channel.
pub fn bitmap_image(bitmap: &Bitmap, zoom: u32, gamma: f64) -> PixelImage {
    let (width, height) = match bitmap.pixel_mode {
        PixelMode::Mono | PixelMode::Gray => (bitmap.width, bitmap.rows),
        PixelMode::Lcd => (bitmap.width / 3, bitmap.rows),
        PixelMode::LcdV => (bitmap.width, bitmap.rows / 3),
    };

    let mut pixels = Vec::with_capacity((width * height) as usize);
    match bitmap.pixel_mode {
        PixelMode::Mono => {
            let table = ColorTable::mono();
            for y in 0..height {
                for x in 0..width {
                    pixels.push(table.color(bitmap.value(x, y)));
                }
            }
        }
        PixelMode::Gray => {
            let table = ColorTable::gray(gamma);
            for y in 0..height {
                for x in 0..width {
                    pixels.push(table.color(bitmap.value(x, y)));
                }
            }
        }
        PixelMode::Lcd => {
            let table = ColorTable::gray(gamma);
            for y in 0..height {
                for x in 0..width {
                    let [r, g, b] = [0, 1, 2].map(|i| table.level(bitmap.value(x * 3 + i, y)));
                    pixels.push(Srgba::new(r, g, b, 255));
                }
            }
        }
        PixelMode::LcdV => {
            let table = ColorTable::gray(gamma);
            for y in 0..height {
                for x in 0..width {
                    let [r, g, b] = [0, 1, 2].map(|i| table.level(bitmap.value(x, y * 3 + i)));
                    pixels.push(Srgba::new(r, g, b, 255));
                }
            }
        }
    }

    let zoom_f = zoom as f32;
    PixelImage {
        origin: Point2D::new(bitmap.left as f32 * zoom_f, -(bitmap.top as f32) * zoom_f),
        pixel_size: zoom,
        width,
        height,
        pixels,
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f32, y: f32, tag: PointTag) -> OutlinePoint {
        OutlinePoint {
            position: Point2D::new(x, y),
            tag,
        }
    }

    fn p(x: f32, y: f32) -> DisplayPoint {
        Point2D::new(x, y)
    }

    #[test]
    fn lines_are_flipped_and_zoomed() {
        let outline = Outline {
            points: vec![
                point(0.0, 0.0, PointTag::On),
                point(1.0, 0.0, PointTag::On),
                point(1.0, 2.0, PointTag::On),
            ],
            contours: vec![2],
        };

        let path = outline_path(&outline, 10);
        assert_eq!(
            path.segments,
            vec![
                PathSegment::MoveTo(p(0.0, 0.0)),
                PathSegment::LineTo(p(10.0, 0.0)),
                PathSegment::LineTo(p(10.0, -20.0)),
                PathSegment::LineTo(p(0.0, 0.0)),
                PathSegment::Close,
            ]
        );

        let bounds = path.bounds().unwrap();
        assert_eq!(bounds.min, p(0.0, -20.0));
        assert_eq!(bounds.max, p(10.0, 0.0));
    }

    #[test]
    fn consecutive_conics_get_implied_midpoints() {
        let outline = Outline {
            points: vec![
                point(0.0, 0.0, PointTag::On),
                point(2.0, 0.0, PointTag::Conic),
                point(4.0, 2.0, PointTag::Conic),
                point(4.0, 4.0, PointTag::On),
            ],
            contours: vec![3],
        };

        let path = outline_path(&outline, 1);
        assert_eq!(
            path.segments,
            vec![
                PathSegment::MoveTo(p(0.0, 0.0)),
                PathSegment::QuadTo {
                    ctrl: p(2.0, 0.0),
                    to: p(3.0, -1.0),
                },
                PathSegment::QuadTo {
                    ctrl: p(4.0, -2.0),
                    to: p(4.0, -4.0),
                },
                PathSegment::LineTo(p(0.0, 0.0)),
                PathSegment::Close,
            ]
        );
    }

    #[test]
    fn contours_may_start_off_curve() {
        // starts on a conic, closes through the on-curve point
        let starts_conic = Outline {
            points: vec![
                point(2.0, 0.0, PointTag::Conic),
                point(4.0, 0.0, PointTag::On),
                point(0.0, 0.0, PointTag::On),
            ],
            contours: vec![2],
        };
        let path = outline_path(&starts_conic, 1);
        assert_eq!(path.segments[0], PathSegment::MoveTo(p(4.0, 0.0)));
        assert_eq!(
            path.segments[2],
            PathSegment::QuadTo {
                ctrl: p(2.0, 0.0),
                to: p(4.0, 0.0),
            }
        );

        // only conics: a circle-like contour starts at an implied midpoint
        let all_conic = Outline {
            points: vec![
                point(0.0, 2.0, PointTag::Conic),
                point(2.0, 2.0, PointTag::Conic),
                point(2.0, 0.0, PointTag::Conic),
                point(0.0, 0.0, PointTag::Conic),
            ],
            contours: vec![3],
        };
        let path = outline_path(&all_conic, 1);
        assert_eq!(path.segments[0], PathSegment::MoveTo(p(0.0, -1.0)));
        let quads = path
            .segments
            .iter()
            .filter(|s| matches!(s, PathSegment::QuadTo { .. }))
            .count();
        assert_eq!(quads, 4);
        assert_eq!(
            path.segments[path.segments.len() - 2],
            PathSegment::QuadTo {
                ctrl: p(0.0, 0.0),
                to: p(0.0, -1.0),
            }
        );
    }

    #[test]
    fn cubic_pairs_become_cubic_segments() {
        let outline = Outline {
            points: vec![
                point(0.0, 0.0, PointTag::On),
                point(1.0, 1.0, PointTag::Cubic),
                point(2.0, 1.0, PointTag::Cubic),
                point(3.0, 0.0, PointTag::On),
                point(9.0, 9.0, PointTag::On),
            ],
            contours: vec![3, 4],
        };

        let path = outline_path(&outline, 2);
        assert_eq!(
            path.segments[1],
            PathSegment::CubicTo {
                ctrl1: p(2.0, -2.0),
                ctrl2: p(4.0, -2.0),
                to: p(6.0, 0.0),
            }
        );
        // second contour of a single point
        assert_eq!(
            path.segments[4..],
            [
                PathSegment::MoveTo(p(18.0, -18.0)),
                PathSegment::LineTo(p(18.0, -18.0)),
                PathSegment::Close,
            ]
        );
    }

    #[test]
    fn lone_cubic_control_stays_cubic() {
        let outline = Outline {
            points: vec![
                point(0.0, 0.0, PointTag::On),
                point(1.0, 2.0, PointTag::Cubic),
                point(4.0, 0.0, PointTag::On),
            ],
            contours: vec![2],
        };

        let path = outline_path(&outline, 1);
        assert_eq!(
            path.segments[1],
            PathSegment::CubicTo {
                ctrl1: p(1.0, -2.0),
                ctrl2: p(1.0, -2.0),
                to: p(4.0, 0.0),
            }
        );
        assert!(
            !path
                .segments
                .iter()
                .any(|s| matches!(s, PathSegment::QuadTo { .. }))
        );
    }

    #[test]
    fn path_is_deterministic() {
        let outline = Outline {
            points: vec![
                point(0.5, 0.0, PointTag::On),
                point(3.0, -0.5, PointTag::Conic),
                point(6.0, 0.5, PointTag::On),
            ],
            contours: vec![2],
        };
        assert_eq!(outline_path(&outline, 7), outline_path(&outline, 7));
        assert_eq!(GlyphPath::default().bounds(), None);
    }

    #[test]
    fn markers_and_labels_follow_points() {
        let outline = Outline {
            points: vec![point(1.0, 1.0, PointTag::On), point(2.0, 3.0, PointTag::Conic)],
            contours: vec![1],
        };

        let markers = point_markers(&outline, 4);
        assert_eq!(
            markers,
            vec![
                PointMarker {
                    position: p(4.0, -4.0),
                    on_curve: true,
                    index: 0
                },
                PointMarker {
                    position: p(8.0, -12.0),
                    on_curve: false,
                    index: 1
                },
            ]
        );

        let labels = point_labels(&outline, 4);
        assert_eq!(labels[1].text, "1");
        assert_eq!(labels[1].position, p(11.0, -15.0));
    }

    #[test]
    fn gray_table_respects_gamma() {
        let linear = ColorTable::gray(1.0);
        assert_eq!(linear.len(), 256);
        assert_eq!(linear.color(0), Srgba::new(255, 255, 255, 255));
        assert_eq!(linear.color(255), Srgba::new(0, 0, 0, 255));
        assert_eq!(linear.color(128).red, 127);

        // gamma > 1 darkens partial coverage
        let dark = ColorTable::gray(2.2);
        assert!(dark.color(128).red < linear.color(128).red);

        assert_eq!(ColorTable::mono().color(1), Srgba::new(0, 0, 0, 255));
        assert_eq!(ColorTable::mono().color(200), Srgba::new(0, 0, 0, 255));
    }

    #[test]
    fn bitmap_image_places_and_colors_pixels() {
        let mono = Bitmap {
            width: 3,
            rows: 2,
            pitch: 1,
            left: 2,
            top: 5,
            pixel_mode: PixelMode::Mono,
            buffer: vec![0b1010_0000, 0b0100_0000],
        };
        let image = bitmap_image(&mono, 10, 1.8);
        assert_eq!(image.origin, p(20.0, -50.0));
        assert_eq!(image.pixel_size, 10);
        assert_eq!((image.width, image.height), (3, 2));
        assert_eq!(image.pixel(0, 0), Some(Srgba::new(0, 0, 0, 255)));
        assert_eq!(image.pixel(1, 0), Some(Srgba::new(255, 255, 255, 255)));
        assert_eq!(image.pixel(1, 1), Some(Srgba::new(0, 0, 0, 255)));
        assert_eq!(image.pixel(3, 0), None);

        let lcd = Bitmap {
            width: 6,
            rows: 1,
            pitch: 6,
            left: 0,
            top: 1,
            pixel_mode: PixelMode::Lcd,
            buffer: vec![255, 0, 255, 0, 0, 0],
        };
        let image = bitmap_image(&lcd, 1, 1.0);
        assert_eq!(image.width, 2);
        assert_eq!(image.pixel(0, 0), Some(Srgba::new(0, 255, 0, 255)));
        assert_eq!(image.pixel(1, 0), Some(Srgba::new(255, 255, 255, 255)));
    }
}
