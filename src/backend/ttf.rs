use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use euclid::Point2D;
use parking_lot::Mutex;
use skrifa::instance::{Location, LocationRef, Size};
use skrifa::outline::{
    DrawSettings, Engine as HintEngine, HintingInstance, HintingOptions, OutlinePen,
    SmoothMode as HintSmoothMode, Target as HintTarget,
};
use skrifa::MetadataProvider;
use ttf_parser::{GlyphId, Tag, name_id};

use super::{
    BackendError, BackendResult, Bitmap, FaceMetrics, FaceProbe, FontBackend, FontProbe,
    FontTechnology, NativeFace, Outline, OutlinePoint, PixelMode, PointTag,
};
use crate::render_config::{EngineProperties, LoadFlags, RenderTarget};

/// Default backend: `fontdb` + `ttf-parser` for probing and names, `skrifa` for
/// named instances, outlines and hinting, `fontdue` for coverage rasterization.
#[derive(Default)]
pub struct TtfBackend;

impl TtfBackend {
    pub fn new() -> Self {
        Self
    }

    fn read(path: &Path) -> BackendResult<Arc<Vec<u8>>> {
        std::fs::read(path)
            .map(Arc::new)
            .map_err(|e| BackendError::new(format!("cannot read `{}`: {}", path.display(), e)))
    }
}

impl FontBackend for TtfBackend {
    type Face = TtfFace;

    fn probe(&mut self, path: &Path) -> BackendResult<FontProbe> {
        let data = Self::read(path)?;
        let face_count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);

        // fontdb resolves family names the same way font matching does.
        let mut db = fontdb::Database::new();
        db.load_font_source(fontdb::Source::Binary(data.clone()));
        let families: HashMap<u32, String, fxhash::FxBuildHasher> = db
            .faces()
            .filter_map(|info| Some((info.index, info.families.first()?.0.clone())))
            .collect();

        let faces = (0..face_count)
            .map(|index| match ttf_parser::Face::parse(&data, index) {
                Ok(face) => Some(FaceProbe {
                    family_name: families
                        .get(&index)
                        .cloned()
                        .or_else(|| family_name(&face))
                        .unwrap_or_default(),
                    style_name: face_name(&face, name_id::SUBFAMILY).unwrap_or_default(),
                    named_instances: named_instance_count(&data, index),
                }),
                Err(e) => {
                    log::warn!(
                        "Failed to probe face {} of `{}`: {}",
                        index,
                        path.display(),
                        e
                    );
                    None
                }
            })
            .collect();

        Ok(FontProbe { faces })
    }

    fn open_face(
        &mut self,
        path: &Path,
        face_index: u32,
        named_instance: u32,
    ) -> BackendResult<TtfFace> {
        let data = Self::read(path)?;

        let face = ttf_parser::Face::parse(&data, face_index)
            .map_err(|e| BackendError::new(format!("face {}: {}", face_index, e)))?;
        let font = skrifa::FontRef::from_index(&data, face_index)
            .map_err(|e| BackendError::new(format!("face {}: {}", face_index, e)))?;
        let instance = InstanceSelection::new(&font, named_instance)?;

        let technology = if face.tables().glyf.is_some() {
            FontTechnology::TrueType
        } else if face.tables().cff.is_some() || face.tables().cff2.is_some() {
            FontTechnology::Cff
        } else {
            FontTechnology::Other
        };
        let units_per_em = face.units_per_em();
        let glyph_count = face.number_of_glyphs() as u32;

        let raster = fontdue::Font::from_bytes(
            data.as_slice(),
            fontdue::FontSettings {
                collection_index: face_index,
                scale: 40.0,
                load_substitutions: false,
            },
        )
        .map_err(|e| BackendError::new(format!("rasterizer rejected face: {}", e)))?;

        Ok(TtfFace {
            data,
            index: face_index,
            instance,
            technology,
            units_per_em,
            glyph_count,
            raster,
            hinting: Mutex::new(None),
        })
    }

    fn apply_properties(&mut self, properties: &EngineProperties) {
        // skrifa selects interpreter and autohinter behavior from the hinting
        // target alone; the properties only invalidate previously opened faces
        log::debug!("Engine properties applied: {:?}", properties);
    }
}

/// Axis values and style name of the selected named instance.
#[derive(Debug, Default)]
struct InstanceSelection {
    /// User-space coordinates, applied to `ttf-parser` for metrics.
    variations: Vec<(Tag, f32)>,
    /// Normalized coordinates, handed to `skrifa` for outlines.
    location: Location,
    subfamily_name_id: Option<u16>,
}

impl InstanceSelection {
    /// `named_instance` is 1-based; `0` selects the default instance.
    fn new(font: &skrifa::FontRef<'_>, named_instance: u32) -> BackendResult<Self> {
        if named_instance == 0 {
            return Ok(Self::default());
        }

        let instance = font
            .named_instances()
            .get(named_instance as usize - 1)
            .ok_or_else(|| {
                BackendError::new(format!("named instance {} is missing", named_instance))
            })?;

        let variations = font
            .axes()
            .iter()
            .zip(instance.user_coords())
            .map(|(axis, value)| (Tag::from_bytes(&axis.tag().to_be_bytes()), value))
            .collect();

        Ok(Self {
            variations,
            location: instance.location(),
            subfamily_name_id: Some(instance.subfamily_name_id().to_u16()),
        })
    }
}

fn named_instance_count(data: &[u8], face_index: u32) -> u32 {
    skrifa::FontRef::from_index(data, face_index)
        .map(|font| font.named_instances().len() as u32)
        .unwrap_or(0)
}

/// Maps the per-glyph load flags onto skrifa's hinting modes.
fn hinting_options(flags: &LoadFlags) -> Option<HintingOptions> {
    if !flags.hinting {
        return None;
    }

    let engine = if flags.force_autohint {
        HintEngine::Auto(None)
    } else {
        HintEngine::AutoFallback
    };
    let smooth = |mode| HintTarget::Smooth {
        mode,
        symmetric_rendering: true,
        preserve_linear_metrics: false,
    };
    let target = match flags.target {
        RenderTarget::Mono => HintTarget::Mono,
        RenderTarget::Normal => smooth(HintSmoothMode::Normal),
        RenderTarget::Light => smooth(HintSmoothMode::Light),
        RenderTarget::Lcd { .. } => smooth(HintSmoothMode::Lcd),
        RenderTarget::LcdV { .. } => smooth(HintSmoothMode::VerticalLcd),
    };

    Some(HintingOptions { engine, target })
}

struct PreparedHinting {
    ppem: u32,
    flags: LoadFlags,
    instance: HintingInstance,
}

/// A face opened by [`TtfBackend`].
pub struct TtfFace {
    data: Arc<Vec<u8>>,
    index: u32,
    instance: InstanceSelection,
    technology: FontTechnology,
    units_per_em: u16,
    glyph_count: u32,
    raster: fontdue::Font,
    // hinting instances run the font programs on creation; keep the last one
    hinting: Mutex<Option<PreparedHinting>>,
}

impl TtfFace {
    fn face(&self) -> BackendResult<ttf_parser::Face<'_>> {
        let mut face = ttf_parser::Face::parse(&self.data, self.index)
            .map_err(|e| BackendError::new(e.to_string()))?;
        for &(tag, value) in &self.instance.variations {
            face.set_variation(tag, value);
        }
        Ok(face)
    }

    fn font(&self) -> BackendResult<skrifa::FontRef<'_>> {
        skrifa::FontRef::from_index(&self.data, self.index)
            .map_err(|e| BackendError::new(e.to_string()))
    }
}

impl NativeFace for TtfFace {
    fn technology(&self) -> FontTechnology {
        self.technology
    }

    fn glyph_count(&self) -> u32 {
        self.glyph_count
    }

    fn family_name(&self) -> Option<String> {
        family_name(&self.face().ok()?)
    }

    fn style_name(&self) -> Option<String> {
        let face = self.face().ok()?;
        self.instance
            .subfamily_name_id
            .and_then(|id| face_name(&face, id))
            .or_else(|| face_name(&face, name_id::SUBFAMILY))
    }

    fn glyph_name(&self, glyph_index: u32) -> Option<String> {
        let glyph = u16::try_from(glyph_index).ok()?;
        self.face()
            .ok()?
            .glyph_name(GlyphId(glyph))
            .map(str::to_string)
    }

    fn metrics(&self, ppem: f32) -> BackendResult<FaceMetrics> {
        let face = self.face()?;
        let scale = ppem / self.units_per_em as f32;

        Ok(FaceMetrics {
            units_per_em: self.units_per_em,
            ppem,
            ascender: face.ascender() as f32 * scale,
            descender: face.descender() as f32 * scale,
            height: face.height() as f32 * scale,
            glyph_count: self.glyph_count,
            technology: self.technology,
        })
    }

    fn load_outline(&self, glyph_index: u32, ppem: f32, flags: &LoadFlags) -> BackendResult<Outline> {
        let font = self.font()?;
        let outlines = font.outline_glyphs();
        let Some(glyph) = outlines.get(skrifa::GlyphId::new(glyph_index)) else {
            if glyph_index < self.glyph_count {
                // empty glyphs (e.g. space) have no outline; that is not an error
                return Ok(Outline::default());
            }
            return Err(BackendError::new(format!("glyph {} is out of range", glyph_index)));
        };

        let size = Size::new(ppem);
        let location = LocationRef::new(self.instance.location.coords());
        let mut collector = OutlineCollector::new(1.0);

        let drawn = match hinting_options(flags) {
            Some(options) => {
                let mut hinting = self.hinting.lock();
                let key = (ppem.to_bits(), *flags);
                let prepared = match hinting.take() {
                    Some(prepared) if (prepared.ppem, prepared.flags) == key => prepared,
                    _ => PreparedHinting {
                        ppem: key.0,
                        flags: key.1,
                        instance: HintingInstance::new(&outlines, size, location, options)
                            .map_err(|e| BackendError::new(format!("hinting failed: {}", e)))?,
                    },
                };
                let drawn = glyph.draw(&prepared.instance, &mut collector);
                *hinting = Some(prepared);
                drawn
            }
            None => glyph.draw(DrawSettings::unhinted(size, location), &mut collector),
        };
        drawn.map_err(|e| BackendError::new(e.to_string()))?;

        Ok(collector.finish())
    }

    fn render_bitmap(&self, glyph_index: u32, ppem: f32, flags: &LoadFlags) -> BackendResult<Bitmap> {
        let glyph = u16::try_from(glyph_index)
            .map_err(|_| BackendError::new("glyph index exceeds 16 bits"))?;

        match flags.target {
            RenderTarget::Lcd { bgr } => {
                let (metrics, mut coverage) = self.raster.rasterize_indexed_subpixel(glyph, ppem);
                let width = metrics.width * 3;
                if bgr {
                    for pixel in coverage.chunks_exact_mut(3) {
                        pixel.swap(0, 2);
                    }
                }
                Ok(Bitmap {
                    width: width as u32,
                    rows: metrics.height as u32,
                    pitch: width,
                    left: metrics.xmin,
                    top: metrics.ymin + metrics.height as i32,
                    pixel_mode: PixelMode::Lcd,
                    buffer: coverage,
                })
            }
            RenderTarget::LcdV { .. } => {
                let (metrics, coverage) = self.raster.rasterize_indexed(glyph, ppem);
                let mut buffer = Vec::with_capacity(coverage.len() * 3);
                for row in coverage.chunks_exact(metrics.width.max(1)) {
                    for _ in 0..3 {
                        buffer.extend_from_slice(row);
                    }
                }
                Ok(Bitmap {
                    width: metrics.width as u32,
                    rows: metrics.height as u32 * 3,
                    pitch: metrics.width,
                    left: metrics.xmin,
                    top: metrics.ymin + metrics.height as i32,
                    pixel_mode: PixelMode::LcdV,
                    buffer,
                })
            }
            RenderTarget::Mono => {
                let (metrics, coverage) = self.raster.rasterize_indexed(glyph, ppem);
                let pitch = metrics.width.div_ceil(8);
                let mut buffer = vec![0u8; pitch * metrics.height];
                for (y, row) in coverage.chunks_exact(metrics.width.max(1)).enumerate() {
                    for (x, &value) in row.iter().enumerate() {
                        if value >= 128 {
                            buffer[y * pitch + x / 8] |= 0x80 >> (x % 8);
                        }
                    }
                }
                Ok(Bitmap {
                    width: metrics.width as u32,
                    rows: metrics.height as u32,
                    pitch,
                    left: metrics.xmin,
                    top: metrics.ymin + metrics.height as i32,
                    pixel_mode: PixelMode::Mono,
                    buffer,
                })
            }
            RenderTarget::Normal | RenderTarget::Light => {
                let (metrics, coverage) = self.raster.rasterize_indexed(glyph, ppem);
                Ok(Bitmap {
                    width: metrics.width as u32,
                    rows: metrics.height as u32,
                    pitch: metrics.width,
                    left: metrics.xmin,
                    top: metrics.ymin + metrics.height as i32,
                    pixel_mode: PixelMode::Gray,
                    buffer: coverage,
                })
            }
        }
    }
}

fn face_name(face: &ttf_parser::Face<'_>, id: u16) -> Option<String> {
    face.names()
        .into_iter()
        .filter(|name| name.name_id == id)
        .find_map(|name| name.to_string())
}

fn family_name(face: &ttf_parser::Face<'_>) -> Option<String> {
    face_name(face, name_id::TYPOGRAPHIC_FAMILY).or_else(|| face_name(face, name_id::FAMILY))
}

/// Records pen commands as tagged points.
struct OutlineCollector {
    scale: f32,
    outline: Outline,
    contour_start: usize,
    open: bool,
}

impl OutlineCollector {
    fn new(scale: f32) -> Self {
        Self {
            scale,
            outline: Outline::default(),
            contour_start: 0,
            open: false,
        }
    }

    fn push(&mut self, x: f32, y: f32, tag: PointTag) {
        self.outline.points.push(OutlinePoint {
            position: Point2D::new(x * self.scale, y * self.scale),
            tag,
        });
    }

    fn end_contour(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;

        let points = &mut self.outline.points;
        // pens may repeat the start point before closing
        if points.len() > self.contour_start + 1 {
            let first = points[self.contour_start];
            if let Some(last) = points.last() {
                if last.tag == PointTag::On && last.position == first.position {
                    points.pop();
                }
            }
        }

        if points.len() > self.contour_start {
            self.outline.contours.push(points.len() - 1);
        }
    }

    fn finish(mut self) -> Outline {
        self.end_contour();
        self.outline
    }
}

impl OutlinePen for OutlineCollector {
    fn move_to(&mut self, x: f32, y: f32) {
        self.end_contour();
        self.contour_start = self.outline.points.len();
        self.open = true;
        self.push(x, y, PointTag::On);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.push(x, y, PointTag::On);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.push(x1, y1, PointTag::Conic);
        self.push(x, y, PointTag::On);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.push(x1, y1, PointTag::Cubic);
        self.push(x2, y2, PointTag::Cubic);
        self.push(x, y, PointTag::On);
    }

    fn close(&mut self) {
        self.end_contour();
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_config::{AntiAliasing, RenderConfig};

    const DEJAVU: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

    /// Builds an sfnt holding only an `fvar` table with `wght` (100..400..900)
    /// and `wdth` (50..100..200) axes.
    fn variable_font(instances: &[(u16, [f32; 2])]) -> Vec<u8> {
        fn fixed(value: f32) -> [u8; 4] {
            ((value * 65536.0) as i32).to_be_bytes()
        }

        let axes = [(*b"wght", 100.0, 400.0, 900.0), (*b"wdth", 50.0, 100.0, 200.0)];
        let mut fvar = Vec::new();
        fvar.extend_from_slice(&1u16.to_be_bytes());
        fvar.extend_from_slice(&0u16.to_be_bytes());
        fvar.extend_from_slice(&16u16.to_be_bytes()); // axes offset
        fvar.extend_from_slice(&2u16.to_be_bytes());
        fvar.extend_from_slice(&(axes.len() as u16).to_be_bytes());
        fvar.extend_from_slice(&20u16.to_be_bytes());
        fvar.extend_from_slice(&(instances.len() as u16).to_be_bytes());
        fvar.extend_from_slice(&(4 + 4 * axes.len() as u16).to_be_bytes());
        for (i, (tag, min, default, max)) in axes.iter().enumerate() {
            fvar.extend_from_slice(tag);
            fvar.extend_from_slice(&fixed(*min));
            fvar.extend_from_slice(&fixed(*default));
            fvar.extend_from_slice(&fixed(*max));
            fvar.extend_from_slice(&0u16.to_be_bytes());
            fvar.extend_from_slice(&(256 + i as u16).to_be_bytes());
        }
        for (name_id, coords) in instances {
            fvar.extend_from_slice(&name_id.to_be_bytes());
            fvar.extend_from_slice(&0u16.to_be_bytes());
            for value in coords {
                fvar.extend_from_slice(&fixed(*value));
            }
        }

        let mut font = Vec::new();
        font.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        font.extend_from_slice(&1u16.to_be_bytes());
        font.extend_from_slice(&[0, 16, 0, 0, 0, 0]);
        font.extend_from_slice(b"fvar");
        font.extend_from_slice(&0u32.to_be_bytes());
        font.extend_from_slice(&28u32.to_be_bytes());
        font.extend_from_slice(&(fvar.len() as u32).to_be_bytes());
        font.extend_from_slice(&fvar);
        font
    }

    #[test]
    fn collector_drops_repeated_start_point() {
        let mut collector = OutlineCollector::new(0.5);
        collector.move_to(0.0, 0.0);
        collector.line_to(100.0, 0.0);
        collector.quad_to(100.0, 100.0, 0.0, 100.0);
        collector.line_to(0.0, 0.0);
        collector.close();

        let outline = collector.finish();
        assert_eq!(outline.contours, vec![3]);
        assert_eq!(outline.points.len(), 4);
        assert_eq!(outline.points[2].tag, PointTag::Conic);
        assert_eq!(outline.points[3].position, Point2D::new(0.0, 50.0));
    }

    #[test]
    fn collector_keeps_cubic_points_and_unclosed_contours() {
        let mut collector = OutlineCollector::new(1.0);
        collector.move_to(0.0, 0.0);
        collector.curve_to(1.0, 2.0, 3.0, 4.0, 5.0, 0.0);
        collector.close();
        collector.move_to(10.0, 10.0);
        collector.line_to(20.0, 10.0);

        let outline = collector.finish();
        assert_eq!(outline.contours, vec![3, 5]);
        let tags: Vec<_> = outline.points.iter().map(|p| p.tag).collect();
        assert_eq!(
            tags,
            vec![
                PointTag::On,
                PointTag::Cubic,
                PointTag::Cubic,
                PointTag::On,
                PointTag::On,
                PointTag::On
            ]
        );
    }

    #[test]
    fn named_instances_are_counted_per_face() {
        let font = variable_font(&[(258, [700.0, 100.0]), (259, [400.0, 50.0])]);
        assert_eq!(named_instance_count(&font, 0), 2);
        assert_eq!(named_instance_count(&variable_font(&[]), 0), 0);
        assert_eq!(named_instance_count(b"not a font", 0), 0);
    }

    #[test]
    fn named_instance_coordinates_are_applied() {
        let data = variable_font(&[(258, [900.0, 100.0]), (259, [400.0, 50.0])]);
        let font = skrifa::FontRef::from_index(&data, 0).unwrap();

        let bold = InstanceSelection::new(&font, 1).unwrap();
        assert_eq!(
            bold.variations,
            vec![(Tag::from_bytes(b"wght"), 900.0), (Tag::from_bytes(b"wdth"), 100.0)]
        );
        assert_eq!(bold.subfamily_name_id, Some(258));
        let coords: Vec<f32> = bold.location.coords().iter().map(|c| c.to_f32()).collect();
        assert_eq!(coords, vec![1.0, 0.0]);

        let narrow = InstanceSelection::new(&font, 2).unwrap();
        let coords: Vec<f32> = narrow.location.coords().iter().map(|c| c.to_f32()).collect();
        assert_eq!(coords, vec![0.0, -1.0]);
        assert_eq!(narrow.subfamily_name_id, Some(259));

        let default = InstanceSelection::new(&font, 0).unwrap();
        assert!(default.variations.is_empty());
        assert_eq!(default.subfamily_name_id, None);

        assert!(InstanceSelection::new(&font, 3).is_err());
    }

    #[test]
    fn hinting_options_follow_the_load_flags() {
        let mut config = RenderConfig::new();
        config.set_hinting(false);
        assert!(hinting_options(&config.load_flags()).is_none());

        config.set_hinting(true);
        config.set_anti_aliasing(AntiAliasing::None);
        let options = hinting_options(&config.load_flags()).unwrap();
        assert!(matches!(options.target, HintTarget::Mono));
        assert!(matches!(options.engine, HintEngine::AutoFallback));

        config.set_anti_aliasing(AntiAliasing::LcdVertical);
        config.set_auto_hinting(true);
        let options = hinting_options(&config.load_flags()).unwrap();
        assert!(matches!(options.engine, HintEngine::Auto(None)));
        assert!(matches!(
            options.target,
            HintTarget::Smooth {
                mode: HintSmoothMode::VerticalLcd,
                ..
            }
        ));
    }

    #[test]
    fn hinted_outlines_differ_from_unhinted_ones() {
        let path = Path::new(DEJAVU);
        if !path.exists() {
            return;
        }

        let mut backend = TtfBackend::new();
        let probe = backend.probe(path).unwrap();
        assert_eq!(probe.faces[0].as_ref().unwrap().named_instances, 0);
        assert!(backend.open_face(path, 0, 1).is_err());

        let face = backend.open_face(path, 0, 0).unwrap();
        let glyph = u32::from(
            ttf_parser::Face::parse(&face.data, 0)
                .unwrap()
                .glyph_index('o')
                .unwrap()
                .0,
        );

        let mut config = RenderConfig::new();
        config.set_hinting(false);
        let unhinted = face.load_outline(glyph, 13.0, &config.load_flags()).unwrap();
        config.set_hinting(true);
        config.set_anti_aliasing(AntiAliasing::None);
        let hinted = face.load_outline(glyph, 13.0, &config.load_flags()).unwrap();
        // same instance is reused for the second load
        let again = face.load_outline(glyph, 13.0, &config.load_flags()).unwrap();

        assert_eq!(hinted.points.len(), unhinted.points.len());
        assert_eq!(hinted.contours, unhinted.contours);
        assert_ne!(hinted, unhinted);
        assert_eq!(hinted, again);
    }

    #[test]
    fn probing_a_missing_file_fails() {
        let mut backend = TtfBackend::new();
        assert!(backend.probe(Path::new("/nonexistent/font.ttf")).is_err());
    }

    #[test]
    fn probing_garbage_reports_an_invalid_face() {
        let path = std::env::temp_dir().join(format!(
            "glyphscope-garbage-{}.ttf",
            std::process::id()
        ));
        std::fs::write(&path, b"definitely not a font").unwrap();

        let mut backend = TtfBackend::new();
        let probe = backend.probe(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(probe.faces, vec![None]);
    }
}
