//! In-memory backend for tests. Fonts are described by [`TestFace`] specs
//! registered under fake paths; "deleting" a path makes later opens fail.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use euclid::Point2D;

use super::{
    BackendError, BackendResult, Bitmap, FaceMetrics, FaceProbe, FontBackend, FontProbe,
    FontTechnology, NativeFace, Outline, OutlinePoint, PixelMode, PointTag,
};
use crate::render_config::{EngineProperties, LoadFlags, RenderTarget};

#[derive(Clone, Debug)]
pub(crate) struct TestFace {
    pub family: String,
    pub style: String,
    pub named_instances: u32,
    pub glyph_count: u32,
    pub technology: FontTechnology,
}

impl TestFace {
    pub fn new(family: &str, named_instances: u32) -> Self {
        Self {
            family: family.to_string(),
            style: "Regular".to_string(),
            named_instances,
            glyph_count: 1200,
            technology: FontTechnology::TrueType,
        }
    }
}

#[derive(Default)]
pub(crate) struct TestBackend {
    files: HashMap<PathBuf, Vec<Option<TestFace>>>,
    pub opens: usize,
    pub property_applications: usize,
    pub properties: Option<EngineProperties>,
}

impl TestBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<PathBuf>, faces: Vec<Option<TestFace>>) {
        self.files.insert(path.into(), faces);
    }

    pub fn delete(&mut self, path: impl AsRef<Path>) {
        self.files.remove(path.as_ref());
    }
}

impl FontBackend for TestBackend {
    type Face = TestNativeFace;

    fn probe(&mut self, path: &Path) -> BackendResult<FontProbe> {
        let faces = self
            .files
            .get(path)
            .ok_or_else(|| BackendError::new("no such file"))?;

        Ok(FontProbe {
            faces: faces
                .iter()
                .map(|face| {
                    face.as_ref().map(|face| FaceProbe {
                        family_name: face.family.clone(),
                        style_name: face.style.clone(),
                        named_instances: face.named_instances,
                    })
                })
                .collect(),
        })
    }

    fn open_face(
        &mut self,
        path: &Path,
        face_index: u32,
        named_instance: u32,
    ) -> BackendResult<TestNativeFace> {
        let faces = self
            .files
            .get(path)
            .ok_or_else(|| BackendError::new("no such file"))?;
        let spec = faces
            .get(face_index as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| BackendError::new("broken face"))?;
        if named_instance > spec.named_instances {
            return Err(BackendError::new("no such instance"));
        }

        self.opens += 1;
        Ok(TestNativeFace {
            spec: spec.clone(),
            named_instance,
        })
    }

    fn apply_properties(&mut self, properties: &EngineProperties) {
        self.property_applications += 1;
        self.properties = Some(*properties);
    }
}

pub(crate) struct TestNativeFace {
    spec: TestFace,
    named_instance: u32,
}

impl NativeFace for TestNativeFace {
    fn technology(&self) -> FontTechnology {
        self.spec.technology
    }

    fn glyph_count(&self) -> u32 {
        self.spec.glyph_count
    }

    fn family_name(&self) -> Option<String> {
        Some(self.spec.family.clone())
    }

    fn style_name(&self) -> Option<String> {
        if self.named_instance > 0 {
            Some(format!("Instance {}", self.named_instance))
        } else {
            Some(self.spec.style.clone())
        }
    }

    fn glyph_name(&self, glyph_index: u32) -> Option<String> {
        // odd glyphs are unnamed
        (glyph_index % 2 == 0).then(|| format!("glyph{}", glyph_index))
    }

    fn metrics(&self, ppem: f32) -> BackendResult<FaceMetrics> {
        Ok(FaceMetrics {
            units_per_em: 1000,
            ppem,
            ascender: ppem * 0.8,
            descender: -ppem * 0.2,
            height: ppem * 1.2,
            glyph_count: self.spec.glyph_count,
            technology: self.spec.technology,
        })
    }

    fn load_outline(&self, glyph_index: u32, ppem: f32, flags: &LoadFlags) -> BackendResult<Outline> {
        if glyph_index == 13 {
            return Err(BackendError::new("unlucky glyph"));
        }

        let shift = self.named_instance as f32 * 0.25 + glyph_index as f32 * 0.01;
        let w = ppem * 0.6 + shift;
        let h = ppem * 0.7;
        let raw = [
            (0.3, 0.0, PointTag::On),
            (w * 0.5, -0.45, PointTag::Conic),
            (w, 0.3, PointTag::On),
            (w + 0.2, h * 0.3, PointTag::Cubic),
            (w + 0.2, h * 0.6, PointTag::Cubic),
            (w, h, PointTag::On),
            (0.3, h, PointTag::On),
        ];

        let round = |v: f32| if flags.hinting { v.round() } else { v };
        Ok(Outline {
            points: raw
                .iter()
                .map(|&(x, y, tag)| OutlinePoint {
                    position: Point2D::new(round(x), round(y)),
                    tag,
                })
                .collect(),
            contours: vec![raw.len() - 1],
        })
    }

    fn render_bitmap(&self, glyph_index: u32, ppem: f32, flags: &LoadFlags) -> BackendResult<Bitmap> {
        if glyph_index == 13 {
            return Err(BackendError::new("unlucky glyph"));
        }

        let width = (ppem * 0.6).ceil() as u32;
        let rows = (ppem * 0.7).ceil() as u32;
        let coverage = |x: u32, y: u32| ((x * 37 + y * 11) % 256) as u8;

        let bitmap = match flags.target {
            RenderTarget::Mono => {
                let pitch = (width as usize).div_ceil(8);
                let mut buffer = vec![0u8; pitch * rows as usize];
                for y in 0..rows {
                    for x in 0..width {
                        if coverage(x, y) >= 128 {
                            buffer[y as usize * pitch + x as usize / 8] |= 0x80 >> (x % 8);
                        }
                    }
                }
                Bitmap {
                    width,
                    rows,
                    pitch,
                    left: 1,
                    top: rows as i32,
                    pixel_mode: PixelMode::Mono,
                    buffer,
                }
            }
            RenderTarget::Lcd { .. } => Bitmap {
                width: width * 3,
                rows,
                pitch: width as usize * 3,
                left: 1,
                top: rows as i32,
                pixel_mode: PixelMode::Lcd,
                buffer: (0..rows)
                    .flat_map(|y| (0..width * 3).map(move |x| coverage(x / 3, y)))
                    .collect(),
            },
            RenderTarget::LcdV { .. } => Bitmap {
                width,
                rows: rows * 3,
                pitch: width as usize,
                left: 1,
                top: rows as i32,
                pixel_mode: PixelMode::LcdV,
                buffer: (0..rows * 3)
                    .flat_map(|y| (0..width).map(move |x| coverage(x, y / 3)))
                    .collect(),
            },
            RenderTarget::Normal | RenderTarget::Light => Bitmap {
                width,
                rows,
                pitch: width as usize,
                left: 1,
                top: rows as i32,
                pixel_mode: PixelMode::Gray,
                buffer: (0..rows)
                    .flat_map(|y| (0..width).map(move |x| coverage(x, y)))
                    .collect(),
            },
        };

        Ok(bitmap)
    }
}
