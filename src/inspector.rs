use std::collections::BTreeMap;
use std::path::PathBuf;

use parking_lot::Mutex;

use crate::backend::{FaceMetrics, FontBackend, TtfBackend};
use crate::engine::{CacheConfig, CacheStats, Engine, GlyphImage, GlyphKind};
use crate::error::{Error, Result};
use crate::face_id::{FaceId, FaceTriplet};
use crate::font_catalog::{FontCatalog, Step};
use crate::geometry::{self, GlyphPath, PixelImage, PointLabel, PointMarker};
use crate::render_config::{ConfigValue, RenderConfig};

/// Glyph offsets offered by the navigation controls.
pub const GLYPH_STEPS: [i64; 4] = [1, 10, 100, 1000];

/// A navigation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Navigation {
    Font(Step),
    Face(Step),
    Instance(Step),
    Glyph(Step),
}

/// Description of the face under the cursor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaceDescription {
    pub id: FaceId,
    pub triplet: FaceTriplet,
    pub file_name: String,
    pub family_name: String,
    pub style_name: String,
    pub face_count: usize,
    /// Number of named instances of the face; `0` for static faces.
    pub named_instances: u32,
}

/// Everything needed to draw one glyph, filtered by the display toggles.
#[derive(Clone, Debug, PartialEq)]
pub struct GlyphRender {
    pub glyph_index: u32,
    pub glyph_name: Option<String>,
    pub metrics: FaceMetrics,
    pub path: Option<GlyphPath>,
    pub markers: Vec<PointMarker>,
    pub labels: Vec<PointLabel>,
    pub image: Option<PixelImage>,
}

struct InspectorState<B: FontBackend> {
    catalog: FontCatalog,
    config: RenderConfig,
    engine: Engine<B>,
    glyph_index: u32,
}

impl<B: FontBackend> InspectorState<B> {
    fn current_id(&mut self) -> Result<FaceId> {
        let triplet = self.catalog.current().ok_or(Error::NoFaceSelected)?;
        self.engine.resolve_face(triplet)
    }

    fn glyph_count(&mut self) -> Result<u32> {
        let id = self.current_id()?;
        let metrics = self.engine.select_face(id, &self.config, &self.catalog)?;
        Ok(metrics.glyph_count)
    }

    /// Keeps the glyph cursor inside the glyph range of the current face.
    fn clamp_glyph(&mut self) {
        let count = self.glyph_count().unwrap_or(0);
        self.glyph_index = self.glyph_index.min(count.saturating_sub(1));
    }
}

/// Interactive inspection session.
///
/// Owns the font catalog, the render configuration and the engine facade
/// behind a single lock, so catalog changes never interleave with rendering.
pub struct Inspector<B: FontBackend = TtfBackend> {
    state: Mutex<InspectorState<B>>,
}

impl Default for Inspector<TtfBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspector<TtfBackend> {
    pub fn new() -> Self {
        Self::with_backend(TtfBackend::new(), CacheConfig::default())
    }
}

impl<B: FontBackend> Inspector<B> {
    pub fn with_backend(backend: B, cache_config: CacheConfig) -> Self {
        Self {
            state: Mutex::new(InspectorState {
                catalog: FontCatalog::new(),
                config: RenderConfig::new(),
                engine: Engine::new(backend, &cache_config),
                glyph_index: 0,
            }),
        }
    }
}

/// catalog
impl<B: FontBackend> Inspector<B> {
    /// Loads font files in order and returns how many were added.
    ///
    /// Unreadable files are logged and skipped.
    pub fn load_fonts<P: Into<PathBuf>>(&self, paths: impl IntoIterator<Item = P>) -> usize {
        let state = &mut *self.state.lock();

        let mut loaded = 0;
        for path in paths {
            match state.catalog.load(path, state.engine.backend_mut()) {
                Ok(_) => loaded += 1,
                Err(e) => log::warn!("{}", e),
            }
        }

        state.clamp_glyph();
        loaded
    }

    /// Closes the font at `index`. Face ids issued for it and for every font
    /// after it become stale.
    pub fn close_font(&self, index: usize) -> Result<()> {
        let state = &mut *self.state.lock();

        state.catalog.close(index)?;
        state.engine.retire_font(index);
        state.clamp_glyph();
        Ok(())
    }

    pub fn font_count(&self) -> usize {
        self.state.lock().catalog.len()
    }

    /// Moves the cursor. Returns whether anything changed.
    pub fn navigate(&self, navigation: Navigation) -> bool {
        let state = &mut *self.state.lock();

        let moved = match navigation {
            Navigation::Font(step) => state.catalog.step_font(step),
            Navigation::Face(step) => state.catalog.step_face(step),
            Navigation::Instance(step) => state.catalog.step_instance(step),
            Navigation::Glyph(step) => {
                let count = state.glyph_count().unwrap_or(0);
                let target = step.apply(state.glyph_index as usize, count as usize) as u32;
                let moved = target != state.glyph_index;
                state.glyph_index = target;
                return moved;
            }
        };

        if moved {
            state.clamp_glyph();
        }
        moved
    }

    /// Jumps to an explicit face.
    pub fn select(&self, triplet: FaceTriplet) -> Result<()> {
        let state = &mut *self.state.lock();
        state.catalog.set_current(triplet)?;
        state.clamp_glyph();
        Ok(())
    }

    pub fn current_face(&self) -> Result<FaceDescription> {
        let state = &mut *self.state.lock();

        let triplet = state.catalog.current().ok_or(Error::NoFaceSelected)?;
        let id = state.engine.resolve_face(triplet)?;
        let font = state
            .catalog
            .font(triplet.font_index)
            .ok_or(Error::NoFaceSelected)?;
        let slot = font.face(triplet.face_index).ok_or(Error::InvalidFaceIndex {
            font: triplet.font_index,
            face: triplet.face_index,
        })?;

        let mut description = FaceDescription {
            id,
            triplet,
            file_name: font.file_name(),
            family_name: slot.family_name().to_string(),
            style_name: slot.style_name().to_string(),
            face_count: font.face_count(),
            named_instances: slot.named_instances().unwrap_or(0),
        };

        // named instances carry their own style names
        if triplet.named_instance_index > 0 {
            match state.engine.face_names(id, &state.catalog) {
                Ok((_, Some(style))) => description.style_name = style,
                Ok((_, None)) => {}
                Err(e) => log::warn!("{}", e),
            }
        }

        Ok(description)
    }

    pub fn glyph_count(&self) -> Result<u32> {
        self.state.lock().glyph_count()
    }

    pub fn current_glyph(&self) -> u32 {
        self.state.lock().glyph_index
    }
}

/// configuration
impl<B: FontBackend> Inspector<B> {
    /// Edits the render configuration in place.
    pub fn update_config<R>(&self, f: impl FnOnce(&mut RenderConfig) -> R) -> R {
        let state = &mut *self.state.lock();
        let result = f(&mut state.config);
        state.engine.sync_config(&state.config);
        result
    }

    pub fn config(&self) -> RenderConfig {
        self.state.lock().config.clone()
    }

    pub fn import_config(&self, map: &BTreeMap<String, ConfigValue>) -> Result<()> {
        let state = &mut *self.state.lock();
        state.config.import(map)?;
        state.engine.sync_config(&state.config);
        Ok(())
    }

    pub fn export_config(&self) -> BTreeMap<String, ConfigValue> {
        self.state.lock().config.export()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.state.lock().engine.stats()
    }
}

/// rendering
impl<B: FontBackend> Inspector<B> {
    pub fn render_current_glyph(&self) -> Result<GlyphRender> {
        let glyph_index = self.current_glyph();
        self.render_glyph(glyph_index)
    }

    /// Renders `glyph_index` of the current face.
    ///
    /// The outline is loaded when outlines or points are shown, the bitmap
    /// when the bitmap is shown.
    pub fn render_glyph(&self, glyph_index: u32) -> Result<GlyphRender> {
        let state = &mut *self.state.lock();

        let id = state.current_id()?;
        let metrics = state.engine.select_face(id, &state.config, &state.catalog)?;
        let config = &state.config;
        let zoom = config.zoom();

        let mut render = GlyphRender {
            glyph_index,
            glyph_name: None,
            metrics,
            path: None,
            markers: Vec::new(),
            labels: Vec::new(),
            image: None,
        };

        if config.show_outlines() || config.show_points() || config.show_point_indices() {
            let image = state
                .engine
                .load_glyph(id, glyph_index, GlyphKind::Outline, config, &state.catalog)?;
            if let GlyphImage::Outline(outline) = image {
                if config.show_outlines() {
                    render.path = Some(geometry::outline_path(&outline, zoom));
                }
                if config.show_points() {
                    render.markers = geometry::point_markers(&outline, zoom);
                }
                if config.show_point_indices() {
                    render.labels = geometry::point_labels(&outline, zoom);
                }
            }
        }

        if config.show_bitmap() {
            let image = state
                .engine
                .load_glyph(id, glyph_index, GlyphKind::Bitmap, config, &state.catalog)?;
            if let GlyphImage::Bitmap(bitmap) = image {
                render.image = Some(geometry::bitmap_image(&bitmap, zoom, config.gamma()));
            }
        }

        render.glyph_name = state.engine.glyph_name(id, glyph_index, &state.catalog);
        Ok(render)
    }
}
