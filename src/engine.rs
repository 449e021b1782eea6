//! Rendering engine facade.
//!
//! [`Engine`] is the single owner of the font backend and of its caches:
//!
//! * the face manager (`FaceId` → opened face),
//! * the size cache (`ScaleKey` → scaled metrics),
//! * the image cache (`ImageKey` → outline),
//! * the small bitmap cache (`ImageKey` → rasterized glyph).
//!
//! Faces are addressed by the abstract ids of the [`FaceRegistry`]. When a
//! face is not open (never opened, or evicted), the face requester maps the id
//! back to its triplet and reopens the file through the backend.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::backend::{Bitmap, FaceMetrics, FontBackend, NativeFace, Outline};
use crate::error::{Error, Result};
use crate::face_id::{FaceId, FaceRegistry, FaceTriplet};
use crate::font_catalog::FontCatalog;
use crate::render_config::{EngineProperties, LoadFlags, RenderConfig, SIZE_UNITS_PER_PIXEL};

mod lru;

use lru::LruCache;

const fn non_zero(n: usize) -> NonZeroUsize {
    match NonZeroUsize::new(n) {
        Some(n) => n,
        None => panic!("cache capacity must be non-zero"),
    }
}

/// Bounds of the engine caches.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Maximum number of simultaneously opened faces.
    pub max_faces: NonZeroUsize,
    /// Maximum number of scaled-size contexts.
    pub max_sizes: NonZeroUsize,
    pub max_images: NonZeroUsize,
    /// Memory budget of the outline cache in bytes.
    pub image_budget_bytes: usize,
    pub max_bitmaps: NonZeroUsize,
    /// Memory budget of the small bitmap cache in bytes.
    pub bitmap_budget_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_faces: non_zero(4),
            max_sizes: non_zero(8),
            max_images: non_zero(512),
            image_budget_bytes: 200_000,
            max_bitmaps: non_zero(512),
            bitmap_budget_bytes: 200_000,
        }
    }
}

/// Scaled-size descriptor of a face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScaleKey {
    pub face_id: FaceId,
    /// Size in 1/64 of the authoritative unit.
    pub size_26_6: u32,
    /// Whether `size_26_6` counts pixels (otherwise points).
    pub pixels: bool,
    pub dpi: u32,
}

impl ScaleKey {
    pub fn new(face_id: FaceId, config: &RenderConfig) -> Self {
        let size = config.size();
        Self {
            face_id,
            size_26_6: (size.value() * SIZE_UNITS_PER_PIXEL).round() as u32,
            pixels: size.unit() == crate::render_config::Unit::Pixels,
            dpi: config.dpi(),
        }
    }
}

/// Key of the image and small bitmap caches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageKey {
    pub scale: ScaleKey,
    pub glyph_index: u32,
    pub flags: LoadFlags,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlyphKind {
    /// Scalable outline from the image cache.
    Outline,
    /// Pre-rendered bitmap from the small bitmap cache.
    Bitmap,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GlyphImage {
    Outline(Arc<Outline>),
    Bitmap(Arc<Bitmap>),
}

/// Counters describing cache behaviour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub face_opens: usize,
    pub size_misses: usize,
    pub image_hits: usize,
    pub image_misses: usize,
    pub bitmap_hits: usize,
    pub bitmap_misses: usize,
    pub flushes: usize,
}

#[derive(Clone, Copy)]
struct CurrentSize {
    scale: ScaleKey,
    metrics: FaceMetrics,
}

pub struct Engine<B: FontBackend> {
    backend: B,
    registry: FaceRegistry,

    faces: LruCache<FaceId, B::Face>,
    sizes: LruCache<ScaleKey, FaceMetrics>,
    images: LruCache<ImageKey, Arc<Outline>>,
    bitmaps: LruCache<ImageKey, Arc<Bitmap>>,

    applied_properties: Option<EngineProperties>,
    seen_generation: Option<u64>,
    current: Option<CurrentSize>,

    stats: CacheStats,
}

impl<B: FontBackend> Engine<B> {
    pub fn new(backend: B, config: &CacheConfig) -> Self {
        Self {
            backend,
            registry: FaceRegistry::new(),
            faces: LruCache::new(config.max_faces),
            sizes: LruCache::new(config.max_sizes),
            images: LruCache::with_weight_budget(
                config.max_images,
                config.image_budget_bytes,
                |outline: &Arc<Outline>| outline.weight(),
            ),
            bitmaps: LruCache::with_weight_budget(
                config.max_bitmaps,
                config.bitmap_budget_bytes,
                |bitmap: &Arc<Bitmap>| bitmap.weight(),
            ),
            applied_properties: None,
            seen_generation: None,
            current: None,
            stats: CacheStats::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn registry(&self) -> &FaceRegistry {
        &self.registry
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Drops every cached face, size, outline and bitmap.
    pub fn reset(&mut self) {
        self.faces.clear();
        self.sizes.clear();
        self.images.clear();
        self.bitmaps.clear();
        self.current = None;
        self.stats.flushes += 1;
        log::debug!("Engine caches flushed");
    }
}

/// identity
impl<B: FontBackend> Engine<B> {
    pub fn resolve_face(&mut self, triplet: FaceTriplet) -> Result<FaceId> {
        self.registry.resolve(triplet)
    }

    /// Retires the ids of a closed font (and of every font shifted by the close)
    /// and purges everything cached for them.
    pub fn retire_font(&mut self, font_index: usize) -> Vec<FaceId> {
        let retired = self.registry.retire_font(font_index);
        if retired.is_empty() {
            return retired;
        }

        let doomed: HashSet<FaceId, fxhash::FxBuildHasher> = retired.iter().copied().collect();
        self.faces.retain(|id| !doomed.contains(id));
        self.sizes.retain(|scale| !doomed.contains(&scale.face_id));
        self.images.retain(|key| !doomed.contains(&key.scale.face_id));
        self.bitmaps.retain(|key| !doomed.contains(&key.scale.face_id));

        if self
            .current
            .is_some_and(|current| doomed.contains(&current.scale.face_id))
        {
            self.current = None;
        }

        log::debug!("Retired face ids {:?}", retired);
        retired
    }
}

/// configuration
impl<B: FontBackend> Engine<B> {
    /// Brings the engine in line with `config`.
    ///
    /// Changed engine properties are applied to the backend and flush all
    /// caches. Faces opened before the first sync carry the backend defaults,
    /// so they are flushed as well. A new key generation drops the memoized
    /// current face/size context.
    pub fn sync_config(&mut self, config: &RenderConfig) {
        let properties = config.engine_properties();
        if self.applied_properties != Some(properties) {
            self.backend.apply_properties(&properties);
            if self.applied_properties.is_some() || !self.faces.is_empty() {
                self.reset();
            }
            self.applied_properties = Some(properties);
        }

        let generation = config.key_generation();
        if self.seen_generation != Some(generation) {
            self.current = None;
            self.seen_generation = Some(generation);
        }
    }
}

/// face requester
impl<B: FontBackend> Engine<B> {
    fn request_face(&mut self, id: FaceId, catalog: &FontCatalog) -> Result<B::Face> {
        let triplet = match self.registry.lookup(id) {
            Ok(triplet) => triplet,
            Err(Error::NotFound(id)) => {
                log::error!("Face id {} was requested but never allocated", id);
                return Err(Error::InternalConsistency(format!(
                    "face id {} was never allocated",
                    id
                )));
            }
            Err(e) => return Err(e),
        };

        let Some(font) = catalog.font(triplet.font_index) else {
            log::error!("Face id {} points at missing font {}", id, triplet.font_index);
            return Err(Error::InternalConsistency(format!(
                "face id {} points at missing font {}",
                id, triplet.font_index
            )));
        };

        let face = font
            .face(triplet.face_index)
            .filter(|face| face.is_valid())
            .ok_or(Error::InvalidFaceIndex {
                font: triplet.font_index,
                face: triplet.face_index,
            })?;
        if Some(triplet.named_instance_index) > face.named_instances() {
            return Err(Error::InvalidInstanceIndex {
                font: triplet.font_index,
                face: triplet.face_index,
                instance: triplet.named_instance_index,
            });
        }

        log::trace!("Opening face {} ({:?})", id, triplet);
        self.backend
            .open_face(
                font.path(),
                triplet.face_index,
                triplet.named_instance_index,
            )
            .map_err(|e| {
                log::error!("Failed to open face {} from `{}`: {}", id, font.path().display(), e);
                Error::FaceOpenFailed {
                    id,
                    reason: e.to_string(),
                }
            })
    }

    fn lookup_face(&mut self, id: FaceId, catalog: &FontCatalog) -> Result<&B::Face> {
        if !self.faces.contains_key(&id) {
            let face = self.request_face(id, catalog)?;
            self.stats.face_opens += 1;
            self.faces.insert(id, face);
        }

        self.faces
            .get(&id)
            .ok_or_else(|| Error::InternalConsistency(format!("face {} vanished from cache", id)))
    }
}

/// glyph access
impl<B: FontBackend> Engine<B> {
    /// Ensures a scaled-size context for `id` under `config` and returns its metrics.
    pub fn select_face(
        &mut self,
        id: FaceId,
        config: &RenderConfig,
        catalog: &FontCatalog,
    ) -> Result<FaceMetrics> {
        self.sync_config(config);

        let scale = ScaleKey::new(id, config);
        if let Some(current) = self.current {
            if current.scale == scale {
                return Ok(current.metrics);
            }
        }

        let metrics = match self.sizes.get(&scale) {
            Some(metrics) => *metrics,
            None => {
                let ppem = config.engine_pixel_size() as f32;
                let metrics = self
                    .lookup_face(id, catalog)?
                    .metrics(ppem)
                    .map_err(|e| Error::FaceOpenFailed {
                        id,
                        reason: e.to_string(),
                    })?;
                self.stats.size_misses += 1;
                self.sizes.insert(scale, metrics);
                metrics
            }
        };

        self.current = Some(CurrentSize { scale, metrics });
        Ok(metrics)
    }

    /// Loads a glyph as outline or bitmap through the matching cache.
    ///
    /// The load flags derived from `config` are part of the cache key, so
    /// different hinting or anti-aliasing settings never share an entry.
    pub fn load_glyph(
        &mut self,
        id: FaceId,
        glyph_index: u32,
        kind: GlyphKind,
        config: &RenderConfig,
        catalog: &FontCatalog,
    ) -> Result<GlyphImage> {
        let metrics = self.select_face(id, config, catalog)?;
        if glyph_index >= metrics.glyph_count {
            return Err(Error::IndexOutOfRange {
                index: glyph_index as usize,
                len: metrics.glyph_count as usize,
            });
        }

        let key = ImageKey {
            scale: ScaleKey::new(id, config),
            glyph_index,
            flags: config.load_flags(),
        };
        let glyph_error = |e: crate::backend::BackendError| Error::GlyphLoadFailed {
            glyph: glyph_index,
            reason: e.to_string(),
        };

        match kind {
            GlyphKind::Outline => {
                if let Some(outline) = self.images.get(&key) {
                    self.stats.image_hits += 1;
                    return Ok(GlyphImage::Outline(Arc::clone(outline)));
                }

                let outline = self
                    .lookup_face(id, catalog)?
                    .load_outline(glyph_index, metrics.ppem, &key.flags)
                    .map_err(glyph_error)?;
                self.stats.image_misses += 1;
                log::trace!("Image cache miss for {:?}", key);

                let outline = Arc::new(outline);
                self.images.insert(key, Arc::clone(&outline));
                Ok(GlyphImage::Outline(outline))
            }
            GlyphKind::Bitmap => {
                if let Some(bitmap) = self.bitmaps.get(&key) {
                    self.stats.bitmap_hits += 1;
                    return Ok(GlyphImage::Bitmap(Arc::clone(bitmap)));
                }

                let bitmap = self
                    .lookup_face(id, catalog)?
                    .render_bitmap(glyph_index, metrics.ppem, &key.flags)
                    .map_err(glyph_error)?;
                self.stats.bitmap_misses += 1;
                log::trace!("Small bitmap cache miss for {:?}", key);

                let bitmap = Arc::new(bitmap);
                self.bitmaps.insert(key, Arc::clone(&bitmap));
                Ok(GlyphImage::Bitmap(bitmap))
            }
        }
    }

    /// Glyph name, if the face has one. Never fails.
    pub fn glyph_name(
        &mut self,
        id: FaceId,
        glyph_index: u32,
        catalog: &FontCatalog,
    ) -> Option<String> {
        self.lookup_face(id, catalog)
            .ok()?
            .glyph_name(glyph_index)
            .filter(|name| !name.is_empty())
    }

    /// Family and style name reported by the opened face.
    pub fn face_names(
        &mut self,
        id: FaceId,
        catalog: &FontCatalog,
    ) -> Result<(Option<String>, Option<String>)> {
        let face = self.lookup_face(id, catalog)?;
        Ok((face.family_name(), face.style_name()))
    }
}
