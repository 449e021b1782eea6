//! # Glyphscope
//!
//! The core of a glyph inspection tool: font faces are loaded into a catalog,
//! rendered through a cached engine facade and turned into drawable geometry.
//!
//! ## Overview
//!
//! The entry point is the [`Inspector`], which owns the [`FontCatalog`], the
//! [`RenderConfig`] and the [`Engine`] behind a single lock. The engine talks
//! to the font machinery through the [`backend::FontBackend`] trait; the
//! default [`backend::TtfBackend`] is built on `ttf-parser`, `fontdb`, `skrifa`
//! and `fontdue`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use glyphscope::{Inspector, inspector::Navigation, font_catalog::Step};
//!
//! let inspector = Inspector::new();
//! inspector.load_fonts(["DejaVuSans.ttf"]);
//!
//! inspector.update_config(|config| config.set_zoom(8));
//! inspector.navigate(Navigation::Glyph(Step::Offset(10)));
//!
//! let render = inspector.render_current_glyph().unwrap();
//! println!("{:?} with {} points", render.glyph_name, render.markers.len());
//! ```
//!
//! ## Features
//!
//! *   **Stable face ids**: faces are addressed by abstract ids that are never
//!     reused; closing a font makes the ids of shifted fonts fail instead of aliasing.
//! *   **Multi-level caches**: faces, scaled sizes, outlines and bitmaps are
//!     kept in bounded LRU caches keyed by everything that affects the result.
//! *   **Geometry**: outlines become paths with point markers and labels,
//!     bitmaps become gamma-corrected pixel images.

pub mod backend;
pub mod engine;
pub mod error;
pub mod face_id;
pub mod font_catalog;
pub mod geometry;
pub mod inspector;
pub mod render_config;

// common re-exports
pub use engine::{CacheConfig, Engine};
pub use error::{Error, Result};
pub use face_id::{FaceId, FaceTriplet};
pub use font_catalog::FontCatalog;
pub use inspector::Inspector;
pub use render_config::RenderConfig;

// re-export dependencies
pub use euclid;
pub use fontdb;
pub use fontdue;
pub use palette;
pub use parking_lot;
pub use skrifa;
pub use ttf_parser;
