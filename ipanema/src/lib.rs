//! Glyph rasterization and caching.
//!
//! A [`FontContext`] owns the faces of one thread and the engines built on
//! them. An engine is a face at a pixel size; it loads glyphs through the
//! hinting policy, renders them into mono, gray or LCD bitmaps and keeps
//! the results in per-transform glyph sets.
//!
//! ```no_run
//! use ipanema::{FaceId, FontContext, FontDef, Fixed, RasterConfig, Transform};
//!
//! let mut context = FontContext::new(RasterConfig::default());
//! let face = FaceId::file("/usr/share/fonts/TTF/DejaVuSans.ttf", 0);
//! let engine = context.acquire_engine(&face, FontDef::new(16.0)).unwrap();
//! let glyph = context.glyph_index_for(engine, 'A').unwrap();
//! if let Some(raster) = context.raster_for(engine, glyph, Fixed::ZERO, None, &Transform::IDENTITY) {
//!     println!("{:?}", raster.glyph().map(|g| (g.width, g.height)));
//! }
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod face;
pub mod fixed;
pub mod glyph;
pub mod glyph_set;
pub mod hint;
pub mod path;
pub mod raster;
pub mod scan;
pub mod synthetic;
pub mod transform;

pub use backend::{FontLibrary, GlyphId, NativeFace, SfntLibrary};
pub use config::RasterConfig;
pub use context::{EngineHandle, EngineProperties, FontContext};
pub use engine::{
    FontDef, FontEngine, FontStyle, GlyphLayout, GlyphMeasure, Raster, Synthesized,
};
pub use error::{ConfigError, FaceError, LoadError};
pub use face::{Face, FaceId, FaceProperties, FaceRegistry, FontBlob};
pub use fixed::{Fixed, FixedMatrix};
pub use glyph::{Glyph, GlyphMetrics};
pub use hint::{HintStyle, HintingPreference};
pub use path::{Path, PathPoint, PathSegment};
pub use raster::{LcdFilter, PixelFormat, SubpixelGeometry};
pub use transform::{Transform, TransformKind};
